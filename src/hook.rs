//! Bridge hook: intercepts frames the host stack received on bound
//! interfaces and steers them into the forwarding engine. Installed once at
//! core initialization; bindings come and go with port attach/detach.

use crate::datapath::Datapath;
use crate::error::{Error, Result};
use crate::frame::Frame;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::sync::{Arc, Weak};

struct Binding {
    dp: Weak<Datapath>,
    port_no: u16,
}

pub(crate) struct BridgeHook {
    bindings: RwLock<FxHashMap<String, Binding>>,
}

impl BridgeHook {
    pub(crate) fn new() -> Self {
        Self {
            bindings: RwLock::new(FxHashMap::default()),
        }
    }

    pub(crate) fn bind(&self, iface_name: &str, dp: &Arc<Datapath>, port_no: u16) -> Result<()> {
        let mut bindings = self.bindings.write();
        if bindings.contains_key(iface_name) {
            return Err(Error::Busy);
        }
        bindings.insert(
            iface_name.to_string(),
            Binding {
                dp: Arc::downgrade(dp),
                port_no,
            },
        );
        Ok(())
    }

    /// Removing a binding waits out every frame currently inside
    /// `frame_input`, so no packet from this interface is in flight
    /// afterwards.
    pub(crate) fn unbind(&self, iface_name: &str) {
        self.bindings.write().remove(iface_name);
    }

    pub(crate) fn is_bound(&self, iface_name: &str) -> bool {
        self.bindings.read().contains_key(iface_name)
    }

    /// Entry from the host stack. Returns true when the frame was consumed
    /// by the switch; an unbound interface leaves the frame to the host.
    pub(crate) fn frame_input(&self, iface_name: &str, mut frame: Frame) -> bool {
        let bindings = self.bindings.read();
        let Some(binding) = bindings.get(iface_name) else {
            return false;
        };
        let Some(dp) = binding.dp.upgrade() else {
            return false;
        };
        let port_no = binding.port_no;
        // Private copy first: earlier consumers (capture taps) must not see
        // the restored header.
        frame.unshare();
        frame.restore_mac_header();
        dp.on_ingress(port_no, frame);
        true
    }
}
