//! One attached switch port: interface binding, admin/link state under a
//! narrow lock, and the description snapshot reported to controllers.

use crate::error::{Error, Result};
use crate::iface::HostIface;
use crate::openflow::{PhyPort, PortConfig, PortMod, PortState};
use parking_lot::Mutex;
use std::sync::Arc;

pub const DP_MAX_PORTS: usize = 256;

#[derive(Clone, Copy, Debug)]
struct StatusBits {
    config: PortConfig,
    state: PortState,
}

impl Default for StatusBits {
    fn default() -> Self {
        Self {
            config: PortConfig::empty(),
            state: PortState::empty(),
        }
    }
}

pub struct Port {
    port_no: u16,
    dev: Arc<dyn HostIface>,
    /// Covers `config` and `state` only.
    status: Mutex<StatusBits>,
}

impl Port {
    pub(crate) fn new(port_no: u16, dev: Arc<dyn HostIface>) -> Arc<Self> {
        Arc::new(Self {
            port_no,
            dev,
            status: Mutex::new(StatusBits::default()),
        })
    }

    pub fn port_no(&self) -> u16 {
        self.port_no
    }

    pub fn dev(&self) -> &Arc<dyn HostIface> {
        &self.dev
    }

    pub fn config(&self) -> PortConfig {
        self.status.lock().config
    }

    pub fn state(&self) -> PortState {
        self.status.lock().state
    }

    /// Masked config update; bits outside the known config set are applied
    /// as-is.
    pub fn set_config(&self, mask: u32, bits: u32) {
        let mut status = self.status.lock();
        let current = status.config.bits();
        status.config = PortConfig::from_bits_retain((current & !mask) | (bits & mask));
    }

    /// Refresh PORT_DOWN from the admin flag and LINK_DOWN from carrier.
    pub fn update_link(&self) {
        use crate::iface::IfaceFlags;
        let up = self.dev.flags().contains(IfaceFlags::UP);
        let carrier = self.dev.carrier_ok();
        let mut status = self.status.lock();
        status.config.set(PortConfig::PORT_DOWN, !up);
        status.state.set(PortState::LINK_DOWN, !carrier);
    }

    /// Snapshot for features replies and port-status notifications.
    pub fn fill_description(&self) -> PhyPort {
        let features = self.dev.link_features().unwrap_or_default();
        let status = self.status.lock();
        PhyPort {
            port_no: self.port_no,
            hw_addr: self.dev.hw_addr(),
            name: self.dev.name().to_string(),
            config: status.config.bits(),
            state: status.state.bits(),
            curr: features.curr.bits(),
            advertised: features.advertised.bits(),
            supported: features.supported.bits(),
            peer: features.peer.bits(),
        }
    }

    /// Port-mod request: rejected when the supplied hardware address no
    /// longer matches the device (stale modify).
    pub(crate) fn apply_port_mod(&self, req: &PortMod) -> Result<()> {
        if req.hw_addr != self.dev.hw_addr() {
            return Err(Error::StaleModify);
        }
        if req.mask != 0 {
            self.set_config(req.mask, req.config);
        }
        Ok(())
    }
}
