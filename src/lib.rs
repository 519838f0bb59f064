//! Userspace OpenFlow 1.0 switch datapath.
//!
//! The [`Core`] owns a set of datapath instances, attaches host interfaces
//! to them as switch ports, forwards frames by consulting an external flow
//! chain, and exchanges OpenFlow control messages with controllers over a
//! message-oriented transport. The flow classifier, packet buffer pool,
//! host stack binding and control transport are collaborator traits; the
//! crate ships in-process realizations of the latter two seams
//! ([`store::SlotStore`], [`transport::ChannelTransport`]).

pub mod chain;
pub mod datapath;
pub mod dispatch;
pub mod error;
pub mod frame;
pub mod identity;
pub mod iface;
pub mod openflow;
pub mod port;
pub mod registry;
pub mod store;
pub mod transport;

mod hook;
mod ratelimit;
mod stats;

pub use crate::datapath::{Datapath, SwitchConfig};
pub use crate::error::{Error, Result};
pub use crate::frame::Frame;
pub use crate::port::Port;

use crate::chain::ChainFactory;
use crate::hook::BridgeHook;
use crate::identity::{Descriptions, PlatformIdentity};
use crate::iface::{HostIface, HostStack, IfaceFlags};
use crate::openflow::{OFPPR_ADD, OFPPR_DELETE, OFPP_LOCAL};
use crate::registry::Registry;
use crate::store::PacketStore;
use crate::transport::ControlTransport;
use once_cell::sync::OnceCell;
use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;

/// Pre-registered multicast groups; a datapath with id `i` notifies group
/// `i & (N_MC_GROUPS - 1)`.
pub const N_MC_GROUPS: usize = 16;

/// Lifecycle notifications, all optional.
pub trait CoreObserver: Send + Sync {
    fn datapath_added(&self, _dp: &Arc<Datapath>) {}
    fn datapath_removed(&self, _dp: &Arc<Datapath>) {}
    fn port_added(&self, _dp: &Arc<Datapath>, _port: &Arc<Port>) {}
    fn port_removed(&self, _dp: &Arc<Datapath>, _port: &Arc<Port>) {}
}

pub struct CoreConfig {
    pub descriptions: Descriptions,
    pub platform: Option<PlatformIdentity>,
    /// Hostname baked into each datapath's description string.
    pub node_name: String,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            descriptions: Descriptions::default(),
            platform: None,
            node_name: "localhost".to_string(),
        }
    }
}

/// Process-wide switch state. All administrative mutation serializes on the
/// admin lock; the data plane never takes it.
pub struct Core {
    admin: Mutex<()>,
    registry: Registry,
    hook: BridgeHook,
    host: Arc<dyn HostStack>,
    transport: Arc<dyn ControlTransport>,
    store: Arc<dyn PacketStore>,
    chains: Arc<dyn ChainFactory>,
    observer: OnceCell<Arc<dyn CoreObserver>>,
    descriptions: Arc<Descriptions>,
    node_name: String,
    mc_groups: [u32; N_MC_GROUPS],
}

impl Core {
    /// Builds the core and registers the 16 notification groups on the
    /// transport. The bridge hook is installed here, exactly once.
    pub fn new(
        config: CoreConfig,
        host: Arc<dyn HostStack>,
        transport: Arc<dyn ControlTransport>,
        store: Arc<dyn PacketStore>,
        chains: Arc<dyn ChainFactory>,
    ) -> Result<Core> {
        let mut descriptions = config.descriptions;
        if let Some(platform) = &config.platform {
            descriptions.apply_platform_identity(platform);
        }
        let mut mc_groups = [0u32; N_MC_GROUPS];
        for (i, slot) in mc_groups.iter_mut().enumerate() {
            *slot = transport.register_group(&format!("openflow{i}"))?;
        }
        Ok(Core {
            admin: Mutex::new(()),
            registry: Registry::new(),
            hook: BridgeHook::new(),
            host,
            transport,
            store,
            chains,
            observer: OnceCell::new(),
            descriptions: Arc::new(descriptions),
            node_name: config.node_name,
            mc_groups,
        })
    }

    /// Installs the lifecycle observer; at most once.
    pub fn set_observer(&self, observer: Arc<dyn CoreObserver>) -> Result<()> {
        self.observer
            .set(observer)
            .map_err(|_| Error::AlreadyExists)
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn transport(&self) -> &Arc<dyn ControlTransport> {
        &self.transport
    }

    pub fn descriptions(&self) -> &Descriptions {
        &self.descriptions
    }

    pub fn mc_group(&self, dp_id: u16) -> u32 {
        self.mc_groups[usize::from(dp_id) & (N_MC_GROUPS - 1)]
    }

    pub(crate) fn admin_lock(&self) -> MutexGuard<'_, ()> {
        self.admin.lock()
    }

    /// Entry from the host stack for every frame received on a bound
    /// interface. Returns true when the switch consumed the frame.
    pub fn frame_input(&self, iface_name: &str, frame: Frame) -> bool {
        self.hook.frame_input(iface_name, frame)
    }

    /// Creates a datapath: reserves an id, brings up the local interface,
    /// builds the chain, installs the local port, starts maintenance and
    /// publishes the instance. Any failure unwinds the earlier steps in
    /// reverse.
    pub fn create_datapath(
        &self,
        preferred: Option<u16>,
        name: Option<&str>,
    ) -> Result<Arc<Datapath>> {
        let admin = self.admin.lock();
        let id = self.registry.allocate(preferred, name)?;
        let dev_name = match name {
            Some(name) => name.to_string(),
            None => format!("of{id}"),
        };
        if self.registry.get_by_name(&dev_name).is_some() {
            return Err(Error::AlreadyExists);
        }
        let local_dev = self.host.create_local_iface(&dev_name)?;
        let chain = match self.chains.create_chain() {
            Ok(chain) => chain,
            Err(err) => {
                self.host.destroy_local_iface(&local_dev);
                return Err(err);
            }
        };
        let desc = format!("{} idx={}", self.node_name, id);
        let dp = Datapath::new(
            id,
            dev_name,
            desc,
            Arc::clone(&local_dev),
            chain,
            self.mc_group(id),
            Arc::clone(&self.transport),
            Arc::clone(&self.store),
            Arc::clone(&self.descriptions),
        );
        dp.install_local_port();
        if let Err(err) = dp.start_maintenance() {
            dp.remove_port(OFPP_LOCAL);
            local_dev.set_promiscuous(false);
            self.host.destroy_local_iface(&local_dev);
            return Err(err);
        }
        self.registry.publish(Arc::clone(&dp));
        drop(admin);
        if let Some(observer) = self.observer.get() {
            observer.datapath_added(&dp);
        }
        Ok(dp)
    }

    /// Tears a datapath down: stops maintenance, deletes every port,
    /// unpublishes, discards buffered packets and releases the local
    /// interface.
    pub fn destroy_datapath(&self, dp: &Arc<Datapath>) -> Result<()> {
        let _admin = self.admin.lock();
        self.check_live(dp)?;
        dp.stop_maintenance();
        for port in dp.port_list() {
            self.delete_port_locked(dp, &port);
        }
        if let Some(observer) = self.observer.get() {
            observer.datapath_removed(dp);
        }
        self.registry.remove(dp.id());
        self.store.discard_all();
        self.host.destroy_local_iface(dp.local_dev());
        Ok(())
    }

    /// Attaches a host interface to the lowest free port slot.
    pub fn add_port(&self, dp: &Arc<Datapath>, iface_name: &str) -> Result<u16> {
        let _admin = self.admin.lock();
        self.check_live(dp)?;
        let dev = self
            .host
            .iface_by_name(iface_name)
            .ok_or(Error::NotFound("no such interface"))?;
        if dev.flags().contains(IfaceFlags::LOOPBACK) || self.registry.is_local_iface(dev.name()) {
            return Err(Error::InvalidArgument("interface cannot be attached"));
        }
        if self.hook.is_bound(dev.name()) {
            return Err(Error::Busy);
        }
        let port_no = dp.find_free_slot()?;
        let port = Port::new(port_no, Arc::clone(&dev));
        dev.set_promiscuous(true);
        dp.install_port(Arc::clone(&port));
        port.update_link();
        // The ADD notification goes out before the hook binding, so no
        // packet-in from this port can precede it.
        let _ = dp.send_port_status(&port, OFPPR_ADD);
        self.hook.bind(dev.name(), dp, port_no)?;
        if let Some(observer) = self.observer.get() {
            observer.port_added(dp, &port);
        }
        Ok(port_no)
    }

    /// Detaches the named interface from `dp`. A port owned by another
    /// datapath is not found here.
    pub fn del_port(&self, dp: &Arc<Datapath>, iface_name: &str) -> Result<()> {
        let _admin = self.admin.lock();
        self.check_live(dp)?;
        let port = dp
            .port_list()
            .into_iter()
            .find(|p| p.port_no() != OFPP_LOCAL && p.dev().name() == iface_name)
            .ok_or(Error::NotFound("port not attached to this datapath"))?;
        self.delete_port_locked(dp, &port);
        Ok(())
    }

    /// Caller holds the admin lock. Unbinds, drains in-flight packets, then
    /// publishes the DELETE notification, which therefore follows the last
    /// packet-in naming this port.
    fn delete_port_locked(&self, dp: &Arc<Datapath>, port: &Arc<Port>) {
        port.dev().set_promiscuous(false);
        self.hook.unbind(port.dev().name());
        dp.remove_port(port.port_no());
        let _ = dp.send_port_status(port, OFPPR_DELETE);
        if let Some(observer) = self.observer.get() {
            observer.port_removed(dp, port);
        }
    }

    fn check_live(&self, dp: &Arc<Datapath>) -> Result<()> {
        match self.registry.get_by_id(dp.id()) {
            Some(live) if Arc::ptr_eq(&live, dp) => Ok(()),
            _ => Err(Error::NotFound("datapath not registered")),
        }
    }
}

impl Drop for Core {
    fn drop(&mut self) {
        for dp in self.registry.iter() {
            let _ = self.destroy_datapath(&dp);
        }
    }
}

#[cfg(test)]
mod testsupport;
