//! Host network stack seam: the interfaces a datapath attaches as switch
//! ports, and the stack-level operations the core needs (local interface
//! creation, lookup by name).

use crate::error::Result;
use crate::frame::Frame;
use crate::openflow::PortFeatures;
use bitflags::bitflags;
use std::sync::Arc;

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct IfaceFlags: u32 {
        const UP       = 1 << 0;
        const LOOPBACK = 1 << 1;
    }
}

/// Link feature bitmaps as advertised by the interface driver. Absent when
/// the driver cannot report them; the port description then carries zeros.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LinkFeatures {
    pub curr: PortFeatures,
    pub advertised: PortFeatures,
    pub supported: PortFeatures,
    pub peer: PortFeatures,
}

impl Default for LinkFeatures {
    fn default() -> Self {
        Self {
            curr: PortFeatures::empty(),
            advertised: PortFeatures::empty(),
            supported: PortFeatures::empty(),
            peer: PortFeatures::empty(),
        }
    }
}

/// Interface counters, read on demand for port stats.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IfaceStats {
    pub rx_packets: u64,
    pub tx_packets: u64,
    pub rx_bytes: u64,
    pub tx_bytes: u64,
    pub rx_dropped: u64,
    pub tx_dropped: u64,
    pub rx_errors: u64,
    pub tx_errors: u64,
    pub rx_frame_err: u64,
    pub rx_over_err: u64,
    pub rx_crc_err: u64,
    pub collisions: u64,
}

/// One host-visible network interface.
pub trait HostIface: Send + Sync {
    fn name(&self) -> &str;
    fn hw_addr(&self) -> [u8; 6];
    fn mtu(&self) -> usize;
    fn flags(&self) -> IfaceFlags;
    fn carrier_ok(&self) -> bool;
    fn link_features(&self) -> Option<LinkFeatures> {
        None
    }
    fn stats(&self) -> IfaceStats;
    fn set_promiscuous(&self, on: bool);
    /// Queue a frame for transmission on the wire.
    fn transmit(&self, frame: &Frame) -> Result<()>;
    /// Deliver a frame up the host stack's receive path (the local-port
    /// output direction).
    fn receive(&self, frame: Frame) -> Result<()>;
}

/// Stack-level operations consumed by datapath lifecycle.
pub trait HostStack: Send + Sync {
    /// Create the datapath's own host-visible interface.
    fn create_local_iface(&self, name: &str) -> Result<Arc<dyn HostIface>>;
    /// Tear down an interface created by `create_local_iface`.
    fn destroy_local_iface(&self, iface: &Arc<dyn HostIface>);
    fn iface_by_name(&self, name: &str) -> Option<Arc<dyn HostIface>>;
}
