//! Shared frame buffer handed between the host stack, the forwarding engine
//! and the packet store. Clones share the underlying bytes; `unshare` makes a
//! private copy so the fast path can restore headers without mangling the
//! buffer for earlier consumers.

use smoltcp::wire::EthernetFrame;
use std::sync::Arc;

pub const ETH_HLEN: usize = 14;
pub const VLAN_HLEN: usize = 4;
pub const ETH_P_8021Q: u16 = 0x8100;

#[derive(Debug, Clone)]
pub struct Frame {
    data: Arc<Vec<u8>>,
    head: usize,
    gso: bool,
    origin: Option<u16>,
}

impl Frame {
    /// Frame whose buffer starts at the Ethernet header.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            data: Arc::new(bytes),
            head: 0,
            gso: false,
            origin: None,
        }
    }

    /// Frame as delivered by a host stack that has already consumed the
    /// Ethernet header. The header bytes are still present in the buffer and
    /// can be restored with [`Frame::restore_mac_header`].
    pub fn with_stripped_header(bytes: Vec<u8>) -> Self {
        let head = ETH_HLEN.min(bytes.len());
        Self {
            data: Arc::new(bytes),
            head,
            gso: false,
            origin: None,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len() - self.head
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data[self.head..]
    }

    /// Puts the Ethernet header back at the front of the visible range.
    pub fn restore_mac_header(&mut self) {
        self.head = 0;
    }

    pub fn is_shared(&self) -> bool {
        Arc::strong_count(&self.data) > 1
    }

    /// Copy-on-write: after this call the buffer is privately owned.
    pub fn unshare(&mut self) {
        if self.is_shared() {
            self.data = Arc::new(self.data.as_ref().clone());
        }
    }

    pub fn is_gso(&self) -> bool {
        self.gso
    }

    pub fn set_gso(&mut self, gso: bool) {
        self.gso = gso;
    }

    /// Marks the port this frame entered the datapath on.
    pub fn set_origin(&mut self, port_no: u16) {
        self.origin = Some(port_no);
    }

    pub fn origin(&self) -> Option<u16> {
        self.origin
    }

    pub fn ether_type(&self) -> Option<u16> {
        let bytes = self.as_slice();
        if bytes.len() < ETH_HLEN {
            return None;
        }
        Some(u16::from(EthernetFrame::new_unchecked(bytes).ethertype()))
    }

    /// On-wire payload length used by the transmit MTU check: frame length
    /// minus the Ethernet header, minus the 802.1Q tag when present.
    pub fn payload_len(&self) -> usize {
        let mut len = self.len().saturating_sub(ETH_HLEN);
        if self.ether_type() == Some(ETH_P_8021Q) {
            len = len.saturating_sub(VLAN_HLEN);
        }
        len
    }
}

#[cfg(test)]
mod tests;
