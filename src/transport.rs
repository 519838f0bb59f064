//! Control transport seam: a message-oriented channel carrying tagged,
//! typed attributes. Unicast replies target a client id; notifications go
//! out on pre-registered multicast groups. `ChannelTransport` is the
//! in-process realization used by tests and embedders without a real bus.

use crate::error::{Error, Result};
use crossbeam_channel::{bounded, Receiver, TrySendError};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

/// Identity of a control-plane requester: the transaction id stitched into
/// replies, the client to unicast them to, and the request sequence number.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Sender {
    pub xid: u32,
    pub client_id: u32,
    pub seq: u32,
}

/// Tagged attribute.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Attr {
    DpIdx(u32),
    DpName(String),
    McGroup(u32),
    PortName(String),
    Openflow(Vec<u8>),
}

/// One transport datagram: a list of attributes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ControlMessage {
    pub attrs: SmallVec<[Attr; 2]>,
}

impl ControlMessage {
    /// OpenFlow message wrapper: datapath index plus the encoded bytes.
    pub fn openflow(dp_idx: u16, bytes: Vec<u8>) -> Self {
        let mut attrs = SmallVec::new();
        attrs.push(Attr::DpIdx(u32::from(dp_idx)));
        attrs.push(Attr::Openflow(bytes));
        Self { attrs }
    }

    pub fn dp_idx(&self) -> Option<u32> {
        self.attrs.iter().find_map(|a| match a {
            Attr::DpIdx(v) => Some(*v),
            _ => None,
        })
    }

    pub fn openflow_payload(&self) -> Option<&[u8]> {
        self.attrs.iter().find_map(|a| match a {
            Attr::Openflow(b) => Some(b.as_slice()),
            _ => None,
        })
    }
}

pub trait ControlTransport: Send + Sync {
    /// Register a named multicast group, returning its id.
    fn register_group(&self, name: &str) -> Result<u32>;
    /// Deliver exactly once to the addressed client.
    fn unicast(&self, client_id: u32, msg: ControlMessage) -> Result<()>;
    /// Best-effort delivery to all subscribers of `group`.
    fn multicast(&self, group: u32, msg: ControlMessage) -> Result<()>;
    /// Largest datagram the transport will carry; bounds stats chunks.
    fn max_datagram(&self) -> usize {
        8192
    }
}

const CLIENT_QUEUE_DEPTH: usize = 512;

struct TransportInner {
    next_group: u32,
    next_client: u32,
    groups: FxHashMap<u32, Vec<u32>>,
    group_names: FxHashMap<String, u32>,
    clients: FxHashMap<u32, crossbeam_channel::Sender<ControlMessage>>,
}

/// Loopback transport over bounded per-client queues.
pub struct ChannelTransport {
    inner: Mutex<TransportInner>,
    max_datagram: usize,
}

impl ChannelTransport {
    pub fn new(max_datagram: usize) -> Self {
        Self {
            inner: Mutex::new(TransportInner {
                next_group: 1,
                next_client: 1,
                groups: FxHashMap::default(),
                group_names: FxHashMap::default(),
                clients: FxHashMap::default(),
            }),
            max_datagram,
        }
    }

    /// Attach a client; returns its id and the receive side of its queue.
    pub fn connect(&self) -> (u32, Receiver<ControlMessage>) {
        let mut inner = self.inner.lock();
        let id = inner.next_client;
        inner.next_client += 1;
        let (tx, rx) = bounded(CLIENT_QUEUE_DEPTH);
        inner.clients.insert(id, tx);
        (id, rx)
    }

    pub fn subscribe(&self, client_id: u32, group: u32) -> Result<()> {
        let mut inner = self.inner.lock();
        if !inner.clients.contains_key(&client_id) {
            return Err(Error::NotFound("unknown client"));
        }
        let members = inner
            .groups
            .get_mut(&group)
            .ok_or(Error::NotFound("unknown multicast group"))?;
        if !members.contains(&client_id) {
            members.push(client_id);
        }
        Ok(())
    }

    pub fn group_id(&self, name: &str) -> Option<u32> {
        self.inner.lock().group_names.get(name).copied()
    }
}

impl Default for ChannelTransport {
    fn default() -> Self {
        Self::new(8192)
    }
}

impl ControlTransport for ChannelTransport {
    fn register_group(&self, name: &str) -> Result<u32> {
        let mut inner = self.inner.lock();
        if inner.group_names.contains_key(name) {
            return Err(Error::AlreadyExists);
        }
        let id = inner.next_group;
        inner.next_group += 1;
        inner.groups.insert(id, Vec::new());
        inner.group_names.insert(name.to_string(), id);
        Ok(id)
    }

    fn unicast(&self, client_id: u32, msg: ControlMessage) -> Result<()> {
        let inner = self.inner.lock();
        let tx = inner
            .clients
            .get(&client_id)
            .ok_or(Error::NotFound("unknown client"))?;
        tx.try_send(msg).map_err(|err| match err {
            TrySendError::Full(_) | TrySendError::Disconnected(_) => Error::QueueFull,
        })
    }

    fn multicast(&self, group: u32, msg: ControlMessage) -> Result<()> {
        let inner = self.inner.lock();
        let Some(members) = inner.groups.get(&group) else {
            return Err(Error::NotFound("unknown multicast group"));
        };
        for client in members {
            if let Some(tx) = inner.clients.get(client) {
                // Slow subscribers lose notifications rather than block the
                // data plane.
                let _ = tx.try_send(msg.clone());
            }
        }
        Ok(())
    }

    fn max_datagram(&self) -> usize {
        self.max_datagram
    }
}
