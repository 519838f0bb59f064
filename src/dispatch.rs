//! Admin command dispatch: typed attribute sets arriving from the control
//! transport are parsed, resolved against the registry, and routed to the
//! datapath lifecycle, the chain, or the stats engine.

use crate::datapath::Datapath;
use crate::error::{Error, Result};
use crate::openflow::{
    self, Header, MessageBuf, OFPSF_REPLY_MORE, OFPT_STATS_REPLY, STATS_REPLY_FIXED,
};
use crate::stats::{DumpSession, DumpStatus};
use crate::transport::{Attr, ControlMessage, ControlTransport, Sender};
use crate::Core;
use smallvec::SmallVec;
use std::sync::Arc;

/// Recognized admin commands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    AddDp,
    DelDp,
    QueryDp,
    AddPort,
    DelPort,
    Openflow,
    Stats,
}

/// Attributes accompanying one admin command.
#[derive(Clone, Debug, Default)]
pub struct AttrSet {
    attrs: SmallVec<[Attr; 4]>,
}

impl AttrSet {
    pub fn new(attrs: impl IntoIterator<Item = Attr>) -> Self {
        Self {
            attrs: attrs.into_iter().collect(),
        }
    }

    pub fn dp_idx(&self) -> Option<u32> {
        self.attrs.iter().find_map(|a| match a {
            Attr::DpIdx(v) => Some(*v),
            _ => None,
        })
    }

    pub fn dp_name(&self) -> Option<&str> {
        self.attrs.iter().find_map(|a| match a {
            Attr::DpName(v) => Some(v.as_str()),
            _ => None,
        })
    }

    pub fn port_name(&self) -> Option<&str> {
        self.attrs.iter().find_map(|a| match a {
            Attr::PortName(v) => Some(v.as_str()),
            _ => None,
        })
    }

    pub fn openflow(&self) -> Option<&[u8]> {
        self.attrs.iter().find_map(|a| match a {
            Attr::Openflow(v) => Some(v.as_slice()),
            _ => None,
        })
    }
}

impl Core {
    /// Routes one admin command. Errors surface to the admin caller only;
    /// they are never multicast.
    pub fn dispatch(&self, sender: &Sender, cmd: Command, attrs: &AttrSet) -> Result<()> {
        match cmd {
            Command::AddDp => {
                let preferred = match attrs.dp_idx() {
                    Some(idx) => Some(
                        u16::try_from(idx)
                            .map_err(|_| Error::InvalidArgument("datapath id out of range"))?,
                    ),
                    None => None,
                };
                self.create_datapath(preferred, attrs.dp_name()).map(|_| ())
            }
            Command::DelDp => {
                let dp = self.lookup(attrs)?;
                self.destroy_datapath(&dp)
            }
            Command::QueryDp => {
                let dp = self.lookup(attrs)?;
                let mut reply = ControlMessage::default();
                reply.attrs.push(Attr::DpIdx(u32::from(dp.id())));
                reply.attrs.push(Attr::DpName(dp.name().to_string()));
                reply.attrs.push(Attr::McGroup(dp.mc_group()));
                self.transport().unicast(sender.client_id, reply)
            }
            Command::AddPort => {
                let port_name = attrs
                    .port_name()
                    .ok_or(Error::InvalidArgument("missing port name"))?;
                let dp = self.lookup(attrs)?;
                self.add_port(&dp, port_name).map(|_| ())
            }
            Command::DelPort => {
                let port_name = attrs
                    .port_name()
                    .ok_or(Error::InvalidArgument("missing port name"))?;
                let dp = self.lookup(attrs)?;
                self.del_port(&dp, port_name)
            }
            Command::Openflow => {
                let dp = self.dp_by_idx_attr(attrs)?;
                let msg = attrs
                    .openflow()
                    .ok_or(Error::InvalidArgument("missing openflow payload"))?;
                let header = Header::parse(msg)?;
                let sender = Sender {
                    xid: header.xid,
                    ..*sender
                };
                // Serializes control input with administrative operations.
                let _admin = self.admin_lock();
                dp.chain().control_input(&dp, &sender, msg)
            }
            Command::Stats => self.stats_dump(sender, attrs),
        }
    }

    /// Resolve a datapath from attributes: an id wins and a name supplied
    /// alongside it must agree; otherwise the name alone is looked up.
    pub(crate) fn lookup(&self, attrs: &AttrSet) -> Result<Arc<Datapath>> {
        match (attrs.dp_idx(), attrs.dp_name()) {
            (Some(idx), name) => {
                let dp = u16::try_from(idx)
                    .ok()
                    .and_then(|id| self.registry().get_by_id(id))
                    .ok_or(Error::NotFound("no such datapath"))?;
                if let Some(name) = name {
                    if dp.name() != name {
                        return Err(Error::InvalidArgument("name does not match datapath id"));
                    }
                }
                Ok(dp)
            }
            (None, Some(name)) => self
                .registry()
                .get_by_name(name)
                .ok_or(Error::NotFound("no such datapath")),
            (None, None) => Err(Error::InvalidArgument("neither id nor name supplied")),
        }
    }

    fn dp_by_idx_attr(&self, attrs: &AttrSet) -> Result<Arc<Datapath>> {
        let idx = attrs
            .dp_idx()
            .ok_or(Error::InvalidArgument("missing datapath id"))?;
        u16::try_from(idx)
            .ok()
            .and_then(|id| self.registry().get_by_id(id))
            .ok_or(Error::NotFound("no such datapath"))
    }

    /// Drives a stats dump to completion, one reply per transport datagram,
    /// with REPLY_MORE on every fragment but the last.
    fn stats_dump(&self, sender: &Sender, attrs: &AttrSet) -> Result<()> {
        let dp = self.dp_by_idx_attr(attrs)?;
        let request = attrs
            .openflow()
            .ok_or(Error::InvalidArgument("missing stats request"))?;
        let header = Header::parse(request)?;
        let sender = Sender {
            xid: header.xid,
            ..*sender
        };
        let mut session = DumpSession::open(&dp, &sender, request)?;
        let budget = self
            .transport()
            .max_datagram()
            .saturating_sub(Header::LEN + STATS_REPLY_FIXED);
        loop {
            let mut body = Vec::new();
            let status = session.dump(&dp, &mut body, budget)?;
            let more = matches!(status, DumpStatus::More);
            let mut msg =
                MessageBuf::alloc(OFPT_STATS_REPLY, sender.xid, STATS_REPLY_FIXED + body.len())?;
            openflow::put_u16(msg.body(), session.stats_type());
            openflow::put_u16(msg.body(), if more { OFPSF_REPLY_MORE } else { 0 });
            msg.body().extend_from_slice(&body);
            dp.send_openflow(Some(&sender), msg)?;
            if !more {
                return Ok(());
            }
        }
    }
}
