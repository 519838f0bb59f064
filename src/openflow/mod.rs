//! OpenFlow 1.0 wire format: protocol constants and byte-exact codecs for
//! every message the datapath emits or consumes. All multi-byte fields are
//! network byte order.

use crate::error::{Error, Result};
use bitflags::bitflags;

pub const OFP_VERSION: u8 = 0x01;

pub const OFPT_HELLO: u8 = 0;
pub const OFPT_ERROR: u8 = 1;
pub const OFPT_ECHO_REQUEST: u8 = 2;
pub const OFPT_ECHO_REPLY: u8 = 3;
pub const OFPT_VENDOR: u8 = 4;
pub const OFPT_FEATURES_REQUEST: u8 = 5;
pub const OFPT_FEATURES_REPLY: u8 = 6;
pub const OFPT_GET_CONFIG_REQUEST: u8 = 7;
pub const OFPT_GET_CONFIG_REPLY: u8 = 8;
pub const OFPT_SET_CONFIG: u8 = 9;
pub const OFPT_PACKET_IN: u8 = 10;
pub const OFPT_FLOW_REMOVED: u8 = 11;
pub const OFPT_PORT_STATUS: u8 = 12;
pub const OFPT_PACKET_OUT: u8 = 13;
pub const OFPT_FLOW_MOD: u8 = 14;
pub const OFPT_PORT_MOD: u8 = 15;
pub const OFPT_STATS_REQUEST: u8 = 16;
pub const OFPT_STATS_REPLY: u8 = 17;
pub const OFPT_BARRIER_REQUEST: u8 = 18;
pub const OFPT_BARRIER_REPLY: u8 = 19;

/// Virtual output ports.
pub const OFPP_MAX: u16 = 0xff00;
pub const OFPP_IN_PORT: u16 = 0xfff8;
pub const OFPP_TABLE: u16 = 0xfff9;
pub const OFPP_NORMAL: u16 = 0xfffa;
pub const OFPP_FLOOD: u16 = 0xfffb;
pub const OFPP_ALL: u16 = 0xfffc;
pub const OFPP_CONTROLLER: u16 = 0xfffd;
pub const OFPP_LOCAL: u16 = 0xfffe;
pub const OFPP_NONE: u16 = 0xffff;

/// Packet-in reasons.
pub const OFPR_NO_MATCH: u8 = 0;
pub const OFPR_ACTION: u8 = 1;

/// Port-status reasons.
pub const OFPPR_ADD: u8 = 0;
pub const OFPPR_DELETE: u8 = 1;
pub const OFPPR_MODIFY: u8 = 2;

/// Flow-removed reasons.
pub const OFPRR_IDLE_TIMEOUT: u8 = 0;
pub const OFPRR_HARD_TIMEOUT: u8 = 1;
pub const OFPRR_DELETE: u8 = 2;

/// Error types and codes.
pub const OFPET_HELLO_FAILED: u16 = 0;
pub const OFPET_BAD_REQUEST: u16 = 1;
pub const OFPET_BAD_ACTION: u16 = 2;
pub const OFPET_FLOW_MOD_FAILED: u16 = 3;
pub const OFPET_PORT_MOD_FAILED: u16 = 4;

pub const OFPHFC_INCOMPATIBLE: u16 = 0;

pub const OFPBRC_BAD_VERSION: u16 = 0;
pub const OFPBRC_BAD_TYPE: u16 = 1;
pub const OFPBRC_BAD_STAT: u16 = 2;
pub const OFPBRC_BAD_VENDOR: u16 = 3;
pub const OFPBRC_BAD_SUBTYPE: u16 = 4;
pub const OFPBRC_BAD_LEN: u16 = 6;

/// Stats categories.
pub const OFPST_DESC: u16 = 0;
pub const OFPST_FLOW: u16 = 1;
pub const OFPST_AGGREGATE: u16 = 2;
pub const OFPST_TABLE: u16 = 3;
pub const OFPST_PORT: u16 = 4;
pub const OFPST_VENDOR: u16 = 0xffff;

pub const OFPSF_REPLY_MORE: u16 = 1 << 0;

/// Switch capability bits.
pub const OFPC_FLOW_STATS: u32 = 1 << 0;
pub const OFPC_TABLE_STATS: u32 = 1 << 1;
pub const OFPC_PORT_STATS: u32 = 1 << 2;
pub const OFPC_ARP_MATCH_IP: u32 = 1 << 7;

pub const SUPPORTED_CAPABILITIES: u32 =
    OFPC_FLOW_STATS | OFPC_TABLE_STATS | OFPC_PORT_STATS | OFPC_ARP_MATCH_IP;

/// Action type bitmap advertised in the features reply: OUTPUT through
/// SET_TP_DST (action types 0..=10).
pub const SUPPORTED_ACTIONS: u32 = 0x7ff;

pub const OFP_MAX_MSG_LEN: usize = u16::MAX as usize;
pub const OFP_MAX_PORT_NAME_LEN: usize = 16;
pub const OFP_MAX_TABLE_NAME_LEN: usize = 32;
pub const DESC_STR_LEN: usize = 256;
pub const SERIAL_NUM_LEN: usize = 32;
pub const OFP_DEFAULT_MISS_SEND_LEN: u16 = 128;

/// Error messages carry at most this much of the offending request.
pub const ERROR_DATA_MAX: usize = 64;

bitflags! {
    /// Port administration bits (`ofp_port_config`). Unknown bits survive a
    /// masked update untouched.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct PortConfig: u32 {
        const PORT_DOWN    = 1 << 0;
        const NO_STP       = 1 << 1;
        const NO_RECV      = 1 << 2;
        const NO_RECV_STP  = 1 << 3;
        const NO_FLOOD     = 1 << 4;
        const NO_FWD       = 1 << 5;
        const NO_PACKET_IN = 1 << 6;
    }
}

bitflags! {
    /// Port link state bits (`ofp_port_state`).
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct PortState: u32 {
        const LINK_DOWN = 1 << 0;
    }
}

bitflags! {
    /// Port feature bitmaps (`ofp_port_features`).
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct PortFeatures: u32 {
        const M10_HD     = 1 << 0;
        const M10_FD     = 1 << 1;
        const M100_HD    = 1 << 2;
        const M100_FD    = 1 << 3;
        const G1_HD      = 1 << 4;
        const G1_FD      = 1 << 5;
        const G10_FD     = 1 << 6;
        const COPPER     = 1 << 7;
        const FIBER      = 1 << 8;
        const AUTONEG    = 1 << 9;
        const PAUSE      = 1 << 10;
        const PAUSE_ASYM = 1 << 11;
    }
}

pub(crate) fn put_u16(buf: &mut Vec<u8>, v: u16) {
    buf.extend_from_slice(&v.to_be_bytes());
}

pub(crate) fn put_u32(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_be_bytes());
}

pub(crate) fn put_u64(buf: &mut Vec<u8>, v: u64) {
    buf.extend_from_slice(&v.to_be_bytes());
}

pub(crate) fn put_zeros(buf: &mut Vec<u8>, n: usize) {
    buf.resize(buf.len() + n, 0);
}

/// Writes `s` into a fixed-width, NUL-padded field, truncating to keep at
/// least one terminating NUL.
pub(crate) fn put_fixed_str(buf: &mut Vec<u8>, s: &str, width: usize) {
    let bytes = s.as_bytes();
    let take = bytes.len().min(width - 1);
    buf.extend_from_slice(&bytes[..take]);
    put_zeros(buf, width - take);
}

pub(crate) fn get_u16(b: &[u8], off: usize) -> u16 {
    u16::from_be_bytes([b[off], b[off + 1]])
}

pub(crate) fn get_u32(b: &[u8], off: usize) -> u32 {
    u32::from_be_bytes([b[off], b[off + 1], b[off + 2], b[off + 3]])
}

pub(crate) fn get_u64(b: &[u8], off: usize) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&b[off..off + 8]);
    u64::from_be_bytes(raw)
}

pub(crate) fn get_fixed_str(b: &[u8], off: usize, width: usize) -> String {
    let field = &b[off..off + width];
    let end = field.iter().position(|&c| c == 0).unwrap_or(width);
    String::from_utf8_lossy(&field[..end]).into_owned()
}

/// Common 8-byte message header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Header {
    pub version: u8,
    pub msg_type: u8,
    pub length: u16,
    pub xid: u32,
}

impl Header {
    pub const LEN: usize = 8;

    pub fn parse(b: &[u8]) -> Result<Self> {
        if b.len() < Self::LEN {
            return Err(Error::InvalidArgument("truncated openflow header"));
        }
        Ok(Self {
            version: b[0],
            msg_type: b[1],
            length: get_u16(b, 2),
            xid: get_u32(b, 4),
        })
    }
}

/// Flow match fields (`ofp_match`, 40 bytes).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Match {
    pub wildcards: u32,
    pub in_port: u16,
    pub dl_src: [u8; 6],
    pub dl_dst: [u8; 6],
    pub dl_vlan: u16,
    pub dl_vlan_pcp: u8,
    pub dl_type: u16,
    pub nw_tos: u8,
    pub nw_proto: u8,
    pub nw_src: u32,
    pub nw_dst: u32,
    pub tp_src: u16,
    pub tp_dst: u16,
}

pub const MATCH_LEN: usize = 40;

impl Match {
    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        put_u32(buf, self.wildcards);
        put_u16(buf, self.in_port);
        buf.extend_from_slice(&self.dl_src);
        buf.extend_from_slice(&self.dl_dst);
        put_u16(buf, self.dl_vlan);
        buf.push(self.dl_vlan_pcp);
        put_zeros(buf, 1);
        put_u16(buf, self.dl_type);
        buf.push(self.nw_tos);
        buf.push(self.nw_proto);
        put_zeros(buf, 2);
        put_u32(buf, self.nw_src);
        put_u32(buf, self.nw_dst);
        put_u16(buf, self.tp_src);
        put_u16(buf, self.tp_dst);
    }

    pub fn decode(b: &[u8]) -> Result<Self> {
        if b.len() < MATCH_LEN {
            return Err(Error::InvalidArgument("truncated match"));
        }
        let mut dl_src = [0u8; 6];
        let mut dl_dst = [0u8; 6];
        dl_src.copy_from_slice(&b[6..12]);
        dl_dst.copy_from_slice(&b[12..18]);
        Ok(Self {
            wildcards: get_u32(b, 0),
            in_port: get_u16(b, 4),
            dl_src,
            dl_dst,
            dl_vlan: get_u16(b, 18),
            dl_vlan_pcp: b[20],
            dl_type: get_u16(b, 22),
            nw_tos: b[24],
            nw_proto: b[25],
            nw_src: get_u32(b, 28),
            nw_dst: get_u32(b, 32),
            tp_src: get_u16(b, 36),
            tp_dst: get_u16(b, 38),
        })
    }
}

/// Physical port description (`ofp_phy_port`, 48 bytes).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PhyPort {
    pub port_no: u16,
    pub hw_addr: [u8; 6],
    pub name: String,
    pub config: u32,
    pub state: u32,
    pub curr: u32,
    pub advertised: u32,
    pub supported: u32,
    pub peer: u32,
}

pub const PHY_PORT_LEN: usize = 48;

impl PhyPort {
    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        put_u16(buf, self.port_no);
        buf.extend_from_slice(&self.hw_addr);
        put_fixed_str(buf, &self.name, OFP_MAX_PORT_NAME_LEN);
        put_u32(buf, self.config);
        put_u32(buf, self.state);
        put_u32(buf, self.curr);
        put_u32(buf, self.advertised);
        put_u32(buf, self.supported);
        put_u32(buf, self.peer);
    }

    pub fn decode(b: &[u8]) -> Result<Self> {
        if b.len() < PHY_PORT_LEN {
            return Err(Error::InvalidArgument("truncated phy port"));
        }
        let mut hw_addr = [0u8; 6];
        hw_addr.copy_from_slice(&b[2..8]);
        Ok(Self {
            port_no: get_u16(b, 0),
            hw_addr,
            name: get_fixed_str(b, 8, OFP_MAX_PORT_NAME_LEN),
            config: get_u32(b, 24),
            state: get_u32(b, 28),
            curr: get_u32(b, 32),
            advertised: get_u32(b, 36),
            supported: get_u32(b, 40),
            peer: get_u32(b, 44),
        })
    }
}

/// `OFPT_PACKET_IN` body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PacketIn {
    pub buffer_id: u32,
    pub total_len: u16,
    pub in_port: u16,
    pub reason: u8,
    pub data: Vec<u8>,
}

pub const PACKET_IN_FIXED: usize = 10;

impl PacketIn {
    pub fn encode_body(&self, buf: &mut Vec<u8>) {
        put_u32(buf, self.buffer_id);
        put_u16(buf, self.total_len);
        put_u16(buf, self.in_port);
        buf.push(self.reason);
        put_zeros(buf, 1);
        buf.extend_from_slice(&self.data);
    }

    pub fn parse_body(b: &[u8]) -> Result<Self> {
        if b.len() < PACKET_IN_FIXED {
            return Err(Error::InvalidArgument("truncated packet-in"));
        }
        Ok(Self {
            buffer_id: get_u32(b, 0),
            total_len: get_u16(b, 4),
            in_port: get_u16(b, 6),
            reason: b[8],
            data: b[PACKET_IN_FIXED..].to_vec(),
        })
    }
}

/// `OFPT_PORT_STATUS` body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PortStatus {
    pub reason: u8,
    pub desc: PhyPort,
}

pub const PORT_STATUS_LEN: usize = 8 + PHY_PORT_LEN;

impl PortStatus {
    pub fn encode_body(&self, buf: &mut Vec<u8>) {
        buf.push(self.reason);
        put_zeros(buf, 7);
        self.desc.encode_into(buf);
    }

    pub fn parse_body(b: &[u8]) -> Result<Self> {
        if b.len() < PORT_STATUS_LEN {
            return Err(Error::InvalidArgument("truncated port status"));
        }
        Ok(Self {
            reason: b[0],
            desc: PhyPort::decode(&b[8..])?,
        })
    }
}

/// `OFPT_FLOW_REMOVED` body.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FlowRemovedBody {
    pub match_fields: Match,
    pub cookie: u64,
    pub priority: u16,
    pub reason: u8,
    pub duration_sec: u32,
    pub duration_nsec: u32,
    pub idle_timeout: u16,
    pub packet_count: u64,
    pub byte_count: u64,
}

pub const FLOW_REMOVED_LEN: usize = MATCH_LEN + 40;

impl FlowRemovedBody {
    pub fn encode_body(&self, buf: &mut Vec<u8>) {
        self.match_fields.encode_into(buf);
        put_u64(buf, self.cookie);
        put_u16(buf, self.priority);
        buf.push(self.reason);
        put_zeros(buf, 1);
        put_u32(buf, self.duration_sec);
        put_u32(buf, self.duration_nsec);
        put_u16(buf, self.idle_timeout);
        put_zeros(buf, 2);
        put_u64(buf, self.packet_count);
        put_u64(buf, self.byte_count);
    }

    pub fn parse_body(b: &[u8]) -> Result<Self> {
        if b.len() < FLOW_REMOVED_LEN {
            return Err(Error::InvalidArgument("truncated flow removed"));
        }
        Ok(Self {
            match_fields: Match::decode(b)?,
            cookie: get_u64(b, 40),
            priority: get_u16(b, 48),
            reason: b[50],
            duration_sec: get_u32(b, 52),
            duration_nsec: get_u32(b, 56),
            idle_timeout: get_u16(b, 60),
            packet_count: get_u64(b, 64),
            byte_count: get_u64(b, 72),
        })
    }
}

/// `OFPT_FEATURES_REPLY` body.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SwitchFeatures {
    pub datapath_id: u64,
    pub n_buffers: u32,
    pub n_tables: u8,
    pub capabilities: u32,
    pub actions: u32,
    pub ports: Vec<PhyPort>,
}

pub const FEATURES_REPLY_FIXED: usize = 24;

impl SwitchFeatures {
    pub fn parse_body(b: &[u8]) -> Result<Self> {
        if b.len() < FEATURES_REPLY_FIXED
            || (b.len() - FEATURES_REPLY_FIXED) % PHY_PORT_LEN != 0
        {
            return Err(Error::InvalidArgument("malformed features reply"));
        }
        let ports = b[FEATURES_REPLY_FIXED..]
            .chunks_exact(PHY_PORT_LEN)
            .map(PhyPort::decode)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            datapath_id: get_u64(b, 0),
            n_buffers: get_u32(b, 8),
            n_tables: b[12],
            capabilities: get_u32(b, 16),
            actions: get_u32(b, 20),
            ports,
        })
    }
}

/// `OFPT_GET_CONFIG_REPLY` / `OFPT_SET_CONFIG` body.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ConfigBody {
    pub flags: u16,
    pub miss_send_len: u16,
}

pub const CONFIG_BODY_LEN: usize = 4;

impl ConfigBody {
    pub fn encode_body(&self, buf: &mut Vec<u8>) {
        put_u16(buf, self.flags);
        put_u16(buf, self.miss_send_len);
    }

    pub fn parse_body(b: &[u8]) -> Result<Self> {
        if b.len() < CONFIG_BODY_LEN {
            return Err(Error::InvalidArgument("truncated switch config"));
        }
        Ok(Self {
            flags: get_u16(b, 0),
            miss_send_len: get_u16(b, 2),
        })
    }
}

/// `OFPT_ERROR` body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ErrorBody {
    pub err_type: u16,
    pub code: u16,
    pub data: Vec<u8>,
}

impl ErrorBody {
    pub fn parse_body(b: &[u8]) -> Result<Self> {
        if b.len() < 4 {
            return Err(Error::InvalidArgument("truncated error message"));
        }
        Ok(Self {
            err_type: get_u16(b, 0),
            code: get_u16(b, 2),
            data: b[4..].to_vec(),
        })
    }
}

/// `OFPT_PORT_MOD` body.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PortMod {
    pub port_no: u16,
    pub hw_addr: [u8; 6],
    pub config: u32,
    pub mask: u32,
    pub advertise: u32,
}

pub const PORT_MOD_BODY_LEN: usize = 24;

impl PortMod {
    pub fn encode_body(&self, buf: &mut Vec<u8>) {
        put_u16(buf, self.port_no);
        buf.extend_from_slice(&self.hw_addr);
        put_u32(buf, self.config);
        put_u32(buf, self.mask);
        put_u32(buf, self.advertise);
        put_zeros(buf, 4);
    }

    pub fn parse_body(b: &[u8]) -> Result<Self> {
        if b.len() < PORT_MOD_BODY_LEN {
            return Err(Error::InvalidArgument("truncated port mod"));
        }
        let mut hw_addr = [0u8; 6];
        hw_addr.copy_from_slice(&b[2..8]);
        Ok(Self {
            port_no: get_u16(b, 0),
            hw_addr,
            config: get_u32(b, 8),
            mask: get_u32(b, 12),
            advertise: get_u32(b, 16),
        })
    }
}

/// `OFPT_STATS_REQUEST` payload: header, category, flags, category body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatsRequest {
    pub header: Header,
    pub stats_type: u16,
    pub flags: u16,
    pub body: Vec<u8>,
}

pub const STATS_REQUEST_FIXED: usize = 4;

impl StatsRequest {
    pub fn parse(msg: &[u8]) -> Result<Self> {
        let header = Header::parse(msg)?;
        if msg.len() < Header::LEN + STATS_REQUEST_FIXED {
            return Err(Error::InvalidArgument("truncated stats request"));
        }
        Ok(Self {
            header,
            stats_type: get_u16(msg, Header::LEN),
            flags: get_u16(msg, Header::LEN + 2),
            body: msg[Header::LEN + STATS_REQUEST_FIXED..].to_vec(),
        })
    }
}

/// `OFPT_STATS_REPLY` body framing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatsReply {
    pub stats_type: u16,
    pub flags: u16,
    pub body: Vec<u8>,
}

pub const STATS_REPLY_FIXED: usize = 4;

impl StatsReply {
    pub fn parse_body(b: &[u8]) -> Result<Self> {
        if b.len() < STATS_REPLY_FIXED {
            return Err(Error::InvalidArgument("truncated stats reply"));
        }
        Ok(Self {
            stats_type: get_u16(b, 0),
            flags: get_u16(b, 2),
            body: b[STATS_REPLY_FIXED..].to_vec(),
        })
    }
}

/// Flow stats request / aggregate stats request body (44 bytes).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FlowStatsRequest {
    pub match_fields: Match,
    pub table_id: u8,
    pub out_port: u16,
}

pub const FLOW_STATS_REQUEST_LEN: usize = MATCH_LEN + 4;

impl FlowStatsRequest {
    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        self.match_fields.encode_into(buf);
        buf.push(self.table_id);
        put_zeros(buf, 1);
        put_u16(buf, self.out_port);
    }

    pub fn decode(b: &[u8]) -> Result<Self> {
        if b.len() < FLOW_STATS_REQUEST_LEN {
            return Err(Error::InvalidArgument("truncated flow stats request"));
        }
        Ok(Self {
            match_fields: Match::decode(b)?,
            table_id: b[40],
            out_port: get_u16(b, 42),
        })
    }
}

/// One record of a flow stats reply.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FlowStatsRecord {
    pub table_id: u8,
    pub match_fields: Match,
    pub duration_sec: u32,
    pub duration_nsec: u32,
    pub priority: u16,
    pub idle_timeout: u16,
    pub hard_timeout: u16,
    pub packet_count: u64,
    pub byte_count: u64,
    pub actions: Vec<u8>,
}

pub const FLOW_STATS_RECORD_FIXED: usize = 80;

impl FlowStatsRecord {
    pub fn wire_len(&self) -> usize {
        FLOW_STATS_RECORD_FIXED + self.actions.len()
    }

    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        put_u16(buf, self.wire_len() as u16);
        buf.push(self.table_id);
        put_zeros(buf, 1);
        self.match_fields.encode_into(buf);
        put_u32(buf, self.duration_sec);
        put_u32(buf, self.duration_nsec);
        put_u16(buf, self.priority);
        put_u16(buf, self.idle_timeout);
        put_u16(buf, self.hard_timeout);
        put_zeros(buf, 6);
        put_u64(buf, self.packet_count);
        put_u64(buf, self.byte_count);
        buf.extend_from_slice(&self.actions);
    }

    /// Decodes the record at the front of `b`, returning it and the number of
    /// bytes consumed.
    pub fn decode(b: &[u8]) -> Result<(Self, usize)> {
        if b.len() < FLOW_STATS_RECORD_FIXED {
            return Err(Error::InvalidArgument("truncated flow stats record"));
        }
        let length = get_u16(b, 0) as usize;
        if length < FLOW_STATS_RECORD_FIXED || length > b.len() {
            return Err(Error::InvalidArgument("bad flow stats record length"));
        }
        let record = Self {
            table_id: b[2],
            match_fields: Match::decode(&b[4..])?,
            duration_sec: get_u32(b, 44),
            duration_nsec: get_u32(b, 48),
            priority: get_u16(b, 52),
            idle_timeout: get_u16(b, 54),
            hard_timeout: get_u16(b, 56),
            packet_count: get_u64(b, 64),
            byte_count: get_u64(b, 72),
            actions: b[FLOW_STATS_RECORD_FIXED..length].to_vec(),
        };
        Ok((record, length))
    }
}

/// Aggregate stats reply body.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AggregateStatsReply {
    pub packet_count: u64,
    pub byte_count: u64,
    pub flow_count: u32,
}

pub const AGGREGATE_REPLY_LEN: usize = 24;

impl AggregateStatsReply {
    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        put_u64(buf, self.packet_count);
        put_u64(buf, self.byte_count);
        put_u32(buf, self.flow_count);
        put_zeros(buf, 4);
    }

    pub fn decode(b: &[u8]) -> Result<Self> {
        if b.len() < AGGREGATE_REPLY_LEN {
            return Err(Error::InvalidArgument("truncated aggregate reply"));
        }
        Ok(Self {
            packet_count: get_u64(b, 0),
            byte_count: get_u64(b, 8),
            flow_count: get_u32(b, 16),
        })
    }
}

/// One table stats record.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TableStatsRecord {
    pub table_id: u8,
    pub name: String,
    pub wildcards: u32,
    pub max_entries: u32,
    pub active_count: u32,
    pub lookup_count: u64,
    pub matched_count: u64,
}

pub const TABLE_STATS_RECORD_LEN: usize = 64;

impl TableStatsRecord {
    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        buf.push(self.table_id);
        put_zeros(buf, 3);
        put_fixed_str(buf, &self.name, OFP_MAX_TABLE_NAME_LEN);
        put_u32(buf, self.wildcards);
        put_u32(buf, self.max_entries);
        put_u32(buf, self.active_count);
        put_u64(buf, self.lookup_count);
        put_u64(buf, self.matched_count);
    }

    pub fn decode(b: &[u8]) -> Result<Self> {
        if b.len() < TABLE_STATS_RECORD_LEN {
            return Err(Error::InvalidArgument("truncated table stats record"));
        }
        Ok(Self {
            table_id: b[0],
            name: get_fixed_str(b, 4, OFP_MAX_TABLE_NAME_LEN),
            wildcards: get_u32(b, 36),
            max_entries: get_u32(b, 40),
            active_count: get_u32(b, 44),
            lookup_count: get_u64(b, 48),
            matched_count: get_u64(b, 56),
        })
    }
}

/// Port stats request body (8 bytes).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PortStatsRequest {
    pub port_no: u16,
}

pub const PORT_STATS_REQUEST_LEN: usize = 8;

impl PortStatsRequest {
    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        put_u16(buf, self.port_no);
        put_zeros(buf, 6);
    }

    pub fn decode(b: &[u8]) -> Result<Self> {
        if b.len() < PORT_STATS_REQUEST_LEN {
            return Err(Error::InvalidArgument("truncated port stats request"));
        }
        Ok(Self {
            port_no: get_u16(b, 0),
        })
    }
}

/// One port stats record (104 bytes).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PortStatsRecord {
    pub port_no: u16,
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

pub const PORT_STATS_RECORD_LEN: usize = 104;

impl PortStatsRecord {
    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        put_u16(buf, self.port_no);
        put_zeros(buf, 6);
        for v in [
            self.rx_packets,
            self.tx_packets,
            self.rx_bytes,
            self.tx_bytes,
            self.rx_dropped,
            self.tx_dropped,
            self.rx_errors,
            self.tx_errors,
            self.rx_frame_err,
            self.rx_over_err,
            self.rx_crc_err,
            self.collisions,
        ] {
            put_u64(buf, v);
        }
    }

    pub fn decode(b: &[u8]) -> Result<Self> {
        if b.len() < PORT_STATS_RECORD_LEN {
            return Err(Error::InvalidArgument("truncated port stats record"));
        }
        Ok(Self {
            port_no: get_u16(b, 0),
            rx_packets: get_u64(b, 8),
            tx_packets: get_u64(b, 16),
            rx_bytes: get_u64(b, 24),
            tx_bytes: get_u64(b, 32),
            rx_dropped: get_u64(b, 40),
            tx_dropped: get_u64(b, 48),
            rx_errors: get_u64(b, 56),
            tx_errors: get_u64(b, 64),
            rx_frame_err: get_u64(b, 72),
            rx_over_err: get_u64(b, 80),
            rx_crc_err: get_u64(b, 88),
            collisions: get_u64(b, 96),
        })
    }
}

/// Description stats body (five fixed-width strings).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DescStats {
    pub mfr_desc: String,
    pub hw_desc: String,
    pub sw_desc: String,
    pub serial_num: String,
    pub dp_desc: String,
}

pub const DESC_STATS_LEN: usize = DESC_STR_LEN * 4 + SERIAL_NUM_LEN;

impl DescStats {
    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        put_fixed_str(buf, &self.mfr_desc, DESC_STR_LEN);
        put_fixed_str(buf, &self.hw_desc, DESC_STR_LEN);
        put_fixed_str(buf, &self.sw_desc, DESC_STR_LEN);
        put_fixed_str(buf, &self.serial_num, SERIAL_NUM_LEN);
        put_fixed_str(buf, &self.dp_desc, DESC_STR_LEN);
    }

    pub fn decode(b: &[u8]) -> Result<Self> {
        if b.len() < DESC_STATS_LEN {
            return Err(Error::InvalidArgument("truncated desc stats"));
        }
        Ok(Self {
            mfr_desc: get_fixed_str(b, 0, DESC_STR_LEN),
            hw_desc: get_fixed_str(b, DESC_STR_LEN, DESC_STR_LEN),
            sw_desc: get_fixed_str(b, DESC_STR_LEN * 2, DESC_STR_LEN),
            serial_num: get_fixed_str(b, DESC_STR_LEN * 3, SERIAL_NUM_LEN),
            dp_desc: get_fixed_str(b, DESC_STR_LEN * 3 + SERIAL_NUM_LEN, DESC_STR_LEN),
        })
    }
}

/// Outbound message under construction: the buffer is reserved for the
/// largest possible payload up front, the header template is written, and
/// `finish` rewrites the length field once the actual size is known.
#[derive(Debug)]
pub(crate) struct MessageBuf {
    buf: Vec<u8>,
}

impl MessageBuf {
    pub fn alloc(msg_type: u8, xid: u32, max_body: usize) -> Result<Self> {
        let max_len = Header::LEN + max_body;
        if max_len > OFP_MAX_MSG_LEN {
            return Err(Error::PacketTooLarge {
                len: max_len,
                limit: OFP_MAX_MSG_LEN,
            });
        }
        let mut buf = Vec::with_capacity(max_len);
        buf.push(OFP_VERSION);
        buf.push(msg_type);
        put_u16(&mut buf, 0);
        put_u32(&mut buf, xid);
        Ok(Self { buf })
    }

    pub fn body(&mut self) -> &mut Vec<u8> {
        &mut self.buf
    }

    pub fn finish(mut self) -> Vec<u8> {
        let len = self.buf.len();
        debug_assert!(len <= OFP_MAX_MSG_LEN);
        self.buf[2..4].copy_from_slice(&(len as u16).to_be_bytes());
        self.buf
    }
}

#[cfg(test)]
mod tests;
