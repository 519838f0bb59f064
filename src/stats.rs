//! Stateful, resumable statistics dumps. A session validates the request
//! once, then produces reply bodies chunk by chunk, each bounded by the
//! transport datagram size, preserving its cursor between chunks.

use crate::chain::{FlowDumpEntry, TablePosition, TableRef};
use crate::datapath::Datapath;
use crate::error::{Error, Result};
use crate::iface::HostIface;
use crate::openflow::{
    AggregateStatsReply, DescStats, FlowStatsRecord, FlowStatsRequest, PortStatsRecord,
    PortStatsRequest, StatsRequest, AGGREGATE_REPLY_LEN, DESC_STATS_LEN, FLOW_STATS_REQUEST_LEN,
    OFPBRC_BAD_STAT, OFPBRC_BAD_VENDOR, OFPBRC_BAD_VERSION, OFPET_BAD_REQUEST, OFPP_LOCAL,
    OFPP_NONE, OFPST_AGGREGATE, OFPST_DESC, OFPST_FLOW, OFPST_PORT, OFPST_TABLE, OFPST_VENDOR,
    OFPT_STATS_REQUEST, OFP_VERSION, PORT_STATS_RECORD_LEN, PORT_STATS_REQUEST_LEN,
    TABLE_STATS_RECORD_LEN,
};
use crate::port::DP_MAX_PORTS;
use crate::transport::Sender;
use std::time::Duration;

/// Table id selecting every table in a flow or aggregate request.
const TABLE_ID_ALL: u8 = 0xff;
/// Table id addressing the emergency table.
const EMERG_TABLE_ID: u8 = 0xfe;

const VENDOR_BODY_MIN: usize = 8;
const VENDOR_BODY_MAX: usize = 32;

/// Splits a duration for the wire: whole seconds and the sub-second
/// remainder in nanoseconds.
pub(crate) fn duration_parts(duration: Duration) -> (u32, u32) {
    (duration.as_secs() as u32, duration.subsec_nanos())
}

#[derive(Debug)]
pub(crate) enum DumpStatus {
    Done,
    More,
}

#[derive(Debug)]
struct FlowDumpState {
    table_idx: u8,
    position: TablePosition,
    req: FlowStatsRequest,
}

#[derive(Debug)]
struct PortDumpState {
    next_port: usize,
    filter: u16,
    local_done: bool,
}

#[derive(Debug)]
enum DumpState {
    Desc,
    Flow(FlowDumpState),
    Aggregate(FlowStatsRequest),
    Table,
    Port(PortDumpState),
}

#[derive(Debug)]
pub(crate) struct DumpSession {
    stats_type: u16,
    state: DumpState,
}

impl DumpSession {
    /// Validates the stats request and prepares per-category state. Wire
    /// errors (bad version, unknown category, unknown vendor) are reported
    /// to the requester here.
    pub(crate) fn open(dp: &Datapath, sender: &Sender, request: &[u8]) -> Result<Self> {
        let req = StatsRequest::parse(request)?;
        if req.header.version != OFP_VERSION {
            dp.send_error(sender, OFPET_BAD_REQUEST, OFPBRC_BAD_VERSION, request)?;
            return Err(Error::InvalidArgument("bad stats request version"));
        }
        if req.header.msg_type != OFPT_STATS_REQUEST
            || usize::from(req.header.length) != request.len()
        {
            return Err(Error::InvalidArgument("malformed stats request"));
        }

        let state = match req.stats_type {
            OFPST_DESC => {
                if !req.body.is_empty() {
                    return Err(Error::InvalidArgument("desc stats request takes no body"));
                }
                DumpState::Desc
            }
            OFPST_FLOW => {
                if req.body.len() != FLOW_STATS_REQUEST_LEN {
                    return Err(Error::InvalidArgument("bad flow stats request length"));
                }
                let fsr = FlowStatsRequest::decode(&req.body)?;
                DumpState::Flow(FlowDumpState {
                    table_idx: if fsr.table_id == TABLE_ID_ALL { 0 } else { fsr.table_id },
                    position: TablePosition::default(),
                    req: fsr,
                })
            }
            OFPST_AGGREGATE => {
                if req.body.len() != FLOW_STATS_REQUEST_LEN {
                    return Err(Error::InvalidArgument("bad aggregate stats request length"));
                }
                DumpState::Aggregate(FlowStatsRequest::decode(&req.body)?)
            }
            OFPST_TABLE => {
                if !req.body.is_empty() {
                    return Err(Error::InvalidArgument("table stats request takes no body"));
                }
                DumpState::Table
            }
            OFPST_PORT => {
                if req.body.len() != PORT_STATS_REQUEST_LEN {
                    return Err(Error::InvalidArgument("bad port stats request length"));
                }
                let psr = PortStatsRequest::decode(&req.body)?;
                DumpState::Port(PortDumpState {
                    next_port: 1,
                    filter: psr.port_no,
                    local_done: false,
                })
            }
            OFPST_VENDOR => {
                if req.body.len() < VENDOR_BODY_MIN || req.body.len() > VENDOR_BODY_MAX {
                    return Err(Error::InvalidArgument("bad vendor stats request length"));
                }
                dp.send_error(sender, OFPET_BAD_REQUEST, OFPBRC_BAD_VENDOR, request)?;
                return Err(Error::Unsupported("vendor stats"));
            }
            _ => {
                dp.send_error(sender, OFPET_BAD_REQUEST, OFPBRC_BAD_STAT, request)?;
                return Err(Error::Unsupported("unknown stats type"));
            }
        };
        Ok(Self {
            stats_type: req.stats_type,
            state,
        })
    }

    pub(crate) fn stats_type(&self) -> u16 {
        self.stats_type
    }

    /// Produces the next reply body, writing at most `budget` bytes.
    pub(crate) fn dump(
        &mut self,
        dp: &Datapath,
        body: &mut Vec<u8>,
        budget: usize,
    ) -> Result<DumpStatus> {
        match &mut self.state {
            DumpState::Desc => {
                if DESC_STATS_LEN > budget {
                    return Err(Error::QueueFull);
                }
                let descriptions = dp.process_descriptions();
                DescStats {
                    mfr_desc: descriptions.mfr_desc.clone(),
                    hw_desc: descriptions.hw_desc.clone(),
                    sw_desc: descriptions.sw_desc.clone(),
                    serial_num: descriptions.serial_num.clone(),
                    dp_desc: dp.description().to_string(),
                }
                .encode_into(body);
                Ok(DumpStatus::Done)
            }
            DumpState::Flow(state) => flow_dump(dp, state, body, budget),
            DumpState::Aggregate(req) => aggregate_dump(dp, req, body, budget),
            DumpState::Table => table_dump(dp, body, budget),
            DumpState::Port(state) => port_dump(dp, state, body, budget),
        }
    }
}

fn record_from(table_id: u8, entry: &FlowDumpEntry) -> FlowStatsRecord {
    let (duration_sec, duration_nsec) = duration_parts(entry.duration);
    FlowStatsRecord {
        table_id,
        match_fields: entry.match_fields,
        duration_sec,
        duration_nsec,
        priority: entry.priority,
        idle_timeout: entry.idle_timeout,
        hard_timeout: entry.hard_timeout,
        packet_count: entry.packet_count,
        byte_count: entry.byte_count,
        actions: entry.actions.clone(),
    }
}

/// Walks flow tables in ascending index order (or the single requested
/// table, or the emergency table), emitting one record per flow until the
/// buffer fills. A full buffer preserves the cursor for the next chunk; a
/// record too wide for an empty buffer can never make progress and aborts
/// the dump.
fn flow_dump(
    dp: &Datapath,
    state: &mut FlowDumpState,
    body: &mut Vec<u8>,
    budget: usize,
) -> Result<DumpStatus> {
    let stopped = if state.req.table_id == EMERG_TABLE_ID {
        let table_id = state.req.table_id;
        let mut cb = |entry: &FlowDumpEntry| -> bool {
            let record = record_from(table_id, entry);
            if body.len() + record.wire_len() > budget {
                return true;
            }
            record.encode_into(body);
            false
        };
        dp.chain().iterate(
            TableRef::Emergency,
            &state.req.match_fields,
            state.req.out_port,
            &mut state.position,
            &mut cb,
        )
    } else {
        let mut stopped = false;
        while state.table_idx < dp.chain().table_count()
            && (state.req.table_id == TABLE_ID_ALL || state.req.table_id == state.table_idx)
        {
            let table_id = state.table_idx;
            let mut cb = |entry: &FlowDumpEntry| -> bool {
                let record = record_from(table_id, entry);
                if body.len() + record.wire_len() > budget {
                    return true;
                }
                record.encode_into(body);
                false
            };
            stopped = dp.chain().iterate(
                TableRef::Index(table_id),
                &state.req.match_fields,
                state.req.out_port,
                &mut state.position,
                &mut cb,
            );
            if stopped {
                break;
            }
            state.table_idx += 1;
            state.position = TablePosition::default();
        }
        stopped
    };

    if !stopped {
        Ok(DumpStatus::Done)
    } else if !body.is_empty() {
        Ok(DumpStatus::More)
    } else {
        // A single flow wider than the whole buffer can never fit.
        Err(Error::OutOfMemory)
    }
}

fn aggregate_dump(
    dp: &Datapath,
    req: &FlowStatsRequest,
    body: &mut Vec<u8>,
    budget: usize,
) -> Result<DumpStatus> {
    if AGGREGATE_REPLY_LEN > budget {
        return Err(Error::QueueFull);
    }
    let mut totals = AggregateStatsReply::default();
    let mut cb = |entry: &FlowDumpEntry| -> bool {
        totals.packet_count = totals.packet_count.wrapping_add(entry.packet_count);
        totals.byte_count = totals.byte_count.wrapping_add(entry.byte_count);
        totals.flow_count += 1;
        false
    };
    if req.table_id == EMERG_TABLE_ID {
        let mut position = TablePosition::default();
        dp.chain().iterate(
            TableRef::Emergency,
            &req.match_fields,
            req.out_port,
            &mut position,
            &mut cb,
        );
    } else {
        let mut table_idx = if req.table_id == TABLE_ID_ALL { 0 } else { req.table_id };
        while table_idx < dp.chain().table_count()
            && (req.table_id == TABLE_ID_ALL || req.table_id == table_idx)
        {
            let mut position = TablePosition::default();
            dp.chain().iterate(
                TableRef::Index(table_idx),
                &req.match_fields,
                req.out_port,
                &mut position,
                &mut cb,
            );
            table_idx += 1;
        }
    }
    totals.encode_into(body);
    Ok(DumpStatus::Done)
}

fn table_dump(dp: &Datapath, body: &mut Vec<u8>, budget: usize) -> Result<DumpStatus> {
    let n_tables = dp.chain().table_count();
    if usize::from(n_tables) * TABLE_STATS_RECORD_LEN > budget {
        return Err(Error::QueueFull);
    }
    for table_id in 0..n_tables {
        let stats = dp.chain().table_stats(table_id).unwrap_or_default();
        crate::openflow::TableStatsRecord {
            table_id,
            name: stats.name,
            wildcards: stats.wildcards,
            max_entries: stats.max_entries,
            active_count: stats.active_count,
            lookup_count: stats.lookup_count,
            matched_count: stats.matched_count,
        }
        .encode_into(body);
    }
    Ok(DumpStatus::Done)
}

fn port_record(port: &crate::port::Port) -> PortStatsRecord {
    let stats = port.dev().stats();
    PortStatsRecord {
        port_no: port.port_no(),
        rx_packets: stats.rx_packets,
        tx_packets: stats.tx_packets,
        rx_bytes: stats.rx_bytes,
        tx_bytes: stats.tx_bytes,
        rx_dropped: stats.rx_dropped,
        tx_dropped: stats.tx_dropped,
        rx_errors: stats.rx_errors,
        tx_errors: stats.tx_errors,
        rx_frame_err: stats.rx_frame_err,
        rx_over_err: stats.rx_over_err,
        rx_crc_err: stats.rx_crc_err,
        collisions: stats.collisions,
    }
}

fn port_dump(
    dp: &Datapath,
    state: &mut PortDumpState,
    body: &mut Vec<u8>,
    budget: usize,
) -> Result<DumpStatus> {
    let max_records = budget / PORT_STATS_RECORD_LEN;
    if max_records == 0 {
        return Err(Error::OutOfMemory);
    }

    if state.filter != OFPP_NONE {
        if let Some(port) = dp.lookup_port(state.filter) {
            port_record(&port).encode_into(body);
        }
        return Ok(DumpStatus::Done);
    }

    let mut written = 0;
    while state.next_port < DP_MAX_PORTS && written < max_records {
        if let Some(port) = dp.lookup_port(state.next_port as u16) {
            port_record(&port).encode_into(body);
            written += 1;
        }
        state.next_port += 1;
    }
    if state.next_port >= DP_MAX_PORTS && !state.local_done && written < max_records {
        if let Some(port) = dp.lookup_port(OFPP_LOCAL) {
            port_record(&port).encode_into(body);
        }
        state.local_done = true;
    }

    if state.next_port < DP_MAX_PORTS || !state.local_done {
        Ok(DumpStatus::More)
    } else {
        Ok(DumpStatus::Done)
    }
}
