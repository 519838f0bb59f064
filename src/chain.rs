//! Flow chain seam. The chain owns the match/action tables, their timeouts
//! and the emergency table; the datapath drives it through this trait and
//! executes whatever actions come back.

use crate::datapath::Datapath;
use crate::error::Result;
use crate::frame::Frame;
use crate::openflow::Match;
use crate::transport::Sender;
use smallvec::SmallVec;
use std::time::{Duration, Instant};

pub type ActionList = SmallVec<[Action; 4]>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    /// Send the frame to `port`; `max_len` bounds the payload when the port
    /// is the controller.
    Output { port: u16, max_len: u16 },
}

/// A flow evicted by the timeout sweep.
#[derive(Clone, Debug)]
pub struct RemovedFlow {
    pub match_fields: Match,
    pub cookie: u64,
    pub priority: u16,
    pub reason: u8,
    pub duration: Duration,
    pub idle_timeout: u16,
    pub packet_count: u64,
    pub byte_count: u64,
    pub send_flow_rem: bool,
    pub emerg_flow: bool,
}

/// One flow yielded by a stats iteration.
#[derive(Clone, Debug)]
pub struct FlowDumpEntry {
    pub match_fields: Match,
    pub duration: Duration,
    pub priority: u16,
    pub idle_timeout: u16,
    pub hard_timeout: u16,
    pub packet_count: u64,
    pub byte_count: u64,
    /// Encoded action list, appended verbatim to the stats record.
    pub actions: Vec<u8>,
}

#[derive(Clone, Debug, Default)]
pub struct TableStats {
    pub name: String,
    pub wildcards: u32,
    pub max_entries: u32,
    pub active_count: u32,
    pub lookup_count: u64,
    pub matched_count: u64,
}

/// Opaque iteration cursor owned by the chain; zeroed between tables.
#[derive(Clone, Debug, Default)]
pub struct TablePosition {
    pub private: [u64; 4],
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TableRef {
    Index(u8),
    Emergency,
}

pub trait Chain: Send + Sync {
    /// Match the frame against the table chain. `None` means table miss.
    fn lookup(&self, frame: &Frame, in_port: u16) -> Option<ActionList>;

    /// Expire flows; returns those removed by this sweep.
    fn timeout_sweep(&self, now: Instant) -> Vec<RemovedFlow>;

    /// Raw OpenFlow input from the control channel. The chain replies
    /// through the datapath's send methods.
    fn control_input(&self, dp: &Datapath, sender: &Sender, msg: &[u8]) -> Result<()>;

    /// Walk flows in `table` matching `match_fields`/`out_port`, starting at
    /// `position`. The callback returns `true` to stop; the method returns
    /// `true` when iteration stopped early (cursor preserved).
    fn iterate(
        &self,
        table: TableRef,
        match_fields: &Match,
        out_port: u16,
        position: &mut TablePosition,
        cb: &mut dyn FnMut(&FlowDumpEntry) -> bool,
    ) -> bool;

    fn table_stats(&self, table: u8) -> Option<TableStats>;

    fn table_count(&self) -> u8;
}

/// Builds the chain for a newly created datapath.
pub trait ChainFactory: Send + Sync {
    fn create_chain(&self) -> Result<Box<dyn Chain>>;
}
