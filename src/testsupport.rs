//! Shared test doubles: mock host stack and interfaces, a programmable
//! chain, and fixture plumbing over the in-process transport.

use crate::chain::{
    ActionList, Chain, ChainFactory, FlowDumpEntry, RemovedFlow, TablePosition, TableRef,
    TableStats,
};
use crate::datapath::Datapath;
use crate::error::{Error, Result};
use crate::frame::Frame;
use crate::iface::{HostIface, HostStack, IfaceFlags, IfaceStats, LinkFeatures};
use crate::openflow::{
    ConfigBody, Header, Match, PortMod, OFPT_BARRIER_REQUEST, OFPT_ECHO_REQUEST,
    OFPT_FEATURES_REQUEST, OFPT_GET_CONFIG_REQUEST, OFPT_HELLO, OFPT_PORT_MOD, OFPT_SET_CONFIG,
};
use crate::store::SlotStore;
use crate::transport::{ChannelTransport, ControlMessage, Sender};
use crate::{Core, CoreConfig};
use crossbeam_channel::Receiver;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Arc;
use std::time::Instant;

pub(crate) struct MockIface {
    name: String,
    hw_addr: [u8; 6],
    mtu: usize,
    up: AtomicBool,
    loopback: bool,
    carrier: AtomicBool,
    promisc: AtomicI32,
    features: Option<LinkFeatures>,
    stats: Mutex<IfaceStats>,
    pub transmitted: Mutex<Vec<Vec<u8>>>,
    pub received: Mutex<Vec<Vec<u8>>>,
}

impl MockIface {
    pub fn new(name: &str, hw_addr: [u8; 6]) -> Arc<Self> {
        Self::with_mtu(name, hw_addr, 1500)
    }

    pub fn with_mtu(name: &str, hw_addr: [u8; 6], mtu: usize) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            hw_addr,
            mtu,
            up: AtomicBool::new(true),
            loopback: false,
            carrier: AtomicBool::new(true),
            promisc: AtomicI32::new(0),
            features: None,
            stats: Mutex::new(IfaceStats::default()),
            transmitted: Mutex::new(Vec::new()),
            received: Mutex::new(Vec::new()),
        })
    }

    pub fn loopback(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            hw_addr: [0; 6],
            mtu: 65536,
            up: AtomicBool::new(true),
            loopback: true,
            carrier: AtomicBool::new(true),
            promisc: AtomicI32::new(0),
            features: None,
            stats: Mutex::new(IfaceStats::default()),
            transmitted: Mutex::new(Vec::new()),
            received: Mutex::new(Vec::new()),
        })
    }

    pub fn set_carrier(&self, up: bool) {
        self.carrier.store(up, Ordering::SeqCst);
    }

    pub fn set_up(&self, up: bool) {
        self.up.store(up, Ordering::SeqCst);
    }

    pub fn set_stats(&self, stats: IfaceStats) {
        *self.stats.lock() = stats;
    }

    pub fn promisc_count(&self) -> i32 {
        self.promisc.load(Ordering::SeqCst)
    }

    pub fn tx_count(&self) -> usize {
        self.transmitted.lock().len()
    }

    pub fn tx_frames(&self) -> Vec<Vec<u8>> {
        self.transmitted.lock().clone()
    }

    pub fn rx_count(&self) -> usize {
        self.received.lock().len()
    }
}

impl HostIface for MockIface {
    fn name(&self) -> &str {
        &self.name
    }

    fn hw_addr(&self) -> [u8; 6] {
        self.hw_addr
    }

    fn mtu(&self) -> usize {
        self.mtu
    }

    fn flags(&self) -> IfaceFlags {
        let mut flags = IfaceFlags::empty();
        if self.up.load(Ordering::SeqCst) {
            flags |= IfaceFlags::UP;
        }
        if self.loopback {
            flags |= IfaceFlags::LOOPBACK;
        }
        flags
    }

    fn carrier_ok(&self) -> bool {
        self.carrier.load(Ordering::SeqCst)
    }

    fn link_features(&self) -> Option<LinkFeatures> {
        self.features
    }

    fn stats(&self) -> IfaceStats {
        *self.stats.lock()
    }

    fn set_promiscuous(&self, on: bool) {
        self.promisc.fetch_add(if on { 1 } else { -1 }, Ordering::SeqCst);
    }

    fn transmit(&self, frame: &Frame) -> Result<()> {
        self.transmitted.lock().push(frame.as_slice().to_vec());
        Ok(())
    }

    fn receive(&self, frame: Frame) -> Result<()> {
        self.received.lock().push(frame.as_slice().to_vec());
        Ok(())
    }
}

pub(crate) struct MockStack {
    ifaces: Mutex<FxHashMap<String, Arc<MockIface>>>,
}

impl MockStack {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            ifaces: Mutex::new(FxHashMap::default()),
        })
    }

    pub fn add(&self, iface: Arc<MockIface>) {
        self.ifaces.lock().insert(iface.name.clone(), iface);
    }

    pub fn get(&self, name: &str) -> Arc<MockIface> {
        self.ifaces.lock().get(name).expect("no such mock iface").clone()
    }
}

impl HostStack for MockStack {
    fn create_local_iface(&self, name: &str) -> Result<Arc<dyn HostIface>> {
        let mut ifaces = self.ifaces.lock();
        if ifaces.contains_key(name) {
            return Err(Error::AlreadyExists);
        }
        let n = ifaces.len() as u8;
        let iface = MockIface::new(name, [0x52, 0x54, 0x00, 0x00, 0x10, n]);
        ifaces.insert(name.to_string(), Arc::clone(&iface));
        Ok(iface)
    }

    fn destroy_local_iface(&self, iface: &Arc<dyn HostIface>) {
        self.ifaces.lock().remove(iface.name());
    }

    fn iface_by_name(&self, name: &str) -> Option<Arc<dyn HostIface>> {
        self.ifaces
            .lock()
            .get(name)
            .map(|iface| Arc::clone(iface) as Arc<dyn HostIface>)
    }
}

/// Programmable chain double: `actions` is what every lookup returns,
/// `tables`/`emerg` feed stats iteration, `pending_removals` is drained by
/// the next timeout sweep. Control input implements the minimal message
/// handling the datapath senders need exercising.
pub(crate) struct TestChain {
    pub actions: Mutex<Option<ActionList>>,
    pub tables: Mutex<Vec<Vec<FlowDumpEntry>>>,
    pub emerg: Mutex<Vec<FlowDumpEntry>>,
    pub pending_removals: Mutex<Vec<RemovedFlow>>,
    pub n_tables: u8,
}

impl TestChain {
    pub fn new() -> Arc<Self> {
        Self::with_tables(2)
    }

    pub fn with_tables(n_tables: u8) -> Arc<Self> {
        Arc::new(Self {
            actions: Mutex::new(None),
            tables: Mutex::new((0..n_tables).map(|_| Vec::new()).collect()),
            emerg: Mutex::new(Vec::new()),
            pending_removals: Mutex::new(Vec::new()),
            n_tables,
        })
    }

    pub fn set_actions(&self, actions: ActionList) {
        *self.actions.lock() = Some(actions);
    }

    pub fn clear_actions(&self) {
        *self.actions.lock() = None;
    }
}

impl Chain for Arc<TestChain> {
    fn lookup(&self, _frame: &Frame, _in_port: u16) -> Option<ActionList> {
        self.actions.lock().clone()
    }

    fn timeout_sweep(&self, _now: Instant) -> Vec<RemovedFlow> {
        std::mem::take(&mut *self.pending_removals.lock())
    }

    fn control_input(&self, dp: &Datapath, sender: &Sender, msg: &[u8]) -> Result<()> {
        let header = Header::parse(msg)?;
        match header.msg_type {
            OFPT_HELLO => dp.send_hello(sender, &header),
            OFPT_ECHO_REQUEST => dp.send_echo_reply(sender, msg),
            OFPT_FEATURES_REQUEST => dp.send_features_reply(sender),
            OFPT_GET_CONFIG_REQUEST => dp.send_config_reply(sender),
            OFPT_SET_CONFIG => {
                let config = ConfigBody::parse_body(&msg[Header::LEN..])?;
                dp.set_switch_config(config.flags, config.miss_send_len);
                Ok(())
            }
            OFPT_PORT_MOD => {
                let req = PortMod::parse_body(&msg[Header::LEN..])?;
                dp.handle_port_mod(&req)
            }
            OFPT_BARRIER_REQUEST => dp.send_barrier_reply(sender),
            _ => Err(Error::Unsupported("message type not handled by test chain")),
        }
    }

    fn iterate(
        &self,
        table: TableRef,
        _match_fields: &Match,
        _out_port: u16,
        position: &mut TablePosition,
        cb: &mut dyn FnMut(&FlowDumpEntry) -> bool,
    ) -> bool {
        let flows = match table {
            TableRef::Index(idx) => self
                .tables
                .lock()
                .get(usize::from(idx))
                .cloned()
                .unwrap_or_default(),
            TableRef::Emergency => self.emerg.lock().clone(),
        };
        let mut idx = position.private[0] as usize;
        while idx < flows.len() {
            if cb(&flows[idx]) {
                position.private[0] = idx as u64;
                return true;
            }
            idx += 1;
        }
        position.private[0] = idx as u64;
        false
    }

    fn table_stats(&self, table: u8) -> Option<TableStats> {
        let tables = self.tables.lock();
        let flows = tables.get(usize::from(table))?;
        Some(TableStats {
            name: format!("table{table}"),
            wildcards: 0x003f_ffff,
            max_entries: 1024,
            active_count: flows.len() as u32,
            lookup_count: 100,
            matched_count: 80,
        })
    }

    fn table_count(&self) -> u8 {
        self.n_tables
    }
}

pub(crate) struct SharedChainFactory {
    pub chain: Arc<TestChain>,
}

impl ChainFactory for SharedChainFactory {
    fn create_chain(&self) -> Result<Box<dyn Chain>> {
        Ok(Box::new(Arc::clone(&self.chain)))
    }
}

pub(crate) struct FailingChainFactory;

impl ChainFactory for FailingChainFactory {
    fn create_chain(&self) -> Result<Box<dyn Chain>> {
        Err(Error::OutOfMemory)
    }
}

pub(crate) struct Fixture {
    pub core: Core,
    pub stack: Arc<MockStack>,
    pub chain: Arc<TestChain>,
    pub store: Arc<SlotStore>,
    pub transport: Arc<ChannelTransport>,
}

pub(crate) fn fixture() -> Fixture {
    fixture_with_datagram(8192)
}

pub(crate) fn fixture_with_datagram(max_datagram: usize) -> Fixture {
    let stack = MockStack::new();
    let chain = TestChain::new();
    let store = Arc::new(SlotStore::new());
    let transport = Arc::new(ChannelTransport::new(max_datagram));
    let core = Core::new(
        CoreConfig::default(),
        Arc::clone(&stack) as Arc<dyn HostStack>,
        Arc::clone(&transport) as Arc<dyn crate::transport::ControlTransport>,
        Arc::clone(&store) as Arc<dyn crate::store::PacketStore>,
        Arc::new(SharedChainFactory {
            chain: Arc::clone(&chain),
        }),
    )
    .expect("core setup");
    Fixture {
        core,
        stack,
        chain,
        store,
        transport,
    }
}

/// Creates `of0` with `n` attached ports named `eth1..ethN`.
pub(crate) fn dp_with_ports(fx: &Fixture, n: usize) -> Arc<Datapath> {
    for i in 1..=n {
        fx.stack
            .add(MockIface::new(&format!("eth{i}"), [0, 0, 0, 0, 0, i as u8]));
    }
    let dp = fx.core.create_datapath(Some(0), Some("of0")).expect("create dp");
    for i in 1..=n {
        fx.core.add_port(&dp, &format!("eth{i}")).expect("add port");
    }
    dp
}

pub(crate) struct Client {
    pub id: u32,
    pub rx: Receiver<ControlMessage>,
}

impl Client {
    pub fn sender(&self, xid: u32) -> Sender {
        Sender {
            xid,
            client_id: self.id,
            seq: 0,
        }
    }

    /// Next queued message's OpenFlow payload.
    pub fn recv_openflow(&self) -> Vec<u8> {
        let msg = self.rx.try_recv().expect("no control message queued");
        msg.openflow_payload().expect("not an openflow message").to_vec()
    }

    pub fn try_recv(&self) -> Option<ControlMessage> {
        self.rx.try_recv().ok()
    }

    pub fn drain_openflow(&self) -> Vec<Vec<u8>> {
        let mut out = Vec::new();
        while let Ok(msg) = self.rx.try_recv() {
            if let Some(payload) = msg.openflow_payload() {
                out.push(payload.to_vec());
            }
        }
        out
    }
}

/// Connect a controller client subscribed to the datapath's group.
pub(crate) fn connect_subscribed(fx: &Fixture, dp: &Datapath) -> Client {
    let (id, rx) = fx.transport.connect();
    fx.transport.subscribe(id, dp.mc_group()).expect("subscribe");
    Client { id, rx }
}

/// Connect a controller client with no subscriptions.
pub(crate) fn connect(fx: &Fixture) -> Client {
    let (id, rx) = fx.transport.connect();
    Client { id, rx }
}

/// Ethernet frame of `len` bytes with an IPv4 ethertype.
pub(crate) fn eth_frame(len: usize) -> Frame {
    let mut bytes = vec![0u8; len.max(14)];
    bytes[0..6].copy_from_slice(&[0xff; 6]);
    bytes[6..12].copy_from_slice(&[0x02, 0, 0, 0, 0, 1]);
    bytes[12] = 0x08;
    bytes[13] = 0x00;
    Frame::new(bytes)
}

pub(crate) fn wildcard_match() -> Match {
    Match {
        wildcards: 0x003f_ffff,
        ..Match::default()
    }
}

pub(crate) fn flow_entry(seq: u32) -> FlowDumpEntry {
    FlowDumpEntry {
        match_fields: Match {
            in_port: (seq % 7) as u16,
            nw_src: seq,
            ..wildcard_match()
        },
        duration: std::time::Duration::from_millis(1500 + u64::from(seq)),
        priority: 0x8000,
        idle_timeout: 60,
        hard_timeout: 0,
        packet_count: u64::from(seq) * 3,
        byte_count: u64::from(seq) * 180,
        actions: Vec::new(),
    }
}
