//! One logical switch instance: the port table, the flow chain, switch
//! configuration, and the control-plane send paths.

pub(crate) mod forward;
pub(crate) mod maint;

use crate::chain::{Action, Chain, RemovedFlow};
use crate::error::{Error, Result};
use crate::frame::Frame;
use crate::identity::{self, Descriptions};
use crate::iface::HostIface;
use crate::openflow::{
    self, ConfigBody, FlowRemovedBody, Header, MessageBuf, PacketIn, PortMod, PortStatus,
    ERROR_DATA_MAX, FEATURES_REPLY_FIXED, OFPP_LOCAL, OFPT_BARRIER_REPLY, OFPT_ECHO_REPLY,
    OFPT_ERROR, OFPT_FEATURES_REPLY, OFPT_FLOW_REMOVED, OFPT_GET_CONFIG_REPLY, OFPT_HELLO,
    OFPT_PACKET_IN, OFPT_PORT_STATUS, OFP_VERSION, PACKET_IN_FIXED, PHY_PORT_LEN,
    SUPPORTED_ACTIONS, SUPPORTED_CAPABILITIES,
};
use crate::port::{Port, DP_MAX_PORTS};
use crate::ratelimit::RateLimit;
use crate::stats::duration_parts;
use crate::store::{PacketStore, NO_BUFFER};
use crate::transport::{ControlMessage, ControlTransport, Sender};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;

/// Switch-wide OpenFlow configuration.
#[derive(Clone, Copy, Debug)]
pub struct SwitchConfig {
    pub flags: u16,
    pub miss_send_len: u16,
}

impl Default for SwitchConfig {
    fn default() -> Self {
        Self {
            flags: 0,
            miss_send_len: openflow::OFP_DEFAULT_MISS_SEND_LEN,
        }
    }
}

/// Port table: numbered slots, the local port, and the insertion-ordered
/// list used for enumeration and flood expansion. Data-plane readers hold
/// the enclosing read guard across a whole packet; a writer acquiring the
/// write guard has waited out every in-flight packet.
pub(crate) struct PortMap {
    pub(super) slots: Vec<Option<Arc<Port>>>,
    pub(super) local: Option<Arc<Port>>,
    pub(super) list: Vec<Arc<Port>>,
}

impl PortMap {
    fn new() -> Self {
        Self {
            slots: (0..DP_MAX_PORTS).map(|_| None).collect(),
            local: None,
            list: Vec::new(),
        }
    }

    pub(super) fn lookup(&self, port_no: u16) -> Option<Arc<Port>> {
        if usize::from(port_no) < DP_MAX_PORTS {
            self.slots[usize::from(port_no)].clone()
        } else if port_no == OFPP_LOCAL {
            self.local.clone()
        } else {
            None
        }
    }
}

pub struct Datapath {
    id: u16,
    name: String,
    desc: String,
    local_dev: Arc<dyn HostIface>,
    chain: Box<dyn Chain>,
    ports: RwLock<PortMap>,
    config: Mutex<SwitchConfig>,
    mc_group: u32,
    transport: Arc<dyn ControlTransport>,
    store: Arc<dyn PacketStore>,
    descriptions: Arc<Descriptions>,
    maint: Mutex<Option<maint::MaintHandle>>,
    pub(crate) drop_log: RateLimit,
}

impl std::fmt::Debug for Datapath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Datapath")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl Datapath {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        id: u16,
        name: String,
        desc: String,
        local_dev: Arc<dyn HostIface>,
        chain: Box<dyn Chain>,
        mc_group: u32,
        transport: Arc<dyn ControlTransport>,
        store: Arc<dyn PacketStore>,
        descriptions: Arc<Descriptions>,
    ) -> Arc<Self> {
        Arc::new(Self {
            id,
            name,
            desc,
            local_dev,
            chain,
            ports: RwLock::new(PortMap::new()),
            config: Mutex::new(SwitchConfig::default()),
            mc_group,
            transport,
            store,
            descriptions,
            maint: Mutex::new(None),
            drop_log: RateLimit::new(),
        })
    }

    pub fn id(&self) -> u16 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.desc
    }

    pub fn mc_group(&self) -> u32 {
        self.mc_group
    }

    pub fn chain(&self) -> &dyn Chain {
        self.chain.as_ref()
    }

    pub fn local_dev(&self) -> &Arc<dyn HostIface> {
        &self.local_dev
    }

    pub(crate) fn store(&self) -> &Arc<dyn PacketStore> {
        &self.store
    }

    pub(crate) fn process_descriptions(&self) -> &Descriptions {
        &self.descriptions
    }

    /// 64-bit datapath id: the MAC of the local interface.
    pub fn datapath_id(&self) -> u64 {
        identity::datapath_id(self.local_dev.hw_addr())
    }

    pub fn switch_config(&self) -> SwitchConfig {
        *self.config.lock()
    }

    pub fn set_switch_config(&self, flags: u16, miss_send_len: u16) {
        let mut config = self.config.lock();
        config.flags = flags;
        config.miss_send_len = miss_send_len;
    }

    pub fn lookup_port(&self, port_no: u16) -> Option<Arc<Port>> {
        self.ports.read().lookup(port_no)
    }

    /// Attached ports in insertion order (local port included).
    pub fn port_list(&self) -> Vec<Arc<Port>> {
        self.ports.read().list.clone()
    }

    pub(crate) fn find_free_slot(&self) -> Result<u16> {
        let ports = self.ports.read();
        ports.slots[1..]
            .iter()
            .position(Option::is_none)
            .map(|idx| (idx + 1) as u16)
            .ok_or(Error::Exhausted)
    }

    pub(crate) fn install_local_port(&self) {
        self.local_dev.set_promiscuous(true);
        let port = Port::new(OFPP_LOCAL, Arc::clone(&self.local_dev));
        let mut ports = self.ports.write();
        ports.local = Some(Arc::clone(&port));
        ports.list.push(port);
    }

    pub(crate) fn install_port(&self, port: Arc<Port>) {
        let mut ports = self.ports.write();
        ports.slots[usize::from(port.port_no())] = Some(Arc::clone(&port));
        ports.list.push(port);
    }

    /// Unpublish a port. Acquiring the write guard waits for every in-flight
    /// data-plane user of the old table to finish.
    pub(crate) fn remove_port(&self, port_no: u16) -> Option<Arc<Port>> {
        let mut ports = self.ports.write();
        let port = if usize::from(port_no) < DP_MAX_PORTS {
            ports.slots[usize::from(port_no)].take()
        } else if port_no == OFPP_LOCAL {
            ports.local.take()
        } else {
            None
        }?;
        ports.list.retain(|p| p.port_no() != port_no);
        Some(port)
    }

    /// Data-plane entry point. The caller (bridge hook) has already made the
    /// frame uniquely owned and restored the Ethernet header.
    pub fn on_ingress(&self, in_port: u16, frame: Frame) {
        forward::forward(self, frame, in_port);
    }

    /// Transmit a frame toward `out_port`, honoring the virtual-port
    /// semantics. Used by the chain for controller-generated output.
    pub fn output_port(&self, frame: Frame, out_port: u16, ignore_no_fwd: bool) -> Result<()> {
        let ports = self.ports.read();
        forward::output_port(self, &ports, frame, out_port, ignore_no_fwd)
    }

    /// Run an action list against a frame, cloning for all but the last
    /// output.
    pub fn execute_actions(
        &self,
        frame: Frame,
        actions: &[Action],
        ignore_no_fwd: bool,
    ) -> Result<()> {
        let ports = self.ports.read();
        forward::execute_actions(self, &ports, frame, actions, ignore_no_fwd)
    }

    pub fn handle_port_mod(&self, req: &PortMod) -> Result<()> {
        let port = self
            .lookup_port(req.port_no)
            .ok_or(Error::NotFound("no such port"))?;
        port.apply_port_mod(req)
    }

    pub(crate) fn start_maintenance(self: &Arc<Self>) -> Result<()> {
        let handle = maint::spawn(Arc::clone(self))?;
        *self.maint.lock() = Some(handle);
        Ok(())
    }

    pub(crate) fn stop_maintenance(&self) {
        if let Some(handle) = self.maint.lock().take() {
            handle.stop();
        }
    }

    /// Routes a finished message: unicast when a sender is present, else
    /// multicast on this datapath's group.
    pub(crate) fn send_openflow(&self, sender: Option<&Sender>, msg: MessageBuf) -> Result<()> {
        let wire = ControlMessage::openflow(self.id, msg.finish());
        match sender {
            Some(sender) => self.transport.unicast(sender.client_id, wire),
            None => self.transport.multicast(self.mc_group, wire),
        }
    }

    pub fn send_features_reply(&self, sender: &Sender) -> Result<()> {
        // Overallocate for a full port table, shrink to the live count.
        let max_body = FEATURES_REPLY_FIXED + PHY_PORT_LEN * DP_MAX_PORTS;
        let mut msg = MessageBuf::alloc(OFPT_FEATURES_REPLY, sender.xid, max_body)?;
        {
            let ports = self.ports.read();
            let body = msg.body();
            openflow::put_u64(body, self.datapath_id());
            openflow::put_u32(body, self.store.capacity());
            body.push(self.chain.table_count());
            openflow::put_zeros(body, 3);
            openflow::put_u32(body, SUPPORTED_CAPABILITIES);
            openflow::put_u32(body, SUPPORTED_ACTIONS);
            for port in &ports.list {
                port.fill_description().encode_into(body);
            }
        }
        self.send_openflow(Some(sender), msg)
    }

    pub fn send_config_reply(&self, sender: &Sender) -> Result<()> {
        let mut msg =
            MessageBuf::alloc(OFPT_GET_CONFIG_REPLY, sender.xid, openflow::CONFIG_BODY_LEN)?;
        let config = self.switch_config();
        ConfigBody {
            flags: config.flags,
            miss_send_len: config.miss_send_len,
        }
        .encode_body(msg.body());
        self.send_openflow(Some(sender), msg)
    }

    pub fn send_port_status(&self, port: &Port, reason: u8) -> Result<()> {
        let mut msg = MessageBuf::alloc(OFPT_PORT_STATUS, 0, openflow::PORT_STATUS_LEN)?;
        PortStatus {
            reason,
            desc: port.fill_description(),
        }
        .encode_body(msg.body());
        self.send_openflow(None, msg)
    }

    /// Notify controllers of an expired flow. Flows without `send_flow_rem`,
    /// and emergency flows, are silently skipped.
    pub fn send_flow_removed(&self, flow: &RemovedFlow) -> Result<()> {
        if !flow.send_flow_rem || flow.emerg_flow {
            return Ok(());
        }
        let (duration_sec, duration_nsec) = duration_parts(flow.duration);
        let mut msg = MessageBuf::alloc(OFPT_FLOW_REMOVED, 0, openflow::FLOW_REMOVED_LEN)?;
        FlowRemovedBody {
            match_fields: flow.match_fields,
            cookie: flow.cookie,
            priority: flow.priority,
            reason: flow.reason,
            duration_sec,
            duration_nsec,
            idle_timeout: flow.idle_timeout,
            packet_count: flow.packet_count,
            byte_count: flow.byte_count,
        }
        .encode_body(msg.body());
        self.send_openflow(None, msg)
    }

    /// Encapsulate a frame for the controller. `buffer_id` of `None` encodes
    /// "not buffered" and attaches the full payload; a buffered frame is
    /// truncated to `max_len`. `total_len` always reports the original
    /// frame length.
    pub fn send_packet_in(
        &self,
        frame: &Frame,
        buffer_id: Option<u32>,
        in_port: u16,
        reason: u8,
        max_len: usize,
    ) -> Result<()> {
        let total_len = frame.len();
        let fwd_len = match buffer_id {
            Some(_) => total_len.min(max_len),
            None => total_len,
        };
        let mut msg = MessageBuf::alloc(OFPT_PACKET_IN, 0, PACKET_IN_FIXED + fwd_len)?;
        PacketIn {
            buffer_id: buffer_id.unwrap_or(NO_BUFFER),
            total_len: total_len as u16,
            in_port,
            reason,
            data: frame.as_slice()[..fwd_len].to_vec(),
        }
        .encode_body(msg.body());
        self.send_openflow(None, msg)
    }

    /// Error reply carrying up to 64 bytes of the offending request.
    pub fn send_error(
        &self,
        sender: &Sender,
        err_type: u16,
        code: u16,
        data: &[u8],
    ) -> Result<()> {
        let data = &data[..data.len().min(ERROR_DATA_MAX)];
        let mut msg = MessageBuf::alloc(OFPT_ERROR, sender.xid, 4 + data.len())?;
        let body = msg.body();
        openflow::put_u16(body, err_type);
        openflow::put_u16(body, code);
        body.extend_from_slice(data);
        self.send_openflow(Some(sender), msg)
    }

    /// Version negotiation: peers below our version get exactly one
    /// HELLO_FAILED/INCOMPATIBLE error and no hello reply.
    pub fn send_hello(&self, sender: &Sender, request: &Header) -> Result<()> {
        if request.version < OFP_VERSION {
            let text = format!("Only version {OFP_VERSION:#04x} supported");
            self.send_error(
                sender,
                openflow::OFPET_HELLO_FAILED,
                openflow::OFPHFC_INCOMPATIBLE,
                text.as_bytes(),
            )?;
            return Err(Error::VersionMismatch(request.version));
        }
        let msg = MessageBuf::alloc(OFPT_HELLO, sender.xid, 0)?;
        self.send_openflow(Some(sender), msg)
    }

    /// Echo reply mirroring the request payload.
    pub fn send_echo_reply(&self, sender: &Sender, request: &[u8]) -> Result<()> {
        let payload = request.get(Header::LEN..).unwrap_or_default();
        let mut msg = MessageBuf::alloc(OFPT_ECHO_REPLY, sender.xid, payload.len())?;
        msg.body().extend_from_slice(payload);
        self.send_openflow(Some(sender), msg)
    }

    pub fn send_barrier_reply(&self, sender: &Sender) -> Result<()> {
        let msg = MessageBuf::alloc(OFPT_BARRIER_REPLY, sender.xid, 0)?;
        self.send_openflow(Some(sender), msg)
    }
}
