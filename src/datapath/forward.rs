//! Per-packet forwarding pipeline: table lookup dispatch, action execution,
//! virtual output ports, flood expansion and the transmit MTU policy.
//! Fast-path failures drop the frame with a rate-limited log line; nothing
//! travels to the controller unless the failure is itself a controller
//! message.

use super::{Datapath, PortMap};
use crate::chain::Action;
use crate::error::{Error, Result};
use crate::frame::Frame;
use crate::iface::HostIface;
use crate::openflow::{
    OFPP_ALL, OFPP_CONTROLLER, OFPP_FLOOD, OFPP_IN_PORT, OFPP_LOCAL, OFPP_TABLE, OFPR_ACTION,
    OFPR_NO_MATCH, PortConfig,
};
use crate::port::{Port, DP_MAX_PORTS};
use log::warn;

/// Ingress entry: match the frame against the chain, execute the resulting
/// actions, or hand a table miss to the controller.
pub(crate) fn forward(dp: &Datapath, mut frame: Frame, in_port: u16) {
    frame.set_origin(in_port);
    // The read guard is the packet's read epoch: port removal waits for it.
    let ports = dp.ports.read();
    match dp.chain().lookup(&frame, in_port) {
        Some(actions) => {
            let _ = execute_actions(dp, &ports, frame, &actions, false);
        }
        None => {
            let max_len = usize::from(dp.switch_config().miss_send_len);
            if let Err(err) = output_control(dp, frame, max_len, OFPR_NO_MATCH) {
                if dp.drop_log.allow() {
                    warn!("{}: table-miss packet-in failed: {err}", dp.name());
                }
            }
        }
    }
}

/// Executes each action, cloning the frame for all but the last so the
/// original buffer rides the final output.
pub(crate) fn execute_actions(
    dp: &Datapath,
    ports: &PortMap,
    frame: Frame,
    actions: &[Action],
    ignore_no_fwd: bool,
) -> Result<()> {
    let Some((last, rest)) = actions.split_last() else {
        return Ok(());
    };
    for action in rest {
        run_action(dp, ports, frame.clone(), action, ignore_no_fwd)?;
    }
    run_action(dp, ports, frame, last, ignore_no_fwd)
}

fn run_action(
    dp: &Datapath,
    ports: &PortMap,
    frame: Frame,
    action: &Action,
    ignore_no_fwd: bool,
) -> Result<()> {
    match *action {
        Action::Output { port, max_len } if port == OFPP_CONTROLLER => {
            output_control(dp, frame, usize::from(max_len), OFPR_ACTION)
        }
        Action::Output { port, .. } => output_port(dp, ports, frame, port, ignore_no_fwd),
    }
}

/// Takes ownership of `frame` and sends it toward `out_port`.
pub(crate) fn output_port(
    dp: &Datapath,
    ports: &PortMap,
    frame: Frame,
    out_port: u16,
    ignore_no_fwd: bool,
) -> Result<()> {
    match out_port {
        OFPP_IN_PORT => {
            let Some(origin) = frame.origin() else {
                if dp.drop_log.allow() {
                    warn!("{}: frame origin not set, cannot output to in-port", dp.name());
                }
                return Err(Error::NoIngressDevice);
            };
            let port = ports.lookup(origin).ok_or(Error::NoIngressDevice)?;
            xmit(dp, &port, frame)
        }
        OFPP_TABLE => {
            // Re-enter the tables as if the frame had just arrived; used only
            // for controller-generated packet-out. A miss drops the frame.
            let in_port = frame.origin().unwrap_or(OFPP_LOCAL);
            match dp.chain().lookup(&frame, in_port) {
                Some(actions) => execute_actions(dp, ports, frame, &actions, ignore_no_fwd),
                None => Err(Error::NotFound("table miss")),
            }
        }
        OFPP_FLOOD => output_all(dp, ports, frame, true),
        OFPP_ALL => output_all(dp, ports, frame, false),
        OFPP_CONTROLLER => output_control(dp, frame, usize::from(u16::MAX), OFPR_ACTION),
        OFPP_LOCAL => dp.local_dev().receive(frame),
        n if usize::from(n) < DP_MAX_PORTS => {
            let Some(port) = ports.lookup(n) else {
                if dp.drop_log.allow() {
                    warn!("{}: can't forward to bad port {n}", dp.name());
                }
                return Err(Error::UnreachableOutput(n));
            };
            if frame.origin() == Some(n) {
                // Sending back out the ingress port requires OFPP_IN_PORT.
                if dp.drop_log.allow() {
                    warn!("{}: can't directly forward to input port", dp.name());
                }
                return Err(Error::InvalidArgument("output resolves to ingress port"));
            }
            if port.config().contains(PortConfig::NO_FWD) && !ignore_no_fwd {
                return Ok(());
            }
            xmit(dp, &port, frame)
        }
        _ => {
            if dp.drop_log.allow() {
                warn!("{}: can't forward to bad port {out_port:#06x}", dp.name());
            }
            Err(Error::UnreachableOutput(out_port))
        }
    }
}

/// Expand a frame to every eligible port except the ingress, honoring
/// NO_FLOOD when `flood` is set. Single pass with one clone saved: each
/// eligible port defers the previous one, the clone goes to the deferred
/// port, and the original rides the final transmit.
fn output_all(dp: &Datapath, ports: &PortMap, frame: Frame, flood: bool) -> Result<()> {
    let mut prev: Option<u16> = None;
    for port in &ports.list {
        if frame.origin() == Some(port.port_no()) {
            continue;
        }
        if flood && port.config().contains(PortConfig::NO_FLOOD) {
            continue;
        }
        if let Some(prev_port) = prev.replace(port.port_no()) {
            let _ = output_port(dp, ports, frame.clone(), prev_port, false);
        }
    }
    match prev {
        Some(last) => output_port(dp, ports, frame, last, false),
        None => Ok(()),
    }
}

/// Transmit policy: frames whose payload exceeds the interface MTU drop
/// unless they are GSO aggregates.
fn xmit(dp: &Datapath, port: &Port, frame: Frame) -> Result<()> {
    let payload = frame.payload_len();
    let mtu = port.dev().mtu();
    if payload > mtu && !frame.is_gso() {
        if dp.drop_log.allow() {
            warn!("{}: dropped over-mtu packet: {payload} > {mtu}", dp.name());
        }
        return Err(Error::PacketTooLarge {
            len: payload,
            limit: mtu,
        });
    }
    port.dev().transmit(&frame)
}

/// Hand a frame to the control path: stash it in the packet store when a
/// slot is free, then emit a packet-in.
pub(crate) fn output_control(
    dp: &Datapath,
    frame: Frame,
    max_len: usize,
    reason: u8,
) -> Result<()> {
    let buffer_id = dp.store().save(frame.clone());
    let in_port = frame.origin().unwrap_or(OFPP_LOCAL);
    dp.send_packet_in(&frame, buffer_id, in_port, reason, max_len)
}
