use super::*;

fn sample_match() -> Match {
    Match {
        wildcards: 0x003f_0fff,
        in_port: 7,
        dl_src: [1, 2, 3, 4, 5, 6],
        dl_dst: [0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff],
        dl_vlan: 100,
        dl_vlan_pcp: 3,
        dl_type: 0x0800,
        nw_tos: 0x10,
        nw_proto: 6,
        nw_src: 0x0a000001,
        nw_dst: 0x0a000002,
        tp_src: 4321,
        tp_dst: 80,
    }
}

fn sample_phy_port() -> PhyPort {
    PhyPort {
        port_no: 3,
        hw_addr: [2, 0, 0, 0, 0, 3],
        name: "eth3".to_string(),
        config: PortConfig::NO_FLOOD.bits(),
        state: PortState::LINK_DOWN.bits(),
        curr: (PortFeatures::G1_FD | PortFeatures::COPPER).bits(),
        advertised: PortFeatures::G1_FD.bits(),
        supported: (PortFeatures::G1_FD | PortFeatures::M100_FD).bits(),
        peer: 0,
    }
}

#[test]
fn match_round_trip() {
    let m = sample_match();
    let mut buf = Vec::new();
    m.encode_into(&mut buf);
    assert_eq!(buf.len(), MATCH_LEN);
    assert_eq!(Match::decode(&buf).unwrap(), m);
}

#[test]
fn phy_port_round_trip() {
    let port = sample_phy_port();
    let mut buf = Vec::new();
    port.encode_into(&mut buf);
    assert_eq!(buf.len(), PHY_PORT_LEN);
    assert_eq!(PhyPort::decode(&buf).unwrap(), port);
}

#[test]
fn packet_in_round_trip() {
    let msg = PacketIn {
        buffer_id: 0x1234,
        total_len: 200,
        in_port: 1,
        reason: OFPR_NO_MATCH,
        data: (0..128u8).collect(),
    };
    let mut buf = Vec::new();
    msg.encode_body(&mut buf);
    assert_eq!(buf.len(), PACKET_IN_FIXED + 128);
    assert_eq!(PacketIn::parse_body(&buf).unwrap(), msg);
}

#[test]
fn port_status_round_trip() {
    let msg = PortStatus {
        reason: OFPPR_MODIFY,
        desc: sample_phy_port(),
    };
    let mut buf = Vec::new();
    msg.encode_body(&mut buf);
    assert_eq!(buf.len(), PORT_STATUS_LEN);
    assert_eq!(PortStatus::parse_body(&buf).unwrap(), msg);
}

#[test]
fn flow_removed_round_trip() {
    let msg = FlowRemovedBody {
        match_fields: sample_match(),
        cookie: 0xdead_beef_0badc0de,
        priority: 0x8000,
        reason: OFPRR_IDLE_TIMEOUT,
        duration_sec: 12,
        duration_nsec: 345_678_901,
        idle_timeout: 60,
        packet_count: 42,
        byte_count: 4200,
    };
    let mut buf = Vec::new();
    msg.encode_body(&mut buf);
    assert_eq!(buf.len(), FLOW_REMOVED_LEN);
    assert_eq!(FlowRemovedBody::parse_body(&buf).unwrap(), msg);
}

#[test]
fn config_round_trip() {
    let msg = ConfigBody {
        flags: 1,
        miss_send_len: 128,
    };
    let mut buf = Vec::new();
    msg.encode_body(&mut buf);
    assert_eq!(ConfigBody::parse_body(&buf).unwrap(), msg);
}

#[test]
fn port_mod_round_trip() {
    let msg = PortMod {
        port_no: 2,
        hw_addr: [2, 0, 0, 0, 0, 2],
        config: PortConfig::NO_FLOOD.bits(),
        mask: PortConfig::NO_FLOOD.bits(),
        advertise: 0,
    };
    let mut buf = Vec::new();
    msg.encode_body(&mut buf);
    assert_eq!(buf.len(), PORT_MOD_BODY_LEN);
    assert_eq!(PortMod::parse_body(&buf).unwrap(), msg);
}

#[test]
fn flow_stats_request_round_trip() {
    let req = FlowStatsRequest {
        match_fields: sample_match(),
        table_id: 0xff,
        out_port: OFPP_NONE,
    };
    let mut buf = Vec::new();
    req.encode_into(&mut buf);
    assert_eq!(buf.len(), FLOW_STATS_REQUEST_LEN);
    assert_eq!(FlowStatsRequest::decode(&buf).unwrap(), req);
}

#[test]
fn flow_stats_record_round_trip() {
    let record = FlowStatsRecord {
        table_id: 1,
        match_fields: sample_match(),
        duration_sec: 9,
        duration_nsec: 999,
        priority: 100,
        idle_timeout: 5,
        hard_timeout: 10,
        packet_count: 7,
        byte_count: 700,
        actions: vec![0, 0, 0, 8, 0, 2, 0, 0],
    };
    let mut buf = Vec::new();
    record.encode_into(&mut buf);
    assert_eq!(buf.len(), record.wire_len());
    let (decoded, consumed) = FlowStatsRecord::decode(&buf).unwrap();
    assert_eq!(consumed, buf.len());
    assert_eq!(decoded, record);
}

#[test]
fn aggregate_reply_round_trip() {
    let reply = AggregateStatsReply {
        packet_count: 1_000_000,
        byte_count: 64_000_000,
        flow_count: 4096,
    };
    let mut buf = Vec::new();
    reply.encode_into(&mut buf);
    assert_eq!(buf.len(), AGGREGATE_REPLY_LEN);
    assert_eq!(AggregateStatsReply::decode(&buf).unwrap(), reply);
}

#[test]
fn table_stats_record_round_trip() {
    let record = TableStatsRecord {
        table_id: 0,
        name: "hash".to_string(),
        wildcards: 0,
        max_entries: 65536,
        active_count: 12,
        lookup_count: 99,
        matched_count: 88,
    };
    let mut buf = Vec::new();
    record.encode_into(&mut buf);
    assert_eq!(buf.len(), TABLE_STATS_RECORD_LEN);
    assert_eq!(TableStatsRecord::decode(&buf).unwrap(), record);
}

#[test]
fn port_stats_record_round_trip() {
    let record = PortStatsRecord {
        port_no: 1,
        rx_packets: 1,
        tx_packets: 2,
        rx_bytes: 3,
        tx_bytes: 4,
        rx_dropped: 5,
        tx_dropped: 6,
        rx_errors: 7,
        tx_errors: 8,
        rx_frame_err: 9,
        rx_over_err: 10,
        rx_crc_err: 11,
        collisions: 12,
    };
    let mut buf = Vec::new();
    record.encode_into(&mut buf);
    assert_eq!(buf.len(), PORT_STATS_RECORD_LEN);
    assert_eq!(PortStatsRecord::decode(&buf).unwrap(), record);
}

#[test]
fn desc_stats_round_trip() {
    let desc = DescStats {
        mfr_desc: "maker".to_string(),
        hw_desc: "hardware".to_string(),
        sw_desc: "0.1.0".to_string(),
        serial_num: "12345".to_string(),
        dp_desc: "host idx=0".to_string(),
    };
    let mut buf = Vec::new();
    desc.encode_into(&mut buf);
    assert_eq!(buf.len(), DESC_STATS_LEN);
    assert_eq!(DescStats::decode(&buf).unwrap(), desc);
}

#[test]
fn message_buf_writes_header_and_patches_length() {
    let mut msg = MessageBuf::alloc(OFPT_ECHO_REPLY, 0x01020304, 16).unwrap();
    msg.body().extend_from_slice(b"ping");
    let wire = msg.finish();
    let header = Header::parse(&wire).unwrap();
    assert_eq!(header.version, OFP_VERSION);
    assert_eq!(header.msg_type, OFPT_ECHO_REPLY);
    assert_eq!(usize::from(header.length), wire.len());
    assert_eq!(header.xid, 0x01020304);
    assert_eq!(&wire[Header::LEN..], b"ping");
}

#[test]
fn oversized_message_rejected_at_alloc() {
    let err = MessageBuf::alloc(OFPT_PACKET_IN, 0, OFP_MAX_MSG_LEN).unwrap_err();
    assert_eq!(err.errno(), libc::E2BIG);
}

#[test]
fn fixed_strings_truncate_with_nul() {
    let mut buf = Vec::new();
    put_fixed_str(&mut buf, "a-very-long-port-name", OFP_MAX_PORT_NAME_LEN);
    assert_eq!(buf.len(), OFP_MAX_PORT_NAME_LEN);
    assert_eq!(buf[OFP_MAX_PORT_NAME_LEN - 1], 0);
    assert_eq!(get_fixed_str(&buf, 0, OFP_MAX_PORT_NAME_LEN), "a-very-long-por");
}

#[test]
fn header_parse_rejects_short_input() {
    assert!(Header::parse(&[1, 2, 3]).is_err());
}
