use super::*;

fn frame_bytes(len: usize, ethertype: u16) -> Vec<u8> {
    let mut bytes = vec![0u8; len];
    bytes[12..14].copy_from_slice(&ethertype.to_be_bytes());
    bytes
}

#[test]
fn stripped_header_is_restored() {
    let mut frame = Frame::with_stripped_header(frame_bytes(64, 0x0800));
    assert_eq!(frame.len(), 50);
    frame.restore_mac_header();
    assert_eq!(frame.len(), 64);
    assert_eq!(frame.ether_type(), Some(0x0800));
}

#[test]
fn clone_shares_until_unshared() {
    let mut frame = Frame::new(frame_bytes(64, 0x0800));
    assert!(!frame.is_shared());
    let clone = frame.clone();
    assert!(frame.is_shared());
    assert!(clone.is_shared());
    frame.unshare();
    assert!(!frame.is_shared());
    assert!(!clone.is_shared());
    assert_eq!(frame.as_slice(), clone.as_slice());
}

#[test]
fn payload_length_accounts_for_vlan_tag() {
    let plain = Frame::new(frame_bytes(100, 0x0800));
    assert_eq!(plain.payload_len(), 86);
    let tagged = Frame::new(frame_bytes(100, ETH_P_8021Q));
    assert_eq!(tagged.payload_len(), 82);
}

#[test]
fn origin_survives_clone() {
    let mut frame = Frame::new(frame_bytes(64, 0x0800));
    assert_eq!(frame.origin(), None);
    frame.set_origin(3);
    let clone = frame.clone();
    assert_eq!(clone.origin(), Some(3));
}

#[test]
fn runt_frame_has_no_ethertype() {
    let frame = Frame::new(vec![0u8; 10]);
    assert_eq!(frame.ether_type(), None);
    assert_eq!(frame.payload_len(), 0);
}
