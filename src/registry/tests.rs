use crate::testsupport::{fixture, MockIface};

#[test]
fn allocate_requires_id_or_name() {
    let fx = fixture();
    let err = fx.core.registry().allocate(None, None).unwrap_err();
    assert_eq!(err.errno(), libc::EINVAL);
}

#[test]
fn allocate_rejects_out_of_range_id() {
    let fx = fixture();
    let err = fx.core.registry().allocate(Some(300), None).unwrap_err();
    assert_eq!(err.errno(), libc::EINVAL);
}

#[test]
fn smallest_free_id_wins() {
    let fx = fixture();
    let dp0 = fx.core.create_datapath(None, Some("br0")).unwrap();
    let dp1 = fx.core.create_datapath(None, Some("br1")).unwrap();
    assert_eq!(dp0.id(), 0);
    assert_eq!(dp1.id(), 1);
    fx.core.destroy_datapath(&dp0).unwrap();
    let dp2 = fx.core.create_datapath(None, Some("br2")).unwrap();
    assert_eq!(dp2.id(), 0);
}

#[test]
fn duplicate_id_rejected() {
    let fx = fixture();
    let _dp = fx.core.create_datapath(Some(4), Some("br0")).unwrap();
    let err = fx
        .core
        .create_datapath(Some(4), Some("br1"))
        .unwrap_err();
    assert_eq!(err.errno(), libc::EEXIST);
}

#[test]
fn duplicate_name_rejected() {
    let fx = fixture();
    let _dp = fx.core.create_datapath(Some(0), Some("br0")).unwrap();
    let err = fx
        .core
        .create_datapath(Some(1), Some("br0"))
        .unwrap_err();
    assert_eq!(err.errno(), libc::EEXIST);
}

#[test]
fn lookup_by_id_and_name() {
    let fx = fixture();
    let dp = fx.core.create_datapath(Some(9), Some("br9")).unwrap();
    let registry = fx.core.registry();
    assert!(std::sync::Arc::ptr_eq(&registry.get_by_id(9).unwrap(), &dp));
    assert!(std::sync::Arc::ptr_eq(&registry.get_by_name("br9").unwrap(), &dp));
    assert!(registry.get_by_id(8).is_none());
    assert!(registry.get_by_name("br8").is_none());
}

#[test]
fn destroy_unpublishes() {
    let fx = fixture();
    let dp = fx.core.create_datapath(Some(0), Some("br0")).unwrap();
    fx.core.destroy_datapath(&dp).unwrap();
    assert!(fx.core.registry().get_by_id(0).is_none());
    assert!(fx.core.registry().get_by_name("br0").is_none());
    assert!(fx.core.registry().iter().is_empty());
}

#[test]
fn local_iface_names_are_tracked() {
    let fx = fixture();
    let dp = fx.core.create_datapath(Some(0), Some("br0")).unwrap();
    assert!(fx.core.registry().is_local_iface("br0"));
    fx.stack.add(MockIface::new("eth1", [0, 0, 0, 0, 0, 1]));
    assert!(!fx.core.registry().is_local_iface("eth1"));
    fx.core.destroy_datapath(&dp).unwrap();
    assert!(!fx.core.registry().is_local_iface("br0"));
}
