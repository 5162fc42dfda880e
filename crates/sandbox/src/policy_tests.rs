use super::*;
use av_adapters::dirutil::fake::FakeDirUtil;
use av_adapters::identity::fake::FakeIdentityService;
use av_adapters::label::fake::FakeLabelService;
use av_core::{AccessMask, Gid, Uid};

#[test]
fn unsandboxed_apps_always_derive_root() {
    let identity = FakeIdentityService::new();
    let labels = FakeLabelService::new();
    let dirs = FakeDirUtil::new();
    let policy = IdentityAndPolicy::new(&identity, &labels, &dirs);

    let id = policy.derive_identity("myApp", false, &["foo".into()]).unwrap();
    assert_eq!(id.uid, Uid::ROOT);
    assert_eq!(id.gid, Gid::ROOT);
    assert!(id.supplement_gids.is_empty());
}

#[test]
fn sandboxed_apps_derive_uid_gid_and_supplementary_groups() {
    let identity = FakeIdentityService::new().with_user("myApp", Uid(1000), Gid(1000));
    let labels = FakeLabelService::new();
    let dirs = FakeDirUtil::new();
    let policy = IdentityAndPolicy::new(&identity, &labels, &dirs);

    let id = policy.derive_identity("myApp", true, &["audio".into(), "video".into()]).unwrap();
    assert_eq!(id.uid, Uid(1000));
    assert_eq!(id.gid, Gid(1000));
    assert_eq!(id.supplement_gids.len(), 2);
}

#[test]
fn too_many_supplementary_groups_overflows() {
    let identity = FakeIdentityService::new().with_user("myApp", Uid(1000), Gid(1000));
    let labels = FakeLabelService::new();
    let dirs = FakeDirUtil::new();
    let policy = IdentityAndPolicy::new(&identity, &labels, &dirs);

    let groups: Vec<String> = (0..MAX_SUPPLEMENTARY_GROUPS + 1).map(|i| format!("g{i}")).collect();
    let err = policy.derive_identity("myApp", true, &groups).unwrap_err();
    assert!(matches!(err, SupervisorError::Overflow(_)));
}

#[test]
fn an_unknown_app_user_is_not_found() {
    let identity = FakeIdentityService::new();
    let labels = FakeLabelService::new();
    let dirs = FakeDirUtil::new();
    let policy = IdentityAndPolicy::new(&identity, &labels, &dirs);

    let err = policy.derive_identity("ghost", true, &[]).unwrap_err();
    assert!(matches!(err, SupervisorError::NotFound(_)));
}

#[test]
fn program_mac_sets_a_rule_for_every_access_mask() {
    let identity = FakeIdentityService::new();
    let labels = FakeLabelService::new();
    let dirs = FakeDirUtil::new();
    let policy = IdentityAndPolicy::new(&identity, &labels, &dirs);

    policy.program_mac("myApp", &[], &[]).unwrap();

    let app_label = labels.app_label("myApp");
    for mask in av_core::ACCESS_MASKS {
        let object = labels.app_access_label("myApp", mask);
        assert!(labels.rule_exists(&app_label, mask, &object));
    }
    assert!(labels.rule_exists(&Label::new("framework"), AccessMask::W, &app_label));
    assert!(labels.rule_exists(&app_label, AccessMask::Rw, &Label::new("framework")));
    assert!(labels.rule_exists(&app_label, AccessMask::W, &Label::new("syslog")));
}

#[test]
fn program_mac_wipes_existing_rules_before_reprogramming() {
    let identity = FakeIdentityService::new();
    let labels = FakeLabelService::new();
    let dirs = FakeDirUtil::new();
    let policy = IdentityAndPolicy::new(&identity, &labels, &dirs);

    let app_label = labels.app_label("myApp");
    labels.set_rule(&app_label, AccessMask::Rwx, &Label::new("stale")).unwrap();

    policy.program_mac("myApp", &[], &[]).unwrap();

    assert!(!labels.rule_exists(&app_label, AccessMask::Rwx, &Label::new("stale")));
}

#[test]
fn program_mac_sets_bidirectional_binding_rules() {
    let identity = FakeIdentityService::new();
    let labels = FakeLabelService::new();
    let dirs = FakeDirUtil::new();
    let policy = IdentityAndPolicy::new(&identity, &labels, &dirs);

    let bindings = vec![Binding { server_app: "server".into() }];
    policy.program_mac("myApp", &bindings, &[]).unwrap();

    let app_label = labels.app_label("myApp");
    let server_label = labels.app_label("server");
    assert!(labels.rule_exists(&app_label, AccessMask::Rw, &server_label));
    assert!(labels.rule_exists(&server_label, AccessMask::Rw, &app_label));
}

#[test]
fn program_mac_skips_bindings_with_an_empty_server_app() {
    let identity = FakeIdentityService::new();
    let labels = FakeLabelService::new();
    let dirs = FakeDirUtil::new();
    let policy = IdentityAndPolicy::new(&identity, &labels, &dirs);

    let bindings = vec![Binding { server_app: String::new() }];
    policy.program_mac("myApp", &bindings, &[]).unwrap();

    let empty_server_label = labels.app_label("");
    assert!(labels.rules().iter().all(|(_, _, o)| *o != empty_server_label));
}

#[test]
fn program_mac_labels_and_rules_a_device_with_read_write() {
    let identity = FakeIdentityService::new();
    let labels = FakeLabelService::new();
    let dirs = FakeDirUtil::new();
    dirs.set_device("/dev/ttyS0", 0x0400_0004);
    let policy = IdentityAndPolicy::new(&identity, &labels, &dirs);

    let devices = vec![DeviceRequirement {
        src: "/dev/ttyS0".into(),
        dest: "/dev/".into(),
        readable: true,
        writable: true,
    }];
    policy.program_mac("myApp", &[], &devices).unwrap();

    let app_label = labels.app_label("myApp");
    let device_label = labels.device_label(0x0400_0004);
    assert_eq!(labels.file_label(std::path::Path::new("/dev/ttyS0")), Some(device_label.clone()));
    assert!(labels.rule_exists(&app_label, AccessMask::Rw, &device_label));
    assert!(dirs.is_world_rw(std::path::Path::new("/dev/ttyS0")));
}

#[test]
fn program_mac_rejects_a_device_requirement_for_a_non_device_path() {
    let identity = FakeIdentityService::new();
    let labels = FakeLabelService::new();
    let dirs = FakeDirUtil::new();

    let policy = IdentityAndPolicy::new(&identity, &labels, &dirs);
    let devices = vec![DeviceRequirement {
        src: "/dev/notadevice".into(),
        dest: "/dev/".into(),
        readable: true,
        writable: false,
    }];
    let err = policy.program_mac("myApp", &[], &devices).unwrap_err();
    assert!(matches!(err, SupervisorError::Fault(_)));
}

#[test]
fn teardown_revokes_every_rule_with_the_app_as_subject() {
    let identity = FakeIdentityService::new();
    let labels = FakeLabelService::new();
    let dirs = FakeDirUtil::new();
    let policy = IdentityAndPolicy::new(&identity, &labels, &dirs);

    policy.program_mac("myApp", &[], &[]).unwrap();
    policy.teardown("myApp").unwrap();

    let app_label = labels.app_label("myApp");
    assert!(labels.rules().iter().all(|(s, _, _)| *s != app_label));
}
