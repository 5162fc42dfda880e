use super::*;

#[test]
fn app_name_from_cfg_path_root_takes_last_segment() {
    let name = AppName::from_cfg_path_root("/apps/myApp").expect("valid path");
    assert_eq!(name.as_str(), "myApp");
}

#[test]
fn app_name_from_cfg_path_root_strips_trailing_slash() {
    let name = AppName::from_cfg_path_root("/apps/myApp/").expect("valid path");
    assert_eq!(name.as_str(), "myApp");
}

#[test]
fn app_name_from_cfg_path_root_rejects_root() {
    assert!(AppName::from_cfg_path_root("/").is_none());
}

#[test]
fn proc_name_display_roundtrips() {
    let name = ProcName::new("worker");
    assert_eq!(name.to_string(), "worker");
    assert_eq!(name, ProcName::from("worker".to_string()));
}
