use super::fake::{FakeConfigStore, Node};
use super::*;

fn sample_tree() -> Node {
    let mut root = Node::branch();
    root.set("apps/myApp/sandboxed", Node::boolean(false));
    root.set("apps/myApp/groups/0", Node::str("video"));
    root.set("apps/myApp/groups/1", Node::str("audio"));
    root.set("apps/myApp/procs/worker/priority", Node::str("medium"));
    root
}

#[test]
fn fake_store_reads_bool_leaf() {
    let store = FakeConfigStore::new(sample_tree());
    let txn = store.read_txn("/apps/myApp");
    assert!(!txn.get_bool("sandboxed", true));
}

#[test]
fn fake_store_missing_bool_uses_default() {
    let store = FakeConfigStore::new(sample_tree());
    let txn = store.read_txn("/apps/otherApp");
    assert!(txn.get_bool("sandboxed", true));
}

#[test]
fn fake_store_lists_children_in_order() {
    let store = FakeConfigStore::new(sample_tree());
    let txn = store.read_txn("/apps/myApp/groups");
    assert_eq!(txn.children(), vec!["0".to_string(), "1".to_string()]);
}

#[test]
fn fake_store_go_to_is_relative_to_cursor() {
    let store = FakeConfigStore::new(sample_tree());
    let mut txn = store.read_txn("/apps/myApp");
    txn.go_to("procs/worker");
    assert_eq!(txn.get_string("priority", ""), "medium");
}

#[test]
fn toml_store_reads_nested_values() {
    let toml_text = r#"
        [apps.myApp]
        sandboxed = true

        [apps.myApp.procs.worker]
        priority = "high"
    "#;
    let value: toml::Value = toml::from_str(toml_text).expect("valid toml");
    let store = TomlConfigStore::from_value(value);
    let txn = store.read_txn("/apps/myApp");
    assert!(txn.get_bool("sandboxed", false));
    assert_eq!(txn.get_string("procs/worker/priority", ""), "high");
}

#[test]
fn toml_store_missing_node_reports_not_exists() {
    let value: toml::Value = toml::from_str("").expect("valid toml");
    let store = TomlConfigStore::from_value(value);
    let txn = store.read_txn("/apps/missing");
    assert!(!txn.exists());
}
