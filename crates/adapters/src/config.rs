// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The config store collaborator: a hierarchical key/value tree with
//! read-only transactions, path navigation, and typed leaf reads
//! (spec.md section 1, "Config store").

use av_core::SupervisorError;

/// A read-only transaction against the config tree, rooted wherever
/// `ConfigStore::read_txn` was asked to root it.
///
/// Transactions are always cancelled, never committed (spec.md section 5) —
/// there is no `commit` method on this trait at all.
pub trait CfgTxn {
    /// Move this transaction's cursor to `path`, relative to the node it
    /// was created at. A leading `/` still treats the path as relative to
    /// the transaction's root, matching the config-tree paths in spec.md
    /// section 6 (all relative to an app's config root).
    fn go_to(&mut self, path: &str);

    /// True if the current node exists.
    fn exists(&self) -> bool;

    /// Names of the current node's children, in config order.
    fn children(&self) -> Vec<String>;

    fn get_string(&self, path: &str, default: &str) -> String;

    fn get_bool(&self, path: &str, default: bool) -> bool;

    fn get_int(&self, path: &str, default: i64) -> i64;
}

pub trait ConfigStore: Send + Sync {
    type Txn<'a>: CfgTxn
    where
        Self: 'a;

    /// Opens a read-only transaction rooted at `path`. Cancelled (dropped)
    /// when the caller is done with it.
    fn read_txn(&self, path: &str) -> Self::Txn<'_>;
}

/// Loads a bool leaf at `path` under `txn`'s current node, defaulting to
/// `default` when the node is missing or empty — the pattern spec.md
/// section 3 specifies for `sandboxed`.
pub fn read_bool_default<T: CfgTxn>(txn: &T, path: &str, default: bool) -> bool {
    txn.get_bool(path, default)
}

/// A real config store backed by a directory of TOML files, one per app,
/// matching the teacher's existing `toml` dependency (`oj-core`'s
/// `Cargo.toml`). Each file is parsed into a `toml::Value` tree and node
/// navigation walks `Table`/`Array` values.
pub struct TomlConfigStore {
    root: toml::Value,
}

impl TomlConfigStore {
    pub fn from_file(path: &std::path::Path) -> Result<Self, SupervisorError> {
        let text = std::fs::read_to_string(path)?;
        let root: toml::Value = toml::from_str(&text)
            .map_err(|e| SupervisorError::Fault(format!("invalid config TOML: {e}")))?;
        Ok(Self { root })
    }

    pub fn from_value(root: toml::Value) -> Self {
        Self { root }
    }
}

pub struct TomlTxn<'a> {
    root: &'a toml::Value,
    cursor: Vec<String>,
}

impl<'a> TomlTxn<'a> {
    fn node(&self) -> Option<&'a toml::Value> {
        let mut node = self.root;
        for seg in &self.cursor {
            node = node.get(seg)?;
        }
        Some(node)
    }
}

impl<'a> CfgTxn for TomlTxn<'a> {
    fn go_to(&mut self, path: &str) {
        if let Some(stripped) = path.strip_prefix('/') {
            self.cursor = stripped.split('/').filter(|s| !s.is_empty()).map(String::from).collect();
        } else {
            for seg in path.split('/').filter(|s| !s.is_empty()) {
                if seg == ".." {
                    self.cursor.pop();
                } else {
                    self.cursor.push(seg.to_string());
                }
            }
        }
    }

    fn exists(&self) -> bool {
        self.node().is_some()
    }

    fn children(&self) -> Vec<String> {
        match self.node() {
            Some(toml::Value::Table(t)) => t.keys().cloned().collect(),
            Some(toml::Value::Array(a)) => (0..a.len()).map(|i| i.to_string()).collect(),
            _ => Vec::new(),
        }
    }

    fn get_string(&self, path: &str, default: &str) -> String {
        let mut sub = TomlTxn { root: self.root, cursor: self.cursor.clone() };
        sub.go_to(path);
        match sub.node() {
            Some(toml::Value::String(s)) => s.clone(),
            _ => default.to_string(),
        }
    }

    fn get_bool(&self, path: &str, default: bool) -> bool {
        let mut sub = TomlTxn { root: self.root, cursor: self.cursor.clone() };
        sub.go_to(path);
        match sub.node() {
            Some(toml::Value::Boolean(b)) => *b,
            _ => default,
        }
    }

    fn get_int(&self, path: &str, default: i64) -> i64 {
        let mut sub = TomlTxn { root: self.root, cursor: self.cursor.clone() };
        sub.go_to(path);
        match sub.node() {
            Some(toml::Value::Integer(i)) => *i,
            _ => default,
        }
    }
}

impl ConfigStore for TomlConfigStore {
    type Txn<'a> = TomlTxn<'a>;

    fn read_txn(&self, path: &str) -> TomlTxn<'_> {
        let mut txn = TomlTxn { root: &self.root, cursor: Vec::new() };
        txn.go_to(path);
        txn
    }
}

#[cfg(any(test, feature = "test-support"))]
pub mod fake {
    //! An in-memory config tree for tests, built programmatically instead
    //! of parsed from TOML text.
    use super::CfgTxn;
    use indexmap::IndexMap;

    #[derive(Debug, Clone)]
    pub enum Node {
        Leaf(Value),
        Branch(IndexMap<String, Node>),
    }

    #[derive(Debug, Clone)]
    pub enum Value {
        Str(String),
        Bool(bool),
        Int(i64),
    }

    impl Node {
        pub fn branch() -> Self {
            Node::Branch(IndexMap::new())
        }

        pub fn str(s: impl Into<String>) -> Self {
            Node::Leaf(Value::Str(s.into()))
        }

        pub fn boolean(b: bool) -> Self {
            Node::Leaf(Value::Bool(b))
        }

        pub fn int(i: i64) -> Self {
            Node::Leaf(Value::Int(i))
        }

        pub fn set(&mut self, path: &str, node: Node) -> &mut Self {
            let Node::Branch(map) = self else {
                panic!("cannot set a child on a leaf node");
            };
            let mut segs = path.split('/').filter(|s| !s.is_empty());
            let Some(first) = segs.next() else { return self };
            let rest: Vec<&str> = segs.collect();
            let entry = map.entry(first.to_string()).or_insert_with(Node::branch);
            if rest.is_empty() {
                *entry = node;
                entry
            } else {
                entry.set(&rest.join("/"), node)
            }
        }

        fn get(&self, path: &str) -> Option<&Node> {
            let mut node = self;
            for seg in path.split('/').filter(|s| !s.is_empty()) {
                let Node::Branch(map) = node else { return None };
                node = map.get(seg)?;
            }
            Some(node)
        }
    }

    pub struct FakeConfigStore {
        root: Node,
    }

    impl FakeConfigStore {
        pub fn new(root: Node) -> Self {
            Self { root }
        }
    }

    pub struct FakeTxn<'a> {
        root: &'a Node,
        cursor: String,
    }

    impl<'a> FakeTxn<'a> {
        fn resolve(&self, path: &str) -> String {
            if let Some(stripped) = path.strip_prefix('/') {
                stripped.to_string()
            } else if self.cursor.is_empty() {
                path.to_string()
            } else {
                format!("{}/{}", self.cursor, path)
            }
        }

        fn node(&self) -> Option<&'a Node> {
            if self.cursor.is_empty() {
                Some(self.root)
            } else {
                self.root.get(&self.cursor)
            }
        }
    }

    impl<'a> CfgTxn for FakeTxn<'a> {
        fn go_to(&mut self, path: &str) {
            self.cursor = self.resolve(path);
        }

        fn exists(&self) -> bool {
            self.node().is_some()
        }

        fn children(&self) -> Vec<String> {
            match self.node() {
                Some(Node::Branch(map)) => map.keys().cloned().collect(),
                _ => Vec::new(),
            }
        }

        fn get_string(&self, path: &str, default: &str) -> String {
            let resolved = self.resolve(path);
            match self.root.get(&resolved) {
                Some(Node::Leaf(Value::Str(s))) => s.clone(),
                _ => default.to_string(),
            }
        }

        fn get_bool(&self, path: &str, default: bool) -> bool {
            let resolved = self.resolve(path);
            match self.root.get(&resolved) {
                Some(Node::Leaf(Value::Bool(b))) => *b,
                _ => default,
            }
        }

        fn get_int(&self, path: &str, default: i64) -> i64 {
            let resolved = self.resolve(path);
            match self.root.get(&resolved) {
                Some(Node::Leaf(Value::Int(i))) => *i,
                _ => default,
            }
        }
    }

    impl super::ConfigStore for FakeConfigStore {
        type Txn<'a> = FakeTxn<'a>;

        fn read_txn(&self, path: &str) -> FakeTxn<'_> {
            let mut txn = FakeTxn { root: &self.root, cursor: String::new() };
            txn.go_to(path);
            txn
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
