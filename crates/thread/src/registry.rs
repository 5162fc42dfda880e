// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The process-wide thread list and safe-reference counter (spec.md
//! section 4.1's "process-wide list used for introspection" and section 9's
//! "list change counter used by the introspection tool"), grounded in
//! `examples/original_source/framework/c/src/thread.c`'s
//! `ThreadRefMap`/`ThreadObjList`/`ThreadObjListChangeCount` statics — kept
//! here as one `parking_lot::Mutex`-guarded table instead of three, since
//! Rust's `Arc`/`Weak` already gives us reference safety without a separate
//! safe-reference map.

use crate::thread_ref::{ThreadInner, ThreadState};
use parking_lot::Mutex;
use smol_str::SmolStr;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, Weak};

struct Registry {
    threads: HashMap<u64, Weak<ThreadInner>>,
    next_id: u64,
    generation: u64,
}

fn registry() -> &'static Mutex<Registry> {
    static REGISTRY: OnceLock<Mutex<Registry>> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(Registry { threads: HashMap::new(), next_id: 1, generation: 0 }))
}

pub(crate) fn next_id() -> u64 {
    let mut r = registry().lock();
    let id = r.next_id;
    r.next_id += 1;
    id
}

pub(crate) fn insert(inner: &Arc<ThreadInner>) {
    let mut r = registry().lock();
    r.threads.insert(inner.id, Arc::downgrade(inner));
    r.generation += 1;
}

pub(crate) fn remove(id: u64) {
    let mut r = registry().lock();
    if r.threads.remove(&id).is_some() {
        r.generation += 1;
    }
}

/// Monotonically increasing counter bumped on every registry insert/remove,
/// for the introspection tool to detect that the thread list changed
/// between snapshots (spec.md section 9).
pub fn generation() -> u64 {
    registry().lock().generation
}

/// A read-only snapshot of one live thread, for diagnostics — the Rust
/// analogue of `ThreadFlux.c`'s thread list walk.
#[derive(Debug, Clone)]
pub struct ThreadInfo {
    pub id: u64,
    pub name: SmolStr,
    pub state: ThreadState,
}

/// Snapshots every thread currently registered. Threads that have already
/// self-destructed (non-joinable, past cleanup) are silently absent — their
/// `Weak` no longer upgrades.
pub fn list_threads() -> Vec<ThreadInfo> {
    let r = registry().lock();
    r.threads
        .values()
        .filter_map(Weak::upgrade)
        .map(|inner| ThreadInfo { id: inner.id, name: inner.name.lock().clone(), state: *inner.state.lock() })
        .collect()
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
