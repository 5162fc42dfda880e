// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! A small, self-contained thread runtime (spec.md section 4.1's "C1"): a
//! thread object created separately from when it starts running, explicit
//! join/cancel/exit semantics, per-thread destructor stacks, and a
//! process-wide registry for introspection. Grounded in
//! `examples/original_source/framework/c/src/thread.c`.

mod priority;
mod registry;
mod thread_ref;

pub use priority::{ThreadPriority, RT_HIGHEST, RT_LOWEST};
pub use registry::{generation, list_threads, ThreadInfo};
pub use thread_ref::{
    add_child_destructor, current, my_name, spawn, DestructorRef, ThreadContext, ThreadExit, ThreadRef, ThreadState,
    MAX_STACK_SIZE, MAX_THREAD_NAME_LEN, MIN_STACK_SIZE,
};
