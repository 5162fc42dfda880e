// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! av-engine: the app lifecycle engine (spec.md sections 4.2 and 4.5,
//! `app.c`'s process-container bookkeeping and state machine).
//!
//! `container` holds the process-container data model (C2): one container
//! per process, owned by the app that declared or ad-hoc-created it.
//! `lifecycle` drives the app state machine, kill escalation, SIGCHLD
//! dispatch, watchdog dispatch, and the ad-hoc process API (C5 and C6).
//!
//! Every operation here is `&mut App` — the engine assumes single-threaded,
//! supervisor-loop-only access, the same way `app.c`'s functions assume
//! they only ever run on the main event loop thread.

pub mod container;
pub mod lifecycle;

pub use container::{App, InternalStopHandler, ProcContainer};
pub use lifecycle::Supervisor;
