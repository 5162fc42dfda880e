// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `tracing-subscriber` setup plus the two severities spec.md section 6
//! names that `tracing::Level` doesn't have: CRITICAL and EMERG. Both log
//! at `ERROR` with a `severity` field rather than inventing a custom
//! `tracing::Level`, so they still show up under ordinary `RUST_LOG=error`
//! filtering.

use tracing_subscriber::EnvFilter;

/// Initializes the global subscriber from `filter` (an `EnvFilter`
/// directive string, see `crate::env::log_filter`). Call once, at startup.
pub fn init(filter: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .init();
}

/// Logs at CRITICAL severity: a policy violation or a stat/mount failure
/// that the caller recovers from but that an operator should still see.
#[macro_export]
macro_rules! critical {
    ($($arg:tt)*) => {
        tracing::error!(severity = "critical", $($arg)*)
    };
}

/// Logs at EMERG severity: a reboot-triggering watchdog action.
#[macro_export]
macro_rules! emerg {
    ($($arg:tt)*) => {
        tracing::error!(severity = "emerg", $($arg)*)
    };
}
