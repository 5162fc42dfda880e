// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon binary.

use av_core::SupervisorError;
use std::path::PathBuf;
use std::time::Duration;

/// State directory for whatever the daemon itself persists across restarts
/// (not app state, which lives under `apps_writeable_dir`):
/// `AV_STATE_DIR` > `dirs::state_dir()/appvisor` > error.
pub fn state_dir() -> Result<PathBuf, SupervisorError> {
    if let Ok(dir) = std::env::var("AV_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    dirs::state_dir()
        .map(|d| d.join("appvisor"))
        .ok_or_else(|| SupervisorError::NotFound("no state directory (HOME unset)".to_string()))
}

/// Path to the system-level TOML config (paths, not per-app data):
/// `AV_SYSTEM_CONFIG` or `/etc/appvisor/system.toml`.
pub fn system_config_path() -> PathBuf {
    std::env::var("AV_SYSTEM_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/etc/appvisor/system.toml"))
}

/// How often the event loop polls every app's kill timer for expiry.
/// `AV_KILL_TIMER_POLL_MS`, default 250ms.
pub fn kill_timer_poll_interval() -> Duration {
    std::env::var("AV_KILL_TIMER_POLL_MS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(Duration::from_millis(250))
}

/// `tracing-subscriber` `EnvFilter` directive string: `AV_LOG`, default
/// `"info"`.
pub fn log_filter() -> String {
    std::env::var("AV_LOG").unwrap_or_else(|_| "info".to_string())
}
