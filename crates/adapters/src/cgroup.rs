// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The control-group service collaborator: freeze, thaw, state query,
//! signal broadcast, emptiness query, per-subsystem membership by app name
//! (spec.md section 1).

use av_core::SupervisorError;
use nix::sys::signal::Signal;
use nix::unistd::Pid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreezeState {
    Thawed,
    Freezing,
    Frozen,
}

pub trait CgroupService: Send + Sync {
    /// Requests the freezer subsystem to freeze the app's cgroup. Freezing
    /// is asynchronous; poll `get_state` until it reports `Frozen`.
    fn freeze(&self, app_name: &str) -> Result<(), SupervisorError>;

    fn thaw(&self, app_name: &str) -> Result<(), SupervisorError>;

    fn get_state(&self, app_name: &str) -> Result<FreezeState, SupervisorError>;

    /// True if the app's freezer cgroup currently has no member processes.
    fn is_empty(&self, app_name: &str) -> bool;

    /// Broadcasts `signal` to every process in the app's freezer cgroup.
    /// Returns the number of processes signalled.
    fn send_sig(&self, app_name: &str, signal: Signal) -> Result<usize, SupervisorError>;
}

/// A real cgroup v1 freezer-subsystem implementation, rooted at
/// `/sys/fs/cgroup/freezer/<app_name>/`.
pub struct LinuxCgroupService {
    freezer_root: std::path::PathBuf,
}

impl LinuxCgroupService {
    pub fn new(freezer_root: impl Into<std::path::PathBuf>) -> Self {
        Self { freezer_root: freezer_root.into() }
    }

    fn cgroup_dir(&self, app_name: &str) -> std::path::PathBuf {
        self.freezer_root.join(app_name)
    }

    fn member_pids(&self, app_name: &str) -> Result<Vec<Pid>, SupervisorError> {
        let procs_path = self.cgroup_dir(app_name).join("cgroup.procs");
        let text = match std::fs::read_to_string(&procs_path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        Ok(text
            .lines()
            .filter_map(|l| l.trim().parse::<i32>().ok())
            .map(Pid::from_raw)
            .collect())
    }
}

impl CgroupService for LinuxCgroupService {
    fn freeze(&self, app_name: &str) -> Result<(), SupervisorError> {
        std::fs::write(self.cgroup_dir(app_name).join("freezer.state"), "FROZEN")?;
        Ok(())
    }

    fn thaw(&self, app_name: &str) -> Result<(), SupervisorError> {
        std::fs::write(self.cgroup_dir(app_name).join("freezer.state"), "THAWED")?;
        Ok(())
    }

    fn get_state(&self, app_name: &str) -> Result<FreezeState, SupervisorError> {
        let text = std::fs::read_to_string(self.cgroup_dir(app_name).join("freezer.state"))?;
        Ok(match text.trim() {
            "FROZEN" => FreezeState::Frozen,
            "FREEZING" => FreezeState::Freezing,
            _ => FreezeState::Thawed,
        })
    }

    fn is_empty(&self, app_name: &str) -> bool {
        self.member_pids(app_name).map(|pids| pids.is_empty()).unwrap_or(true)
    }

    fn send_sig(&self, app_name: &str, signal: Signal) -> Result<usize, SupervisorError> {
        let pids = self.member_pids(app_name)?;
        let mut signalled = 0;
        for pid in pids {
            match nix::sys::signal::kill(pid, signal) {
                Ok(()) => signalled += 1,
                Err(nix::errno::Errno::ESRCH) => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(signalled)
    }
}

#[cfg(any(test, feature = "test-support"))]
pub mod fake {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::{HashMap, HashSet};

    #[derive(Default)]
    pub struct FakeCgroupService {
        state: Mutex<HashMap<String, FreezeState>>,
        members: Mutex<HashMap<String, HashSet<i32>>>,
        /// Signals observed by `send_sig`, for test assertions.
        signals_sent: Mutex<Vec<(String, Signal)>>,
    }

    impl FakeCgroupService {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn add_member(&self, app_name: &str, pid: i32) {
            self.members.lock().entry(app_name.to_string()).or_default().insert(pid);
        }

        pub fn remove_member(&self, app_name: &str, pid: i32) {
            if let Some(set) = self.members.lock().get_mut(app_name) {
                set.remove(&pid);
            }
        }

        pub fn signals_sent(&self) -> Vec<(String, Signal)> {
            self.signals_sent.lock().clone()
        }
    }

    impl CgroupService for FakeCgroupService {
        fn freeze(&self, app_name: &str) -> Result<(), SupervisorError> {
            self.state.lock().insert(app_name.to_string(), FreezeState::Frozen);
            Ok(())
        }

        fn thaw(&self, app_name: &str) -> Result<(), SupervisorError> {
            self.state.lock().insert(app_name.to_string(), FreezeState::Thawed);
            Ok(())
        }

        fn get_state(&self, app_name: &str) -> Result<FreezeState, SupervisorError> {
            Ok(*self.state.lock().get(app_name).unwrap_or(&FreezeState::Thawed))
        }

        fn is_empty(&self, app_name: &str) -> bool {
            self.members.lock().get(app_name).map(|s| s.is_empty()).unwrap_or(true)
        }

        fn send_sig(&self, app_name: &str, signal: Signal) -> Result<usize, SupervisorError> {
            self.signals_sent.lock().push((app_name.to_string(), signal));
            let count = self.members.lock().get(app_name).map(|s| s.len()).unwrap_or(0);
            Ok(count)
        }
    }
}

#[cfg(test)]
#[path = "cgroup_tests.rs"]
mod tests;
