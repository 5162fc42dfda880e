// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The kill helper collaborator: soft-then-hard termination of a single
//! process, used by the ad-hoc `deleteProc` path (spec.md section 4.5, C6)
//! where there is no freeze cgroup to broadcast through — unlike
//! `killAppProcs` (spec.md section 4.5, C5), which signals a whole app via
//! `CgroupService::send_sig`.

use av_core::SupervisorError;
use nix::sys::signal::Signal;
use nix::unistd::Pid;

pub trait KillHelper: Send + Sync {
    fn kill_soft(&self, pid: i32) -> Result<(), SupervisorError>;
    fn kill_hard(&self, pid: i32) -> Result<(), SupervisorError>;
}

/// Sends real signals via `kill(2)`. `ESRCH` (process already gone) is not
/// an error — the caller's `deleteProc` only wants to know the signal was
/// delivered or the target no longer exists either way.
pub struct LinuxKillHelper;

impl LinuxKillHelper {
    fn send(pid: i32, signal: Signal) -> Result<(), SupervisorError> {
        match nix::sys::signal::kill(Pid::from_raw(pid), signal) {
            Ok(()) => Ok(()),
            Err(nix::errno::Errno::ESRCH) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl KillHelper for LinuxKillHelper {
    fn kill_soft(&self, pid: i32) -> Result<(), SupervisorError> {
        Self::send(pid, Signal::SIGTERM)
    }

    fn kill_hard(&self, pid: i32) -> Result<(), SupervisorError> {
        Self::send(pid, Signal::SIGKILL)
    }
}

#[cfg(any(test, feature = "test-support"))]
pub mod fake {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum KillCall {
        Soft(i32),
        Hard(i32),
    }

    #[derive(Default)]
    pub struct FakeKillHelper {
        calls: Mutex<Vec<KillCall>>,
    }

    impl FakeKillHelper {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn calls(&self) -> Vec<KillCall> {
            self.calls.lock().clone()
        }
    }

    impl KillHelper for FakeKillHelper {
        fn kill_soft(&self, pid: i32) -> Result<(), SupervisorError> {
            self.calls.lock().push(KillCall::Soft(pid));
            Ok(())
        }

        fn kill_hard(&self, pid: i32) -> Result<(), SupervisorError> {
            self.calls.lock().push(KillCall::Hard(pid));
            Ok(())
        }
    }
}

#[cfg(test)]
#[path = "killhelper_tests.rs"]
mod tests;
