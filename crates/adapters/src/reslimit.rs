// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The resource-limit module collaborator (spec.md section 1). Named only
//! by capability in spec.md; grounded here as POSIX `rlimit` programming,
//! since that is what Legato's `resourceLimits.c` and every Linux sandboxing
//! layer in the reference pack actually configures — file descriptor count,
//! process count (`RLIMIT_NPROC`), core dump size, and locked-memory size
//! are the limits the app config tree exposes.

use av_core::SupervisorError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceLimits {
    pub max_file_descriptors: Option<u64>,
    pub max_processes: Option<u64>,
    pub core_dump_size: Option<u64>,
    pub max_locked_memory: Option<u64>,
}

impl ResourceLimits {
    pub const fn unlimited() -> Self {
        Self { max_file_descriptors: None, max_processes: None, core_dump_size: None, max_locked_memory: None }
    }
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self::unlimited()
    }
}

pub trait ResourceLimiter: Send + Sync {
    /// Installs resource limits for the given app. Applied in the child
    /// between fork and exec on Linux (i.e. before `ProcessExecutor::start`
    /// actually runs the target binary); a no-op limit field leaves the
    /// inherited soft/hard limits untouched.
    fn set_limits(&self, app_name: &str, limits: ResourceLimits) -> Result<(), SupervisorError>;

    /// Tears down any limits this module tracks for the app. Actual rlimits
    /// are per-process and vanish with the process; this only clears
    /// bookkeeping used to re-derive limits for auxiliary/ad-hoc processes
    /// started later under the same app (spec.md section 4.4, app deletion).
    fn teardown(&self, app_name: &str) -> Result<(), SupervisorError>;
}

/// A real resource limiter backed by `nix::sys::resource::setrlimit`. Limits
/// installed here apply to the calling process, so `set_limits` is meant to
/// be called from within a `pre_exec` hook (see `av_adapters::executor`)
/// rather than from the Supervisor's own process.
pub struct LinuxResourceLimiter {
    installed: parking_lot::Mutex<std::collections::HashMap<String, ResourceLimits>>,
}

impl LinuxResourceLimiter {
    pub fn new() -> Self {
        Self { installed: parking_lot::Mutex::new(std::collections::HashMap::new()) }
    }

    /// Applies `limits` to the *current* process. Safe to call only from a
    /// freshly forked child, per `setrlimit`'s semantics.
    pub fn apply_to_self(limits: &ResourceLimits) -> Result<(), SupervisorError> {
        use nix::sys::resource::{setrlimit, Resource};

        if let Some(n) = limits.max_file_descriptors {
            setrlimit(Resource::RLIMIT_NOFILE, n, n)?;
        }
        if let Some(n) = limits.max_processes {
            setrlimit(Resource::RLIMIT_NPROC, n, n)?;
        }
        if let Some(n) = limits.core_dump_size {
            setrlimit(Resource::RLIMIT_CORE, n, n)?;
        }
        if let Some(n) = limits.max_locked_memory {
            setrlimit(Resource::RLIMIT_MEMLOCK, n, n)?;
        }
        Ok(())
    }
}

impl Default for LinuxResourceLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceLimiter for LinuxResourceLimiter {
    fn set_limits(&self, app_name: &str, limits: ResourceLimits) -> Result<(), SupervisorError> {
        self.installed.lock().insert(app_name.to_string(), limits);
        Ok(())
    }

    fn teardown(&self, app_name: &str) -> Result<(), SupervisorError> {
        self.installed.lock().remove(app_name);
        Ok(())
    }
}

#[cfg(any(test, feature = "test-support"))]
pub mod fake {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    #[derive(Default)]
    pub struct FakeResourceLimiter {
        installed: Mutex<HashMap<String, ResourceLimits>>,
    }

    impl FakeResourceLimiter {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn limits_for(&self, app_name: &str) -> Option<ResourceLimits> {
            self.installed.lock().get(app_name).copied()
        }
    }

    impl ResourceLimiter for FakeResourceLimiter {
        fn set_limits(&self, app_name: &str, limits: ResourceLimits) -> Result<(), SupervisorError> {
            self.installed.lock().insert(app_name.to_string(), limits);
            Ok(())
        }

        fn teardown(&self, app_name: &str) -> Result<(), SupervisorError> {
            self.installed.lock().remove(app_name);
            Ok(())
        }
    }
}

#[cfg(test)]
#[path = "reslimit_tests.rs"]
mod tests;
