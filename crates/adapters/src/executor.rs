// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The process executor collaborator: given a process descriptor, performs
//! fork/exec, priority/arg setup, and reports a fault action on exit
//! (spec.md section 1).

use av_core::{FaultAction, ProcName, SupervisorError, WatchdogAction};
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};

/// Process scheduling priority, parsed from the ad-hoc API's priority
/// strings (spec.md section 4.5, C6): `idle|low|medium|high|rt1..rt32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    Idle,
    Low,
    Medium,
    High,
    /// Real-time priority 1 (lowest) through 32 (highest).
    Rt(u8),
}

impl Priority {
    pub fn parse(s: &str) -> Result<Self, SupervisorError> {
        match s {
            "idle" => Ok(Self::Idle),
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            s if s.starts_with("rt") => {
                let level: u8 = s[2..]
                    .parse()
                    .map_err(|_| SupervisorError::Fault(format!("invalid priority string '{s}'")))?;
                if (1..=32).contains(&level) {
                    Ok(Self::Rt(level))
                } else {
                    Err(SupervisorError::OutOfRange(format!("rt priority '{s}' out of range 1..32")))
                }
            }
            other => Err(SupervisorError::Fault(format!("invalid priority string '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StdioSlot {
    Stdin,
    Stdout,
    Stderr,
}

/// Where a process's standard stream should be connected. Expressed as a
/// path rather than a raw file descriptor so the real implementation can
/// open it with `std::fs::File` and hand `Command` an owned `Stdio` — no
/// raw-fd ownership transfer needed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StdioTarget {
    Inherit,
    Null,
    File(PathBuf),
}

impl Default for StdioTarget {
    fn default() -> Self {
        Self::Inherit
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcRunState {
    Stopped,
    Running(i32),
}

/// What to create a process handle from: its exec path plus the config
/// read by the runtime-area builder and policy programmer.
#[derive(Debug, Clone)]
pub struct ProcDescriptor {
    pub name: ProcName,
    pub exec_path: PathBuf,
    pub args: Vec<String>,
    pub priority: Priority,
    pub fault_action: FaultAction,
    pub watchdog_action: WatchdogAction,
    /// Configured stdin/stdout/stderr targets, indexed by `StdioSlot`.
    /// `deleteProc` resets a configured process's ad-hoc `set_stdio`
    /// overrides back to these (`app.c`'s `app_DeleteProc` resetting all
    /// three redirections to `-1`).
    pub stdio: [StdioTarget; 3],
}

/// Resolves the supervisor-facing fault action for a process exit, given
/// whether the Supervisor itself initiated the stop (`was_stopping`, set by
/// `ProcessHandle::mark_stopping`) and the process's configured fault
/// action. A deliberate stop or a clean exit is always `None` regardless of
/// configuration — only an *unexpected* abnormal exit consults the
/// configured policy.
pub fn resolve_fault_action(was_stopping: bool, exit_status: ExitStatus, configured: FaultAction) -> FaultAction {
    if was_stopping || exit_status.success() {
        FaultAction::None
    } else {
        configured
    }
}

pub trait ProcessHandle: Send {
    fn name(&self) -> &ProcName;
    fn state(&self) -> ProcRunState;
    fn pid(&self) -> Option<i32> {
        match self.state() {
            ProcRunState::Running(pid) => Some(pid),
            ProcRunState::Stopped => None,
        }
    }

    /// Starts (or restarts) the process. Reuses the same descriptor each
    /// time, matching `proc_Start`'s restart semantics.
    fn start(&mut self) -> Result<(), SupervisorError>;

    /// Marks the process as about to be stopped by the Supervisor, so the
    /// next `sig_child_handler` call treats the exit as deliberate.
    fn mark_stopping(&mut self);

    fn set_exec_path(&mut self, path: PathBuf);
    fn set_priority(&mut self, priority: Priority);

    /// `None` means "override with empty args" (spec.md section 4.5, C6).
    fn add_args(&mut self, args: Option<Vec<String>>);
    fn clear_args(&mut self);
    fn set_stdio(&mut self, slot: StdioSlot, target: StdioTarget);
    fn set_fault_action(&mut self, action: FaultAction);
    fn fault_action(&self) -> FaultAction;
    fn watchdog_action(&self) -> WatchdogAction;

    /// Called by the app lifecycle engine when a SIGCHLD is attributed to
    /// this process. Returns the fault action the engine should act on.
    fn sig_child_handler(&mut self, exit_status: ExitStatus) -> FaultAction;

    /// Non-blocking reap: `Some(status)` once this process has actually
    /// exited, `None` while it's still running or already reaped. The
    /// daemon's SIGCHLD loop calls this on every running handle to learn
    /// which pid to feed into `sig_child_handler`, instead of
    /// reconstructing an `ExitStatus` by hand from a raw `waitpid` status.
    fn try_reap(&mut self) -> Result<Option<ExitStatus>, SupervisorError>;
}

pub trait ProcessExecutor: Send + Sync {
    type Handle: ProcessHandle;

    fn create(&self, desc: ProcDescriptor) -> Self::Handle;
}

/// A real process executor backed by `std::process::Command`. `start`
/// spawns a child and stores its pid; the Supervisor learns of its exit
/// asynchronously via SIGCHLD/`waitpid`, fed back in through
/// `sig_child_handler`. Priority is recorded but not enforced on the child
/// — doing so needs `Command::pre_exec`, which this workspace's
/// `unsafe_code = "forbid"` lint rules out.
pub struct LinuxProcessHandle {
    name: ProcName,
    exec_path: PathBuf,
    args: Vec<String>,
    priority: Priority,
    fault_action: FaultAction,
    watchdog_action: WatchdogAction,
    stdio: [StdioTarget; 3],
    child: Option<std::process::Child>,
    stopping: bool,
}

impl LinuxProcessHandle {
    fn open_stdio(target: &StdioTarget, slot: StdioSlot) -> Result<Stdio, SupervisorError> {
        Ok(match target {
            StdioTarget::Inherit => Stdio::inherit(),
            StdioTarget::Null => Stdio::null(),
            StdioTarget::File(path) => {
                let file = match slot {
                    StdioSlot::Stdin => std::fs::File::open(path)?,
                    StdioSlot::Stdout | StdioSlot::Stderr => {
                        std::fs::OpenOptions::new().create(true).append(true).open(path)?
                    }
                };
                Stdio::from(file)
            }
        })
    }
}

impl ProcessHandle for LinuxProcessHandle {
    fn name(&self) -> &ProcName {
        &self.name
    }

    fn state(&self) -> ProcRunState {
        match &self.child {
            Some(c) => ProcRunState::Running(c.id() as i32),
            None => ProcRunState::Stopped,
        }
    }

    fn start(&mut self) -> Result<(), SupervisorError> {
        let mut cmd = std::process::Command::new(&self.exec_path);
        cmd.args(&self.args);
        cmd.stdin(Self::open_stdio(&self.stdio[0], StdioSlot::Stdin)?);
        cmd.stdout(Self::open_stdio(&self.stdio[1], StdioSlot::Stdout)?);
        cmd.stderr(Self::open_stdio(&self.stdio[2], StdioSlot::Stderr)?);
        self.stopping = false;
        self.child = Some(cmd.spawn()?);
        Ok(())
    }

    fn mark_stopping(&mut self) {
        self.stopping = true;
    }

    fn set_exec_path(&mut self, path: PathBuf) {
        self.exec_path = path;
    }

    fn set_priority(&mut self, priority: Priority) {
        self.priority = priority;
    }

    fn add_args(&mut self, args: Option<Vec<String>>) {
        match args {
            Some(a) => self.args = a,
            None => self.args.clear(),
        }
    }

    fn clear_args(&mut self) {
        self.args.clear();
    }

    fn set_stdio(&mut self, slot: StdioSlot, target: StdioTarget) {
        let idx = match slot {
            StdioSlot::Stdin => 0,
            StdioSlot::Stdout => 1,
            StdioSlot::Stderr => 2,
        };
        self.stdio[idx] = target;
    }

    fn set_fault_action(&mut self, action: FaultAction) {
        self.fault_action = action;
    }

    fn fault_action(&self) -> FaultAction {
        self.fault_action
    }

    fn watchdog_action(&self) -> WatchdogAction {
        self.watchdog_action
    }

    fn sig_child_handler(&mut self, exit_status: ExitStatus) -> FaultAction {
        let was_stopping = self.stopping;
        self.stopping = false;
        self.child = None;
        resolve_fault_action(was_stopping, exit_status, self.fault_action)
    }

    fn try_reap(&mut self) -> Result<Option<ExitStatus>, SupervisorError> {
        let Some(child) = self.child.as_mut() else {
            return Ok(None);
        };
        match child.try_wait()? {
            Some(status) => Ok(Some(status)),
            None => Ok(None),
        }
    }
}

pub struct LinuxProcessExecutor;

impl ProcessExecutor for LinuxProcessExecutor {
    type Handle = LinuxProcessHandle;

    fn create(&self, desc: ProcDescriptor) -> LinuxProcessHandle {
        LinuxProcessHandle {
            name: desc.name,
            exec_path: desc.exec_path,
            args: desc.args,
            priority: desc.priority,
            fault_action: desc.fault_action,
            watchdog_action: desc.watchdog_action,
            stdio: desc.stdio,
            child: None,
            stopping: false,
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub mod fake {
    use super::*;
    use std::sync::atomic::{AtomicI32, Ordering};

    static NEXT_PID: AtomicI32 = AtomicI32::new(1000);

    pub struct FakeProcessHandle {
        name: ProcName,
        exec_path: PathBuf,
        args: Vec<String>,
        priority: Priority,
        fault_action: FaultAction,
        watchdog_action: WatchdogAction,
        stdio: [StdioTarget; 3],
        pid: Option<i32>,
        stopping: bool,
        /// Incremented every time `start` is called; tests assert on this
        /// to observe watchdog/SIGCHLD-triggered restarts.
        pub start_count: u32,
        /// When set, the next call to `start` fails instead of assigning a
        /// pid, for exercising a mid-sequence start failure.
        fail_next_start: bool,
    }

    impl FakeProcessHandle {
        pub fn exec_path(&self) -> &PathBuf {
            &self.exec_path
        }

        pub fn args(&self) -> &[String] {
            &self.args
        }

        pub fn priority(&self) -> Priority {
            self.priority
        }

        pub fn stdio(&self, slot: StdioSlot) -> &StdioTarget {
            let idx = match slot {
                StdioSlot::Stdin => 0,
                StdioSlot::Stdout => 1,
                StdioSlot::Stderr => 2,
            };
            &self.stdio[idx]
        }

        pub fn fail_next_start(&mut self) {
            self.fail_next_start = true;
        }
    }

    impl ProcessHandle for FakeProcessHandle {
        fn name(&self) -> &ProcName {
            &self.name
        }

        fn state(&self) -> ProcRunState {
            match self.pid {
                Some(pid) => ProcRunState::Running(pid),
                None => ProcRunState::Stopped,
            }
        }

        fn start(&mut self) -> Result<(), SupervisorError> {
            if self.fail_next_start {
                self.fail_next_start = false;
                return Err(SupervisorError::Fault(format!("process '{}' failed to start", self.name)));
            }
            self.stopping = false;
            self.pid = Some(NEXT_PID.fetch_add(1, Ordering::SeqCst));
            self.start_count += 1;
            Ok(())
        }

        fn mark_stopping(&mut self) {
            self.stopping = true;
        }

        fn set_exec_path(&mut self, path: PathBuf) {
            self.exec_path = path;
        }

        fn set_priority(&mut self, priority: Priority) {
            self.priority = priority;
        }

        fn add_args(&mut self, args: Option<Vec<String>>) {
            match args {
                Some(a) => self.args = a,
                None => self.args.clear(),
            }
        }

        fn clear_args(&mut self) {
            self.args.clear();
        }

        fn set_stdio(&mut self, slot: StdioSlot, target: StdioTarget) {
            let idx = match slot {
                StdioSlot::Stdin => 0,
                StdioSlot::Stdout => 1,
                StdioSlot::Stderr => 2,
            };
            self.stdio[idx] = target;
        }

        fn set_fault_action(&mut self, action: FaultAction) {
            self.fault_action = action;
        }

        fn fault_action(&self) -> FaultAction {
            self.fault_action
        }

        fn watchdog_action(&self) -> WatchdogAction {
            self.watchdog_action
        }

        fn sig_child_handler(&mut self, exit_status: ExitStatus) -> FaultAction {
            let was_stopping = self.stopping;
            self.stopping = false;
            self.pid = None;
            resolve_fault_action(was_stopping, exit_status, self.fault_action)
        }

        /// The fake has no real child to poll; tests drive exits directly
        /// through `sig_child_handler` instead.
        fn try_reap(&mut self) -> Result<Option<ExitStatus>, SupervisorError> {
            Ok(None)
        }
    }

    pub struct FakeProcessExecutor;

    impl ProcessExecutor for FakeProcessExecutor {
        type Handle = FakeProcessHandle;

        fn create(&self, desc: ProcDescriptor) -> FakeProcessHandle {
            FakeProcessHandle {
                name: desc.name,
                exec_path: desc.exec_path,
                args: desc.args,
                priority: desc.priority,
                fault_action: desc.fault_action,
                watchdog_action: desc.watchdog_action,
                stdio: desc.stdio,
                pid: None,
                stopping: false,
                start_count: 0,
                fail_next_start: false,
            }
        }
    }

    /// Builds a successful `ExitStatus` for tests, since `ExitStatus` has
    /// no public constructor on stable Rust.
    pub fn exit_success() -> ExitStatus {
        std::process::Command::new("true").status().expect("spawn `true`")
    }

    pub fn exit_failure() -> ExitStatus {
        std::process::Command::new("false").status().expect("spawn `false`")
    }
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
