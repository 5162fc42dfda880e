// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The app lifecycle engine (spec.md section 4.5, C5 and C6): the
//! start/stop state machine, kill escalation, SIGCHLD dispatch, watchdog
//! dispatch, and the ad-hoc process API. Grounded in `app.c`'s
//! `app_Start`/`app_Stop`/`KillAppProcs`/`app_SigChildHandler`/
//! `app_WatchdogTimedOut` and the `app_Create*Proc`/`app_*Proc*` family.
//!
//! `Supervisor` holds borrowed references to its collaborators the same
//! way `av_sandbox::IdentityAndPolicy`/`RuntimeAreaBuilder` do — it is
//! stateless itself; all mutable state lives on the `App` passed into
//! each call.

use crate::container::{self, App, InternalStopHandler, ProcContainer};
use av_adapters::{
    CgroupService, FreezeState, KillHelper, Priority, ProcDescriptor, ProcessExecutor, ProcessHandle, ProcRunState,
    ResourceLimiter, StdioSlot, StdioTarget, TimerService,
};
use av_core::{AppState, FaultAction, KillType, ProcName, SupervisorError, WatchdogAction};
use nix::sys::signal::Signal;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;

/// The kill timer always escalates soft to hard after exactly one second
/// (spec.md section 5) — not configurable.
const KILL_TIMER_DURATION: Duration = Duration::from_secs(1);

/// Upper bound on how many times `kill_app_procs` polls the freezer state
/// before giving up. The freeze/thaw cycle is normally a handful of
/// scheduler ticks; a cgroup stuck mid-freeze past this is treated as a
/// fault rather than looped on forever.
const FREEZE_POLL_MAX_ITERS: u32 = 10_000;
const FREEZE_POLL_INTERVAL: Duration = Duration::from_micros(100);

pub struct Supervisor<'a, H: ProcessHandle> {
    cgroup: &'a dyn CgroupService,
    timers: &'a dyn TimerService,
    kill_helper: &'a dyn KillHelper,
    executor: &'a dyn ProcessExecutor<Handle = H>,
    resource_limiter: &'a dyn ResourceLimiter,
}

impl<'a, H: ProcessHandle> Supervisor<'a, H> {
    pub fn new(
        cgroup: &'a dyn CgroupService,
        timers: &'a dyn TimerService,
        kill_helper: &'a dyn KillHelper,
        executor: &'a dyn ProcessExecutor<Handle = H>,
        resource_limiter: &'a dyn ResourceLimiter,
    ) -> Self {
        Self { cgroup, timers, kill_helper, executor, resource_limiter }
    }

    // -- C5: state machine -------------------------------------------

    /// `STOPPED -> RUNNING`: starts every configured process in
    /// declaration order. If the k-th fails, processes `0..k-1` are
    /// stopped via a normal `stop()` before returning the failure
    /// (spec.md section 5's ordering guarantee). `RUNNING -> RUNNING`
    /// is rejected.
    pub fn start(&self, app: &mut App<H>) -> Result<(), SupervisorError> {
        if app.state == AppState::Running {
            return Err(SupervisorError::NotPossible(format!("app '{}' is already running", app.name)));
        }

        self.resource_limiter.set_limits(app.name.as_str(), app.resource_limits)?;

        for i in 0..app.procs.len() {
            if let Err(e) = app.procs[i].handle_mut().start() {
                tracing::error!(app = %app.name, proc = %app.procs[i].name(), error = %e, "process failed to start");
                app.state = AppState::Running;
                let _ = self.stop(app);
                return Err(e);
            }
        }

        app.state = AppState::Running;
        Ok(())
    }

    /// `RUNNING -> RUNNING` or `STOPPED`: soft-kills every process in the
    /// app. Transitions straight to `STOPPED` if the freeze group was
    /// already empty, else arms the kill timer. A no-op, logged, when the
    /// app is already stopped (spec.md section 5's state table).
    pub fn stop(&self, app: &mut App<H>) -> Result<(), SupervisorError> {
        if app.state != AppState::Running {
            tracing::info!(app = %app.name, "stop() called on an app that is not running, ignoring");
            return Ok(());
        }

        match self.kill_app_procs(app, KillType::Soft) {
            Ok(()) | Err(SupervisorError::NotFound(_)) => {}
            Err(e) => return Err(e),
        }

        self.settle_after_kill(app);
        Ok(())
    }

    /// `RUNNING` + killTimer expiry `-> RUNNING`: hard-kills every
    /// process still running. Called by the event loop once
    /// `TimerService::is_expired` reports true for the app's key.
    pub fn on_kill_timer_expiry(&self, app: &mut App<H>) -> Result<(), SupervisorError> {
        if !app.kill_timer_armed {
            return Ok(());
        }
        if !self.timers.is_expired(app.name.as_str()) {
            return Ok(());
        }

        self.timers.disarm(app.name.as_str());
        app.kill_timer_armed = false;

        match self.kill_app_procs(app, KillType::Hard) {
            Ok(()) | Err(SupervisorError::NotFound(_)) => {}
            Err(e) => return Err(e),
        }

        if self.cgroup.is_empty(app.name.as_str()) {
            app.state = AppState::Stopped;
        }
        Ok(())
    }

    fn settle_after_kill(&self, app: &mut App<H>) {
        if self.cgroup.is_empty(app.name.as_str()) {
            app.state = AppState::Stopped;
            app.kill_timer_armed = false;
            self.timers.disarm(app.name.as_str());
        } else {
            app.kill_timer_armed = true;
            self.timers.arm(app.name.as_str(), KILL_TIMER_DURATION);
        }
    }

    /// Freeze-signal-thaw escalation (spec.md section 4.5's
    /// `killAppProcs`): freeze the app's cgroup, wait for it to actually
    /// freeze, mark every still-running container as stopping and clear
    /// its internal stop handler, broadcast the signal, thaw, and report
    /// how many processes were signalled. `NotFound` when the freeze
    /// group was already empty.
    pub fn kill_app_procs(&self, app: &mut App<H>, kill_type: KillType) -> Result<(), SupervisorError> {
        self.cgroup.freeze(app.name.as_str())?;
        self.wait_for_frozen(app.name.as_str())?;

        for c in app.procs.iter_mut().chain(app.aux_procs.iter_mut()) {
            if !matches!(c.handle().state(), ProcRunState::Stopped) {
                c.clear_stop_handler();
                c.handle_mut().mark_stopping();
            }
        }

        let signal = match kill_type {
            KillType::Soft => Signal::SIGTERM,
            KillType::Hard => Signal::SIGKILL,
        };
        let signalled = self.cgroup.send_sig(app.name.as_str(), signal)?;
        self.cgroup.thaw(app.name.as_str())?;

        if signalled == 0 {
            return Err(SupervisorError::NotFound(format!("app '{}' freeze group is already empty", app.name)));
        }
        Ok(())
    }

    fn wait_for_frozen(&self, app_name: &str) -> Result<(), SupervisorError> {
        for _ in 0..FREEZE_POLL_MAX_ITERS {
            match self.cgroup.get_state(app_name)? {
                FreezeState::Frozen => return Ok(()),
                FreezeState::Freezing | FreezeState::Thawed => {
                    std::thread::sleep(FREEZE_POLL_INTERVAL);
                }
            }
        }
        Err(SupervisorError::Fault(format!("app '{app_name}' cgroup never reported FROZEN")))
    }

    // -- C5: SIGCHLD --------------------------------------------------

    /// Dispatches a SIGCHLD to whichever container owns `pid` (spec.md
    /// section 4.5's SIGCHLD handling). Returns the resolved fault
    /// action: `None`/`Ignore`/`RestartProc` are handled internally before
    /// returning; `RestartApp`/`StopApp`/`Reboot` are surfaced unchanged
    /// for the caller to act on, since restarting or rebooting the whole
    /// app is outside this component. An unknown pid is reported as
    /// `Ignore` — nothing in this app owns that process.
    pub fn sig_child_handler(
        &self,
        app: &mut App<H>,
        pid: i32,
        exit_status: ExitStatus,
    ) -> Result<FaultAction, SupervisorError> {
        let Some(c) = container::find_proc_container(&mut app.procs, &mut app.aux_procs, pid) else {
            return Ok(FaultAction::Ignore);
        };

        c.invoke_extern_stop_handler(exit_status);
        let action = c.handle_mut().sig_child_handler(exit_status);

        let mut escalate = false;
        match action {
            FaultAction::None => {
                if c.has_stop_handler() {
                    if let Err(e) = c.invoke_stop_handler() {
                        tracing::error!(app = %app.name, proc = %c.name(), error = %e, "internal stop handler failed");
                        escalate = true;
                    }
                }
            }
            FaultAction::Ignore => {
                tracing::warn!(app = %app.name, proc = %c.name(), "process exited, fault action is ignore");
            }
            FaultAction::RestartProc => {
                if let Err(e) = c.handle_mut().start() {
                    tracing::error!(app = %app.name, proc = %c.name(), error = %e, "restart failed, stopping app");
                    escalate = true;
                }
            }
            FaultAction::RestartApp | FaultAction::StopApp | FaultAction::Reboot => {}
        }

        if escalate {
            self.stop(app)?;
            return Ok(FaultAction::StopApp);
        }

        if self.cgroup.is_empty(app.name.as_str()) {
            self.timers.disarm(app.name.as_str());
            app.kill_timer_armed = false;
            app.state = AppState::Stopped;
        }

        Ok(action)
    }

    // -- C5: watchdog ---------------------------------------------------

    /// Dispatches a watchdog timeout for `pid` (spec.md section 4.5's
    /// watchdog handling). `proc_action` is the process's own configured
    /// watchdog action; `app_action` is the app-level fallback consulted
    /// when the process-level action is `NotFound`/`Error`. An unresolved
    /// action after fallback defaults to restart — the Supervisor never
    /// lets a policy-read failure crash the app (spec.md section 7).
    /// `RestartApp`/`StopApp`/`Reboot` are surfaced unchanged for the
    /// caller to escalate.
    pub fn watchdog_handler(
        &self,
        app: &mut App<H>,
        pid: i32,
        proc_action: WatchdogAction,
        app_action: WatchdogAction,
    ) -> Result<WatchdogAction, SupervisorError> {
        let resolved = match proc_action {
            WatchdogAction::NotFound | WatchdogAction::Error => app_action,
            other => other,
        };

        let Some(c) = container::find_proc_container(&mut app.procs, &mut app.aux_procs, pid) else {
            return Err(SupervisorError::NotFound(format!("no process container for pid {pid}")));
        };

        match resolved {
            WatchdogAction::NotFound | WatchdogAction::Error => {
                tracing::error!(app = %app.name, pid, "watchdog action unresolved, defaulting to restart");
                c.set_stop_handler(InternalStopHandler::RestartOnExit);
                c.handle_mut().mark_stopping();
                self.kill_helper.kill_soft(pid)?;
                Ok(WatchdogAction::Handled)
            }
            WatchdogAction::Ignore => {
                tracing::error!(app = %app.name, pid, "watchdog timeout ignored per configured policy");
                Ok(WatchdogAction::Handled)
            }
            WatchdogAction::Stop => {
                c.handle_mut().mark_stopping();
                self.kill_helper.kill_soft(pid)?;
                Ok(WatchdogAction::Handled)
            }
            WatchdogAction::Restart => {
                c.set_stop_handler(InternalStopHandler::RestartOnExit);
                c.handle_mut().mark_stopping();
                self.kill_helper.kill_soft(pid)?;
                Ok(WatchdogAction::Handled)
            }
            WatchdogAction::RestartApp | WatchdogAction::StopApp | WatchdogAction::Reboot => Ok(resolved),
            WatchdogAction::Handled => Ok(WatchdogAction::Handled),
        }
    }

    // -- C6: ad-hoc process API ----------------------------------------

    /// Creates or reconfigures a process by name (spec.md section 4.5,
    /// C6's `createProc`). If `name` matches a configured process, fails
    /// if it's currently running, otherwise optionally overrides its exec
    /// path. Otherwise `exec_path` is mandatory; a missing `name` is
    /// derived from the exec path's basename, and a brand new auxiliary
    /// container is appended to `aux_procs`.
    pub fn create_proc(
        &self,
        app: &mut App<H>,
        name: Option<&str>,
        exec_path: Option<PathBuf>,
    ) -> Result<(), SupervisorError> {
        if let Some(name) = name {
            if let Some(c) = container::get_proc_container(&mut app.procs, name) {
                if !matches!(c.handle().state(), ProcRunState::Stopped) {
                    return Err(SupervisorError::NotPossible(format!("process '{name}' is already running")));
                }
                if let Some(path) = exec_path {
                    c.handle_mut().set_exec_path(path);
                }
                return Ok(());
            }
        }

        let exec_path = exec_path
            .ok_or_else(|| SupervisorError::Fault("createProc: execPath is mandatory for a new process".into()))?;
        let proc_name = match name {
            Some(n) => ProcName::new(n),
            None => {
                let basename = exec_path.file_name().and_then(|s| s.to_str()).unwrap_or("proc");
                ProcName::new(basename)
            }
        };

        let desc = ProcDescriptor {
            name: proc_name,
            exec_path,
            args: Vec::new(),
            priority: Priority::Medium,
            fault_action: FaultAction::Ignore,
            watchdog_action: WatchdogAction::NotFound,
            stdio: [StdioTarget::Inherit, StdioTarget::Inherit, StdioTarget::Inherit],
        };
        self.resource_limiter.set_limits(app.name.as_str(), app.resource_limits)?;
        let handle = self.executor.create(desc.clone());
        app.aux_procs.push(ProcContainer::new(handle, desc));
        Ok(())
    }

    pub fn set_stdio(
        &self,
        app: &mut App<H>,
        name: &str,
        slot: StdioSlot,
        target: StdioTarget,
    ) -> Result<(), SupervisorError> {
        let c = self.find_by_name(app, name)?;
        c.handle_mut().set_stdio(slot, target);
        Ok(())
    }

    /// Parses `idle|low|medium|high|rt1..rt32` and applies it (spec.md
    /// section 4.5, C6's `setPriority`).
    pub fn set_priority(&self, app: &mut App<H>, name: &str, priority: &str) -> Result<(), SupervisorError> {
        let priority = Priority::parse(priority)?;
        let c = self.find_by_name(app, name)?;
        c.handle_mut().set_priority(priority);
        Ok(())
    }

    /// `None` overrides with empty args (spec.md section 4.5, C6).
    pub fn add_args(&self, app: &mut App<H>, name: &str, args: Option<Vec<String>>) -> Result<(), SupervisorError> {
        let c = self.find_by_name(app, name)?;
        c.handle_mut().add_args(args);
        Ok(())
    }

    pub fn clear_args(&self, app: &mut App<H>, name: &str) -> Result<(), SupervisorError> {
        let c = self.find_by_name(app, name)?;
        c.handle_mut().clear_args();
        Ok(())
    }

    pub fn set_fault_action(&self, app: &mut App<H>, name: &str, action: FaultAction) -> Result<(), SupervisorError> {
        let c = self.find_by_name(app, name)?;
        c.handle_mut().set_fault_action(action);
        Ok(())
    }

    pub fn set_stop_handler(
        &self,
        app: &mut App<H>,
        name: &str,
        handler: InternalStopHandler,
    ) -> Result<(), SupervisorError> {
        let c = self.find_by_name(app, name)?;
        c.set_stop_handler(handler);
        Ok(())
    }

    /// Starts the process if it's currently stopped; a no-op otherwise
    /// (spec.md section 4.5, C6's `startProc`).
    pub fn start_proc(&self, app: &mut App<H>, name: &str) -> Result<(), SupervisorError> {
        let c = self.find_by_name(app, name)?;
        if matches!(c.handle().state(), ProcRunState::Stopped) {
            c.handle_mut().start()?;
        }
        Ok(())
    }

    /// Stops and removes an ad-hoc process, or stops and resets overrides
    /// on a configured one (spec.md section 4.5, C6's `deleteProc`). A
    /// running process is soft- then hard-killed directly through the
    /// kill helper — there is no freeze cgroup to broadcast through for a
    /// single ad-hoc process, unlike `killAppProcs`.
    pub fn delete_proc(&self, app: &mut App<H>, name: &str) -> Result<(), SupervisorError> {
        let is_aux = app.aux_procs.iter().any(|c| c.name().as_str() == name);

        let pid = {
            let c = self.find_by_name(app, name)?;
            c.handle().pid()
        };

        if let Some(pid) = pid {
            if let Ok(c) = self.find_by_name(app, name) {
                c.handle_mut().mark_stopping();
            }
            self.kill_helper.kill_soft(pid)?;
            self.kill_helper.kill_hard(pid)?;
        }

        if is_aux {
            app.aux_procs.retain(|c| c.name().as_str() != name);
        } else if let Ok(c) = self.find_by_name(app, name) {
            c.clear_overrides();
        }
        Ok(())
    }

    /// Releases everything this component owns for `app` once it is being
    /// removed entirely: the resource-limit bookkeeping installed by
    /// `start`/`create_proc` (spec.md section 4.4's "on app deletion...
    /// resource limits are torn down via the resource-limit module";
    /// `app.c`'s `app_Delete` calling `resLim_CleanupApp`). The app must
    /// already be stopped; process containers and the runtime area
    /// themselves are released by dropping the `App` and by
    /// `RuntimeAreaBuilder::teardown`, not by this method.
    pub fn delete_app(&self, app: &App<H>) -> Result<(), SupervisorError> {
        self.resource_limiter.teardown(app.name.as_str())
    }

    fn find_by_name<'b>(&self, app: &'b mut App<H>, name: &str) -> Result<&'b mut ProcContainer<H>, SupervisorError> {
        container::container_by_name(&mut app.procs, &mut app.aux_procs, name)
            .ok_or_else(|| SupervisorError::NotFound(format!("no process container named '{name}'")))
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
