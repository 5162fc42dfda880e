// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The daemon's event loop: the "event loop" collaborator spec.md section 1
//! names only by capability, implemented here as a `tokio::select!` loop in
//! the shape of `listener/mod.rs`'s `run_dual` — one branch per OS event
//! source feeding `av-engine::Supervisor`, which stays synchronous and
//! `&mut`-oriented (spec.md section 5: single supervisor-thread-only
//! access).
//!
//! Two OS-level event sources are wired up here, matching spec.md section
//! 4.5 exactly: SIGCHLD delivery (via `ProcessHandle::try_reap`, avoiding
//! any raw `waitpid`/`ExitStatus` reconstruction) and kill-timer expiry
//! polling. Watchdog timeouts are dispatched through `Daemon::watchdog_timeout`
//! but this core doesn't invent the out-of-scope mechanism that decides
//! when one fires (spec.md section 1 names the event loop and the watchdog
//! kick channel as external collaborators) — that hook exists for whatever
//! future caller owns it.

use av_adapters::{CgroupService, KillHelper, ProcessExecutor, ProcessHandle, ResourceLimiter, TimerService};
use av_core::{AppName, FaultAction, SupervisorError, WatchdogAction};
use av_engine::{App, Supervisor};
use std::collections::HashMap;
use std::time::Duration;
use tokio::signal::unix::{signal, SignalKind};
use tokio::time::interval;
use tokio_util::sync::CancellationToken;

use crate::{critical, emerg};

/// Upper bound on how long graceful shutdown waits for every app's kill
/// timer to escalate and settle before giving up and exiting anyway.
const SHUTDOWN_MAX_WAIT: Duration = Duration::from_secs(5);
const SHUTDOWN_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Owns every app's runtime state plus the Linux collaborators the
/// Supervisor borrows for the duration of a call. One process, one
/// `Daemon`: there is exactly one freezer cgroup tree and one passwd/group
/// pair to program against.
pub struct Daemon<C, T, K, E, R>
where
    C: CgroupService,
    T: TimerService,
    K: KillHelper,
    E: ProcessExecutor,
    R: ResourceLimiter,
{
    cgroup: C,
    timers: T,
    kill_helper: K,
    executor: E,
    resource_limiter: R,
    apps: Vec<App<E::Handle>>,
    /// `<app>/watchdogAction` fallback (spec.md section 6), keyed by app
    /// name. Consulted by whatever external collaborator owns the
    /// watchdog-kick channel when it calls `watchdog_timeout`.
    app_watchdog_actions: HashMap<AppName, WatchdogAction>,
}

impl<C, T, K, E, R> Daemon<C, T, K, E, R>
where
    C: CgroupService,
    T: TimerService,
    K: KillHelper,
    E: ProcessExecutor,
    R: ResourceLimiter,
{
    pub fn new(
        cgroup: C,
        timers: T,
        kill_helper: K,
        executor: E,
        resource_limiter: R,
        apps: Vec<App<E::Handle>>,
        app_watchdog_actions: HashMap<AppName, WatchdogAction>,
    ) -> Self {
        Self { cgroup, timers, kill_helper, executor, resource_limiter, apps, app_watchdog_actions }
    }

    /// The app-level watchdog action fallback, or `NotFound` if `app_name`
    /// wasn't configured with one.
    pub fn app_watchdog_action(&self, app_name: &str) -> WatchdogAction {
        self.app_watchdog_actions.get(&AppName::new(app_name)).copied().unwrap_or(WatchdogAction::NotFound)
    }

    /// Starts every app in declaration order, logging (not propagating) a
    /// single app's start failure so one misconfigured app doesn't keep
    /// the rest from coming up.
    pub fn start_all(&mut self) {
        for app in self.apps.iter_mut() {
            let sup = Supervisor::new(&self.cgroup, &self.timers, &self.kill_helper, &self.executor, &self.resource_limiter);
            if let Err(e) = sup.start(app) {
                critical!(app = %app.name, error = %e, "app failed to start");
            }
        }
    }

    /// Reaps every process across every app that has actually exited
    /// since the last poll, and dispatches each through
    /// `Supervisor::sig_child_handler`. Run on SIGCHLD.
    fn reap_exited(&mut self) {
        for app in self.apps.iter_mut() {
            let sup = Supervisor::new(&self.cgroup, &self.timers, &self.kill_helper, &self.executor, &self.resource_limiter);

            let mut exited = Vec::new();
            for c in app.procs.iter_mut().chain(app.aux_procs.iter_mut()) {
                let Some(pid) = c.handle().pid() else { continue };
                match c.handle_mut().try_reap() {
                    Ok(Some(status)) => exited.push((pid, status)),
                    Ok(None) => {}
                    Err(e) => tracing::error!(app = %app.name, pid, error = %e, "try_reap failed"),
                }
            }

            for (pid, status) in exited {
                match sup.sig_child_handler(app, pid, status) {
                    Ok(FaultAction::RestartApp) => {
                        tracing::warn!(app = %app.name, "fault action restartApp");
                        let _ = sup.stop(app);
                        let _ = sup.start(app);
                    }
                    Ok(FaultAction::StopApp) => {
                        tracing::warn!(app = %app.name, "fault action stopApp");
                        let _ = sup.stop(app);
                    }
                    Ok(FaultAction::Reboot) => {
                        emerg!(app = %app.name, pid, "fault action reboot; stopping every app instead of rebooting the host");
                        let _ = sup.stop(app);
                    }
                    Ok(_) => {}
                    Err(e) => tracing::error!(app = %app.name, pid, error = %e, "sig_child_handler failed"),
                }
            }
        }
    }

    /// Polls every app with an armed kill timer for expiry, escalating
    /// soft kills to hard ones. Run on the kill-timer poll interval.
    fn poll_kill_timers(&mut self) {
        for app in self.apps.iter_mut() {
            if !app.kill_timer_armed() {
                continue;
            }
            let sup = Supervisor::new(&self.cgroup, &self.timers, &self.kill_helper, &self.executor, &self.resource_limiter);
            if let Err(e) = sup.on_kill_timer_expiry(app) {
                tracing::error!(app = %app.name, error = %e, "kill timer escalation failed");
            }
        }
    }

    /// Dispatches a watchdog timeout for `app_name`/`pid` (spec.md section
    /// 4.5's watchdog handling). The mechanism that decides a watchdog has
    /// timed out is an external collaborator (spec.md section 1); this is
    /// the hook it calls into.
    pub fn watchdog_timeout(
        &mut self,
        app_name: &str,
        pid: i32,
        proc_action: WatchdogAction,
    ) -> Result<WatchdogAction, SupervisorError> {
        let app_action = self.app_watchdog_action(app_name);
        let app = self
            .apps
            .iter_mut()
            .find(|a| a.name == AppName::new(app_name))
            .ok_or_else(|| SupervisorError::NotFound(format!("no such app '{app_name}'")))?;
        let sup = Supervisor::new(&self.cgroup, &self.timers, &self.kill_helper, &self.executor, &self.resource_limiter);
        sup.watchdog_handler(app, pid, proc_action, app_action)
    }

    fn stop_all(&mut self) {
        for app in self.apps.iter_mut() {
            let sup = Supervisor::new(&self.cgroup, &self.timers, &self.kill_helper, &self.executor, &self.resource_limiter);
            let _ = sup.stop(app);
        }
    }

    fn all_stopped(&self) -> bool {
        self.apps.iter().all(|a| a.state() == av_core::AppState::Stopped)
    }

    /// Soft-stops every app, then keeps polling kill-timer expiry until
    /// every app settles to `Stopped` or `SHUTDOWN_MAX_WAIT` elapses,
    /// whichever comes first.
    async fn shutdown(&mut self) {
        self.stop_all();
        let deadline = tokio::time::Instant::now() + SHUTDOWN_MAX_WAIT;
        while tokio::time::Instant::now() < deadline && !self.all_stopped() {
            self.poll_kill_timers();
            tokio::time::sleep(SHUTDOWN_POLL_INTERVAL).await;
        }
        if !self.all_stopped() {
            tracing::warn!("shutdown deadline reached with processes still running");
        }
    }

    /// Runs the event loop until SIGTERM, SIGINT, or `cancel` fires.
    pub async fn run(mut self, kill_timer_poll_interval: Duration, cancel: CancellationToken) {
        self.start_all();

        let mut sigchld = match signal(SignalKind::child()) {
            Ok(s) => s,
            Err(e) => {
                critical!(error = %e, "failed to install SIGCHLD handler");
                return;
            }
        };
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(s) => s,
            Err(e) => {
                critical!(error = %e, "failed to install SIGTERM handler");
                return;
            }
        };
        let mut ticker = interval(kill_timer_poll_interval);

        loop {
            tokio::select! {
                _ = sigchld.recv() => {
                    self.reap_exited();
                }
                _ = ticker.tick() => {
                    self.poll_kill_timers();
                }
                _ = sigterm.recv() => {
                    tracing::info!("received SIGTERM, shutting down");
                    break;
                }
                _ = cancel.cancelled() => {
                    tracing::info!("shutdown requested, shutting down");
                    break;
                }
            }
        }

        self.shutdown().await;
    }
}

#[cfg(test)]
#[path = "runtime_tests.rs"]
mod tests;
