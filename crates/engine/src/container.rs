// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The process container and the app it belongs to (spec.md section 4.2,
//! C2): grounded in `app.c`'s `ProcContainer_t`/`App_t` and
//! `CreateProcContainer`/`GetProcContainer`/`FindProcContainer`. A
//! container is just an owned `Vec` entry here — no pool, no intrusive
//! list, since a `Vec<ProcContainer<H>>` already owns and frees its
//! entries (teacher precedent: `oj-core`'s `Crew`/`Job` collections are
//! plain owned `Vec`s/`HashMap`s, not object pools).

use av_adapters::{ProcDescriptor, ProcessHandle, ProcRunState, ResourceLimits, StdioSlot};
use av_core::{AppName, AppState, Gid, ProcName, ProcState, SupervisorError, Uid};
use std::path::PathBuf;
use std::process::ExitStatus;
use std::sync::Arc;

/// Stands in for `app.c`'s internal `stopHandlerFunc` — a C function
/// pointer naming one of a small, fixed set of internal recovery actions.
/// Rust closures can't be compared or stored as plainly as a C fn pointer,
/// and the container only ever needs one concrete behavior (restart the
/// process once its exit has been handled, installed by watchdog handling
/// and by SIGCHLD's own `NONE` branch), so this is an enum rather than a
/// boxed closure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InternalStopHandler {
    /// Restart the process handle once the current exit is handled
    /// (spec.md section 4.5: watchdog's unresolved-action fallback, and
    /// SIGCHLD's `NONE` branch when a stop handler was attached).
    RestartOnExit,
}

impl InternalStopHandler {
    fn invoke<H: ProcessHandle>(self, handle: &mut H) -> Result<(), SupervisorError> {
        match self {
            Self::RestartOnExit => handle.start(),
        }
    }
}

/// One process, configured or ad-hoc, tracked by its owning app (spec.md
/// section 3's `ProcContainer_t`). The C struct's `void *stopHandlerCtx`
/// is dropped: a Rust closure already owns whatever context it captured,
/// so `extern_stop_handler` needs no separate context pointer.
pub struct ProcContainer<H> {
    handle: H,
    /// The descriptor the container was created from. Kept only so
    /// `deleteProc` can reset a configured process's ad-hoc overrides
    /// back to what the config declared (spec.md section 4.5, C6).
    original: ProcDescriptor,
    stop_handler: Option<InternalStopHandler>,
    extern_stop_handler: Option<Arc<dyn Fn(ExitStatus) + Send + Sync>>,
}

impl<H: ProcessHandle> ProcContainer<H> {
    pub fn new(handle: H, original: ProcDescriptor) -> Self {
        Self { handle, original, stop_handler: None, extern_stop_handler: None }
    }

    pub fn handle(&self) -> &H {
        &self.handle
    }

    pub fn handle_mut(&mut self) -> &mut H {
        &mut self.handle
    }

    pub fn name(&self) -> &ProcName {
        self.handle.name()
    }

    pub fn has_stop_handler(&self) -> bool {
        self.stop_handler.is_some()
    }

    pub fn set_stop_handler(&mut self, handler: InternalStopHandler) {
        self.stop_handler = Some(handler);
    }

    pub fn clear_stop_handler(&mut self) {
        self.stop_handler = None;
    }

    pub fn set_extern_stop_handler(&mut self, handler: Arc<dyn Fn(ExitStatus) + Send + Sync>) {
        self.extern_stop_handler = Some(handler);
    }

    pub fn clear_extern_stop_handler(&mut self) {
        self.extern_stop_handler = None;
    }

    pub(crate) fn invoke_extern_stop_handler(&self, exit_status: ExitStatus) {
        if let Some(f) = &self.extern_stop_handler {
            f(exit_status);
        }
    }

    /// Takes and invokes the internal stop handler, if one is attached.
    /// A no-op success when none is attached, matching `app.c`'s "call it
    /// if non-null".
    pub(crate) fn invoke_stop_handler(&mut self) -> Result<(), SupervisorError> {
        match self.stop_handler.take() {
            Some(handler) => handler.invoke(&mut self.handle),
            None => Ok(()),
        }
    }

    /// Resets every ad-hoc override back to the process's configured
    /// descriptor (spec.md section 4.5, C6's `deleteProc` on a configured
    /// process: "clear overrides only"), matching `app.c`'s
    /// `app_DeleteProc` resetting the 3 stdio redirections and clearing the
    /// extern stop handler/context alongside exec path/priority/args/fault
    /// action.
    pub(crate) fn clear_overrides(&mut self) {
        let desc = self.original.clone();
        self.handle.set_exec_path(desc.exec_path);
        self.handle.set_priority(desc.priority);
        self.handle.add_args(Some(desc.args));
        self.handle.set_fault_action(desc.fault_action);
        self.handle.set_stdio(StdioSlot::Stdin, desc.stdio[0].clone());
        self.handle.set_stdio(StdioSlot::Stdout, desc.stdio[1].clone());
        self.handle.set_stdio(StdioSlot::Stderr, desc.stdio[2].clone());
        self.clear_extern_stop_handler();
    }
}

/// The app an installed bundle of process containers belongs to (spec.md
/// section 3's `App_t`, trimmed of fields `av-sandbox` already owns — the
/// caller is expected to run `RuntimeAreaBuilder`/`IdentityAndPolicy`
/// before handing a populated `App` to `Supervisor`).
pub struct App<H> {
    pub name: AppName,
    pub sandboxed: bool,
    pub install_dir: PathBuf,
    pub working_dir: PathBuf,
    pub uid: Uid,
    pub gid: Gid,
    pub supplement_gids: Vec<Gid>,
    /// Config-declared rlimits for this app, installed via the
    /// resource-limit module on start (spec.md section 1; `app.c`'s
    /// `resLim_SetAppLimits`/`resLim_CleanupApp`).
    pub resource_limits: ResourceLimits,
    pub(crate) state: AppState,
    pub procs: Vec<ProcContainer<H>>,
    pub aux_procs: Vec<ProcContainer<H>>,
    pub(crate) kill_timer_armed: bool,
}

impl<H: ProcessHandle> App<H> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: AppName,
        sandboxed: bool,
        install_dir: PathBuf,
        working_dir: PathBuf,
        uid: Uid,
        gid: Gid,
        supplement_gids: Vec<Gid>,
        resource_limits: ResourceLimits,
        procs: Vec<ProcContainer<H>>,
    ) -> Self {
        Self {
            name,
            sandboxed,
            install_dir,
            working_dir,
            uid,
            gid,
            supplement_gids,
            resource_limits,
            state: AppState::Stopped,
            procs,
            aux_procs: Vec::new(),
            kill_timer_armed: false,
        }
    }

    pub fn state(&self) -> AppState {
        self.state
    }

    pub fn is_sandboxed(&self) -> bool {
        self.sandboxed
    }

    pub fn has_top_level_proc(&self) -> bool {
        !self.procs.is_empty()
    }

    pub fn supplementary_groups(&self) -> &[Gid] {
        &self.supplement_gids
    }

    pub fn kill_timer_armed(&self) -> bool {
        self.kill_timer_armed
    }

    /// The run state of a configured process, or `None` if `name` isn't
    /// one of the app's configured processes (spec.md section 6's
    /// supplemented `app_GetProcState`; auxiliary/ad-hoc processes aren't
    /// addressable this way, matching `app.c`'s lookup through `procs`
    /// only, not `auxProcs`).
    pub fn proc_state(&self, name: &ProcName) -> Option<ProcState> {
        let container = self.procs.iter().find(|c| c.name() == name)?;
        if self.state != AppState::Running {
            return Some(ProcState::NotStarted);
        }
        Some(match container.handle().state() {
            ProcRunState::Running(_) => ProcState::Running,
            ProcRunState::Stopped => ProcState::Stopped,
        })
    }
}

/// Scans the app's configured process list only (spec.md section 4.2,
/// `GetProcContainer`).
pub fn get_proc_container<'a, H: ProcessHandle>(
    procs: &'a mut [ProcContainer<H>],
    name: &str,
) -> Option<&'a mut ProcContainer<H>> {
    procs.iter_mut().find(|c| c.name().as_str() == name)
}

/// Scans configured processes, then auxiliary ones, by pid (spec.md
/// section 4.2, `FindProcContainer`) — used by SIGCHLD dispatch, which
/// doesn't know in advance whether the exited process was configured or
/// ad-hoc.
pub fn find_proc_container<'a, H: ProcessHandle>(
    procs: &'a mut [ProcContainer<H>],
    aux_procs: &'a mut [ProcContainer<H>],
    pid: i32,
) -> Option<&'a mut ProcContainer<H>> {
    if let Some(pos) = procs.iter().position(|c| c.handle().pid() == Some(pid)) {
        return Some(&mut procs[pos]);
    }
    let pos = aux_procs.iter().position(|c| c.handle().pid() == Some(pid))?;
    Some(&mut aux_procs[pos])
}

/// Scans both configured and auxiliary processes by name — used by the
/// ad-hoc override API (spec.md section 4.5, C6), which must reach a
/// process whichever list it lives in.
pub(crate) fn container_by_name<'a, H: ProcessHandle>(
    procs: &'a mut [ProcContainer<H>],
    aux_procs: &'a mut [ProcContainer<H>],
    name: &str,
) -> Option<&'a mut ProcContainer<H>> {
    if let Some(pos) = procs.iter().position(|c| c.name().as_str() == name) {
        return Some(&mut procs[pos]);
    }
    let pos = aux_procs.iter().position(|c| c.name().as_str() == name)?;
    Some(&mut aux_procs[pos])
}

#[cfg(test)]
#[path = "container_tests.rs"]
mod tests;
