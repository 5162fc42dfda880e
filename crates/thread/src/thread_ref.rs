// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The thread object itself (spec.md section 3 "Thread object", section 4.1
//! contract), grounded in `thread.c`'s `thread_Obj_t`/`Destructor_t` and the
//! `PThreadStartRoutine`/`CleanupThread` split: a thread is first created
//! (`spawn`), its attributes set while `NEW`, then actually started
//! (`start`), and an outermost cleanup wrapper around the real entry point
//! guarantees the destructor stack runs on every exit path.

use crate::priority::ThreadPriority;
use crate::registry;
use av_core::SupervisorError;
use parking_lot::Mutex;
use smol_str::SmolStr;
use std::any::Any;
use std::cell::RefCell;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Thread names are truncated, never rejected (spec.md section 3).
pub const MAX_THREAD_NAME_LEN: usize = 31;

/// OS-enforced minimum and a workspace-chosen sanity maximum for
/// `set_stack_size` (spec.md section 4.1: below minimum is `OVERFLOW`,
/// above maximum is `OUT_OF_RANGE`).
pub const MIN_STACK_SIZE: usize = 16 * 1024;
pub const MAX_STACK_SIZE: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadState {
    New,
    Running,
    Dying,
}

/// How a thread's main function actually ended.
pub enum ThreadExit {
    /// The main function returned normally.
    Normal,
    /// The thread called `ThreadContext::exit` with this payload.
    Explicit(Box<dyn Any + Send>),
    /// The thread observed `cancel()` and unwound in response to it.
    Cancelled,
    /// The main function panicked for a reason other than `exit`/`cancel`.
    Panicked,
}

/// Payload type used to distinguish a deliberate `ThreadContext::exit` from
/// a real panic when unwinding through the outermost cleanup wrapper.
struct ExitSignal(Box<dyn Any + Send>);

struct Destructor {
    id: u64,
    func: Option<Box<dyn FnOnce() + Send>>,
}

pub(crate) struct ThreadInner {
    pub(crate) id: u64,
    pub(crate) name: Mutex<SmolStr>,
    pub(crate) state: Mutex<ThreadState>,
    priority: Mutex<ThreadPriority>,
    stack_size: Mutex<Option<usize>>,
    joinable: Mutex<bool>,
    cancel_requested: AtomicBool,
    destructors: Mutex<Vec<Destructor>>,
    next_destructor_id: AtomicU64,
    main: Mutex<Option<Box<dyn FnOnce(ThreadContext) + Send>>>,
    join_handle: Mutex<Option<std::thread::JoinHandle<ThreadExit>>>,
}

thread_local! {
    static CURRENT: RefCell<Option<ThreadRef>> = const { RefCell::new(None) };
}

/// An opaque, ref-counted handle to a thread object — the Rust analogue of
/// `le_thread_Ref_t`. Cloning shares the same underlying thread; there is no
/// separate "safe reference" validity check the way the C original needs,
/// since an `Arc` can't outlive its referent becoming invalid.
#[derive(Clone)]
pub struct ThreadRef(Arc<ThreadInner>);

/// Passed into a thread's main function. Lets the thread read its own name,
/// poll for a cooperative cancellation request, and perform an explicit
/// `pthread_exit`-style unwind that still runs its destructor stack.
pub struct ThreadContext {
    inner: Arc<ThreadInner>,
}

impl ThreadContext {
    pub fn name(&self) -> SmolStr {
        self.inner.name.lock().clone()
    }

    /// True once `ThreadRef::cancel` has been called for this thread. Rust
    /// has no asynchronous `pthread_cancel` equivalent — cancellation here
    /// is cooperative, and the main function is expected to check this and
    /// return (or call `exit`) promptly.
    pub fn is_cancel_requested(&self) -> bool {
        self.inner.cancel_requested.load(Ordering::Relaxed)
    }

    /// Unwinds out of the thread's main function immediately, running the
    /// destructor stack on the way out, and delivers `value` to whoever
    /// `join()`s this thread as `ThreadExit::Explicit`. Modeled as a panic
    /// carrying a private payload type, the same way `thread.c`'s
    /// `le_thread_Exit` never returns to its caller.
    pub fn exit(self, value: impl Any + Send + 'static) -> ! {
        std::panic::panic_any(ExitSignal(Box::new(value)))
    }
}

fn truncate_name(name: &str) -> SmolStr {
    if name.len() <= MAX_THREAD_NAME_LEN {
        return SmolStr::new(name);
    }
    tracing::warn!(requested = name, max = MAX_THREAD_NAME_LEN, "thread name truncated");
    let mut end = MAX_THREAD_NAME_LEN;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    SmolStr::new(&name[..end])
}

/// Creates a thread object in the `NEW` state. It does not actually start
/// running until `ThreadRef::start` is called, matching the C original's
/// `create` / `start` split (spec.md section 4.1).
pub fn spawn(name: &str, main: impl FnOnce(ThreadContext) + Send + 'static) -> ThreadRef {
    let inner = Arc::new(ThreadInner {
        id: registry::next_id(),
        name: Mutex::new(truncate_name(name)),
        state: Mutex::new(ThreadState::New),
        priority: Mutex::new(ThreadPriority::default()),
        stack_size: Mutex::new(None),
        joinable: Mutex::new(false),
        cancel_requested: AtomicBool::new(false),
        destructors: Mutex::new(Vec::new()),
        next_destructor_id: AtomicU64::new(0),
        main: Mutex::new(Some(Box::new(main))),
        join_handle: Mutex::new(None),
    });
    registry::insert(&inner);
    ThreadRef(inner)
}

/// The thread calling `current()` right now, if it was created via `spawn`
/// (or opted in via a future `init_thread_data`-equivalent — out of scope
/// here, spec.md section 4.1's "threads not created here" path).
pub fn current() -> Option<ThreadRef> {
    CURRENT.with(|c| c.borrow().clone())
}

pub fn my_name() -> SmolStr {
    current().map(|t| t.name()).unwrap_or_else(|| SmolStr::new("main"))
}

/// May only be called by another thread while `target` is `NEW`; once
/// running, only the thread itself may add its own destructors (spec.md
/// section 4.1).
pub fn add_child_destructor(
    target: &ThreadRef,
    f: impl FnOnce() + Send + 'static,
) -> Result<DestructorRef, SupervisorError> {
    target.add_destructor_checked(f)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DestructorRef {
    thread_id: u64,
    destructor_id: u64,
}

impl ThreadRef {
    pub fn name(&self) -> SmolStr {
        self.0.name.lock().clone()
    }

    pub fn state(&self) -> ThreadState {
        *self.0.state.lock()
    }

    fn guard_new(&self) -> Result<(), SupervisorError> {
        if *self.0.state.lock() == ThreadState::New {
            Ok(())
        } else {
            Err(SupervisorError::NotPossible("thread attributes can only be changed while NEW".into()))
        }
    }

    pub fn set_priority(&self, priority: ThreadPriority) -> Result<(), SupervisorError> {
        self.guard_new()?;
        *self.0.priority.lock() = priority;
        Ok(())
    }

    pub fn priority(&self) -> ThreadPriority {
        *self.0.priority.lock()
    }

    pub fn set_stack_size(&self, bytes: usize) -> Result<(), SupervisorError> {
        self.guard_new()?;
        if bytes < MIN_STACK_SIZE {
            return Err(SupervisorError::Overflow(format!("stack size {bytes} below OS minimum {MIN_STACK_SIZE}")));
        }
        if bytes > MAX_STACK_SIZE {
            return Err(SupervisorError::OutOfRange(format!("stack size {bytes} exceeds maximum {MAX_STACK_SIZE}")));
        }
        *self.0.stack_size.lock() = Some(bytes);
        Ok(())
    }

    pub fn set_joinable(&self, joinable: bool) -> Result<(), SupervisorError> {
        self.guard_new()?;
        *self.0.joinable.lock() = joinable;
        Ok(())
    }

    pub fn is_joinable(&self) -> bool {
        *self.0.joinable.lock()
    }

    pub fn start(&self) -> Result<(), SupervisorError> {
        {
            let mut state = self.0.state.lock();
            if *state != ThreadState::New {
                return Err(SupervisorError::NotPossible("thread has already been started".into()));
            }
            *state = ThreadState::Running;
        }

        let main = self
            .0
            .main
            .lock()
            .take()
            .ok_or_else(|| SupervisorError::NotPossible("thread has already been started".into()))?;

        let inner = self.0.clone();
        let ctx = ThreadContext { inner: inner.clone() };
        let name = inner.name.lock().to_string();
        let mut builder = std::thread::Builder::new().name(name);
        if let Some(size) = *inner.stack_size.lock() {
            builder = builder.stack_size(size);
        }

        let spawned = builder
            .spawn(move || run_thread_body(inner, ctx, main))
            .map_err(|e| SupervisorError::Fault(format!("failed to start OS thread: {e}")))?;
        *self.0.join_handle.lock() = Some(spawned);
        Ok(())
    }

    pub fn join(&self) -> Result<ThreadExit, SupervisorError> {
        if current().map(|c| c.0.id) == Some(self.0.id) {
            return Err(SupervisorError::Deadlock("a thread cannot join itself".into()));
        }
        if !*self.0.joinable.lock() {
            return Err(SupervisorError::NotPossible("thread is not joinable".into()));
        }
        let handle = self.0.join_handle.lock().take();
        match handle {
            None => Err(SupervisorError::NotFound("thread has not been started or was already joined".into())),
            Some(h) => {
                let exit = match h.join() {
                    Ok(exit) => exit,
                    Err(_) => ThreadExit::Panicked,
                };
                registry::remove(self.0.id);
                Ok(exit)
            }
        }
    }

    /// Requests cooperative cancellation; see `ThreadContext::is_cancel_requested`.
    pub fn cancel(&self) {
        self.0.cancel_requested.store(true, Ordering::Relaxed);
    }

    pub fn add_destructor(&self, f: impl FnOnce() + Send + 'static) -> DestructorRef {
        let id = self.0.next_destructor_id.fetch_add(1, Ordering::Relaxed);
        self.0.destructors.lock().push(Destructor { id, func: Some(Box::new(f)) });
        DestructorRef { thread_id: self.0.id, destructor_id: id }
    }

    fn add_destructor_checked(&self, f: impl FnOnce() + Send + 'static) -> Result<DestructorRef, SupervisorError> {
        let is_self = current().map(|c| c.0.id) == Some(self.0.id);
        if is_self || *self.0.state.lock() == ThreadState::New {
            Ok(self.add_destructor(f))
        } else {
            Err(SupervisorError::NotPossible(
                "addChildDestructor: target is no longer NEW and caller is not the thread itself".into(),
            ))
        }
    }

    pub fn remove_destructor(&self, d: DestructorRef) {
        if d.thread_id != self.0.id {
            return;
        }
        self.0.destructors.lock().retain(|x| x.id != d.destructor_id);
    }
}

fn run_thread_body(
    inner: Arc<ThreadInner>,
    ctx: ThreadContext,
    main: Box<dyn FnOnce(ThreadContext) + Send>,
) -> ThreadExit {
    CURRENT.with(|c| *c.borrow_mut() = Some(ThreadRef(inner.clone())));

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| main(ctx)));

    let outcome = match result {
        Ok(()) => ThreadExit::Normal,
        Err(payload) => match payload.downcast::<ExitSignal>() {
            Ok(signal) => ThreadExit::Explicit(signal.0),
            Err(_) if inner.cancel_requested.load(Ordering::Relaxed) => ThreadExit::Cancelled,
            Err(_) => ThreadExit::Panicked,
        },
    };

    cleanup(&inner);
    outcome
}

/// Runs the destructor stack LIFO, each destructor free to mutate the list
/// via `remove_destructor` (popping one at a time before invoking it keeps
/// this safe), then — if not joinable — removes the object from the
/// process-wide list (spec.md section 4.1's cleanup-handler rule). Per-thread
/// event/timer teardown is out of this crate's scope (spec.md calls that
/// state "opaque to this spec").
fn cleanup(inner: &Arc<ThreadInner>) {
    *inner.state.lock() = ThreadState::Dying;
    loop {
        let next = inner.destructors.lock().pop();
        match next {
            Some(Destructor { func: Some(f), .. }) => f(),
            Some(Destructor { func: None, .. }) => {}
            None => break,
        }
    }
    if !*inner.joinable.lock() {
        registry::remove(inner.id);
    }
}

#[cfg(test)]
#[path = "thread_ref_tests.rs"]
mod tests;
