// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The error kinds returned by every fallible Supervisor operation.
//!
//! Maps one-to-one to spec.md section 7's error kinds; `Io` and `Nix` exist
//! only so adapter implementations can propagate lower-level failures with
//! `?` instead of discarding context.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SupervisorError {
    /// A generic, non-retryable step failure.
    #[error("{0}")]
    Fault(String),

    /// A buffer or fixed-size slot was too small for the requested value.
    #[error("overflow: {0}")]
    Overflow(String),

    /// A requested value was outside the accepted range.
    #[error("out of range: {0}")]
    OutOfRange(String),

    /// The requested entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The entity already exists.
    #[error("duplicate: {0}")]
    Duplicate(String),

    /// The operation would deadlock (e.g. a thread joining itself).
    #[error("deadlock: {0}")]
    Deadlock(String),

    /// The operation is not possible in the current state (legacy kind,
    /// still returned for some join failure modes per spec.md section 7).
    #[error("not possible: {0}")]
    NotPossible(String),

    /// Sink value for watchdog handling: the event was fully handled and
    /// the caller need not escalate further.
    #[error("handled")]
    Handled,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("system call failed: {0}")]
    Nix(#[from] nix::errno::Errno),
}

pub type Result<T> = std::result::Result<T, SupervisorError>;
