// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Thin newtypes over raw UID/GID so app identity can't be confused with
//! an arbitrary integer at a call site.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Uid(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Gid(pub u32);

impl Uid {
    /// The identity used by unsandboxed apps (spec.md section 3).
    pub const ROOT: Uid = Uid(0);
}

impl Gid {
    pub const ROOT: Gid = Gid(0);
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for Gid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uid> for nix::unistd::Uid {
    fn from(u: Uid) -> Self {
        nix::unistd::Uid::from_raw(u.0)
    }
}

impl From<Gid> for nix::unistd::Gid {
    fn from(g: Gid) -> Self {
        nix::unistd::Gid::from_raw(g.0)
    }
}
