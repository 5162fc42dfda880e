// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! MAC label vocabulary.
//!
//! `Label` is the opaque subject/object tag from spec.md's GLOSSARY.
//! `AccessMask` and `ACCESS_MASKS` are the fixed table of the seven
//! permission-mask combinations that the identity & policy programmer (C4)
//! sets default rules for — design notes section 9 calls out that this must
//! be a fixed table, not nested loops over characters.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Label(String);

impl Label {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for Label {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// One of the seven non-empty subsets of {read, write, execute}.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMask {
    R,
    W,
    X,
    Rw,
    Rx,
    Wx,
    Rwx,
}

impl AccessMask {
    /// The string form used both for SMACK-style rule strings and for
    /// deriving per-mask object labels.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::R => "r",
            Self::W => "w",
            Self::X => "x",
            Self::Rw => "rw",
            Self::Rx => "rx",
            Self::Wx => "wx",
            Self::Rwx => "rwx",
        }
    }
}

impl fmt::Display for AccessMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The fixed table of all seven mask combinations, in a stable order.
pub const ACCESS_MASKS: [AccessMask; 7] = [
    AccessMask::R,
    AccessMask::W,
    AccessMask::X,
    AccessMask::Rw,
    AccessMask::Rx,
    AccessMask::Wx,
    AccessMask::Rwx,
];

#[cfg(test)]
#[path = "label_tests.rs"]
mod tests;
