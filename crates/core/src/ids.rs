// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Application and process names.
//!
//! Both are short, config-tree-derived identifiers, so we use `SmolStr` the
//! same way the teacher's `oj-core` does for its id types: cheap to clone,
//! no heap allocation for the common case.

use smol_str::SmolStr;
use std::fmt;

macro_rules! name_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(SmolStr);

        impl $name {
            pub fn new(s: impl AsRef<str>) -> Self {
                Self(SmolStr::new(s.as_ref()))
            }

            pub fn as_str(&self) -> &str {
                self.0.as_str()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self::new(s)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self::new(s)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                self.0.as_str()
            }
        }
    };
}

name_newtype!(AppName);
name_newtype!(ProcName);

impl AppName {
    /// An application's name is the last path segment of its config-tree
    /// root (spec.md section 3).
    pub fn from_cfg_path_root(cfg_path_root: &str) -> Option<Self> {
        let last = cfg_path_root.trim_end_matches('/').rsplit('/').next()?;
        if last.is_empty() {
            None
        } else {
            Some(Self::new(last))
        }
    }
}

#[cfg(test)]
#[path = "ids_tests.rs"]
mod tests;
