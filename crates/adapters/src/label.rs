// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The MAC label service collaborator (spec.md section 1, "Label service"
//! and section 4.4).

use av_core::{AccessMask, Label, SupervisorError};
use std::path::Path;

pub trait LabelService: Send + Sync {
    /// Derives the app's own subject label from its name.
    fn app_label(&self, app_name: &str) -> Label;

    /// Derives the per-mask object label for files the app owns
    /// (e.g. its own working directory), per spec.md section 4.4 step 1.
    fn app_access_label(&self, app_name: &str, mask: AccessMask) -> Label;

    /// Derives a device's object label from its `dev_t`.
    fn device_label(&self, dev: u64) -> Label;

    /// Sets the extended-attribute label on a filesystem object.
    fn set_file_label(&self, path: &Path, label: &Label) -> Result<(), SupervisorError>;

    /// Programs a rule `subject -mask-> object`.
    fn set_rule(&self, subject: &Label, mask: AccessMask, object: &Label) -> Result<(), SupervisorError>;

    /// Removes every rule whose subject is `subject` — the pre-wipe done
    /// at the start of app creation and the teardown done at app deletion
    /// (spec.md section 4.4).
    fn revoke_subject(&self, subject: &Label) -> Result<(), SupervisorError>;
}

/// Extended attribute name SMACK reads labels from.
const SMACK_XATTR: &str = "security.SMACK64";

/// A real label service. Rules are kept in an in-process table (there is
/// no real SMACK rule-loading syscall available from an unprivileged
/// process in this crate's scope — spec.md's Non-goals exclude
/// implementing "the label kernel module") while file/device labels really
/// are written via `setxattr`, so `set_file_label` has an observable,
/// testable effect on the filesystem the way the original implementation's
/// `smack_SetLabel` does.
pub struct LinuxLabelService {
    rules: parking_lot::Mutex<Vec<(Label, AccessMask, Label)>>,
}

impl LinuxLabelService {
    pub fn new() -> Self {
        Self { rules: parking_lot::Mutex::new(Vec::new()) }
    }
}

impl Default for LinuxLabelService {
    fn default() -> Self {
        Self::new()
    }
}

impl LabelService for LinuxLabelService {
    fn app_label(&self, app_name: &str) -> Label {
        Label::new(format!("app.{app_name}"))
    }

    fn app_access_label(&self, app_name: &str, mask: AccessMask) -> Label {
        Label::new(format!("app.{app_name}.{}", mask.as_str()))
    }

    fn device_label(&self, dev: u64) -> Label {
        Label::new(format!("dev.{dev:x}"))
    }

    fn set_file_label(&self, path: &Path, label: &Label) -> Result<(), SupervisorError> {
        xattr::set(path, SMACK_XATTR, label.as_str().as_bytes())
            .map_err(|e| SupervisorError::Fault(format!("setxattr {path:?}: {e}")))
    }

    fn set_rule(&self, subject: &Label, mask: AccessMask, object: &Label) -> Result<(), SupervisorError> {
        self.rules.lock().push((subject.clone(), mask, object.clone()));
        Ok(())
    }

    fn revoke_subject(&self, subject: &Label) -> Result<(), SupervisorError> {
        self.rules.lock().retain(|(s, _, _)| s != subject);
        Ok(())
    }
}

#[cfg(any(test, feature = "test-support"))]
pub mod fake {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    #[derive(Default)]
    pub struct FakeLabelService {
        rules: Mutex<Vec<(Label, AccessMask, Label)>>,
        file_labels: Mutex<HashMap<std::path::PathBuf, Label>>,
    }

    impl FakeLabelService {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn rules(&self) -> Vec<(Label, AccessMask, Label)> {
            self.rules.lock().clone()
        }

        pub fn rule_exists(&self, subject: &Label, mask: AccessMask, object: &Label) -> bool {
            self.rules.lock().iter().any(|(s, m, o)| s == subject && *m == mask && o == object)
        }

        pub fn file_label(&self, path: &Path) -> Option<Label> {
            self.file_labels.lock().get(path).cloned()
        }
    }

    impl LabelService for FakeLabelService {
        fn app_label(&self, app_name: &str) -> Label {
            Label::new(format!("app.{app_name}"))
        }

        fn app_access_label(&self, app_name: &str, mask: AccessMask) -> Label {
            Label::new(format!("app.{app_name}.{}", mask.as_str()))
        }

        fn device_label(&self, dev: u64) -> Label {
            Label::new(format!("dev.{dev:x}"))
        }

        fn set_file_label(&self, path: &Path, label: &Label) -> Result<(), SupervisorError> {
            self.file_labels.lock().insert(path.to_path_buf(), label.clone());
            Ok(())
        }

        fn set_rule(&self, subject: &Label, mask: AccessMask, object: &Label) -> Result<(), SupervisorError> {
            self.rules.lock().push((subject.clone(), mask, object.clone()));
            Ok(())
        }

        fn revoke_subject(&self, subject: &Label) -> Result<(), SupervisorError> {
            self.rules.lock().retain(|(s, _, _)| s != subject);
            Ok(())
        }
    }
}

#[cfg(test)]
#[path = "label_tests.rs"]
mod tests;
