// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The identity & policy programmer (spec.md section 4.4, C4): derives an
//! app's UID/GID and supplementary groups, and programs its MAC rules.
//! Grounded in `app.c`'s `CreateUserAndGroups`/`CreateSupplementaryGroups`/
//! `SetSmackRules`/`SetDefaultSmackRules`/`SetSmackRulesForBindings`/
//! `SetDevicePermissions`.

use crate::links::DeviceRequirement;
use av_adapters::{DirUtil, IdentityService, LabelService};
use av_core::{AccessMask, Gid, Label, SupervisorError, Uid, ACCESS_MASKS};

/// Maximum number of supplementary groups a sandboxed app may request
/// (spec.md section 3, "bounded list").
pub const MAX_SUPPLEMENTARY_GROUPS: usize = 16;

/// UID/GID/supplementary-GID triple derived for one app (spec.md
/// section 3).
#[derive(Debug, Clone)]
pub struct AppIdentity {
    pub uid: Uid,
    pub gid: Gid,
    pub supplement_gids: Vec<Gid>,
}

/// A non-empty binding: `app -> server_app` (spec.md section 4.4 step 2).
/// Entries with an empty server app name are filtered out by the config
/// reader before reaching here — resolving spec.md section 9's Open
/// Question about the binding-walk continuing past an absent first child:
/// an empty bindings list is simply an empty `Vec`, nothing to walk.
#[derive(Debug, Clone)]
pub struct Binding {
    pub server_app: String,
}

pub struct IdentityAndPolicy<'a> {
    identity: &'a dyn IdentityService,
    labels: &'a dyn LabelService,
    dir_util: &'a dyn DirUtil,
}

impl<'a> IdentityAndPolicy<'a> {
    pub fn new(identity: &'a dyn IdentityService, labels: &'a dyn LabelService, dir_util: &'a dyn DirUtil) -> Self {
        Self { identity, labels, dir_util }
    }

    /// Derives UID/GID and, for sandboxed apps, the supplementary group
    /// list (spec.md section 4.4). `supplementary_groups` is the ordered
    /// list of group names from the app's `groups` config node; the
    /// number of entries actually read is what's stored, resolving spec.md
    /// section 9's "stored as i+1 even on early break" Open Question.
    pub fn derive_identity(
        &self,
        app_name: &str,
        sandboxed: bool,
        supplementary_groups: &[String],
    ) -> Result<AppIdentity, SupervisorError> {
        if !sandboxed {
            return Ok(AppIdentity { uid: Uid::ROOT, gid: Gid::ROOT, supplement_gids: Vec::new() });
        }

        let (uid, gid) = self.identity.get_app_uid_gid(app_name)?;

        if supplementary_groups.len() > MAX_SUPPLEMENTARY_GROUPS {
            return Err(SupervisorError::Overflow(format!(
                "app '{app_name}' requests {} supplementary groups, exceeding the maximum of {MAX_SUPPLEMENTARY_GROUPS}",
                supplementary_groups.len()
            )));
        }

        let mut supplement_gids = Vec::with_capacity(supplementary_groups.len());
        for name in supplementary_groups {
            supplement_gids.push(self.identity.get_or_create_group(name)?);
        }

        Ok(AppIdentity { uid, gid, supplement_gids })
    }

    /// Programs every MAC rule for the app, in the order spec.md section
    /// 4.4 specifies: pre-wipe, default rules, binding rules, device
    /// permissions.
    pub fn program_mac(
        &self,
        app_name: &str,
        bindings: &[Binding],
        devices: &[DeviceRequirement],
    ) -> Result<(), SupervisorError> {
        let app_label = self.labels.app_label(app_name);
        self.labels.revoke_subject(&app_label)?;
        self.set_default_rules(app_name, &app_label)?;
        self.set_binding_rules(&app_label, bindings)?;
        self.set_device_rules(&app_label, devices)?;
        Ok(())
    }

    /// On app deletion: revoke every rule whose subject is the app's
    /// label (spec.md section 4.4).
    pub fn teardown(&self, app_name: &str) -> Result<(), SupervisorError> {
        let app_label = self.labels.app_label(app_name);
        self.labels.revoke_subject(&app_label)
    }

    fn set_default_rules(&self, app_name: &str, app_label: &Label) -> Result<(), SupervisorError> {
        for mask in ACCESS_MASKS {
            let object = self.labels.app_access_label(app_name, mask);
            self.labels.set_rule(app_label, mask, &object)?;
        }

        let framework = Label::new("framework");
        self.labels.set_rule(&framework, AccessMask::W, app_label)?;
        self.labels.set_rule(app_label, AccessMask::Rw, &framework)?;

        let syslog = Label::new("syslog");
        self.labels.set_rule(app_label, AccessMask::W, &syslog)?;
        Ok(())
    }

    fn set_binding_rules(&self, app_label: &Label, bindings: &[Binding]) -> Result<(), SupervisorError> {
        for binding in bindings {
            if binding.server_app.is_empty() {
                continue;
            }
            let server_label = self.labels.app_label(&binding.server_app);
            self.labels.set_rule(app_label, AccessMask::Rw, &server_label)?;
            self.labels.set_rule(&server_label, AccessMask::Rw, app_label)?;
        }
        Ok(())
    }

    fn set_device_rules(&self, app_label: &Label, devices: &[DeviceRequirement]) -> Result<(), SupervisorError> {
        for device in devices {
            let dev_id = self.dir_util.dev_id(&device.src)?.ok_or_else(|| {
                SupervisorError::Fault(format!("'{}' is not a device file", device.src.display()))
            })?;
            let device_label = self.labels.device_label(dev_id);
            self.labels.set_file_label(&device.src, &device_label)?;

            let mask = device_access_mask(device.readable, device.writable)?;
            self.labels.set_rule(app_label, mask, &device_label)?;
            self.dir_util.set_world_rw(&device.src)?;
        }
        Ok(())
    }
}

fn device_access_mask(readable: bool, writable: bool) -> Result<AccessMask, SupervisorError> {
    match (readable, writable) {
        (true, true) => Ok(AccessMask::Rw),
        (true, false) => Ok(AccessMask::R),
        (false, true) => Ok(AccessMask::W),
        (false, false) => {
            Err(SupervisorError::Fault("device requirement configured with neither isReadable nor isWritable".into()))
        }
    }
}

#[cfg(test)]
#[path = "policy_tests.rs"]
mod tests;
