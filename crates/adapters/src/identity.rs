// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The identity service collaborator: maps app name to user/group IDs and
//! creates named groups on demand (spec.md section 1).

use av_core::{Gid, SupervisorError, Uid};

pub trait IdentityService: Send + Sync {
    /// Derives a username from the app name and looks up (or creates) its
    /// UID and primary GID. Fails if the derived username is too long.
    fn get_app_uid_gid(&self, app_name: &str) -> Result<(Uid, Gid), SupervisorError>;

    /// Looks up a named group's GID, creating the group if it does not
    /// already exist.
    fn get_or_create_group(&self, group_name: &str) -> Result<Gid, SupervisorError>;
}

/// Maximum username length accepted by `useradd`-alike tooling; names
/// longer than this fail app creation per spec.md section 4.4.
pub const MAX_USER_NAME_LEN: usize = 32;

/// A real identity service backed by `/etc/passwd` and `/etc/group`
/// (read) and `groupadd`-equivalent file appends (create). This never
/// shells out — it edits the group database directly, matching the level
/// the Supervisor operates at on a device image with no `shadow-utils`.
pub struct LinuxIdentityService {
    passwd_path: std::path::PathBuf,
    group_path: std::path::PathBuf,
}

impl LinuxIdentityService {
    pub fn new(passwd_path: impl Into<std::path::PathBuf>, group_path: impl Into<std::path::PathBuf>) -> Self {
        Self { passwd_path: passwd_path.into(), group_path: group_path.into() }
    }

    fn find_passwd_entry(&self, user_name: &str) -> Result<Option<(Uid, Gid)>, SupervisorError> {
        let text = std::fs::read_to_string(&self.passwd_path)?;
        for line in text.lines() {
            let fields: Vec<&str> = line.split(':').collect();
            if fields.len() >= 4 && fields[0] == user_name {
                let uid = fields[2].parse::<u32>().map_err(|_| {
                    SupervisorError::Fault(format!("malformed passwd entry for '{user_name}'"))
                })?;
                let gid = fields[3].parse::<u32>().map_err(|_| {
                    SupervisorError::Fault(format!("malformed passwd entry for '{user_name}'"))
                })?;
                return Ok(Some((Uid(uid), Gid(gid))));
            }
        }
        Ok(None)
    }

    fn find_group_entry(&self, group_name: &str) -> Result<Option<Gid>, SupervisorError> {
        let text = std::fs::read_to_string(&self.group_path)?;
        for line in text.lines() {
            let fields: Vec<&str> = line.split(':').collect();
            if fields.len() >= 3 && fields[0] == group_name {
                let gid = fields[2]
                    .parse::<u32>()
                    .map_err(|_| SupervisorError::Fault(format!("malformed group entry for '{group_name}'")))?;
                return Ok(Some(Gid(gid)));
            }
        }
        Ok(None)
    }

    fn next_free_gid(&self) -> Result<u32, SupervisorError> {
        let text = std::fs::read_to_string(&self.group_path)?;
        let max = text
            .lines()
            .filter_map(|line| line.split(':').nth(2))
            .filter_map(|s| s.parse::<u32>().ok())
            .max()
            .unwrap_or(999);
        Ok(max + 1)
    }
}

impl IdentityService for LinuxIdentityService {
    fn get_app_uid_gid(&self, app_name: &str) -> Result<(Uid, Gid), SupervisorError> {
        if app_name.len() > MAX_USER_NAME_LEN {
            return Err(SupervisorError::Overflow(format!(
                "app name '{app_name}' exceeds max user name length"
            )));
        }
        match self.find_passwd_entry(app_name)? {
            Some(ids) => Ok(ids),
            None => Err(SupervisorError::NotFound(format!("no user entry for app '{app_name}'"))),
        }
    }

    fn get_or_create_group(&self, group_name: &str) -> Result<Gid, SupervisorError> {
        if let Some(gid) = self.find_group_entry(group_name)? {
            return Ok(gid);
        }
        let gid = self.next_free_gid()?;
        let mut file = std::fs::OpenOptions::new().append(true).open(&self.group_path)?;
        use std::io::Write;
        writeln!(file, "{group_name}:x:{gid}:")?;
        Ok(Gid(gid))
    }
}

#[cfg(any(test, feature = "test-support"))]
pub mod fake {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    pub struct FakeIdentityService {
        users: HashMap<String, (Uid, Gid)>,
        groups: Mutex<HashMap<String, Gid>>,
        next_gid: Mutex<u32>,
    }

    impl FakeIdentityService {
        pub fn new() -> Self {
            Self { users: HashMap::new(), groups: Mutex::new(HashMap::new()), next_gid: Mutex::new(1000) }
        }

        pub fn with_user(mut self, app_name: &str, uid: Uid, gid: Gid) -> Self {
            self.users.insert(app_name.to_string(), (uid, gid));
            self
        }
    }

    impl Default for FakeIdentityService {
        fn default() -> Self {
            Self::new()
        }
    }

    impl IdentityService for FakeIdentityService {
        fn get_app_uid_gid(&self, app_name: &str) -> Result<(Uid, Gid), SupervisorError> {
            if app_name.len() > MAX_USER_NAME_LEN {
                return Err(SupervisorError::Overflow(format!(
                    "app name '{app_name}' exceeds max user name length"
                )));
            }
            self.users
                .get(app_name)
                .copied()
                .ok_or_else(|| SupervisorError::NotFound(format!("no user entry for app '{app_name}'")))
        }

        fn get_or_create_group(&self, group_name: &str) -> Result<Gid, SupervisorError> {
            let mut groups = self.groups.lock();
            if let Some(gid) = groups.get(group_name) {
                return Ok(*gid);
            }
            let mut next = self.next_gid.lock();
            let gid = Gid(*next);
            *next += 1;
            groups.insert(group_name.to_string(), gid);
            Ok(gid)
        }
    }
}

#[cfg(test)]
#[path = "identity_tests.rs"]
mod tests;
