// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The directory/file utilities collaborator: the primitives the runtime-area
//! builder (spec.md section 4.3) composes into bind mounts, symlinks, tmpfs
//! mounts, and stale-link repair. Grounded in
//! `examples/original_source/framework/c/src/supervisor/app.c`'s
//! `CreateDirLink`/`CreateFileLink`/`CreateTmpFs`/`DoesLinkExist` helpers,
//! expressed here as a `nix::mount`-backed Linux implementation plus an
//! in-memory fake filesystem for deterministic tests.

use av_core::SupervisorError;
use std::path::{Path, PathBuf};

pub trait DirUtil: Send + Sync {
    fn mkdir_p(&self, path: &Path, mode: u32) -> Result<(), SupervisorError>;
    fn touch(&self, path: &Path) -> Result<(), SupervisorError>;
    fn exists(&self, path: &Path) -> bool;
    fn is_mount_point(&self, path: &Path) -> Result<bool, SupervisorError>;

    /// Whether `path` is a directory (spec.md section 4.3's link-source
    /// kind check, `app.c`'s `CreateDirLink`/`CreateFileLink` `stat` +
    /// `S_ISDIR`). Errors the same way `exists` callers already guard
    /// against `NotFound`: call only after confirming `path` exists.
    fn is_dir_entry(&self, path: &Path) -> Result<bool, SupervisorError>;

    /// Bind-mounts `src` onto `dest`. `src == dest` is the "mount onto
    /// itself" idiom used to make a plain directory lazy-unmountable
    /// (spec.md section 4.3, step 2).
    fn bind_mount(&self, src: &Path, dest: &Path) -> Result<(), SupervisorError>;

    fn mount_tmpfs(&self, dest: &Path, size_bytes: u64, mode: u32, uid: u32, gid: u32) -> Result<(), SupervisorError>;

    /// Unmounts `path` with `MNT_DETACH` semantics: succeeds immediately
    /// even if the mount is still busy, completing once the last reference
    /// drops. A no-op, not an error, if `path` is not currently a mount
    /// point.
    fn lazy_umount(&self, path: &Path) -> Result<(), SupervisorError>;

    /// `None` if `path` does not exist or is not a symlink.
    fn read_link(&self, path: &Path) -> Result<Option<PathBuf>, SupervisorError>;
    fn symlink(&self, target: &Path, link: &Path) -> Result<(), SupervisorError>;
    fn remove_file(&self, path: &Path) -> Result<(), SupervisorError>;

    /// The `dev_t` of `path`, or `None` if it is not a block or character
    /// device file (spec.md section 4.4, device permission programming).
    fn dev_id(&self, path: &Path) -> Result<Option<u64>, SupervisorError>;

    /// Sets DAC permissions on a device file to world read+write (spec.md
    /// section 4.4 step 3).
    fn set_world_rw(&self, path: &Path) -> Result<(), SupervisorError>;
}

/// Creates or repairs a symlink at `link` pointing at `target`: a no-op if
/// an identical link already exists, otherwise removes whatever is there
/// (stale symlink, per spec.md section 4.3's unsandboxed link-repair rule)
/// and recreates it. Shared by the real and fake `DirUtil` callers rather
/// than duplicated in each implementation.
pub fn ensure_symlink(util: &dyn DirUtil, target: &Path, link: &Path) -> Result<(), SupervisorError> {
    if let Some(existing) = util.read_link(link)? {
        if existing == target {
            return Ok(());
        }
        util.remove_file(link)?;
    } else if util.exists(link) {
        util.remove_file(link)?;
    }
    util.symlink(target, link)
}

pub struct LinuxDirUtil;

impl LinuxDirUtil {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LinuxDirUtil {
    fn default() -> Self {
        Self::new()
    }
}

impl DirUtil for LinuxDirUtil {
    fn mkdir_p(&self, path: &Path, mode: u32) -> Result<(), SupervisorError> {
        use std::os::unix::fs::PermissionsExt;
        std::fs::create_dir_all(path)?;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))?;
        Ok(())
    }

    fn touch(&self, path: &Path) -> Result<(), SupervisorError> {
        std::fs::OpenOptions::new().create(true).write(true).open(path)?;
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        path.symlink_metadata().is_ok()
    }

    fn is_mount_point(&self, path: &Path) -> Result<bool, SupervisorError> {
        use std::os::unix::fs::MetadataExt;
        let meta = match std::fs::metadata(path) {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        };
        let parent = path.parent().unwrap_or(path);
        let parent_meta = std::fs::metadata(parent)?;
        Ok(meta.dev() != parent_meta.dev())
    }

    fn is_dir_entry(&self, path: &Path) -> Result<bool, SupervisorError> {
        Ok(std::fs::metadata(path)?.is_dir())
    }

    fn bind_mount(&self, src: &Path, dest: &Path) -> Result<(), SupervisorError> {
        use nix::mount::{mount, MsFlags};
        mount(Some(src), dest, None::<&str>, MsFlags::MS_BIND, None::<&str>)?;
        Ok(())
    }

    fn mount_tmpfs(&self, dest: &Path, size_bytes: u64, mode: u32, uid: u32, gid: u32) -> Result<(), SupervisorError> {
        use nix::mount::{mount, MsFlags};
        let opts = format!("size={size_bytes},mode={mode:o},uid={uid},gid={gid}");
        mount(Some("tmpfs"), dest, Some("tmpfs"), MsFlags::empty(), Some(opts.as_str()))?;
        Ok(())
    }

    fn lazy_umount(&self, path: &Path) -> Result<(), SupervisorError> {
        use nix::mount::{umount2, MntFlags};
        match umount2(path, MntFlags::MNT_DETACH) {
            Ok(()) => Ok(()),
            Err(nix::errno::Errno::EINVAL) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn read_link(&self, path: &Path) -> Result<Option<PathBuf>, SupervisorError> {
        match std::fs::read_link(path) {
            Ok(target) => Ok(Some(target)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::InvalidInput => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn symlink(&self, target: &Path, link: &Path) -> Result<(), SupervisorError> {
        std::os::unix::fs::symlink(target, link)?;
        Ok(())
    }

    fn remove_file(&self, path: &Path) -> Result<(), SupervisorError> {
        match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn dev_id(&self, path: &Path) -> Result<Option<u64>, SupervisorError> {
        use std::os::unix::fs::{FileTypeExt, MetadataExt};
        let meta = std::fs::metadata(path)?;
        let ft = meta.file_type();
        Ok((ft.is_block_device() || ft.is_char_device()).then(|| meta.rdev()))
    }

    fn set_world_rw(&self, path: &Path) -> Result<(), SupervisorError> {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = std::fs::metadata(path)?.permissions();
        perms.set_mode(perms.mode() | 0o006);
        std::fs::set_permissions(path, perms)?;
        Ok(())
    }
}

#[cfg(any(test, feature = "test-support"))]
pub mod fake {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::{HashMap, HashSet};

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Node {
        Dir,
        File,
        Symlink(PathBuf),
    }

    /// An in-memory filesystem/mount table standing in for the real one, so
    /// runtime-area tests don't need root privileges to exercise mount and
    /// symlink logic.
    #[derive(Default)]
    pub struct FakeDirUtil {
        nodes: Mutex<HashMap<PathBuf, Node>>,
        mounts: Mutex<HashSet<PathBuf>>,
        tmpfs_opts: Mutex<HashMap<PathBuf, (u64, u32, u32, u32)>>,
        devices: Mutex<HashMap<PathBuf, u64>>,
        world_rw: Mutex<HashSet<PathBuf>>,
    }

    impl FakeDirUtil {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn is_dir(&self, path: &Path) -> bool {
            matches!(self.nodes.lock().get(path), Some(Node::Dir))
        }

        pub fn is_file(&self, path: &Path) -> bool {
            matches!(self.nodes.lock().get(path), Some(Node::File))
        }

        pub fn tmpfs_opts_for(&self, path: &Path) -> Option<(u64, u32, u32, u32)> {
            self.tmpfs_opts.lock().get(path).copied()
        }

        /// Registers `path` as a device file with the given `dev_t`, for
        /// tests exercising the identity & policy programmer's device
        /// permission handling.
        pub fn set_device(&self, path: impl Into<PathBuf>, dev: u64) {
            let path = path.into();
            self.nodes.lock().entry(path.clone()).or_insert(Node::File);
            self.devices.lock().insert(path, dev);
        }

        pub fn is_world_rw(&self, path: &Path) -> bool {
            self.world_rw.lock().contains(path)
        }

        fn ensure_parent(&self, nodes: &mut HashMap<PathBuf, Node>, path: &Path) {
            if let Some(parent) = path.parent() {
                nodes.entry(parent.to_path_buf()).or_insert(Node::Dir);
            }
        }
    }

    impl DirUtil for FakeDirUtil {
        fn mkdir_p(&self, path: &Path, _mode: u32) -> Result<(), SupervisorError> {
            let mut nodes = self.nodes.lock();
            let mut acc = PathBuf::new();
            for component in path.components() {
                acc.push(component);
                nodes.entry(acc.clone()).or_insert(Node::Dir);
            }
            Ok(())
        }

        fn touch(&self, path: &Path) -> Result<(), SupervisorError> {
            let mut nodes = self.nodes.lock();
            self.ensure_parent(&mut nodes, path);
            nodes.entry(path.to_path_buf()).or_insert(Node::File);
            Ok(())
        }

        fn exists(&self, path: &Path) -> bool {
            self.nodes.lock().contains_key(path)
        }

        fn is_mount_point(&self, path: &Path) -> Result<bool, SupervisorError> {
            Ok(self.mounts.lock().contains(path))
        }

        fn is_dir_entry(&self, path: &Path) -> Result<bool, SupervisorError> {
            match self.nodes.lock().get(path) {
                Some(Node::Dir) => Ok(true),
                Some(_) => Ok(false),
                None => Err(SupervisorError::NotFound(format!("'{}' does not exist", path.display()))),
            }
        }

        fn bind_mount(&self, _src: &Path, dest: &Path) -> Result<(), SupervisorError> {
            self.mounts.lock().insert(dest.to_path_buf());
            let mut nodes = self.nodes.lock();
            self.ensure_parent(&mut nodes, dest);
            nodes.entry(dest.to_path_buf()).or_insert(Node::Dir);
            Ok(())
        }

        fn mount_tmpfs(
            &self,
            dest: &Path,
            size_bytes: u64,
            mode: u32,
            uid: u32,
            gid: u32,
        ) -> Result<(), SupervisorError> {
            self.mounts.lock().insert(dest.to_path_buf());
            self.tmpfs_opts.lock().insert(dest.to_path_buf(), (size_bytes, mode, uid, gid));
            self.nodes.lock().entry(dest.to_path_buf()).or_insert(Node::Dir);
            Ok(())
        }

        fn lazy_umount(&self, path: &Path) -> Result<(), SupervisorError> {
            self.mounts.lock().remove(path);
            Ok(())
        }

        fn read_link(&self, path: &Path) -> Result<Option<PathBuf>, SupervisorError> {
            Ok(match self.nodes.lock().get(path) {
                Some(Node::Symlink(target)) => Some(target.clone()),
                _ => None,
            })
        }

        fn symlink(&self, target: &Path, link: &Path) -> Result<(), SupervisorError> {
            let mut nodes = self.nodes.lock();
            self.ensure_parent(&mut nodes, link);
            nodes.insert(link.to_path_buf(), Node::Symlink(target.to_path_buf()));
            Ok(())
        }

        fn remove_file(&self, path: &Path) -> Result<(), SupervisorError> {
            self.nodes.lock().remove(path);
            Ok(())
        }

        fn dev_id(&self, path: &Path) -> Result<Option<u64>, SupervisorError> {
            Ok(self.devices.lock().get(path).copied())
        }

        fn set_world_rw(&self, path: &Path) -> Result<(), SupervisorError> {
            self.world_rw.lock().insert(path.to_path_buf());
            Ok(())
        }
    }
}

#[cfg(test)]
#[path = "dirutil_tests.rs"]
mod tests;
