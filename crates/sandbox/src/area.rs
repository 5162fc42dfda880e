// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The runtime-area builder (spec.md section 4.3, C3): makes an app's
//! working dir a correct root for launching its processes, sandboxed or
//! not. Grounded in `app.c`'s `SetupAppArea`/`CreateTmpFs`/
//! `CreateDefaultLinks`/`CreateLibBinLinks`/`CreateBundledLinks`/
//! `CreateRequiredLinks`.

use crate::links::{self, BundlesSpec, LinkEntry, RequiresSpec};
use av_adapters::{DirUtil, LabelService};
use av_core::{Label, SupervisorError};
use std::path::{Path, PathBuf};

/// Size in bytes of the sandboxed `/tmp` tmpfs (spec.md section 4.3).
pub const APP_TMPFS_SIZE: u64 = 90112;

/// Mode for the sandboxed `/tmp` directory and its tmpfs mount: `o=rwx`.
const TMP_MODE: u32 = 0o007;

/// The default device/library links programmed into every sandboxed app
/// (spec.md section 6's default-links table), selected by target
/// architecture at build time.
fn default_system_links() -> &'static [&'static str] {
    if cfg!(target_arch = "x86_64") {
        &[
            "/lib/ld-linux-x86-64.so.2",
            "/lib/libc.so.6",
            "/lib/libpthread.so.0",
            "/lib/librt.so.1",
            "/lib/libdl.so.2",
            "/lib/libgcc_s.so.1",
            "/lib/libm.so.6",
            "/usr/lib/libstdc++.so.6",
        ]
    } else if cfg!(target_arch = "x86") {
        &[
            "/lib/ld-linux.so.2",
            "/lib/libc.so.6",
            "/lib/libpthread.so.0",
            "/lib/librt.so.1",
            "/lib/libdl.so.2",
            "/lib/libgcc_s.so.1",
            "/lib/libm.so.6",
            "/usr/lib/libstdc++.so.6",
        ]
    } else if cfg!(target_arch = "arm") {
        &[
            "/lib/ld-linux.so.3",
            "/lib/ld-linux-armhf.so.3",
            "/lib/arm-linux-gnueabihf/libc.so.6",
            "/lib/arm-linux-gnueabihf/libpthread.so.0",
            "/lib/arm-linux-gnueabihf/librt.so.1",
            "/lib/arm-linux-gnueabihf/libdl.so.2",
            "/lib/arm-linux-gnueabihf/libgcc_s.so.1",
            "/lib/arm-linux-gnueabihf/libm.so.6",
            "/usr/lib/arm-linux-gnueabihf/libstdc++.so.6",
        ]
    } else {
        &[]
    }
}

/// Well-known device nodes linked into every sandboxed app (spec.md
/// section 6), in addition to `default_system_links`'s runtime libraries.
const DEFAULT_DEVICE_LINKS: [&str; 3] = ["/dev/log", "/dev/null", "/dev/zero"];

/// The running system's own supervisor library, linked into `/lib` for
/// every sandboxed app regardless of architecture — unlike
/// `default_system_links`'s per-arch table, this entry is fixed.
const CURRENT_SYSTEM_LIB: &str = "/legato/systems/current/lib/liblegato.so";

/// Socket paths linked into `/tmp/legato/` at app start, after the tmpfs
/// mount (spec.md section 4.3's "operations performed at app start").
const DEFAULT_TMP_LINKS: [&str; 2] =
    ["/run/legato/serviceDirectoryServer.socket", "/run/legato/serviceDirectoryClient.socket"];

/// The inputs the runtime-area builder needs for one app (spec.md
/// section 3's Application object, restricted to the fields C3 touches).
#[derive(Debug, Clone)]
pub struct AppArea {
    pub working_dir: PathBuf,
    pub install_dir: PathBuf,
    pub sandboxed: bool,
    pub app_label: Label,
}

pub struct RuntimeAreaBuilder<'a> {
    dir_util: &'a dyn DirUtil,
    labels: &'a dyn LabelService,
}

impl<'a> RuntimeAreaBuilder<'a> {
    pub fn new(dir_util: &'a dyn DirUtil, labels: &'a dyn LabelService) -> Self {
        Self { dir_util, labels }
    }

    /// Creation-time steps 1-3 of spec.md section 4.3.
    pub fn create(&self, area: &AppArea) -> Result<(), SupervisorError> {
        self.ensure_working_dir(area)?;
        if area.sandboxed {
            self.bind_mount_self(area)?;
            self.create_default_links(area)?;
        }
        self.create_lib_bin_links(area)?;
        Ok(())
    }

    /// Step 1: ensure `workingDir` exists with the right mode and label.
    fn ensure_working_dir(&self, area: &AppArea) -> Result<(), SupervisorError> {
        self.dir_util.mkdir_p(&area.working_dir, links::APP_DIR_MODE)?;
        self.labels.set_file_label(&area.working_dir, &area.app_label)?;
        Ok(())
    }

    /// Step 2, sandboxed only: bind-mount `workingDir` onto itself so
    /// cleanup can lazy-umount it later.
    fn bind_mount_self(&self, area: &AppArea) -> Result<(), SupervisorError> {
        if self.dir_util.is_mount_point(&area.working_dir)? {
            return Ok(());
        }
        self.dir_util.bind_mount(&area.working_dir, &area.working_dir)
    }

    /// Step 3, sandboxed only: default device nodes and runtime libraries.
    fn create_default_links(&self, area: &AppArea) -> Result<(), SupervisorError> {
        for dev in DEFAULT_DEVICE_LINKS {
            let entry = LinkEntry { src: PathBuf::from(dev), dest: "/dev/".to_string() };
            links::link_entry(self.dir_util, self.labels, area.sandboxed, &area.working_dir, &entry, &area.app_label)?;
        }
        for lib in default_system_links() {
            let entry = LinkEntry { src: PathBuf::from(*lib), dest: "/lib/".to_string() };
            links::link_entry(self.dir_util, self.labels, area.sandboxed, &area.working_dir, &entry, &area.app_label)?;
        }
        let lib_entry = LinkEntry { src: PathBuf::from(CURRENT_SYSTEM_LIB), dest: "/lib/".to_string() };
        links::link_entry(self.dir_util, self.labels, area.sandboxed, &area.working_dir, &lib_entry, &area.app_label)?;
        Ok(())
    }

    /// Step 4: recursively link the app's installed `read-only/lib` and
    /// `read-only/bin` into `/lib` and `/bin`.
    fn create_lib_bin_links(&self, area: &AppArea) -> Result<(), SupervisorError> {
        let src_lib = area.install_dir.join("read-only").join("lib");
        links::recursively_create_links(
            self.dir_util,
            self.labels,
            area.sandboxed,
            &area.working_dir,
            &src_lib,
            "/lib",
            &area.app_label,
        )?;
        let src_bin = area.install_dir.join("read-only").join("bin");
        links::recursively_create_links(
            self.dir_util,
            self.labels,
            area.sandboxed,
            &area.working_dir,
            &src_bin,
            "/bin",
            &area.app_label,
        )?;
        Ok(())
    }

    /// Step 5: bundled files and directories marked non-writable (writable
    /// bundles are assumed already copied by the installer).
    pub fn create_bundled_links(&self, area: &AppArea, bundles: &BundlesSpec) -> Result<(), SupervisorError> {
        for bundle in bundles.dirs.iter().filter(|b| !b.writable) {
            links::recursively_create_links(
                self.dir_util,
                self.labels,
                area.sandboxed,
                &area.working_dir,
                &bundle.src,
                &bundle.dest,
                &area.app_label,
            )?;
        }
        for bundle in bundles.files.iter().filter(|b| !b.writable) {
            let entry = LinkEntry { src: bundle.src.clone(), dest: bundle.dest.clone() };
            links::link_entry(self.dir_util, self.labels, area.sandboxed, &area.working_dir, &entry, &area.app_label)?;
        }
        Ok(())
    }

    /// Step 6: `requires.dirs`, `requires.files`, `requires.devices`.
    pub fn create_required_links(&self, area: &AppArea, requires: &RequiresSpec) -> Result<(), SupervisorError> {
        for entry in &requires.dirs {
            let dest_path = links::abs_dest_path(&area.working_dir, &entry.dest, &entry.src);
            links::link_dir(self.dir_util, self.labels, area.sandboxed, &entry.src, &dest_path, &area.app_label)?;
        }
        for entry in &requires.files {
            links::link_entry(self.dir_util, self.labels, area.sandboxed, &area.working_dir, entry, &area.app_label)?;
        }
        for device in &requires.devices {
            let entry = LinkEntry { src: device.src.clone(), dest: device.dest.clone() };
            links::link_entry(self.dir_util, self.labels, area.sandboxed, &area.working_dir, &entry, &area.app_label)?;
        }
        Ok(())
    }

    /// Start-time operation, sandboxed only: mount `/tmp` as a tmpfs and
    /// link the service-directory sockets into it (spec.md section 4.3).
    pub fn mount_tmp(&self, area: &AppArea) -> Result<(), SupervisorError> {
        if !area.sandboxed {
            return Ok(());
        }
        let tmp_path = area.working_dir.join("tmp");
        self.dir_util.mkdir_p(&tmp_path, TMP_MODE)?;
        self.labels.set_file_label(&tmp_path, &area.app_label)?;
        self.dir_util.lazy_umount(&tmp_path)?;
        self.dir_util.mount_tmpfs(&tmp_path, APP_TMPFS_SIZE, TMP_MODE, 0, 0)?;
        self.labels.set_file_label(&tmp_path, &area.app_label)?;
        tracing::info!(path = %tmp_path.display(), "mounted tmpfs");

        for socket in DEFAULT_TMP_LINKS {
            let entry = LinkEntry { src: PathBuf::from(socket), dest: "/tmp/legato/".to_string() };
            if !self.dir_util.exists(&entry.src) {
                tracing::debug!(src = %entry.src.display(), "service directory socket not present, skipping");
                continue;
            }
            links::link_entry(self.dir_util, self.labels, area.sandboxed, &area.working_dir, &entry, &area.app_label)?;
        }
        Ok(())
    }

    /// Tears the area down on app deletion: lazy-umount `/tmp` and the
    /// self bind-mount, if sandboxed. Link targets themselves are left for
    /// the installer to clean up (spec.md section 1's Non-goals).
    pub fn teardown(&self, area: &AppArea) -> Result<(), SupervisorError> {
        if !area.sandboxed {
            return Ok(());
        }
        let tmp_path = area.working_dir.join("tmp");
        self.dir_util.lazy_umount(&tmp_path)?;
        self.dir_util.lazy_umount(&area.working_dir)?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "area_tests.rs"]
mod tests;
