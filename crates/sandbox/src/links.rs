// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The link-policy primitives behind the runtime-area builder (spec.md
//! section 4.3), grounded in `app.c`'s `CreateDirLink`/`CreateFileLink`/
//! `RecursivelyCreateLinks`/`GetAbsDestPath`/`CreateIntermediateDirs`.

use av_adapters::{DirUtil, LabelService};
use av_core::{Label, SupervisorError};
use std::path::{Path, PathBuf};

/// One `src -> dest` pair from config (requires.dirs/files, bundles.dirs/
/// files). `dest` is relative to the app's working dir; a trailing `/`
/// means "append the source's basename" (spec.md section 4.3).
#[derive(Debug, Clone)]
pub struct LinkEntry {
    pub src: PathBuf,
    pub dest: String,
}

#[derive(Debug, Clone)]
pub struct DeviceRequirement {
    pub src: PathBuf,
    pub dest: String,
    pub readable: bool,
    pub writable: bool,
}

/// `requires.dirs` / `requires.files` / `requires.devices` from spec.md
/// section 6.
#[derive(Debug, Clone, Default)]
pub struct RequiresSpec {
    pub dirs: Vec<LinkEntry>,
    pub files: Vec<LinkEntry>,
    pub devices: Vec<DeviceRequirement>,
}

/// `bundles.dirs` / `bundles.files` from spec.md section 6. Writable
/// bundles are assumed already copied by the installer and are skipped.
#[derive(Debug, Clone)]
pub struct BundleEntry {
    pub src: PathBuf,
    pub dest: String,
    pub writable: bool,
}

/// The `bundles` config node, split into directory and file entries the
/// same way `requires` is split — config carries that distinction, so
/// nothing here needs to stat a source to tell them apart.
#[derive(Debug, Clone, Default)]
pub struct BundlesSpec {
    pub dirs: Vec<BundleEntry>,
    pub files: Vec<BundleEntry>,
}

/// Mode for intermediate directories along a link's destination path:
/// `u=rx, o=rx` (spec.md section 4.3).
pub const INTERMEDIATE_DIR_MODE: u32 = 0o505;

/// Mode for the app's working dir and other directories the link-creation
/// machinery materializes directly: `u=rx, o=rwx`.
pub const APP_DIR_MODE: u32 = 0o507;

fn is_pseudo_fs(src: &Path) -> bool {
    src.starts_with("/proc") || src.starts_with("/sys")
}

/// Computes the absolute destination path under `working_dir` for a link
/// whose configured destination is `dest` and whose source is `src`
/// (spec.md section 4.3's "destination paths that end in `/`" rule).
pub fn abs_dest_path(working_dir: &Path, dest: &str, src: &Path) -> PathBuf {
    let relative = dest.trim_start_matches('/');
    if dest.ends_with('/') {
        let basename = src.file_name().unwrap_or_default();
        working_dir.join(relative).join(basename)
    } else {
        working_dir.join(relative)
    }
}

fn create_intermediate_dirs(
    dir_util: &dyn DirUtil,
    labels: &dyn LabelService,
    dest_path: &Path,
    label: &Label,
) -> Result<(), SupervisorError> {
    if let Some(parent) = dest_path.parent() {
        dir_util.mkdir_p(parent, INTERMEDIATE_DIR_MODE)?;
        labels.set_file_label(parent, label)?;
    }
    Ok(())
}

/// Links a directory `src` to `dest_path` (spec.md section 4.3's bind-mount
/// vs. symlink split). Idempotent: a directory that is already a mount
/// point (sandboxed) or a correct symlink (unsandboxed) is left alone.
pub fn link_dir(
    dir_util: &dyn DirUtil,
    labels: &dyn LabelService,
    sandboxed: bool,
    src: &Path,
    dest_path: &Path,
    label: &Label,
) -> Result<(), SupervisorError> {
    if !dir_util.exists(src) {
        return Err(SupervisorError::NotFound(format!("link source '{}' does not exist", src.display())));
    }
    if !is_pseudo_fs(src) && !dir_util.is_dir_entry(src)? {
        return Err(SupervisorError::Fault(format!("link source '{}' is not a directory", src.display())));
    }

    create_intermediate_dirs(dir_util, labels, dest_path, label)?;

    if sandboxed {
        if dir_util.is_mount_point(dest_path)? {
            return Ok(());
        }
        dir_util.mkdir_p(dest_path, INTERMEDIATE_DIR_MODE)?;
        labels.set_file_label(dest_path, label)?;
        dir_util.bind_mount(src, dest_path)?;
    } else {
        av_adapters::ensure_symlink(dir_util, src, dest_path)?;
    }
    tracing::info!(src = %src.display(), dest = %dest_path.display(), "created directory link");
    Ok(())
}

/// Links a non-directory `src` to `dest_path` (spec.md section 4.3).
pub fn link_file(
    dir_util: &dyn DirUtil,
    labels: &dyn LabelService,
    sandboxed: bool,
    src: &Path,
    dest_path: &Path,
    label: &Label,
) -> Result<(), SupervisorError> {
    if !dir_util.exists(src) {
        return Err(SupervisorError::NotFound(format!("link source '{}' does not exist", src.display())));
    }
    if dir_util.is_dir_entry(src)? {
        return Err(SupervisorError::Fault(format!("link source '{}' is a directory", src.display())));
    }

    create_intermediate_dirs(dir_util, labels, dest_path, label)?;

    if sandboxed {
        if dir_util.exists(dest_path) {
            return Ok(());
        }
        dir_util.touch(dest_path)?;
        dir_util.bind_mount(src, dest_path)?;
    } else {
        av_adapters::ensure_symlink(dir_util, src, dest_path)?;
    }
    tracing::info!(src = %src.display(), dest = %dest_path.display(), "created file link");
    Ok(())
}

/// Links one config `LinkEntry` whose source may be a directory, a regular
/// file, or a `/proc`/`/sys` pseudo-filesystem entry (linked as a whole
/// directory regardless of the actual entry kind, since userspace cannot
/// create files inside a pseudo-filesystem — spec.md section 4.3).
pub fn link_entry(
    dir_util: &dyn DirUtil,
    labels: &dyn LabelService,
    sandboxed: bool,
    working_dir: &Path,
    entry: &LinkEntry,
    label: &Label,
) -> Result<(), SupervisorError> {
    let dest_path = abs_dest_path(working_dir, &entry.dest, &entry.src);
    if is_pseudo_fs(&entry.src) {
        return link_dir(dir_util, labels, sandboxed, &entry.src, &dest_path, label);
    }
    link_file(dir_util, labels, sandboxed, &entry.src, &dest_path, label)
}

/// Recursively links every file under `src` into `dest` under
/// `working_dir`, file-by-file (spec.md section 4.3 step 4, for
/// `read-only/lib` -> `/lib` and `read-only/bin` -> `/bin`), unless `src`
/// is itself a `/proc`/`/sys` entry, in which case it's linked whole.
#[allow(clippy::too_many_arguments)]
pub fn recursively_create_links(
    dir_util: &dyn DirUtil,
    labels: &dyn LabelService,
    sandboxed: bool,
    working_dir: &Path,
    src: &Path,
    dest: &str,
    label: &Label,
) -> Result<(), SupervisorError> {
    if is_pseudo_fs(src) {
        let dest_path = abs_dest_path(working_dir, dest, src);
        return link_dir(dir_util, labels, sandboxed, src, &dest_path, label);
    }

    if !dir_util.exists(src) {
        tracing::debug!(src = %src.display(), "recursive link source absent, skipping");
        return Ok(());
    }

    walk(dir_util, labels, sandboxed, working_dir, src, dest, label)
}

#[allow(clippy::too_many_arguments)]
fn walk(
    dir_util: &dyn DirUtil,
    labels: &dyn LabelService,
    sandboxed: bool,
    working_dir: &Path,
    src_root: &Path,
    dest_root: &str,
    label: &Label,
) -> Result<(), SupervisorError> {
    let mut stack = vec![src_root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for child in std::fs::read_dir(&dir)?.filter_map(|e| e.ok()) {
            let path = child.path();
            let file_type = child.file_type()?;
            let rel = path.strip_prefix(src_root).unwrap_or(&path);
            let dest = format!("{}/{}", dest_root.trim_end_matches('/'), rel.display());
            if file_type.is_dir() {
                stack.push(path);
            } else {
                let dest_path = working_dir.join(dest.trim_start_matches('/'));
                link_file(dir_util, labels, sandboxed, &path, &dest_path, label)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "links_tests.rs"]
mod tests;
