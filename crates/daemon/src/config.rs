// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Loads the on-disk config tree into the typed structs `av-sandbox` and
//! `av-engine` expect (spec.md section 6's "config-tree paths consumed").
//!
//! Reading is generic over `ConfigStore` rather than `dyn`: the trait's
//! `Txn<'a>` associated type is a GAT, which makes `ConfigStore` not
//! object-safe. Every function here is parameterized `<C: ConfigStore>` and
//! takes the app's config root (e.g. `/apps/myApp`) as a plain path string.
//!
//! Numbered list paths (`groups/<i>`, `bindings/<i>/app`,
//! `requires/dirs/<i>/*`, ...) must be authored on disk as TOML *tables*
//! keyed by numeric strings (`[apps.myApp.groups]` with `0 = "video"`, or
//! `[apps.myApp.requires.dirs.0]`), never as `[[array]]` syntax:
//! `toml::Value`'s `Index` impl resolves on the static type of the index
//! (`usize` for arrays, `&str` for tables), and `TomlTxn` always navigates
//! with string cursor segments, so a real TOML array never round-trips
//! through `go_to`/`get_string`.

use av_core::{FaultAction, ProcName, SupervisorError, WatchdogAction};
use av_adapters::config::{CfgTxn, ConfigStore};
use av_adapters::executor::{Priority, ProcDescriptor, StdioTarget};
use av_adapters::reslimit::ResourceLimits;
use av_sandbox::links::{BundleEntry, BundlesSpec, DeviceRequirement, LinkEntry, RequiresSpec};
use av_sandbox::policy::Binding;
use serde::Deserialize;
use std::path::PathBuf;

/// Top-level daemon configuration: the handful of filesystem/process paths
/// that aren't per-app (spec.md section 6's "Filesystem layout" plus the
/// identity-service backing files `av-sandbox::policy` needs).
#[derive(Debug, Clone, Deserialize)]
pub struct SystemConfig {
    pub apps_install_dir: PathBuf,
    pub apps_writeable_dir: PathBuf,
    pub apps_config_path: PathBuf,
    pub freezer_cgroup_root: PathBuf,
    pub passwd_path: PathBuf,
    pub group_path: PathBuf,
}

impl SystemConfig {
    pub fn from_file(path: &std::path::Path) -> Result<Self, SupervisorError> {
        let text = std::fs::read_to_string(path)?;
        toml::from_str(&text).map_err(|e| SupervisorError::Fault(format!("invalid system config TOML: {e}")))
    }
}

/// The sandboxing flag at `<app_root>/sandboxed`, defaulting to `true`
/// (spec.md section 6).
pub fn read_sandboxed<C: ConfigStore>(cfg: &C, app_root: &str) -> bool {
    cfg.read_txn(app_root).get_bool("sandboxed", true)
}

/// Reads the supplementary group names at `<app_root>/groups/<i>`, each a
/// string leaf under a numeric child key, in config order.
pub fn read_group_names<C: ConfigStore>(cfg: &C, app_root: &str) -> Vec<String> {
    let txn = cfg.read_txn(&format!("{app_root}/groups"));
    txn.children().iter().map(|i| txn.get_string(i, "")).collect()
}

/// The app-level watchdog action fallback at `<app_root>/watchdogAction`
/// (spec.md section 6's "fallback for procs").
pub fn read_app_watchdog_action<C: ConfigStore>(cfg: &C, app_root: &str) -> WatchdogAction {
    let raw = cfg.read_txn(app_root).get_string("watchdogAction", "");
    WatchdogAction::from_cfg_str(&raw)
}

/// Walks `<app_root>/procs/<procName>/*`, building one `ProcDescriptor` per
/// child whose `exec_path` leaf is non-empty. A process with no `exec_path`
/// is logged and skipped rather than failing the whole load, since a
/// malformed single process shouldn't block every other process in the app.
pub fn read_proc_descriptors<C: ConfigStore>(cfg: &C, app_root: &str) -> Vec<ProcDescriptor> {
    let procs_root = format!("{app_root}/procs");
    let procs_txn = cfg.read_txn(&procs_root);
    let mut out = Vec::new();
    for name in procs_txn.children() {
        let proc_root = format!("{procs_root}/{name}");
        let txn = cfg.read_txn(&proc_root);
        let exec_path = txn.get_string("exec_path", "");
        if exec_path.is_empty() {
            tracing::warn!(proc = %name, "process has no exec_path, skipping");
            continue;
        }
        let priority = match Priority::parse(&txn.get_string("priority", "medium")) {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(proc = %name, error = %e, "invalid priority, defaulting to medium");
                Priority::Medium
            }
        };
        let args_root = format!("{proc_root}/args");
        let args_txn = cfg.read_txn(&args_root);
        let args = args_txn.children().iter().map(|i| args_txn.get_string(i, "")).collect();
        out.push(ProcDescriptor {
            name: ProcName::new(&name),
            exec_path: PathBuf::from(exec_path),
            args,
            priority,
            fault_action: FaultAction::from_cfg_str(&txn.get_string("faultAction", "")),
            watchdog_action: WatchdogAction::from_cfg_str(&txn.get_string("watchdogAction", "")),
            // No config-tree path for stdio redirection is specified; a
            // configured process always starts with its streams inherited,
            // same as `deleteProc`'s reset target for an ad-hoc override.
            stdio: [StdioTarget::Inherit, StdioTarget::Inherit, StdioTarget::Inherit],
        });
    }
    out
}

/// `<app_root>/bindings/<i>/app` (spec.md section 6; empty entries are
/// skipped, matching the "empty means skip" note).
pub fn read_bindings<C: ConfigStore>(cfg: &C, app_root: &str) -> Vec<Binding> {
    let bindings_root = format!("{app_root}/bindings");
    let txn = cfg.read_txn(&bindings_root);
    txn.children()
        .iter()
        .filter_map(|i| {
            let server_app = txn.get_string(&format!("{i}/app"), "");
            if server_app.is_empty() {
                None
            } else {
                Some(Binding { server_app })
            }
        })
        .collect()
}

fn read_link_entries<C: ConfigStore>(cfg: &C, root: &str) -> Vec<LinkEntry> {
    let txn = cfg.read_txn(root);
    txn.children()
        .iter()
        .map(|i| LinkEntry {
            src: PathBuf::from(txn.get_string(&format!("{i}/src"), "")),
            dest: txn.get_string(&format!("{i}/dest"), ""),
        })
        .collect()
}

fn read_device_requirements<C: ConfigStore>(cfg: &C, root: &str) -> Vec<DeviceRequirement> {
    let txn = cfg.read_txn(root);
    txn.children()
        .iter()
        .map(|i| DeviceRequirement {
            src: PathBuf::from(txn.get_string(&format!("{i}/src"), "")),
            dest: txn.get_string(&format!("{i}/dest"), ""),
            readable: txn.get_bool(&format!("{i}/isReadable"), false),
            writable: txn.get_bool(&format!("{i}/isWritable"), false),
        })
        .collect()
}

fn read_bundle_entries<C: ConfigStore>(cfg: &C, root: &str) -> Vec<BundleEntry> {
    let txn = cfg.read_txn(root);
    txn.children()
        .iter()
        .map(|i| BundleEntry {
            src: PathBuf::from(txn.get_string(&format!("{i}/src"), "")),
            dest: txn.get_string(&format!("{i}/dest"), ""),
            writable: txn.get_bool(&format!("{i}/isWritable"), false),
        })
        .collect()
}

/// `<app_root>/requires/{dirs,files,devices}/<i>/*` (spec.md section 6).
pub fn read_requires<C: ConfigStore>(cfg: &C, app_root: &str) -> RequiresSpec {
    RequiresSpec {
        dirs: read_link_entries(cfg, &format!("{app_root}/requires/dirs")),
        files: read_link_entries(cfg, &format!("{app_root}/requires/files")),
        devices: read_device_requirements(cfg, &format!("{app_root}/requires/devices")),
    }
}

/// `<app_root>/bundles/{dirs,files}/<i>/*` (spec.md section 6).
pub fn read_bundles<C: ConfigStore>(cfg: &C, app_root: &str) -> BundlesSpec {
    BundlesSpec {
        dirs: read_bundle_entries(cfg, &format!("{app_root}/bundles/dirs")),
        files: read_bundle_entries(cfg, &format!("{app_root}/bundles/files")),
    }
}

/// `<app_root>/limits/*` (spec.md section 1's resource-limit module): an
/// absent or non-positive leaf means "no limit imposed", matching
/// `ResourceLimits::unlimited`'s `None` fields.
pub fn read_resource_limits<C: ConfigStore>(cfg: &C, app_root: &str) -> ResourceLimits {
    let txn = cfg.read_txn(&format!("{app_root}/limits"));
    let as_limit = |v: i64| if v > 0 { Some(v as u64) } else { None };
    ResourceLimits {
        max_file_descriptors: as_limit(txn.get_int("maxFileDescriptors", 0)),
        max_processes: as_limit(txn.get_int("maxProcesses", 0)),
        core_dump_size: as_limit(txn.get_int("maxCoreDumpFileBytes", 0)),
        max_locked_memory: as_limit(txn.get_int("maxLockedMemoryBytes", 0)),
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
