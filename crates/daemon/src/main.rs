// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `avd`: loads the system and per-app config, builds every app's runtime
//! area and identity/MAC policy (spec.md sections 4.3 and 4.4), then hands
//! the populated apps to the lifecycle engine's event loop.

use av_adapters::config::ConfigStore;
use av_adapters::{
    LinuxCgroupService, LinuxDirUtil, LinuxIdentityService, LinuxKillHelper, LinuxLabelService, LinuxProcessExecutor,
    LinuxResourceLimiter, LinuxTimerService, ProcessExecutor, TomlConfigStore,
};
use av_core::{AppName, SystemClock};
use av_daemon::{config, env, logging, Daemon, SystemConfig};
use av_engine::{App, ProcContainer};
use av_sandbox::{AppArea, IdentityAndPolicy, RuntimeAreaBuilder};
use std::collections::HashMap;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;

fn load_apps(
    cfg: &impl ConfigStore,
    system: &SystemConfig,
    dir_util: &LinuxDirUtil,
    labels: &LinuxLabelService,
    identity_and_policy: &IdentityAndPolicy<'_>,
    area_builder: &RuntimeAreaBuilder<'_>,
    executor: &LinuxProcessExecutor,
) -> (Vec<App<av_adapters::LinuxProcessHandle>>, HashMap<AppName, av_core::WatchdogAction>) {
    let mut apps = Vec::new();
    let mut watchdog_fallbacks = HashMap::new();

    for app_name in cfg.read_txn("/apps").children() {
        let app_root = format!("/apps/{app_name}");
        let sandboxed = config::read_sandboxed(cfg, &app_root);
        let groups = config::read_group_names(cfg, &app_root);
        let bindings = config::read_bindings(cfg, &app_root);
        let requires = config::read_requires(cfg, &app_root);
        let bundles = config::read_bundles(cfg, &app_root);
        let proc_descriptors = config::read_proc_descriptors(cfg, &app_root);
        let resource_limits = config::read_resource_limits(cfg, &app_root);
        watchdog_fallbacks.insert(AppName::new(&app_name), config::read_app_watchdog_action(cfg, &app_root));

        let identity = match identity_and_policy.derive_identity(&app_name, sandboxed, &groups) {
            Ok(id) => id,
            Err(e) => {
                tracing::error!(app = %app_name, error = %e, "failed to derive identity, skipping app");
                continue;
            }
        };

        let working_dir = system.apps_writeable_dir.join(&app_name);
        let install_dir = system.apps_install_dir.join(&app_name).join("read-only");
        let app_label = labels.app_label(&app_name);
        let area = AppArea { working_dir: working_dir.clone(), install_dir, sandboxed, app_label };

        let built = area_builder
            .create(&area)
            .and_then(|()| area_builder.create_bundled_links(&area, &bundles))
            .and_then(|()| area_builder.create_required_links(&area, &requires))
            .and_then(|()| if sandboxed { area_builder.mount_tmp(&area) } else { Ok(()) })
            .and_then(|()| identity_and_policy.program_mac(&app_name, &bindings, &requires.devices));

        if let Err(e) = built {
            tracing::error!(app = %app_name, error = %e, "failed to build runtime area, skipping app");
            continue;
        }

        let procs = proc_descriptors
            .into_iter()
            .map(|d| {
                let handle = executor.create(d.clone());
                ProcContainer::new(handle, d)
            })
            .collect();

        apps.push(App::new(
            AppName::new(&app_name),
            sandboxed,
            area.install_dir.clone(),
            working_dir,
            identity.uid,
            identity.gid,
            identity.supplement_gids,
            resource_limits,
            procs,
        ));
    }

    (apps, watchdog_fallbacks)
}

#[tokio::main]
async fn main() -> ExitCode {
    logging::init(&env::log_filter());

    let system = match SystemConfig::from_file(&env::system_config_path()) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "failed to load system config");
            return ExitCode::FAILURE;
        }
    };

    let cfg = match TomlConfigStore::from_file(&system.apps_config_path) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "failed to load app config");
            return ExitCode::FAILURE;
        }
    };

    let dir_util = LinuxDirUtil::new();
    let labels = LinuxLabelService::new();
    let identity_service = LinuxIdentityService::new(system.passwd_path.clone(), system.group_path.clone());
    let identity_and_policy = IdentityAndPolicy::new(&identity_service, &labels, &dir_util);
    let area_builder = RuntimeAreaBuilder::new(&dir_util, &labels);
    let executor = LinuxProcessExecutor;

    let (apps, watchdog_fallbacks) =
        load_apps(&cfg, &system, &dir_util, &labels, &identity_and_policy, &area_builder, &executor);

    let cgroup = LinuxCgroupService::new(system.freezer_cgroup_root.clone());
    let timers = LinuxTimerService::new(SystemClock);
    let kill_helper = LinuxKillHelper::new();
    let resource_limiter = LinuxResourceLimiter::new();

    let daemon = Daemon::new(cgroup, timers, kill_helper, executor, resource_limiter, apps, watchdog_fallbacks);

    let cancel = CancellationToken::new();
    let shutdown_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            shutdown_signal.cancel();
        }
    });

    daemon.run(env::kill_timer_poll_interval(), cancel).await;
    ExitCode::SUCCESS
}
