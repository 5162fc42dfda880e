//! Scenario 1 (sandboxed happy path): an app with one proc whose exec is
//! `/bin/true` and no requires/bundles. After `create`/`mount_tmp`/`start`,
//! the working dir is a mount point, `/tmp` is tmpfs, the default links
//! exist, the proc runs to completion, and the SIGCHLD it generates
//! transitions the app to `Stopped`.

use av_adapters::cgroup::fake::FakeCgroupService;
use av_adapters::dirutil::fake::FakeDirUtil;
use av_adapters::executor::fake::{exit_success, FakeProcessExecutor};
use av_adapters::killhelper::fake::FakeKillHelper;
use av_adapters::label::fake::FakeLabelService;
use av_adapters::reslimit::fake::FakeResourceLimiter;
use av_adapters::timer::ClockTimerService;
use av_adapters::{DirUtil, Priority, ProcDescriptor, ProcessExecutor, ResourceLimits, StdioTarget};
use av_core::{AppName, AppState, FakeClock, FaultAction, Gid, Label, ProcName, Uid, WatchdogAction};
use av_engine::{App, ProcContainer, Supervisor};
use av_sandbox::area::APP_TMPFS_SIZE;
use av_sandbox::{AppArea, RuntimeAreaBuilder};
use std::path::Path;
use tempfile::TempDir;

/// Every default device/library link `RuntimeAreaBuilder::create` requires
/// present for a sandboxed app, registered by hand since `av-sandbox`'s own
/// architecture-specific list is private to that crate.
fn register_default_links(dirs: &FakeDirUtil) {
    for dev in ["/dev/log", "/dev/null", "/dev/zero"] {
        dirs.touch(Path::new(dev)).unwrap();
    }
    let libs: &[&str] = if cfg!(target_arch = "x86_64") {
        &["/lib/ld-linux-x86-64.so.2", "/lib/libc.so.6", "/lib/libpthread.so.0", "/lib/librt.so.1", "/lib/libdl.so.2", "/lib/libgcc_s.so.1", "/lib/libm.so.6", "/usr/lib/libstdc++.so.6"]
    } else {
        &[]
    };
    for lib in libs {
        dirs.touch(Path::new(lib)).unwrap();
    }
    dirs.touch(Path::new("/legato/systems/current/lib/liblegato.so")).unwrap();
}

fn real_install_dir(dirs: &FakeDirUtil) -> (TempDir, std::path::PathBuf) {
    let tmp = tempfile::tempdir().unwrap();
    let install_dir = tmp.path().join("myApp");
    std::fs::create_dir_all(install_dir.join("read-only/lib")).unwrap();
    std::fs::create_dir_all(install_dir.join("read-only/bin")).unwrap();
    dirs.mkdir_p(&install_dir.join("read-only/lib"), 0o755).unwrap();
    dirs.mkdir_p(&install_dir.join("read-only/bin"), 0o755).unwrap();
    (tmp, install_dir)
}

#[test]
fn sandboxed_app_with_one_proc_runs_to_completion_and_settles_stopped() {
    let dirs = FakeDirUtil::new();
    let labels = FakeLabelService::new();
    register_default_links(&dirs);
    let (_tmp, install_dir) = real_install_dir(&dirs);

    let area = AppArea {
        working_dir: "/appsWriteable/myApp".into(),
        install_dir,
        sandboxed: true,
        app_label: Label::new("app.myApp"),
    };
    let area_builder = RuntimeAreaBuilder::new(&dirs, &labels);

    area_builder.create(&area).unwrap();
    area_builder.mount_tmp(&area).unwrap();

    assert!(dirs.is_mount_point(&area.working_dir).unwrap());
    assert!(dirs.is_mount_point(&area.working_dir.join("tmp")).unwrap());
    assert_eq!(dirs.tmpfs_opts_for(&area.working_dir.join("tmp")), Some((APP_TMPFS_SIZE, 0o007, 0, 0)));
    assert!(dirs.is_mount_point(Path::new("/appsWriteable/myApp/dev/log")).unwrap());

    let executor = FakeProcessExecutor;
    let desc = ProcDescriptor {
        name: ProcName::new("proc1"),
        exec_path: "/bin/true".into(),
        args: Vec::new(),
        priority: Priority::Medium,
        fault_action: FaultAction::Ignore,
        watchdog_action: WatchdogAction::NotFound,
        stdio: [StdioTarget::Inherit, StdioTarget::Inherit, StdioTarget::Inherit],
    };
    let handle = executor.create(desc.clone());
    let container = ProcContainer::new(handle, desc);
    let mut app = App::new(
        AppName::new("myApp"),
        true,
        "/legato/apps/myApp".into(),
        area.working_dir.clone(),
        Uid(1000),
        Gid(1000),
        Vec::new(),
        ResourceLimits::unlimited(),
        vec![container],
    );

    let cgroup = FakeCgroupService::new();
    let clock = FakeClock::new();
    let timers = ClockTimerService::new(clock);
    let kill_helper = FakeKillHelper::new();
    let resource_limiter = FakeResourceLimiter::new();
    let sup = Supervisor::new(&cgroup, &timers, &kill_helper, &executor, &resource_limiter);

    sup.start(&mut app).unwrap();
    assert_eq!(app.state(), AppState::Running);

    let pid = app.procs[0].handle().pid().unwrap();
    // No freezer membership registered for this pid: the freeze group
    // reports empty as soon as the process exits.
    sup.sig_child_handler(&mut app, pid, exit_success()).unwrap();

    assert_eq!(app.state(), AppState::Stopped);
    assert!(!app.kill_timer_armed());
}
