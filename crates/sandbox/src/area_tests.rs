use super::*;
use av_adapters::dirutil::fake::FakeDirUtil;
use av_adapters::label::fake::FakeLabelService;
use std::path::Path;
use tempfile::TempDir;

fn sandboxed_area(install_dir: impl Into<PathBuf>) -> AppArea {
    AppArea {
        working_dir: "/appsWriteable/myApp".into(),
        install_dir: install_dir.into(),
        sandboxed: true,
        app_label: Label::new("app.myApp"),
    }
}

fn unsandboxed_area(install_dir: impl Into<PathBuf>) -> AppArea {
    AppArea {
        working_dir: "/appsWriteable/myApp".into(),
        install_dir: install_dir.into(),
        sandboxed: false,
        app_label: Label::new("app.myApp"),
    }
}

/// The lib/bin walk reads the install dir's tree via real `std::fs`
/// (`links::walk`), so every test exercising `create()` needs an actual
/// directory on disk, not just `FakeDirUtil` state. `dirs` still needs the
/// same paths registered so `DirUtil::exists` reports them present.
fn real_install_dir(dirs: &FakeDirUtil) -> (TempDir, PathBuf) {
    let tmp = tempfile::tempdir().unwrap();
    let install_dir = tmp.path().join("myApp");
    std::fs::create_dir_all(install_dir.join("read-only/lib")).unwrap();
    std::fs::create_dir_all(install_dir.join("read-only/bin")).unwrap();
    dirs.mkdir_p(&install_dir.join("read-only/lib"), 0o755).unwrap();
    dirs.mkdir_p(&install_dir.join("read-only/bin"), 0o755).unwrap();
    (tmp, install_dir)
}

/// Registers the default device nodes and runtime libraries that, on a
/// real target, are always present. `create()` hard-fails on a sandboxed
/// app if any of these are missing (spec.md section 4.3: "default links
/// must work otherwise there is something very wrong"), so sandboxed
/// `create()` tests need them registered in the fake filesystem.
fn register_default_links(dirs: &FakeDirUtil) {
    dirs.touch(Path::new("/dev/log")).unwrap();
    dirs.touch(Path::new("/dev/null")).unwrap();
    dirs.touch(Path::new("/dev/zero")).unwrap();
    for lib in super::default_system_links() {
        dirs.touch(Path::new(lib)).unwrap();
    }
    dirs.touch(Path::new(super::CURRENT_SYSTEM_LIB)).unwrap();
}

#[test]
fn create_materializes_the_working_dir_with_the_app_label() {
    let dirs = FakeDirUtil::new();
    let labels = FakeLabelService::new();
    let (_tmp, install_dir) = real_install_dir(&dirs);
    let area = unsandboxed_area(&install_dir);
    let builder = RuntimeAreaBuilder::new(&dirs, &labels);

    builder.create(&area).unwrap();

    assert!(dirs.is_dir(&area.working_dir));
    assert_eq!(labels.file_label(&area.working_dir), Some(area.app_label.clone()));
}

#[test]
fn create_bind_mounts_working_dir_onto_itself_when_sandboxed() {
    let dirs = FakeDirUtil::new();
    register_default_links(&dirs);
    let labels = FakeLabelService::new();
    let (_tmp, install_dir) = real_install_dir(&dirs);
    let area = sandboxed_area(&install_dir);
    let builder = RuntimeAreaBuilder::new(&dirs, &labels);

    builder.create(&area).unwrap();

    assert!(dirs.is_mount_point(&area.working_dir).unwrap());
}

#[test]
fn create_is_a_no_op_on_the_self_bind_mount_when_already_mounted() {
    let dirs = FakeDirUtil::new();
    register_default_links(&dirs);
    let labels = FakeLabelService::new();
    let (_tmp, install_dir) = real_install_dir(&dirs);
    let area = sandboxed_area(&install_dir);
    let builder = RuntimeAreaBuilder::new(&dirs, &labels);

    builder.create(&area).unwrap();
    builder.create(&area).unwrap();

    assert!(dirs.is_mount_point(&area.working_dir).unwrap());
}

#[test]
fn create_links_default_devices_and_system_libraries_when_sandboxed() {
    let dirs = FakeDirUtil::new();
    register_default_links(&dirs);
    let labels = FakeLabelService::new();
    let (_tmp, install_dir) = real_install_dir(&dirs);
    let area = sandboxed_area(&install_dir);
    let builder = RuntimeAreaBuilder::new(&dirs, &labels);

    builder.create(&area).unwrap();

    assert!(dirs.is_mount_point(Path::new("/appsWriteable/myApp/dev/log")).unwrap());
    assert!(dirs.is_mount_point(Path::new("/appsWriteable/myApp/dev/null")).unwrap());
    assert!(dirs.is_mount_point(Path::new("/appsWriteable/myApp/dev/zero")).unwrap());
}

#[test]
fn create_links_lib_and_bin_trees_for_both_sandboxed_and_unsandboxed_apps() {
    let dirs = FakeDirUtil::new();
    let (_tmp, install_dir) = real_install_dir(&dirs);
    std::fs::write(install_dir.join("read-only/bin/myExe"), b"").unwrap();

    let labels = FakeLabelService::new();
    let area = unsandboxed_area(&install_dir);
    let builder = RuntimeAreaBuilder::new(&dirs, &labels);

    builder.create(&area).unwrap();

    assert_eq!(
        dirs.read_link(Path::new("/appsWriteable/myApp/bin/myExe")).unwrap().as_deref(),
        Some(install_dir.join("read-only/bin/myExe").as_path())
    );
}

#[test]
fn create_bundled_links_skips_writable_entries() {
    let dirs = FakeDirUtil::new();
    let (_tmp, install_dir) = real_install_dir(&dirs);
    dirs.touch(Path::new("/legato/apps/myApp/files/config.cfg")).unwrap();
    dirs.touch(Path::new("/legato/apps/myApp/files/state.db")).unwrap();
    let labels = FakeLabelService::new();
    let area = unsandboxed_area(&install_dir);
    let builder = RuntimeAreaBuilder::new(&dirs, &labels);
    builder.create(&area).unwrap();

    let bundles = BundlesSpec {
        dirs: Vec::new(),
        files: vec![
            BundleEntry { src: "/legato/apps/myApp/files/config.cfg".into(), dest: "/config.cfg".into(), writable: false },
            BundleEntry { src: "/legato/apps/myApp/files/state.db".into(), dest: "/state.db".into(), writable: true },
        ],
    };

    builder.create_bundled_links(&area, &bundles).unwrap();

    assert!(dirs.exists(Path::new("/appsWriteable/myApp/config.cfg")));
    assert!(!dirs.exists(Path::new("/appsWriteable/myApp/state.db")));
}

#[test]
fn create_required_links_links_dirs_files_and_devices() {
    let dirs = FakeDirUtil::new();
    let (_tmp, install_dir) = real_install_dir(&dirs);
    dirs.mkdir_p(Path::new("/usr/share/data"), 0o755).unwrap();
    dirs.touch(Path::new("/etc/resolv.conf")).unwrap();
    dirs.touch(Path::new("/dev/ttyS0")).unwrap();
    let labels = FakeLabelService::new();
    let area = unsandboxed_area(&install_dir);
    let builder = RuntimeAreaBuilder::new(&dirs, &labels);
    builder.create(&area).unwrap();

    let requires = RequiresSpec {
        dirs: vec![LinkEntry { src: "/usr/share/data".into(), dest: "/data".into() }],
        files: vec![LinkEntry { src: "/etc/resolv.conf".into(), dest: "/etc/resolv.conf".into() }],
        devices: vec![DeviceRequirement {
            src: "/dev/ttyS0".into(),
            dest: "/dev/".into(),
            readable: true,
            writable: true,
        }],
    };

    builder.create_required_links(&area, &requires).unwrap();

    assert_eq!(
        dirs.read_link(Path::new("/appsWriteable/myApp/data")).unwrap().as_deref(),
        Some(Path::new("/usr/share/data"))
    );
    assert_eq!(
        dirs.read_link(Path::new("/appsWriteable/myApp/etc/resolv.conf")).unwrap().as_deref(),
        Some(Path::new("/etc/resolv.conf"))
    );
    assert_eq!(
        dirs.read_link(Path::new("/appsWriteable/myApp/dev/ttyS0")).unwrap().as_deref(),
        Some(Path::new("/dev/ttyS0"))
    );
}

#[test]
fn mount_tmp_is_a_no_op_when_unsandboxed() {
    let dirs = FakeDirUtil::new();
    let labels = FakeLabelService::new();
    let area = unsandboxed_area("/legato/apps/myApp");
    let builder = RuntimeAreaBuilder::new(&dirs, &labels);

    builder.mount_tmp(&area).unwrap();

    assert!(!dirs.is_mount_point(&area.working_dir.join("tmp")).unwrap());
}

#[test]
fn mount_tmp_mounts_a_tmpfs_with_the_expected_options_when_sandboxed() {
    let dirs = FakeDirUtil::new();
    let labels = FakeLabelService::new();
    let area = sandboxed_area("/legato/apps/myApp");
    let builder = RuntimeAreaBuilder::new(&dirs, &labels);

    builder.mount_tmp(&area).unwrap();

    let tmp_path = area.working_dir.join("tmp");
    assert!(dirs.is_mount_point(&tmp_path).unwrap());
    assert_eq!(dirs.tmpfs_opts_for(&tmp_path), Some((APP_TMPFS_SIZE, 0o007, 0, 0)));
}

#[test]
fn mount_tmp_links_service_directory_sockets_when_present() {
    let dirs = FakeDirUtil::new();
    dirs.touch(Path::new("/run/legato/serviceDirectoryServer.socket")).unwrap();
    let labels = FakeLabelService::new();
    let area = sandboxed_area("/legato/apps/myApp");
    let builder = RuntimeAreaBuilder::new(&dirs, &labels);

    builder.mount_tmp(&area).unwrap();

    assert!(dirs.is_mount_point(&area.working_dir.join("tmp/legato/serviceDirectoryServer.socket")).unwrap());
}

#[test]
fn mount_tmp_skips_sockets_that_are_not_present() {
    let dirs = FakeDirUtil::new();
    let labels = FakeLabelService::new();
    let area = sandboxed_area("/legato/apps/myApp");
    let builder = RuntimeAreaBuilder::new(&dirs, &labels);

    builder.mount_tmp(&area).unwrap();
}

#[test]
fn teardown_unmounts_tmp_and_the_working_dir_when_sandboxed() {
    let dirs = FakeDirUtil::new();
    register_default_links(&dirs);
    let labels = FakeLabelService::new();
    let (_tmp, install_dir) = real_install_dir(&dirs);
    let area = sandboxed_area(&install_dir);
    let builder = RuntimeAreaBuilder::new(&dirs, &labels);
    builder.create(&area).unwrap();
    builder.mount_tmp(&area).unwrap();

    builder.teardown(&area).unwrap();

    assert!(!dirs.is_mount_point(&area.working_dir).unwrap());
    assert!(!dirs.is_mount_point(&area.working_dir.join("tmp")).unwrap());
}

#[test]
fn teardown_is_a_no_op_when_unsandboxed() {
    let dirs = FakeDirUtil::new();
    let labels = FakeLabelService::new();
    let area = unsandboxed_area("/legato/apps/myApp");
    let builder = RuntimeAreaBuilder::new(&dirs, &labels);

    builder.teardown(&area).unwrap();
}
