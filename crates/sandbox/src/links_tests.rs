use super::*;
use av_adapters::dirutil::fake::FakeDirUtil;
use av_adapters::label::fake::FakeLabelService;
use std::path::Path;

#[test]
fn abs_dest_path_appends_basename_when_dest_ends_in_slash() {
    let working_dir = Path::new("/app");
    let src = Path::new("/usr/lib/libfoo.so");
    let dest = abs_dest_path(working_dir, "/lib/", src);
    assert_eq!(dest, Path::new("/app/lib/libfoo.so"));
}

#[test]
fn abs_dest_path_uses_dest_verbatim_when_it_does_not_end_in_slash() {
    let working_dir = Path::new("/app");
    let src = Path::new("/usr/lib/libfoo.so");
    let dest = abs_dest_path(working_dir, "/lib/libbar.so", src);
    assert_eq!(dest, Path::new("/app/lib/libbar.so"));
}

#[test]
fn link_dir_bind_mounts_when_sandboxed() {
    let dirs = FakeDirUtil::new();
    dirs.mkdir_p(Path::new("/usr/share/data"), 0o755).unwrap();
    let labels = FakeLabelService::new();
    let label = Label::new("app.myApp");

    link_dir(&dirs, &labels, true, Path::new("/usr/share/data"), Path::new("/app/data"), &label).unwrap();

    assert!(dirs.is_mount_point(Path::new("/app/data")).unwrap());
}

#[test]
fn link_dir_is_idempotent_when_already_mounted() {
    let dirs = FakeDirUtil::new();
    dirs.mkdir_p(Path::new("/usr/share/data"), 0o755).unwrap();
    let labels = FakeLabelService::new();
    let label = Label::new("app.myApp");

    link_dir(&dirs, &labels, true, Path::new("/usr/share/data"), Path::new("/app/data"), &label).unwrap();
    link_dir(&dirs, &labels, true, Path::new("/usr/share/data"), Path::new("/app/data"), &label).unwrap();

    assert!(dirs.is_mount_point(Path::new("/app/data")).unwrap());
}

#[test]
fn link_dir_symlinks_when_unsandboxed() {
    let dirs = FakeDirUtil::new();
    dirs.mkdir_p(Path::new("/usr/share/data"), 0o755).unwrap();
    let labels = FakeLabelService::new();
    let label = Label::new("app.myApp");

    link_dir(&dirs, &labels, false, Path::new("/usr/share/data"), Path::new("/app/data"), &label).unwrap();

    assert_eq!(dirs.read_link(Path::new("/app/data")).unwrap().as_deref(), Some(Path::new("/usr/share/data")));
}

#[test]
fn link_dir_fails_when_source_is_missing() {
    let dirs = FakeDirUtil::new();
    let labels = FakeLabelService::new();
    let label = Label::new("app.myApp");

    let err = link_dir(&dirs, &labels, true, Path::new("/does/not/exist"), Path::new("/app/data"), &label).unwrap_err();
    assert!(matches!(err, SupervisorError::NotFound(_)));
}

#[test]
fn link_dir_fails_when_source_is_a_regular_file() {
    let dirs = FakeDirUtil::new();
    dirs.touch(Path::new("/etc/resolv.conf")).unwrap();
    let labels = FakeLabelService::new();
    let label = Label::new("app.myApp");

    let err = link_dir(&dirs, &labels, true, Path::new("/etc/resolv.conf"), Path::new("/app/resolv.conf"), &label)
        .unwrap_err();
    assert!(matches!(err, SupervisorError::Fault(_)));
}

#[test]
fn link_file_fails_when_source_is_a_directory() {
    let dirs = FakeDirUtil::new();
    dirs.mkdir_p(Path::new("/usr/share/data"), 0o755).unwrap();
    let labels = FakeLabelService::new();
    let label = Label::new("app.myApp");

    let err = link_file(&dirs, &labels, true, Path::new("/usr/share/data"), Path::new("/app/data"), &label).unwrap_err();
    assert!(matches!(err, SupervisorError::Fault(_)));
}

#[test]
fn link_file_bind_mounts_when_sandboxed() {
    let dirs = FakeDirUtil::new();
    dirs.touch(Path::new("/etc/resolv.conf")).unwrap();
    let labels = FakeLabelService::new();
    let label = Label::new("app.myApp");

    link_file(&dirs, &labels, true, Path::new("/etc/resolv.conf"), Path::new("/app/etc/resolv.conf"), &label).unwrap();

    assert!(dirs.is_mount_point(Path::new("/app/etc/resolv.conf")).unwrap());
}

#[test]
fn link_file_symlinks_when_unsandboxed() {
    let dirs = FakeDirUtil::new();
    dirs.touch(Path::new("/etc/resolv.conf")).unwrap();
    let labels = FakeLabelService::new();
    let label = Label::new("app.myApp");

    link_file(&dirs, &labels, false, Path::new("/etc/resolv.conf"), Path::new("/app/etc/resolv.conf"), &label).unwrap();

    assert_eq!(
        dirs.read_link(Path::new("/app/etc/resolv.conf")).unwrap().as_deref(),
        Some(Path::new("/etc/resolv.conf"))
    );
}

#[test]
fn link_entry_dispatches_proc_sources_as_directory_links() {
    let dirs = FakeDirUtil::new();
    dirs.mkdir_p(Path::new("/proc"), 0o755).unwrap();
    let labels = FakeLabelService::new();
    let label = Label::new("app.myApp");

    let entry = LinkEntry { src: "/proc".into(), dest: "/proc".into() };
    link_entry(&dirs, &labels, true, Path::new("/app"), &entry, &label).unwrap();

    assert!(dirs.is_mount_point(Path::new("/app/proc")).unwrap());
}

#[test]
fn recursively_create_links_skips_a_missing_source_without_error() {
    let dirs = FakeDirUtil::new();
    let labels = FakeLabelService::new();
    let label = Label::new("app.myApp");

    recursively_create_links(&dirs, &labels, true, Path::new("/app"), Path::new("/does/not/exist"), "/lib", &label)
        .unwrap();
}

#[test]
fn recursively_create_links_walks_a_real_directory_tree() {
    let tmp = tempfile::tempdir().unwrap();
    let lib_dir = tmp.path().join("lib");
    std::fs::create_dir_all(lib_dir.join("sub")).unwrap();
    std::fs::write(lib_dir.join("libfoo.so"), b"").unwrap();
    std::fs::write(lib_dir.join("sub").join("libbar.so"), b"").unwrap();

    let dirs = FakeDirUtil::new();
    dirs.mkdir_p(&lib_dir, 0o755).unwrap();
    let labels = FakeLabelService::new();
    let label = Label::new("app.myApp");

    recursively_create_links(&dirs, &labels, true, Path::new("/app"), &lib_dir, "/lib", &label).unwrap();

    assert!(dirs.is_mount_point(Path::new("/app/lib/libfoo.so")).unwrap());
    assert!(dirs.is_mount_point(Path::new("/app/lib/sub/libbar.so")).unwrap());
}

#[test]
fn recursively_create_links_whole_dir_links_a_pseudo_fs_source() {
    let dirs = FakeDirUtil::new();
    dirs.mkdir_p(Path::new("/sys"), 0o755).unwrap();
    let labels = FakeLabelService::new();
    let label = Label::new("app.myApp");

    recursively_create_links(&dirs, &labels, true, Path::new("/app"), Path::new("/sys"), "/sys", &label).unwrap();

    assert!(dirs.is_mount_point(Path::new("/app/sys")).unwrap());
}
