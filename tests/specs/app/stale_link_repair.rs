//! Scenario 5 (unsandboxed stale-link repair): a symlink at
//! `workingDir/lib/foo.so` already points somewhere wrong when the runtime
//! area is built. Building it again must replace the stale target with the
//! correct one rather than leaving it, or erroring, or doubling it up.

use av_adapters::dirutil::fake::FakeDirUtil;
use av_adapters::label::fake::FakeLabelService;
use av_adapters::DirUtil;
use av_core::Label;
use av_sandbox::{AppArea, RuntimeAreaBuilder};
use std::path::Path;

#[test]
fn a_stale_symlink_is_replaced_with_one_pointing_at_the_right_target() {
    let dirs = FakeDirUtil::new();
    let labels = FakeLabelService::new();

    let tmp = tempfile::tempdir().unwrap();
    let install_dir = tmp.path().join("myApp");
    std::fs::create_dir_all(install_dir.join("read-only/lib")).unwrap();
    std::fs::create_dir_all(install_dir.join("read-only/bin")).unwrap();
    std::fs::write(install_dir.join("read-only/lib/foo.so"), b"").unwrap();
    dirs.mkdir_p(&install_dir.join("read-only/lib"), 0o755).unwrap();
    dirs.mkdir_p(&install_dir.join("read-only/bin"), 0o755).unwrap();

    let area =
        AppArea { working_dir: "/appsWriteable/myApp".into(), install_dir, sandboxed: false, app_label: Label::new("app.myApp") };

    let stale_link = Path::new("/appsWriteable/myApp/lib/foo.so");
    dirs.symlink(Path::new("/nowhere"), stale_link).unwrap();
    assert_eq!(dirs.read_link(stale_link).unwrap().as_deref(), Some(Path::new("/nowhere")));

    let builder = RuntimeAreaBuilder::new(&dirs, &labels);
    builder.create(&area).unwrap();

    let correct_target = area.install_dir.join("read-only/lib/foo.so");
    assert_eq!(dirs.read_link(stale_link).unwrap().as_deref(), Some(correct_target.as_path()));
}
