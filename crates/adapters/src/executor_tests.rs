use super::fake::{exit_failure, exit_success, FakeProcessExecutor};
use super::*;
use av_core::{FaultAction, WatchdogAction};
use std::path::PathBuf;

fn desc(name: &str) -> ProcDescriptor {
    ProcDescriptor {
        name: ProcName::from(name),
        exec_path: PathBuf::from("/bin/true"),
        args: Vec::new(),
        priority: Priority::Medium,
        fault_action: FaultAction::RestartProc,
        watchdog_action: WatchdogAction::NotFound,
        stdio: [StdioTarget::Inherit, StdioTarget::Inherit, StdioTarget::Inherit],
    }
}

#[test]
fn priority_parses_named_levels() {
    assert_eq!(Priority::parse("idle").unwrap(), Priority::Idle);
    assert_eq!(Priority::parse("low").unwrap(), Priority::Low);
    assert_eq!(Priority::parse("medium").unwrap(), Priority::Medium);
    assert_eq!(Priority::parse("high").unwrap(), Priority::High);
}

#[test]
fn priority_parses_realtime_levels_in_range() {
    assert_eq!(Priority::parse("rt1").unwrap(), Priority::Rt(1));
    assert_eq!(Priority::parse("rt32").unwrap(), Priority::Rt(32));
}

#[test]
fn priority_rejects_out_of_range_realtime_level() {
    assert!(Priority::parse("rt33").is_err());
    assert!(Priority::parse("rt0").is_err());
}

#[test]
fn priority_rejects_unknown_string() {
    assert!(Priority::parse("urgent").is_err());
}

#[test]
fn deliberate_stop_resolves_to_no_fault_action_regardless_of_exit_status() {
    let action = resolve_fault_action(true, exit_failure(), FaultAction::RestartApp);
    assert_eq!(action, FaultAction::None);
}

#[test]
fn clean_exit_resolves_to_no_fault_action() {
    let action = resolve_fault_action(false, exit_success(), FaultAction::RestartApp);
    assert_eq!(action, FaultAction::None);
}

#[test]
fn unexpected_abnormal_exit_uses_configured_fault_action() {
    let action = resolve_fault_action(false, exit_failure(), FaultAction::RestartApp);
    assert_eq!(action, FaultAction::RestartApp);
}

#[test]
fn start_assigns_a_pid_and_increments_start_count() {
    let exec = FakeProcessExecutor;
    let mut handle = exec.create(desc("foo"));
    assert_eq!(handle.state(), ProcRunState::Stopped);
    handle.start().unwrap();
    assert!(matches!(handle.state(), ProcRunState::Running(_)));
    assert_eq!(handle.start_count, 1);
}

#[test]
fn sig_child_after_mark_stopping_is_treated_as_deliberate() {
    let exec = FakeProcessExecutor;
    let mut handle = exec.create(desc("foo"));
    handle.start().unwrap();
    handle.mark_stopping();
    let action = handle.sig_child_handler(exit_failure());
    assert_eq!(action, FaultAction::None);
    assert_eq!(handle.state(), ProcRunState::Stopped);
}

#[test]
fn sig_child_without_stopping_consults_configured_action() {
    let exec = FakeProcessExecutor;
    let mut handle = exec.create(desc("foo"));
    handle.start().unwrap();
    let action = handle.sig_child_handler(exit_failure());
    assert_eq!(action, FaultAction::RestartProc);
}

#[test]
fn overrides_replace_args_and_exec_path() {
    let exec = FakeProcessExecutor;
    let mut handle = exec.create(desc("foo"));
    handle.add_args(Some(vec!["-v".to_string()]));
    assert_eq!(handle.args(), &["-v".to_string()]);
    handle.clear_args();
    assert!(handle.args().is_empty());
    handle.set_exec_path(PathBuf::from("/usr/bin/custom"));
    assert_eq!(handle.exec_path(), &PathBuf::from("/usr/bin/custom"));
}
