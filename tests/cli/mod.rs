use assert_cmd::Command;
use predicates::prelude::*;

fn rustbox_cg() -> Command {
    Command::cargo_bin("rustbox-cg").expect("binary should be built")
}

#[test]
fn test_usage_disabled_prints_zero() {
    rustbox_cg()
        .args(["--no-cgroup", "usage", "--box-id", "3"])
        .assert()
        .success()
        .stdout("0\n");
}

#[test]
fn test_init_disabled() {
    rustbox_cg()
        .args(["--no-cgroup", "init", "--box-id", "1", "--cpus", "0"])
        .assert()
        .success()
        .stdout(predicate::str::contains("cgroups disabled"));
}

#[test]
fn test_run_disabled_reports_exit_code() {
    rustbox_cg()
        .args(["--no-cgroup", "run", "--box-id", "0", "--", "/bin/sh", "-c", "exit 4"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"exit_code\": 4"))
        .stdout(predicate::str::contains("\"cpu_time_ms\": 0"));
}

#[test]
fn test_missing_mount_exits_with_two() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("not-mounted");
    rustbox_cg()
        .args(["--cg-root", root.to_str().unwrap(), "init", "--box-id", "0"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Control group filesystem at"))
        .stderr(predicate::str::contains("not mounted"));
}

#[test]
fn test_box_id_out_of_range() {
    rustbox_cg()
        .args(["--no-cgroup", "cleanup", "--box-id", "5000"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Sandbox ID out of range"));
}
