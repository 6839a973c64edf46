#![cfg(target_os = "linux")]

use std::os::unix::fs::{symlink, PermissionsExt};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use uuid::Uuid;

fn unique_temp_dir(prefix: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("{prefix}-{}", Uuid::new_v4()));
    std::fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

fn fake_process(root: &Path, pid: u32, target: Option<&str>) {
    let dir = root.join(pid.to_string());
    std::fs::create_dir_all(&dir)
        .unwrap_or_else(|e| panic!("create {} failed: {e}", dir.display()));
    if let Some(target) = target {
        symlink(target, dir.join("exe"))
            .unwrap_or_else(|e| panic!("symlink for {pid} failed: {e}"));
    }
}

fn fake_registry() -> (PathBuf, CleanupDir) {
    let root = unique_temp_dir("singleton-cli-procfs");
    let guard = CleanupDir(root.clone());
    fake_process(&root, 1, Some("/sbin/init"));
    fake_process(&root, 42, Some("/opt/app/bin/app"));
    fake_process(&root, 77, Some("/opt/app/bin/app"));
    fake_process(&root, 90, None);
    (root, guard)
}

fn run(args: &[&str]) -> Output {
    let exe = env!("CARGO_BIN_EXE_singleton");
    Command::new(exe)
        .args(args)
        .output()
        .expect("run singleton")
}

fn stdout(out: &Output) -> String {
    String::from_utf8_lossy(&out.stdout).into_owned()
}

#[test]
fn e2e_check_reports_duplicate_and_unique() {
    let (root, _cleanup) = fake_registry();
    let root = root.to_str().expect("utf-8 temp path");

    let out = run(&["--proc-root", root, "check", "--pid", "42"]);
    assert_eq!(out.status.code(), Some(3), "stdout: {}", stdout(&out));
    assert_eq!(stdout(&out).trim(), "duplicate /opt/app/bin/app pids=42,77");

    let out = run(&["--proc-root", root, "check", "--pid", "1"]);
    assert_eq!(out.status.code(), Some(0), "stdout: {}", stdout(&out));
    assert_eq!(stdout(&out).trim(), "unique /sbin/init");
}

#[test]
fn e2e_check_unresolvable_pid_is_unknown() {
    let (root, _cleanup) = fake_registry();
    let root = root.to_str().expect("utf-8 temp path");

    let out = run(&["--proc-root", root, "check", "--pid", "90"]);
    assert_eq!(out.status.code(), Some(2));
    assert_eq!(stdout(&out).trim(), "unknown");
}

#[test]
fn e2e_config_file_sets_proc_root_and_strictness() {
    let (root, _cleanup) = fake_registry();
    let config_path = root.join("singleton.json");
    let config = serde_json::json!({
        "proc_root": root,
        "strictness": "any_member",
    });
    std::fs::write(&config_path, config.to_string()).expect("write config");

    let out = run(&[
        "--config",
        config_path.to_str().expect("utf-8 config path"),
        "strategy",
    ]);
    assert!(out.status.success());
    assert_eq!(stdout(&out).trim(), "procfs");

    let out = run(&[
        "--config",
        config_path.to_str().expect("utf-8 config path"),
        "check",
        "--pid",
        "1",
    ]);
    assert_eq!(out.status.code(), Some(0), "stdout: {}", stdout(&out));
}

#[test]
fn e2e_index_outputs_groups_as_json() {
    let (root, _cleanup) = fake_registry();
    let root = root.to_str().expect("utf-8 temp path");

    let out = run(&["--proc-root", root, "index", "--duplicates-only"]);
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));

    let v: serde_json::Value = serde_json::from_slice(&out.stdout).expect("index json");
    let groups = v["groups"].as_array().expect("groups array");
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0]["path"], "/opt/app/bin/app");
    assert_eq!(groups[0]["pids"], serde_json::json!([42, 77]));
    assert!(v["captured_at"].is_i64());
}

#[test]
fn e2e_stub_checks_are_always_false() {
    for args in [["stub", "path", "/bin/app"], ["stub", "name", "app"]] {
        let out = run(&args);
        assert!(out.status.success());
        assert_eq!(stdout(&out).trim(), "false");
    }
}

#[test]
fn e2e_missing_registry_fails_index() {
    let out = run(&["--proc-root", "/nonexistent/singleton-root", "index"]);
    assert!(!out.status.success());
}

#[test]
fn e2e_unreadable_registry_is_unknown_not_unique() {
    let (root, _cleanup) = fake_registry();
    std::fs::set_permissions(&root, std::fs::Permissions::from_mode(0o000))
        .expect("chmod 000 registry root");
    let _restore = RestoreMode(root.clone());
    if std::fs::read_dir(&root).is_ok() {
        return;
    }
    let root = root.to_str().expect("utf-8 temp path");

    let out = run(&[
        "--proc-root",
        root,
        "check",
        "--pid",
        "42",
        "--name",
        "singleton-no-such-binary-9z",
    ]);
    assert_eq!(out.status.code(), Some(2), "stdout: {}", stdout(&out));
    assert_eq!(stdout(&out).trim(), "unknown");

    let out = run(&["--proc-root", root, "strategy"]);
    assert!(!out.status.success());
}

struct RestoreMode(PathBuf);

impl Drop for RestoreMode {
    fn drop(&mut self) {
        let _ = std::fs::set_permissions(&self.0, std::fs::Permissions::from_mode(0o755));
    }
}

struct CleanupDir(PathBuf);

impl Drop for CleanupDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.0);
    }
}
