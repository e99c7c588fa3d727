#![cfg(unix)]

use loadcollect_common::ResultSet;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::OnceLock;
use tempfile::TempDir;

const OK_FORTIO: &str = r#"#!/bin/sh
out=""
prev=""
for arg in "$@"; do
  if [ "$prev" = "-json" ]; then out="$arg"; fi
  prev="$arg"
done
echo '{"DurationHistogram":{"Count":1,"Max":0.1,"Sum":0.1,"Data":[{"Start":0,"End":0.1,"Count":1}]},"RetCodes":{"200":1}}' > "$out"
"#;

const FAILING_FORTIO: &str = "#!/bin/sh\necho 'dial tcp: connection refused' >&2\nexit 1\n";

fn loadgens() -> &'static Path {
    static DIR: OnceLock<TempDir> = OnceLock::new();
    DIR.get_or_init(|| {
        let dir = TempDir::new().unwrap();
        for (name, body) in [("ok", OK_FORTIO), ("failing", FAILING_FORTIO)] {
            let path = dir.path().join(name);
            std::fs::write(&path, body).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        }
        dir
    })
    .path()
}

fn write_action(dir: &Path, action: &str) -> PathBuf {
    let path = dir.join("action.json");
    std::fs::write(&path, action).unwrap();
    path
}

fn run(dir: &Path, action: &Path, loadgen: &str) -> i32 {
    Command::new(env!("CARGO_BIN_EXE_loadcollect"))
        .arg("run")
        .arg("--action")
        .arg(action)
        .arg("--experiment")
        .arg("checkout")
        .arg("--state-dir")
        .arg(dir.join("state"))
        .arg("--loadgen")
        .arg(loadgens().join(loadgen))
        .arg("--tag")
        .arg("host=checkout.svc")
        .arg("--log-level")
        .arg("error")
        .status()
        .expect("failed to run loadcollect")
        .code()
        .expect("killed by signal")
}

const COLLECT: &str = r#"[{"task": "metrics/collect", "with": {
    "time": "1s",
    "versions": [{"name": "v1", "url": "http://{{ host }}/"}]
}}]"#;

#[test]
fn test_successful_action_exits_zero_and_stores() {
    let dir = TempDir::new().unwrap();
    let action = write_action(dir.path(), COLLECT);

    assert_eq!(run(dir.path(), &action, "ok"), 0);

    let blob = std::fs::read_to_string(dir.path().join("state/default/checkout.json")).unwrap();
    let stored = ResultSet::decode(&blob).unwrap();
    assert_eq!(stored.get("v1").unwrap().duration_histogram.count, 1);
}

#[test]
fn test_failed_task_exits_one() {
    let dir = TempDir::new().unwrap();
    let action = write_action(dir.path(), COLLECT);

    assert_eq!(run(dir.path(), &action, "failing"), 1);
    assert!(!dir.path().join("state/default/checkout.json").exists());
}

#[test]
fn test_invalid_action_exits_two() {
    let dir = TempDir::new().unwrap();

    let unknown = write_action(dir.path(), r#"[{"task": "notify/slack"}]"#);
    assert_eq!(run(dir.path(), &unknown, "ok"), 2);

    let malformed = write_action(dir.path(), "not json");
    assert_eq!(run(dir.path(), &malformed, "ok"), 2);

    let missing = dir.path().join("missing.json");
    assert_eq!(run(dir.path(), &missing, "ok"), 2);
}
