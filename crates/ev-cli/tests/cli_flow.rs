//! End-to-end test driving the `ev` binary through a daily/monthly cycle.

use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};

use tempfile::{NamedTempFile, TempDir};

struct Harness {
    _dir: TempDir,
    config: NamedTempFile,
}

impl Harness {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("ev.db");

        let mut config = NamedTempFile::new().unwrap();
        writeln!(
            config,
            "database_path = {:?}\ntimezone = \"Asia/Taipei\"\nsource_type = \"kafka\"",
            db_path.to_string_lossy()
        )
        .unwrap();
        config.flush().unwrap();

        Self { _dir: dir, config }
    }

    fn ev(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_ev"))
            .arg("--config")
            .arg(self.config.path())
            .args(args)
            .output()
            .expect("Failed to run ev")
    }

    fn ev_with_stdin(&self, args: &[&str], stdin: &str) -> Output {
        let mut child = Command::new(env!("CARGO_BIN_EXE_ev"))
            .arg("--config")
            .arg(self.config.path())
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .expect("Failed to spawn ev");
        child
            .stdin
            .as_mut()
            .unwrap()
            .write_all(stdin.as_bytes())
            .unwrap();
        child.wait_with_output().expect("Failed to wait for ev")
    }

    fn stdout(&self, args: &[&str]) -> String {
        let output = self.ev(args);
        assert!(
            output.status.success(),
            "ev {args:?} failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        String::from_utf8(output.stdout).unwrap()
    }
}

fn write_file(dir: &Path, name: &str, contents: &str) -> String {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path.to_string_lossy().into_owned()
}

#[test]
fn test_daily_and_monthly_expectations_roll_over() {
    let harness = Harness::new();
    let patterns = r#"[{"frequency":"D","name":"A"},{"frequency":"M","name":"B"}]"#;

    let output = harness.ev_with_stdin(
        &[
            "sync",
            "--watcher",
            "etl",
            "--patterns",
            "-",
            "--now",
            "2019-06-05T08:00:00+08:00",
        ],
        patterns,
    );
    assert!(
        output.status.success(),
        "sync failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert_eq!(
        String::from_utf8_lossy(&output.stdout),
        "Synced etl: 2 inserted, 0 deleted, 0 reset\n"
    );

    let unreceived = harness.stdout(&["unreceived", "--watcher", "etl"]);
    assert_eq!(
        unreceived,
        "{\"frequency\":\"D\",\"name\":\"A\"}\n{\"frequency\":\"M\",\"name\":\"B\"}\n"
    );

    let arrived = harness.stdout(&[
        "arrive",
        "--watcher",
        "etl",
        "--pattern",
        r#"{"name":"A","frequency":"D"}"#,
        "--payload",
        r#"{"name":"A","rows":10}"#,
        "--now",
        "2019-06-05T09:00:00+08:00",
    ]);
    assert_eq!(arrived, "Updated 1 expectations for etl\n");
    assert_eq!(
        harness.stdout(&["status", "--watcher", "etl"]),
        "NOT_ALL_RECEIVED\n"
    );

    harness.stdout(&[
        "arrive",
        "--watcher",
        "etl",
        "--pattern",
        r#"{"frequency":"M","name":"B"}"#,
        "--payload",
        "0",
        "--now",
        "2019-06-05T10:00:00+08:00",
    ]);
    assert_eq!(
        harness.stdout(&["status", "--watcher", "etl"]),
        "ALL_RECEIVED\n"
    );

    let reset = harness.stdout(&[
        "reset",
        "--watcher",
        "etl",
        "--now",
        "2019-06-07T08:00:00+08:00",
    ]);
    assert_eq!(reset, "Reset 1 expired expectations for etl\n");

    let shown = harness.stdout(&["show", "--watcher", "etl"]);
    let rows: Vec<&str> = shown.lines().skip(2).collect();
    assert_eq!(rows.len(), 2);
    assert!(rows[0].contains("2019-06-07T15:59:59Z"), "{shown}");
    assert!(rows[0].contains(" - "), "{shown}");
    assert!(rows[1].contains("2019-06-05T02:00:00Z"), "{shown}");
    assert!(rows[1].contains("2019-06-30T15:59:59Z"), "{shown}");

    let dir = tempfile::tempdir().unwrap();
    let observed = write_file(dir.path(), "observed.json", "[]");
    let carried = harness.stdout(&[
        "carried-over",
        "--watcher",
        "etl",
        "--observed",
        &observed,
        "--now",
        "2019-06-07T08:00:00+08:00",
    ]);
    assert_eq!(carried, "{\"frequency\":\"M\",\"name\":\"B\"}\n");

    let watchers = harness.stdout(&["watchers"]);
    assert!(watchers.lines().any(|line| line.starts_with("etl ")), "{watchers}");

    assert_eq!(
        harness.stdout(&["delete", "--watcher", "etl"]),
        "Deleted 2 expectations for etl\n"
    );
    assert_eq!(
        harness.stdout(&["status", "--watcher", "etl"]),
        "ALL_RECEIVED\n"
    );
}

#[test]
fn test_sync_rejects_invalid_frequency() {
    let harness = Harness::new();
    let dir = tempfile::tempdir().unwrap();
    let patterns = write_file(
        dir.path(),
        "patterns.json",
        r#"[{"frequency":"not_valid","topic":"etl-finish"}]"#,
    );

    let output = harness.ev(&["sync", "--watcher", "etl", "--patterns", &patterns]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("frequency should be one of"), "{stderr}");

    assert_eq!(
        harness.stdout(&["show", "--watcher", "etl"]),
        "No expectations recorded for etl.\n"
    );
}

#[test]
fn test_help_lists_commands() {
    let output = Command::new(env!("CARGO_BIN_EXE_ev"))
        .arg("--help")
        .output()
        .expect("Failed to run ev --help");

    assert!(output.status.success());
    let help_text = String::from_utf8_lossy(&output.stdout);
    for command in ["sync", "reset", "arrive", "status", "unreceived", "carried-over", "delete", "show", "watchers"] {
        assert!(help_text.contains(command), "missing {command}: {help_text}");
    }
}
