#![cfg(all(unix, feature = "cli"))]

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant};

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = PathBuf::from(format!(
        "/tmp/dxcli-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

fn duplexipc() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_duplexipc"));
    cmd.arg("--log-level").arg("error");
    cmd
}

fn spawn_serve(base: &Path, extra: &[&str]) -> Child {
    duplexipc()
        .arg("--format")
        .arg("json")
        .arg("serve")
        .arg(base)
        .args(extra)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("serve command should start")
}

fn ping(base: &Path) -> Output {
    duplexipc()
        .arg("--format")
        .arg("json")
        .arg("ping")
        .arg(base)
        .arg("--timeout")
        .arg("1s")
        .output()
        .expect("ping should run")
}

fn wait_for_server(base: &Path, timeout: Duration) {
    let start = Instant::now();
    loop {
        if ping(base).status.success() {
            return;
        }
        if start.elapsed() >= timeout {
            panic!("server at {} never answered ping", base.display());
        }
        thread::sleep(Duration::from_millis(25));
    }
}

fn stop(mut child: Child) {
    let _ = child.kill();
    let _ = child.wait();
}

#[test]
fn version_prints_package_version() {
    let output = duplexipc()
        .arg("version")
        .output()
        .expect("version should run");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(
        stdout.trim(),
        format!("duplexipc {}", env!("CARGO_PKG_VERSION"))
    );
}

#[test]
fn version_extended_reports_limits() {
    let output = duplexipc()
        .arg("version")
        .arg("--extended")
        .output()
        .expect("version should run");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("max_datagram: 32768"));
    assert!(stdout.contains("default_limit: 16777215"));
}

#[test]
fn ping_without_server_returns_transport_code() {
    let dir = unique_temp_dir("noserver");
    let output = ping(&dir.join("calc"));

    assert_eq!(output.status.code(), Some(3));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ping failed"));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn call_against_serve_returns_result() {
    let dir = unique_temp_dir("call");
    let base = dir.join("calc");
    let child = spawn_serve(&base, &[]);
    wait_for_server(&base, Duration::from_secs(5));

    let output = duplexipc()
        .arg("--format")
        .arg("json")
        .arg("call")
        .arg(&base)
        .args(["--a", "5", "--b", "7"])
        .output()
        .expect("call should run");

    assert!(output.status.success());
    let payload: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("call should emit json");
    assert_eq!(payload["result"], 12);
    assert_eq!(payload["op"], "+");

    let output = duplexipc()
        .arg("--format")
        .arg("raw")
        .arg("call")
        .arg(&base)
        .args(["--a", "6", "--b", "-7", "--op", "mul"])
        .output()
        .expect("call should run");
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "-42\n");

    stop(child);
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn watch_prints_ticks_in_order() {
    let dir = unique_temp_dir("watch");
    let base = dir.join("calc");
    let child = spawn_serve(&base, &["--notify-every", "100ms"]);
    wait_for_server(&base, Duration::from_secs(5));

    let output = duplexipc()
        .arg("--format")
        .arg("json")
        .arg("watch")
        .arg(&base)
        .arg("--count")
        .arg("3")
        .output()
        .expect("watch should run");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let seqs: Vec<u64> = stdout
        .lines()
        .map(|line| {
            let value: serde_json::Value =
                serde_json::from_str(line).expect("each line should be json");
            assert_eq!(value["header"], "tick");
            value["seq"].as_u64().expect("tick should carry a sequence number")
        })
        .collect();
    assert_eq!(seqs.len(), 3);
    assert!(seqs.windows(2).all(|pair| pair[1] == pair[0] + 1));

    stop(child);
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn oversized_request_times_out_with_124() {
    let dir = unique_temp_dir("limit");
    let base = dir.join("calc");
    let child = spawn_serve(&base, &["--limit", "4"]);
    wait_for_server(&base, Duration::from_secs(5));

    let output = duplexipc()
        .arg("call")
        .arg(&base)
        .args(["--a", "1", "--b", "2", "--timeout", "500ms"])
        .output()
        .expect("call should run");

    assert_eq!(output.status.code(), Some(124));

    stop(child);
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn second_server_on_same_path_fails() {
    let dir = unique_temp_dir("twice");
    let base = dir.join("calc");
    let child = spawn_serve(&base, &[]);
    wait_for_server(&base, Duration::from_secs(5));

    let output = duplexipc()
        .arg("serve")
        .arg(&base)
        .output()
        .expect("second serve should run");

    assert_eq!(output.status.code(), Some(3));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("serve failed"));

    stop(child);
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn invalid_duration_is_usage_error() {
    let dir = unique_temp_dir("usage");
    let output = duplexipc()
        .arg("serve")
        .arg(dir.join("calc"))
        .arg("--notify-every")
        .arg("soon")
        .output()
        .expect("serve should run");

    assert_eq!(output.status.code(), Some(64));
    let _ = std::fs::remove_dir_all(&dir);
}
