//! Integration tests driving the compiled authwatch binary.

use std::path::{Path, PathBuf};
use std::process::Command;

/// Helper to get the path to the compiled binary
fn get_binary_path() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // Remove test binary name
    path.pop(); // Remove deps directory
    path.push("authwatch");
    path
}

/// Run authwatch and return output
fn run_authwatch(args: &[&str]) -> std::process::Output {
    Command::new(get_binary_path())
        .args(args)
        .output()
        .expect("Failed to execute authwatch")
}

fn failed_line(address: &str) -> String {
    format!("Aug 12 06:17:01 gw sshd[1021]: Failed password for root from {address} port 52814 ssh2\n")
}

fn write_log(dir: &Path, lines: &str) -> PathBuf {
    let path = dir.join("auth.log");
    std::fs::write(&path, lines).unwrap();
    path
}

#[test]
fn test_help() {
    let output = run_authwatch(&["--help"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("--threshold"));
    assert!(stdout.contains("--follow"));
    assert!(stdout.contains("--dry-run"));
}

#[test]
fn test_batch_scan_report() {
    let dir = tempfile::tempdir().unwrap();
    let log = write_log(dir.path(), &failed_line("10.0.0.5").repeat(6));
    let report_path = dir.path().join("report.json");
    let blocklist_path = dir.path().join("blocklist.txt");

    let output = run_authwatch(&[
        "--log",
        log.to_str().unwrap(),
        "--threshold",
        "5",
        "--output",
        report_path.to_str().unwrap(),
        "--blocklist-output",
        blocklist_path.to_str().unwrap(),
    ]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let report: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&report_path).unwrap()).unwrap();
    assert_eq!(report["total_failed_events"], 6);
    assert_eq!(report["unique_offenders"], 1);
    assert_eq!(report["threshold"], 5);
    assert_eq!(report["top"][0]["address"], "10.0.0.5");
    assert_eq!(report["top"][0]["count"], 6);
    assert_eq!(report["flagged"][0], "10.0.0.5");
    assert_eq!(report["log_path"], log.to_str().unwrap());

    let blocklist = std::fs::read_to_string(&blocklist_path).unwrap();
    assert_eq!(blocklist, "10.0.0.5\n");
}

#[test]
fn test_ranking_tie_break_in_report() {
    let dir = tempfile::tempdir().unwrap();
    // A reaches its 5th event before B does; equal final counts.
    let mut lines = String::new();
    for _ in 0..4 {
        lines.push_str(&failed_line("10.0.0.1"));
        lines.push_str(&failed_line("10.0.0.2"));
    }
    lines.push_str(&failed_line("10.0.0.1"));
    lines.push_str(&failed_line("10.0.0.2"));
    let log = write_log(dir.path(), &lines);
    let report_path = dir.path().join("report.json");

    let output = run_authwatch(&[
        "--log",
        log.to_str().unwrap(),
        "--threshold",
        "5",
        "--output",
        report_path.to_str().unwrap(),
    ]);
    assert!(output.status.success());

    let report: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&report_path).unwrap()).unwrap();
    assert_eq!(report["top"][0]["address"], "10.0.0.1");
    assert_eq!(report["top"][1]["address"], "10.0.0.2");
    assert_eq!(report["top"][0]["count"], 5);
    assert_eq!(report["top"][1]["count"], 5);
}

#[test]
fn test_zero_events_is_success() {
    let dir = tempfile::tempdir().unwrap();
    let log = write_log(dir.path(), "Aug 12 06:17:02 gw CRON[300]: session opened\n");
    let report_path = dir.path().join("report.json");

    let output = run_authwatch(&[
        "--log",
        log.to_str().unwrap(),
        "--output",
        report_path.to_str().unwrap(),
    ]);
    assert!(output.status.success());

    let report: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&report_path).unwrap()).unwrap();
    assert_eq!(report["total_failed_events"], 0);
    assert_eq!(report["unique_offenders"], 0);
}

#[test]
fn test_unresolvable_log_still_succeeds_with_empty_report() {
    let dir = tempfile::tempdir().unwrap();
    let report_path = dir.path().join("report.json");

    let output = run_authwatch(&[
        "--log",
        "/nonexistent/auth.log",
        "--output",
        report_path.to_str().unwrap(),
    ]);
    assert!(output.status.success());

    let report: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&report_path).unwrap()).unwrap();
    assert_eq!(report["total_failed_events"], 0);
}

#[test]
fn test_unwritable_report_is_nonzero_exit() {
    let dir = tempfile::tempdir().unwrap();
    let log = write_log(dir.path(), &failed_line("10.0.0.5"));

    let output = run_authwatch(&[
        "--log",
        log.to_str().unwrap(),
        "--output",
        "/nonexistent-dir/report.json",
    ]);
    assert!(!output.status.success());
}

#[test]
fn test_dry_run_auto_block() {
    let dir = tempfile::tempdir().unwrap();
    let log = write_log(dir.path(), &failed_line("10.0.0.5").repeat(3));
    let report_path = dir.path().join("report.json");
    let blocklist_path = dir.path().join("blocklist.txt");

    let output = run_authwatch(&[
        "--log",
        log.to_str().unwrap(),
        "--threshold",
        "3",
        "--auto-block",
        "--dry-run",
        "--block-method",
        "iptables",
        "--output",
        report_path.to_str().unwrap(),
        "--blocklist-output",
        blocklist_path.to_str().unwrap(),
    ]);
    assert!(output.status.success());

    // The rendered command is reported, and the blocklist still records
    // the flagged address despite dry-run.
    let combined = format!(
        "{}{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(
        combined.contains("sudo iptables -A INPUT -s 10.0.0.5 -j DROP"),
        "output: {combined}"
    );
    assert_eq!(std::fs::read_to_string(&blocklist_path).unwrap(), "10.0.0.5\n");
}

#[test]
fn test_glob_spans_rotated_files() {
    use std::io::Write;

    let dir = tempfile::tempdir().unwrap();
    let rotated = dir.path().join("auth.log.2.gz");
    let file = std::fs::File::create(&rotated).unwrap();
    let mut enc = flate2::write::GzEncoder::new(file, flate2::Compression::default());
    enc.write_all(failed_line("10.0.0.5").as_bytes()).unwrap();
    enc.finish().unwrap();

    write_log(dir.path(), &failed_line("10.0.0.5"));

    let pattern = dir.path().join("auth.log*");
    let report_path = dir.path().join("report.json");

    let output = run_authwatch(&[
        "--log",
        pattern.to_str().unwrap(),
        "--output",
        report_path.to_str().unwrap(),
    ]);
    assert!(output.status.success());

    let report: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&report_path).unwrap()).unwrap();
    assert_eq!(report["total_failed_events"], 2);
}
