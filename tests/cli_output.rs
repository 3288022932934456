//! Runs the built binary and checks what lands on stdout and stderr.

use std::process::Command;

use tempfile::TempDir;

#[test]
fn test_json_stdout_is_not_mixed_with_logs() {
    let dir = TempDir::new().unwrap();
    let output = Command::new(env!("CARGO_BIN_EXE_script-forge"))
        .current_dir(dir.path())
        .env("RUST_LOG", "info")
        .env_remove("SCRIPT_FORGE_CONFIG")
        .env_remove("SCRIPT_FORGE_LOG_PATH")
        .args(["--data-dir", "data", "feedback", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["requeued"], 0);

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Feedback pass complete"));
}
