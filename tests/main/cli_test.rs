//! CLI contract tests.

use assert_cmd::Command;

fn bridge(tmp: &tempfile::TempDir) -> Command {
    let mut cmd = match Command::cargo_bin("wasapi-bridge") {
        Ok(cmd) => cmd,
        Err(err) => panic!("binary should be built: {err}"),
    };
    cmd.current_dir(tmp.path())
        .env_remove("WASAPI_TOKEN")
        .env_remove("WASAPI_DEVICE_ID")
        .env_remove("WASAPI_BRIDGE_CONFIG")
        .env("HOME", tmp.path());
    cmd
}

#[test]
fn help_lists_primary_subcommands() {
    let tmp = tempfile::tempdir().expect("should create temp dir");
    let output = bridge(&tmp).arg("--help").output().expect("should run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for sub in ["start", "status", "send", "download"] {
        assert!(stdout.contains(sub), "missing {sub} in:\n{stdout}");
    }
}

#[test]
fn status_without_token_fails_with_help_link() {
    let tmp = tempfile::tempdir().expect("should create temp dir");
    let output = bridge(&tmp).arg("status").output().expect("should run");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("must provide a Wasapi token"), "{stderr}");
}

#[test]
fn send_requires_recipient_and_text() {
    let tmp = tempfile::tempdir().expect("should create temp dir");
    bridge(&tmp).args(["send", "521555@c.us"]).assert().failure();
}

#[test]
fn invalid_config_file_is_reported() {
    let tmp = tempfile::tempdir().expect("should create temp dir");
    let path = tmp.path().join("bad.toml");
    std::fs::write(&path, "[server\n").expect("write config");
    let output = bridge(&tmp)
        .arg("--config")
        .arg(&path)
        .arg("status")
        .output()
        .expect("should run");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("failed to parse config"), "{stderr}");
}
