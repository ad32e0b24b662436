use assert_cmd::Command;

#[test]
fn help_lists_connect() {
    let output = Command::cargo_bin("wterm")
        .unwrap()
        .arg("--help")
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("connect"));
}

#[test]
fn connect_requires_a_target() {
    Command::cargo_bin("wterm")
        .unwrap()
        .arg("connect")
        .assert()
        .failure();
}

#[test]
fn malformed_config_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[gateway\n").unwrap();

    let output = Command::cargo_bin("wterm")
        .unwrap()
        .args(["--config", path.to_str().unwrap(), "connect", "root@10.0.0.5"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("failed to parse config"));
}
