mod common;

use common::{assert_contains_any, TestEnvironment};
use std::net::TcpListener;
use std::process::{Command, Output};

/// Integration tests for the aptsentry binary
/// These tests run the compiled binary and verify its exit codes and output

fn aptsentry(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_aptsentry"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute aptsentry")
}

fn is_root() -> bool {
    nix::unistd::geteuid().is_root()
}

/// Port on 127.0.0.1 that refuses connections
fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

#[test]
fn test_cli_help() {
    let output = aptsentry(&["--help"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("doctor"));
    assert!(stdout.contains("--dry-run"));
    assert!(stdout.contains("--config"));
}

#[test]
fn test_cli_version() {
    let output = aptsentry(&["--version"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("aptsentry"));
}

#[test]
fn test_invalid_command() {
    let output = aptsentry(&["nonexistent-command"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_contains_any(&stderr, &["error", "unrecognized", "invalid"]);
}

#[test]
fn test_error_handling_invalid_config() {
    let env = TestEnvironment::new();
    let config_path = env.temp_dir.path().join("invalid-config.yml");
    std::fs::write(&config_path, "probe: [unclosed").unwrap();

    let output = aptsentry(&["--config", config_path.to_str().unwrap()]);

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_contains_any(&stderr, &["parse", "config"]);
}

#[test]
fn test_missing_sources_directory_is_fatal() {
    let env = TestEnvironment::new();
    let config_path = env.write_config(&format!("http://127.0.0.1:{}/", closed_port()));
    std::fs::remove_dir_all(&env.sources_dir).unwrap();

    let output = aptsentry(&["--config", config_path.to_str().unwrap()]);

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    if is_root() {
        assert!(stderr.contains("is missing"), "stderr: {}", stderr);
    } else {
        assert!(stderr.contains("must be run as root"), "stderr: {}", stderr);
    }
}

#[test]
fn test_no_network_is_fatal_for_root() {
    let env = TestEnvironment::new();
    env.write_list("foo.list", "deb http://127.0.0.1/ ./\n");
    let config_path = env.write_config(&format!("http://127.0.0.1:{}/", closed_port()));

    let output = aptsentry(&["--config", config_path.to_str().unwrap()]);

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_contains_any(&stderr, &["no network connectivity", "must be run as root"]);
    // Nothing may move on a failed precondition
    assert!(env.sources_dir.join("foo.list").exists());
    assert!(!env.retired_dir().exists());
}

#[test]
fn test_sweep_retires_offline_mirror() {
    let env = TestEnvironment::new();
    let connectivity = TcpListener::bind("127.0.0.1:0").unwrap();
    let connectivity_url = format!("http://{}/", connectivity.local_addr().unwrap());
    let mirror = format!("deb http://127.0.0.1:{}/ ./\n", closed_port());
    env.write_list("foo.list", &mirror);
    let config_path = env.write_config(&connectivity_url);

    let output = aptsentry(&["--config", config_path.to_str().unwrap()]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    if !is_root() {
        assert_eq!(output.status.code(), Some(1));
        assert!(stderr.contains("must be run as root"));
        return;
    }

    assert!(output.status.success(), "stderr: {}", stderr);
    assert!(stdout.contains("1 bad repo"));
    assert!(stdout.contains("Filename:\tfoo.list"));
    assert!(stdout.contains("Repo Error:\tService not online."));
    assert!(!env.sources_dir.join("foo.list").exists());
    assert_eq!(
        std::fs::read_to_string(env.retired_dir().join("foo.list")).unwrap(),
        mirror
    );
}

#[test]
fn test_non_root_sweep_writes_no_default_config() {
    if is_root() {
        return;
    }
    let env = TestEnvironment::new();
    let xdg = env.temp_dir.path().join("xdg");

    let output = Command::new(env!("CARGO_BIN_EXE_aptsentry"))
        .env_remove("RUST_LOG")
        .env("XDG_CONFIG_HOME", &xdg)
        .env("HOME", env.temp_dir.path())
        .output()
        .expect("Failed to execute aptsentry");

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("must be run as root"), "stderr: {}", stderr);
    assert!(!xdg.join("aptsentry").exists());
}

#[test]
fn test_doctor_command() {
    let env = TestEnvironment::new();
    let config_path = env.write_config(&format!("http://127.0.0.1:{}/", closed_port()));

    let output = aptsentry(&["--config", config_path.to_str().unwrap(), "doctor"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Diagnostics"));
    assert!(stdout.contains("Sources Directory"));
    assert!(stdout.contains("We have no network connectivity!"));
    assert!(stdout.contains("No retired folder present"));
}
