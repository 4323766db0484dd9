#![cfg(all(unix, feature = "cli"))]

use std::path::PathBuf;
use std::process::{Command, Output};

const MISSING_PORT: &str = "/dev/lightsweeper-test-missing";

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "lightsweeper-cli-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

fn lightsweeper(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_lightsweeper"))
        .args(["--log-level", "error"])
        .args(args)
        .output()
        .expect("lightsweeper should run")
}

#[test]
fn version_prints_package_version() {
    let output = lightsweeper(&["version"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(
        stdout.trim(),
        format!("lightsweeper {}", env!("CARGO_PKG_VERSION"))
    );
}

#[test]
fn extended_version_lists_features() {
    let output = lightsweeper(&["version", "--extended"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("features: floor=true, cli=true"));
    assert!(stdout.contains("read timeout: 10ms"));
    assert!(stdout.contains("min write gap: 5ms"));
    assert!(stdout.contains("no contact reads 256"));
}

#[test]
fn missing_port_is_transport_error() {
    let output = lightsweeper(&["tile", MISSING_PORT, "8", "version"]);
    assert_eq!(output.status.code(), Some(3));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("open failed"));
}

#[test]
fn bad_tile_arguments_fail_before_opening_the_port() {
    let output = lightsweeper(&["tile", MISSING_PORT, "12", "version"]);
    assert_eq!(output.status.code(), Some(64));

    let output = lightsweeper(&["tile", MISSING_PORT, "8", "color", "mauve"]);
    assert_eq!(output.status.code(), Some(64));
    assert!(String::from_utf8_lossy(&output.stderr).contains("unknown color"));

    let output = lightsweeper(&["tile", MISSING_PORT, "8", "shape", "0x80"]);
    assert_eq!(output.status.code(), Some(64));
}

#[test]
fn zero_read_timeout_is_usage_error() {
    let output = lightsweeper(&["--read-timeout", "0ms", "tile", MISSING_PORT, "8", "sensor"]);
    assert_eq!(output.status.code(), Some(64));
}

#[test]
fn missing_layout_file_fails() {
    let dir = unique_temp_dir("missing");
    let layout = dir.join("nope.json");

    let output = lightsweeper(&["clear", "--layout", layout.to_str().expect("utf-8 path")]);
    assert_eq!(output.status.code(), Some(1));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn invalid_layout_is_data_invalid() {
    let dir = unique_temp_dir("invalid");
    let layout = dir.join("floor.json");
    std::fs::write(
        &layout,
        r#"{ "rows": 1, "cols": 2, "tiles": [
            { "row": 1, "col": 1, "channel": "/dev/null", "address": 8 }
        ] }"#,
    )
    .expect("layout should be writable");

    let output = lightsweeper(&["poll", "--layout", layout.to_str().expect("utf-8 path")]);
    assert_eq!(output.status.code(), Some(60));
    assert!(String::from_utf8_lossy(&output.stderr).contains("invalid floor layout"));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn layout_on_missing_port_is_transport_error() {
    let dir = unique_temp_dir("unplugged");
    let layout = dir.join("floor.json");
    std::fs::write(
        &layout,
        format!(
            r#"{{ "rows": 1, "cols": 1, "tiles": [
                {{ "row": 1, "col": 1, "channel": "{MISSING_PORT}", "address": 8 }}
            ] }}"#
        ),
    )
    .expect("layout should be writable");

    let output = lightsweeper(&["clear", "--layout", layout.to_str().expect("utf-8 path")]);
    assert_eq!(output.status.code(), Some(3));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn threshold_above_no_contact_is_usage_error() {
    let dir = unique_temp_dir("threshold");
    let layout = dir.join("floor.json");

    let output = lightsweeper(&[
        "poll",
        "--layout",
        layout.to_str().expect("utf-8 path"),
        "--threshold",
        "300",
    ]);
    assert_eq!(output.status.code(), Some(64));
    assert!(String::from_utf8_lossy(&output.stderr).contains("threshold"));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn write_layout_requires_cols() {
    let output = lightsweeper(&["discover", "--write-layout", "floor.json"]);
    assert_eq!(output.status.code(), Some(2));
}
