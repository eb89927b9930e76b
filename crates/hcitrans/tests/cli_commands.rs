#![cfg(feature = "cli")]

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};

fn hcitrans(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_hcitrans"))
        .args(["--log-level", "error"])
        .args(args)
        .output()
        .expect("hcitrans should run")
}

fn json_lines(output: &Output) -> Vec<serde_json::Value> {
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(|line| serde_json::from_str(line).expect("each line should be json"))
        .collect()
}

fn temp_path(tag: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "hcitrans-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ))
}

#[test]
fn decode_prints_each_packet() {
    let output = hcitrans(&[
        "--format",
        "json",
        "decode",
        "ff 04 0e 04 01 03 0c 00 02 01 20 02 00 aa bb",
    ]);
    assert!(output.status.success());

    let packets = json_lines(&output);
    assert_eq!(packets.len(), 2);
    assert_eq!(packets[0]["kind"], "event");
    assert_eq!(packets[0]["header"]["event_code"], 14);
    assert_eq!(packets[0]["payload"], "01030c00");
    assert_eq!(packets[1]["kind"], "acl_data");
    assert_eq!(packets[1]["header"]["handle"], 1);
    assert_eq!(packets[1]["header"]["packet_boundary"], 2);
    assert_eq!(packets[1]["payload"], "aabb");
}

#[test]
fn decode_reads_raw_file() {
    let path = temp_path("decode");
    std::fs::write(&path, [0x01, 0x03, 0x0C, 0x00]).expect("temp file should be writable");

    let output = hcitrans(&["--format", "pretty", "decode", "--file", path.to_str().unwrap()]);
    let _ = std::fs::remove_file(&path);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("COMMAND"));
    assert!(stdout.contains("opcode=0x0C03"));
}

#[test]
fn decode_reads_hex_from_stdin() {
    let mut child = Command::new(env!("CARGO_BIN_EXE_hcitrans"))
        .args(["--log-level", "error", "--format", "json", "decode"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .expect("decode should start");
    child
        .stdin
        .take()
        .expect("stdin should be piped")
        .write_all(b"04 0f 00\n")
        .expect("stdin should accept input");
    let output = child.wait_with_output().expect("decode should finish");

    assert!(output.status.success());
    assert_eq!(json_lines(&output)[0]["kind"], "event");
}

#[test]
fn decode_of_noise_is_data_invalid() {
    let output = hcitrans(&["decode", "00 03 ff 7f"]);
    assert_eq!(output.status.code(), Some(60));
}

#[test]
fn decode_honors_acl_limit() {
    let output = hcitrans(&[
        "--format",
        "json",
        "decode",
        "--max-acl-payload",
        "1",
        "02 01 00 02 00 aa bb 04 0e 00",
    ]);
    assert!(output.status.success());
    let packets = json_lines(&output);
    assert_eq!(packets.len(), 1);
    assert_eq!(packets[0]["kind"], "event");
}

#[test]
fn decode_uses_config_file_limits() {
    let path = temp_path("config");
    std::fs::write(&path, r#"{ "receiver": { "max_event_payload": 1 } }"#)
        .expect("temp file should be writable");

    let output = hcitrans(&[
        "--config",
        path.to_str().unwrap(),
        "decode",
        "04 0e 02 01 02",
    ]);
    let _ = std::fs::remove_file(&path);

    assert_eq!(output.status.code(), Some(60));
}

#[test]
fn encode_builds_command_from_fields() {
    let output = hcitrans(&["--format", "pretty", "encode", "command", "--opcode", "0x0c03"]);
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "01030c00");
}

#[test]
fn encode_json_reports_framed_bytes() {
    let output = hcitrans(&["--format", "json", "encode", "event", "0e0101"]);
    assert!(output.status.success());
    let out = &json_lines(&output)[0];
    assert_eq!(out["kind"], "event");
    assert_eq!(out["size"], 4);
    assert_eq!(out["framed"], "040e0101");
}

#[test]
fn encode_raw_writes_bytes() {
    let output = hcitrans(&[
        "--format", "raw", "encode", "acl", "--handle", "0x0040", "--params", "aa",
    ]);
    assert!(output.status.success());
    assert_eq!(output.stdout, vec![0x02, 0x40, 0x00, 0x01, 0x00, 0xAA]);
}

#[test]
fn encode_rejects_length_mismatch() {
    let output = hcitrans(&["encode", "command", "030c05"]);
    assert_eq!(output.status.code(), Some(60));
}

#[test]
fn monitor_missing_port_is_transport_error() {
    let output = hcitrans(&["monitor", "/dev/hcitrans-missing-port", "--count", "1"]);
    assert_eq!(output.status.code(), Some(3));
    assert!(String::from_utf8_lossy(&output.stderr).contains("open failed"));
}

#[test]
fn version_prints_package_version() {
    let output = hcitrans(&["version"]);
    assert!(output.status.success());
    assert_eq!(
        String::from_utf8_lossy(&output.stdout).trim(),
        format!("hcitrans {}", env!("CARGO_PKG_VERSION"))
    );
}
