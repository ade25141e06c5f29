// Drives the capnp-wasm-bridge binary against schema files on disk.

use std::fs;
use std::process::Command;

fn bridge() -> Command {
    Command::new(env!("CARGO_BIN_EXE_capnp-wasm-bridge"))
}

#[test]
fn test_compile_then_inspect() {
    let dir = tempfile::tempdir().unwrap();
    let schema_path = dir.path().join("point.capnp");
    let payload_path = dir.path().join("point.out");
    fs::write(
        &schema_path,
        "@0xbf5147cbbecf40c1;\nstruct Point {\n  x @0 :Float64;\n  y @1 :Float64;\n}\n",
    )
    .unwrap();

    let status = bridge()
        .arg("compile")
        .arg(&schema_path)
        .arg("--out")
        .arg(&payload_path)
        .status()
        .unwrap();
    assert!(status.success());
    assert!(fs::read_to_string(&payload_path).unwrap().starts_with("Ok\n"));

    let output = bridge().arg("inspect").arg(&payload_path).output().unwrap();
    assert!(output.status.success());
    let summary = String::from_utf8(output.stdout).unwrap();
    assert!(summary.contains("Nodes: 2"), "{}", summary);
    assert!(summary.contains("index.capnp:Point"), "{}", summary);
    assert!(summary.contains("Requested files: 1"), "{}", summary);
}

#[test]
fn test_compile_errors_exit_nonzero() {
    let dir = tempfile::tempdir().unwrap();
    let schema_path = dir.path().join("broken.capnp");
    fs::write(&schema_path, "struct Broken {}\n").unwrap();

    let output = bridge().arg("compile").arg(&schema_path).output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.starts_with("Err\n1:1 File does not declare an ID."), "{}", stdout);
}

#[test]
fn test_version_flag_and_json_summary() {
    let dir = tempfile::tempdir().unwrap();
    let schema_path = dir.path().join("empty.capnp");
    let payload_path = dir.path().join("empty.out");
    fs::write(&schema_path, "@0xbf5147cbbecf40c1;\n").unwrap();

    let status = bridge()
        .args(["compile", "--capnp-version", "0.10.4", "--out"])
        .arg(&payload_path)
        .arg(&schema_path)
        .status()
        .unwrap();
    assert!(status.success());

    let output = bridge()
        .args(["inspect", "--json"])
        .arg(&payload_path)
        .output()
        .unwrap();
    assert!(output.status.success());
    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary["capnpVersion"], "0.10.4");
    assert_eq!(summary["nodes"].as_array().unwrap().len(), 1);
    assert_eq!(summary["requestedFiles"][0]["filename"], "index.capnp");
}

#[test]
fn test_bad_version_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let schema_path = dir.path().join("empty.capnp");
    fs::write(&schema_path, "@0xbf5147cbbecf40c1;\n").unwrap();

    let output = bridge()
        .args(["compile", "--capnp-version", "1.x"])
        .arg(&schema_path)
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("invalid compiler version"), "{}", stderr);
}
