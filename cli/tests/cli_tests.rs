use std::io::{Cursor, Write};
use std::path::Path;
use std::process::{Command, Output};

use pbixproj::converters::TextEncoding;
use serde_json::{Value, json};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

fn pbixproj_cmd() -> Command {
    Command::new(env!("CARGO_BIN_EXE_pbixproj"))
}

fn run(args: &[&str]) -> Output {
    pbixproj_cmd()
        .env_remove("PBIXPROJ_LOG")
        .args(args)
        .output()
        .expect("failed to run pbixproj")
}

fn unicode_json(value: &Value) -> Vec<u8> {
    TextEncoding::Unicode.encode(&value.to_string())
}

fn write_template(path: &Path) {
    let model = json!({
        "name": "SemanticModel",
        "model": {
            "tables": [{
                "name": "Sales",
                "columns": [{"name": "Amount", "dataType": "double"}],
                "measures": [{"name": "Total", "expression": "SUM(Sales[Amount])"}]
            }]
        }
    });
    let layout = json!({"id": 0, "sections": [{"name": "ReportSection", "displayName": "Overview", "ordinal": 0, "visualContainers": []}]});

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let entries: Vec<(&str, Vec<u8>)> = vec![
        (
            "[Content_Types].xml",
            br#"<?xml version="1.0" encoding="utf-8"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="json" ContentType="" /></Types>"#.to_vec(),
        ),
        ("Version", TextEncoding::Unicode.encode("1.28")),
        ("DataModelSchema", unicode_json(&model)),
        ("Report/Layout", unicode_json(&layout)),
    ];
    for (name, bytes) in entries {
        zip.start_file(name, options).expect("start entry");
        zip.write_all(&bytes).expect("write entry");
    }
    let bytes = zip.finish().expect("finish zip").into_inner();
    std::fs::write(path, bytes).expect("write template");
}

#[test]
fn extract_then_compile_round_trips() {
    let dir = tempfile::tempdir().expect("tempdir");
    let template = dir.path().join("Sales.pbit");
    write_template(&template);

    let output = run(&["extract", template.to_str().expect("utf8 path")]);
    assert!(
        output.status.success(),
        "extract should exit 0: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let folder = dir.path().join("Sales");
    assert!(folder.join(".pbixproj.json").is_file());
    assert!(folder.join("Version.txt").is_file());
    assert_eq!(
        std::fs::read_to_string(folder.join("Model/tables/Sales/measures/Total.dax"))
            .expect("measure file"),
        "SUM(Sales[Amount])"
    );

    let compiled = dir.path().join("Compiled.pbit");
    let output = run(&[
        "compile",
        folder.to_str().expect("utf8 path"),
        "--output",
        compiled.to_str().expect("utf8 path"),
    ]);
    assert!(
        output.status.success(),
        "compile should exit 0: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(compiled.is_file());

    let output = run(&["info", "--format", "json", compiled.to_str().expect("utf8 path")]);
    assert!(output.status.success());
    let parts: Value = serde_json::from_slice(&output.stdout).expect("json listing");
    let paths: Vec<&str> = parts
        .as_array()
        .expect("array")
        .iter()
        .filter_map(|p| p["path"].as_str())
        .collect();
    assert!(paths.contains(&"DataModelSchema"));
    assert!(paths.contains(&"Report/Layout"));
    assert!(paths.contains(&"Version"));
}

#[test]
fn compile_refuses_to_overwrite_without_flag() {
    let dir = tempfile::tempdir().expect("tempdir");
    let template = dir.path().join("Sales.pbit");
    write_template(&template);
    let folder = dir.path().join("project");
    let output = run(&[
        "extract",
        template.to_str().expect("utf8 path"),
        "--output",
        folder.to_str().expect("utf8 path"),
    ]);
    assert!(output.status.success());

    let output = run(&[
        "compile",
        folder.to_str().expect("utf8 path"),
        "--output",
        template.to_str().expect("utf8 path"),
    ]);
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("--overwrite"));

    let output = run(&[
        "compile",
        folder.to_str().expect("utf8 path"),
        "--output",
        template.to_str().expect("utf8 path"),
        "--overwrite",
    ]);
    assert!(output.status.success());
}

#[test]
fn missing_inputs_are_user_errors() {
    let dir = tempfile::tempdir().expect("tempdir");
    let missing = dir.path().join("nope.pbix");

    let output = run(&["extract", missing.to_str().expect("utf8 path")]);
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).starts_with("Error:"));

    let output = run(&["compile", dir.path().join("absent").to_str().expect("utf8 path")]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn non_package_input_is_an_internal_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let bogus = dir.path().join("bogus.pbix");
    std::fs::write(&bogus, b"not a zip archive").expect("write");

    let output = run(&["info", bogus.to_str().expect("utf8 path")]);
    assert_eq!(output.status.code(), Some(3));
}

#[test]
fn info_lists_parts_as_text() {
    let dir = tempfile::tempdir().expect("tempdir");
    let template = dir.path().join("Sales.pbit");
    write_template(&template);

    let output = run(&["info", template.to_str().expect("utf8 path")]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Package: Sales.pbit"));
    assert!(stdout.contains("DataModelSchema [json]"));
}
