use pbixproj::PbixModel;
use serde_json::json;

mod common;

fn model_with_tables(names: &[&str]) -> PbixModel {
    let tables: Vec<_> = names
        .iter()
        .map(|name| json!({"name": name, "columns": [{"name": "Id", "dataType": "int64"}]}))
        .collect();
    PbixModel {
        version: Some("1.28".into()),
        data_model_schema: Some(json!({"name": "db", "model": {"tables": tables}})),
        report_layout: Some(json!({"id": 0, "sections": []})),
        ..PbixModel::default()
    }
}

#[test]
fn removed_table_is_pruned() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path();
    model_with_tables(&["Foo", "Bar"]).extract_to(root).expect("first extract");
    assert!(root.join("Model/tables/Foo/table.json").is_file());
    std::fs::write(root.join(".gitignore"), "*.pbix\n").expect("gitignore");

    let summary = model_with_tables(&["Bar"]).extract_to(root).expect("second extract");
    assert!(!root.join("Model/tables/Foo").exists());
    assert!(root.join("Model/tables/Bar/table.json").is_file());
    assert!(root.join("Model/tables/Bar/columns/Id.json").is_file());
    assert!(root.join(".gitignore").is_file());
    assert_eq!(summary.pruned.deleted_files, 2);
}

#[test]
fn failed_part_keeps_its_previous_files() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path();
    model_with_tables(&["Foo"]).extract_to(root).expect("first extract");
    assert!(root.join("Report/report.json").is_file());

    let mut broken = model_with_tables(&[]);
    broken.report_layout = Some(json!(["not", "a", "layout"]));
    let summary = broken.extract_to(root).expect("second extract");

    assert_eq!(summary.failed_parts.len(), 1);
    assert_eq!(summary.failed_parts[0].part, "Report/Layout");
    assert_eq!(summary.failed_parts[0].code, pbixproj::error_codes::SERIALIZE_INVALID_DOCUMENT);
    assert!(root.join("Report/report.json").is_file());
    assert!(!root.join("Model/tables/Foo").exists());
}

#[test]
fn dropped_part_leaves_no_files_behind() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path();
    let mut model = model_with_tables(&["Foo"]);
    model.report_metadata = Some(json!({"version": 5}));
    model.extract_to(root).expect("first extract");
    assert!(root.join("ReportMetadata.json").is_file());

    model.report_metadata = None;
    model.extract_to(root).expect("second extract");
    assert!(!root.join("ReportMetadata.json").exists());
}
