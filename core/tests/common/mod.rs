//! Common test utilities shared across integration tests.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::io::{Cursor, Write};
use std::path::Path;

use pbixproj::converters::TextEncoding;
use pbixproj::mashup::metadata::build_metadata;
use pbixproj::mashup::package::write_package_entries;
use pbixproj::mashup::permissions::permissions_xml;
use pbixproj::mashup::{
    MetadataEntry, MetadataItem, PackageEntry, PackageMetadata, Permissions, RawDataMashup,
    build_data_mashup,
};
use serde_json::{Value, json};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

pub const SECTION1: &str = "section Section1;\r\n\r\nshared Sales = let\r\n    Source = Csv.Document(File.Contents(\"C:\\data\\sales.csv\"))\r\nin\r\n    Source;\r\n\r\nshared #\"Date Table\" = List.Dates(#date(2024, 1, 1), 366, #duration(1, 0, 0, 0));";

pub fn build_zip(entries: &[(&str, Vec<u8>)]) -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    for (name, bytes) in entries {
        zip.start_file(*name, options).expect("start entry");
        zip.write_all(bytes).expect("write entry");
    }
    zip.finish().expect("finish zip").into_inner()
}

pub fn unicode(text: &str) -> Vec<u8> {
    TextEncoding::Unicode.encode(text)
}

pub fn unicode_json(value: &Value) -> Vec<u8> {
    unicode(&value.to_string())
}

fn entry(name: &str, bytes: &[u8]) -> PackageEntry {
    PackageEntry {
        name: name.to_string(),
        bytes: bytes.to_vec(),
    }
}

/// A `DataMashup` stream with one section document, metadata for both
/// members and an empty content archive.
pub fn sample_mashup() -> Vec<u8> {
    let package = write_package_entries(&[
        entry(
            "[Content_Types].xml",
            br#"<?xml version="1.0" encoding="utf-8"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="xml" ContentType="text/xml" /><Default Extension="m" ContentType="application/x-ms-m" /></Types>"#,
        ),
        entry(
            "Config/Package.xml",
            br#"<?xml version="1.0" encoding="utf-8"?><Package xmlns:xsd="http://www.w3.org/2001/XMLSchema"><Version>2.126.0</Version><MinVersion>2.21.0</MinVersion><Culture>en-US</Culture></Package>"#,
        ),
        entry("Formulas/Section1.m", SECTION1.as_bytes()),
    ])
    .expect("package");

    let items = vec![
        MetadataItem {
            item_type: "AllFormulas".into(),
            item_path: String::new(),
            entries: vec![
                MetadataEntry {
                    entry_type: "QueryGroups".into(),
                    value: "s[]".into(),
                },
                MetadataEntry {
                    entry_type: "Relationships".into(),
                    value: "sAAAAAA==".into(),
                },
            ],
        },
        MetadataItem {
            item_type: "Formula".into(),
            item_path: "Section1/Sales".into(),
            entries: vec![
                MetadataEntry {
                    entry_type: "IsPrivate".into(),
                    value: "l0".into(),
                },
                MetadataEntry {
                    entry_type: "FillLastUpdated".into(),
                    value: "d2024-03-01T10:00:00.0000000Z".into(),
                },
                MetadataEntry {
                    entry_type: "FillColumnNames".into(),
                    value: "s[\"Region\",\"Amount\"]".into(),
                },
            ],
        },
        MetadataItem {
            item_type: "Formula".into(),
            item_path: "Section1/Date%20Table".into(),
            entries: vec![MetadataEntry {
                entry_type: "ResultType".into(),
                value: "sList".into(),
            }],
        },
    ];
    let metadata = build_metadata(&PackageMetadata {
        version: 0,
        items,
        content: write_package_entries(&[entry("Formulas/Section1.m", b"section Section1;")])
            .expect("content"),
    })
    .expect("metadata");

    build_data_mashup(&RawDataMashup {
        version: 0,
        package_parts: package,
        permissions: permissions_xml(&Permissions::default()).into_bytes(),
        metadata,
        permission_bindings: Vec::new(),
    })
    .expect("mashup")
}

pub fn sample_database() -> Value {
    json!({
        "name": "a3c2f1e0-0000-4000-8000-000000000001",
        "compatibilityLevel": 1567,
        "createdTimestamp": "2024-03-01T10:00:00",
        "model": {
            "culture": "en-US",
            "defaultPowerBIDataSourceVersion": "powerBI_V3",
            "tables": [
                {
                    "name": "Sales",
                    "columns": [
                        {"name": "Region", "dataType": "string", "sourceColumn": "Region"},
                        {"name": "Amount", "dataType": "double", "sourceColumn": "Amount"}
                    ],
                    "measures": [
                        {"name": "Total", "expression": "SUM([Amount])"},
                        {"name": "Avg/Region", "expression": ["", "AVERAGEX(", "    VALUES(Sales[Region]),", "    [Total])"]}
                    ],
                    "partitions": [{
                        "name": "Sales-0a1b",
                        "mode": "import",
                        "source": {"type": "m", "expression": ["let", "    Source = Sales", "in", "    Source"]}
                    }]
                },
                {
                    "name": "Calendar",
                    "columns": [{"name": "Date", "dataType": "dateTime", "isNameInferred": true, "sourceColumn": "[Date]"}],
                    "partitions": [{
                        "name": "Calendar",
                        "mode": "import",
                        "source": {"type": "calculated", "expression": "CALENDARAUTO()"}
                    }],
                    "hierarchies": [{"name": "Date Hierarchy", "levels": [{"name": "Year", "ordinal": 0, "column": "Date"}]}]
                }
            ],
            "expressions": [
                {"name": "Server", "kind": "m", "expression": "\"localhost\" meta [IsParameterQuery=true, Type=\"Text\"]"}
            ],
            "annotations": [{"name": "PBIDesktopVersion", "value": "2.126"}]
        }
    })
}

fn visual(tab_order: i64, name: &str, config_extra: Value) -> Value {
    let mut config = json!({
        "name": name,
        "layouts": [{"id": 0, "position": {"x": 40.0, "y": 16.000000001, "z": 0, "width": 300, "height": 200}}],
        "singleVisual": {"visualType": "columnChart", "projections": {}}
    });
    if let (Value::Object(base), Value::Object(extra)) = (&mut config, config_extra) {
        for (k, v) in extra {
            base.insert(k, v);
        }
    }
    json!({
        "x": 40.0,
        "y": 16.0,
        "z": 0.0,
        "width": 300.0,
        "height": 200.0,
        "tabOrder": tab_order,
        "config": config.to_string(),
        "filters": "[]"
    })
}

pub fn sample_layout() -> Value {
    json!({
        "id": 0,
        "reportId": "d0e1f2a3-volatile",
        "config": json!({"version": "5.50", "themeCollection": {"baseTheme": {"name": "CY24SU02"}}}).to_string(),
        "layoutOptimization": 0,
        "resourcePackages": [{"resourcePackage": {"name": "SharedResources", "type": 2, "items": []}}],
        "sections": [
            {
                "name": "ReportSection",
                "displayName": "Overview",
                "ordinal": 0,
                "width": 1280.0,
                "height": 720.0,
                "filters": "[]",
                "config": "{}",
                "visualContainers": [
                    visual(3, "8b2c1d4e5f", json!({
                        "singleVisual": {
                            "visualType": "card",
                            "vcObjects": {"title": [{"properties": {"text": {"expr": {"Literal": {"Value": "'Revenue'"}}}}}]}
                        }
                    })),
                    visual(0, "abcde11111", json!({})),
                    visual(0, "abcde22222", json!({}))
                ]
            },
            {
                "name": "ReportSection2",
                "displayName": "Details",
                "ordinal": 1,
                "filters": "[]",
                "visualContainers": []
            }
        ]
    })
}

/// A PBIT-style package with every part the extractor handles.
pub fn sample_package() -> Vec<u8> {
    build_zip(&[
        (
            "[Content_Types].xml",
            br#"<?xml version="1.0" encoding="utf-8"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="json" ContentType="" /></Types>"#.to_vec(),
        ),
        ("Version", unicode("1.28")),
        ("DataModelSchema", unicode_json(&sample_database())),
        ("DataMashup", sample_mashup()),
        ("DiagramLayout", unicode_json(&json!({"version": "1.1.0", "diagrams": []}))),
        ("Report/Layout", unicode_json(&sample_layout())),
        (
            "Report/LinguisticSchema",
            unicode(r#"<?xml version="1.0" encoding="utf-16"?><LinguisticSchema xmlns="http://schemas.microsoft.com/sqlserver/2016/01/linguisticschema" Version="1.2.0" Language="en-US"><Entities /></LinguisticSchema>"#),
        ),
        ("Metadata", unicode_json(&json!({"version": 5, "createdFrom": "Cloud"}))),
        ("Settings", unicode_json(&json!({"version": "4.0", "useStylableVisualContainerHeader": true}))),
        ("SecurityBindings", vec![1, 2, 3, 4]),
        ("Report/StaticResources/SharedResources/BaseThemes/CY24SU02.json", br#"{"name":"CY24SU02"}"#.to_vec()),
        ("Report/CustomVisuals/chord1234/package.json", br#"{"visual":{"name":"chord"}}"#.to_vec()),
    ])
}

/// Every file below `dir` as `/`-separated relative path -> contents.
pub fn read_tree(dir: &Path) -> BTreeMap<String, Vec<u8>> {
    let mut out = BTreeMap::new();
    let mut stack = vec![dir.to_path_buf()];
    while let Some(current) = stack.pop() {
        for entry in std::fs::read_dir(&current).expect("read_dir") {
            let path = entry.expect("entry").path();
            if path.is_dir() {
                stack.push(path);
            } else {
                let rel = path
                    .strip_prefix(dir)
                    .expect("below dir")
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect::<Vec<_>>()
                    .join("/");
                out.insert(rel, std::fs::read(&path).expect("read"));
            }
        }
    }
    out
}

pub fn read_json(path: &Path) -> Value {
    let text = std::fs::read_to_string(path)
        .unwrap_or_else(|e| panic!("failed to read {}: {e}", path.display()));
    serde_json::from_str(&text).unwrap_or_else(|e| panic!("{} is not JSON: {e}", path.display()))
}
