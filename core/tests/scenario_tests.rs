use pbixproj::mashup::metadata::entry_value_to_json;
use pbixproj::report::naming::FolderNamer;
use pbixproj::{
    PartSerializer, ProjectRootFolder, ReportSerializer, SerializationMode, TabularModelSerializer,
};
use serde_json::json;
use std::collections::BTreeMap;

mod common;
use common::read_json;

#[test]
fn measure_expression_lands_in_a_dax_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = ProjectRootFolder::new(dir.path());
    let mut serializer = TabularModelSerializer::new(&root, SerializationMode::Default, BTreeMap::new());
    serializer
        .serialize(&json!({
            "model": {
                "tables": [{"name": "Sales", "measures": [{"name": "Total", "expression": "SUM([Amount])"}]}]
            }
        }))
        .expect("serialize");

    let dax = std::fs::read_to_string(dir.path().join("Model/tables/Sales/measures/Total.dax"))
        .expect("dax file");
    assert_eq!(dax, "SUM([Amount])");
    let table = read_json(&dir.path().join("Model/tables/Sales/table.json"));
    assert!(table.get("measures").is_none());
}

#[test]
fn titled_visual_folder_uses_tab_order_and_title() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = ProjectRootFolder::new(dir.path());
    let config = json!({
        "name": "0123456789",
        "singleVisual": {
            "visualType": "card",
            "vcObjects": {"title": [{"properties": {"text": {"expr": {"Literal": {"Value": "'Revenue'"}}}}}]}
        }
    });
    let layout = json!({
        "sections": [{
            "name": "ReportSection",
            "displayName": "Page 1",
            "ordinal": 0,
            "visualContainers": [{"tabOrder": 3, "config": config.to_string()}]
        }]
    });
    ReportSerializer::new(&root, SerializationMode::Default, Vec::new())
        .serialize(&layout)
        .expect("serialize");
    assert!(
        dir.path()
            .join("Report/sections/000_Page 1/visualContainers/00003_Revenue/visualContainer.json")
            .is_file()
    );
}

#[test]
fn colliding_visual_labels_get_distinct_stable_names() {
    let chart = |name: &str| json!({"name": name, "singleVisual": {"visualType": "Column Chart"}});
    let containers = [json!({"tabOrder": 1}), json!({"tabOrder": 1})];
    let configs = [chart("abcde-first"), chart("abcde-second")];

    let names = |_: usize| {
        let mut namer = FolderNamer::new();
        containers
            .iter()
            .zip(&configs)
            .map(|(container, config)| namer.visual_folder_name(container, Some(config)))
            .collect::<Vec<_>>()
    };
    let first_run = names(0);
    assert_eq!(first_run[0], "00001_Column Chart (abcde)");
    assert_eq!(first_run[1], "00001_Column Chart (abcde) (abcde-second)");
    assert_ne!(first_run[0], first_run[1]);
    assert_eq!(first_run, names(1));
}

#[test]
fn json_looking_metadata_strings_become_json() {
    assert_eq!(entry_value_to_json("FillColumnNames", "s[1,2,3]"), json!([1, 2, 3]));
    assert_eq!(entry_value_to_json("Name", "s[1,2"), json!("[1,2"));
}
