use std::collections::{BTreeMap, BTreeSet};

use log::{debug, warn};
use serde_json::{Map, Value};

use super::data_sources::GlobalPipeSource;
use super::expressions::{expression_text, expression_value};
use super::queries_lookup::{DataSourceIdCache, QueriesLookup};
use super::TIMESTAMP_PROPERTIES;
use crate::canonical::strip_properties;
use crate::escaping::{escape_path_segment, unescape_path_segment};
use crate::mashup::{MashupSerializer, decode_datamashup_base64};
use crate::project_folder::{ProjectFolder, ProjectRootFolder};
use crate::serialization::{PartSerializer, SerializationError};
use crate::settings::SerializationMode;

pub const MODEL_FOLDER: &str = "Model";
const DATABASE_FILE: &str = "database.json";
const TABLE_FILE: &str = "table.json";
const DATA_SOURCE_FILE: &str = "dataSource.json";
const TABLES_FOLDER: &str = "tables";
const QUERIES_FOLDER: &str = "queries";
const DATA_SOURCES_FOLDER: &str = "dataSources";
const MASHUP_FOLDER: &str = "mashup";

/// How one child collection of a table is peeled into files.
#[derive(Clone, Copy)]
enum Formula {
    None,
    /// `expression` holds DAX.
    Dax,
    /// `source.expression` holds M or DAX depending on `source.type`.
    PartitionSource,
}

const TABLE_COLLECTIONS: &[(&str, Formula)] = &[
    ("columns", Formula::Dax),
    ("measures", Formula::Dax),
    ("hierarchies", Formula::None),
    ("partitions", Formula::PartitionSource),
];

/// TMSL `database.json` <-> the `Model/` folder.
pub struct TabularModelSerializer<'a> {
    folder: ProjectFolder<'a>,
    base_path: String,
    mode: SerializationMode,
    mashup_mode: SerializationMode,
    queries: BTreeMap<String, String>,
}

impl<'a> TabularModelSerializer<'a> {
    /// `queries` is the manifest's data source id cache; it is updated by
    /// [`PartSerializer::serialize`].
    pub fn new(
        root: &'a ProjectRootFolder,
        mode: SerializationMode,
        queries: BTreeMap<String, String>,
    ) -> Self {
        let folder = root.folder(MODEL_FOLDER);
        Self {
            base_path: folder.relative_path(),
            folder,
            mode,
            mashup_mode: SerializationMode::Default,
            queries,
        }
    }

    pub fn with_mashup_mode(mut self, mode: SerializationMode) -> Self {
        self.mashup_mode = mode;
        self
    }

    pub fn queries(&self) -> &BTreeMap<String, String> {
        &self.queries
    }

    pub fn into_queries(self) -> BTreeMap<String, String> {
        self.queries
    }

    fn serialize_data_sources(
        &mut self,
        data_sources: Vec<Value>,
    ) -> Result<(Vec<Value>, DataSourceIdCache), SerializationError> {
        let pipes: Vec<Option<GlobalPipeSource>> = data_sources
            .iter()
            .map(|ds| {
                ds.get("connectionString")
                    .and_then(Value::as_str)
                    .and_then(GlobalPipeSource::detect)
            })
            .collect();
        let current = data_sources.iter().zip(&pipes).filter_map(|(ds, pipe)| {
            let name = ds.get("name")?.as_str()?;
            Some((name.to_string(), pipe.as_ref()?.location.clone()))
        });
        let cache = DataSourceIdCache::new(&self.queries, current.collect::<Vec<_>>());

        let folder = self.folder.subfolder(DATA_SOURCES_FOLDER);
        let mut inline = Vec::new();
        for (ds, pipe) in data_sources.into_iter().zip(pipes) {
            let Value::Object(mut ds) = ds else {
                inline.push(ds);
                continue;
            };
            let Some(name) = ds.get("name").and_then(Value::as_str).map(str::to_string) else {
                inline.push(Value::Object(ds));
                continue;
            };
            match pipe {
                Some(pipe) => match decode_datamashup_base64(&pipe.mashup_base64) {
                    Ok(bytes) => {
                        let ds_folder = folder.subfolder(&escape_path_segment(&pipe.location));
                        ds.insert(
                            "name".into(),
                            Value::String(cache.lookup_original_data_source_id(&name)),
                        );
                        ds.insert(
                            "connectionString".into(),
                            Value::String(pipe.reduced_connection_string()),
                        );
                        ds_folder.write_json(DATA_SOURCE_FILE, &Value::Object(ds))?;
                        MashupSerializer::new(ds_folder.subfolder(MASHUP_FOLDER), self.mashup_mode)
                            .serialize(&bytes)?;
                    }
                    Err(e) => {
                        warn!("data source '{name}': embedded mashup is unreadable ({e}); keeping it as is");
                        folder
                            .subfolder(&escape_path_segment(&name))
                            .write_json(DATA_SOURCE_FILE, &Value::Object(ds))?;
                    }
                },
                None => folder
                    .subfolder(&escape_path_segment(&name))
                    .write_json(DATA_SOURCE_FILE, &Value::Object(ds))?,
            }
        }
        Ok((inline, cache))
    }

    fn serialize_expressions(&self, expressions: Vec<Value>) -> Result<Vec<Value>, SerializationError> {
        let folder = self.folder.subfolder(QUERIES_FOLDER);
        let mut inline = Vec::new();
        for expr in expressions {
            let Value::Object(mut map) = expr else {
                inline.push(expr);
                continue;
            };
            let is_m = map.get("kind").and_then(Value::as_str) == Some("m");
            let name = map.get("name").and_then(Value::as_str).map(str::to_string);
            let text = map.get("expression").and_then(expression_text);
            match (is_m, name, text) {
                (true, Some(name), Some(text)) => {
                    map.remove("expression");
                    let stem = escape_path_segment(&name);
                    folder.write_text(&format!("{stem}.m"), &text)?;
                    folder.write_json(&format!("{stem}.json"), &Value::Object(map))?;
                }
                _ => inline.push(Value::Object(map)),
            }
        }
        Ok(inline)
    }

    fn deserialize_data_sources(&self) -> Result<Vec<Value>, SerializationError> {
        let folder = self.folder.subfolder(DATA_SOURCES_FOLDER);
        let mut out = Vec::new();
        for name in folder.subfolder_names()? {
            let ds_folder = folder.subfolder(&name);
            if ds_folder.subfolder(MASHUP_FOLDER).exists() {
                return Err(SerializationError::NotSupported {
                    feature: format!(
                        "legacy data source '{}' with an embedded mashup",
                        unescape_path_segment(&name)
                    ),
                });
            }
            if let Some(ds) = ds_folder.read_json(DATA_SOURCE_FILE)? {
                out.push(ds);
            }
        }
        Ok(out)
    }

    fn deserialize_tables(&self) -> Result<Vec<Value>, SerializationError> {
        let folder = self.folder.subfolder(TABLES_FOLDER);
        let mut tables = Vec::new();
        for name in folder.subfolder_names()? {
            let table_folder = folder.subfolder(&name);
            let path = format!("{}/{TABLES_FOLDER}/{name}/{TABLE_FILE}", self.base_path);
            let Some(table) = table_folder.read_json(TABLE_FILE)? else {
                debug!("{path} missing, skipping folder");
                continue;
            };
            let Value::Object(mut table) = table else {
                return Err(SerializationError::invalid(path, "table is not an object"));
            };
            for (collection, formula) in TABLE_COLLECTIONS {
                let items = read_table_items(&table_folder.subfolder(collection), *formula)?;
                if items.is_empty() {
                    continue;
                }
                match table.get_mut(*collection) {
                    Some(Value::Array(existing)) => existing.extend(items),
                    _ => {
                        table.insert(collection.to_string(), Value::Array(items));
                    }
                }
            }
            tables.push(Value::Object(table));
        }
        Ok(tables)
    }

    /// Shared expressions from `queries/`, plus partitions synthesized for
    /// tables that only have a query file.
    fn deserialize_queries(&self, tables: &mut [Value]) -> Result<Vec<Value>, SerializationError> {
        let folder = self.folder.subfolder(QUERIES_FOLDER);
        let files = folder.file_names()?;
        let stems: BTreeSet<&str> = files.iter().filter_map(|f| f.strip_suffix(".json")).collect();
        let mut expressions = Vec::new();
        for file in &files {
            let Some(stem) = file.strip_suffix(".m") else {
                continue;
            };
            let Some(text) = folder.read_text(file)? else {
                continue;
            };
            let name = unescape_path_segment(stem);
            if stems.contains(stem) {
                let meta_file = format!("{stem}.json");
                let mut meta = match folder.read_json(&meta_file)? {
                    Some(Value::Object(map)) => map,
                    _ => {
                        return Err(SerializationError::invalid(
                            format!("{}/{QUERIES_FOLDER}/{meta_file}", self.base_path),
                            "expected an object",
                        ));
                    }
                };
                meta.insert("expression".into(), expression_value(&text));
                expressions.push(Value::Object(meta));
                continue;
            }
            if let Some(table) = tables.iter_mut().find(|t| table_name(t) == Some(name.as_str())) {
                if has_m_partition(table) {
                    return Err(SerializationError::invalid(
                        format!("{}/{QUERIES_FOLDER}/{file}", self.base_path),
                        format!("table '{name}' already has an M partition"),
                    ));
                }
                debug!("synthesizing partition for table '{name}' from its query file");
                push_partition(table, &name, &text);
                continue;
            }
            let mut expr = Map::new();
            expr.insert("name".into(), Value::String(name));
            expr.insert("kind".into(), Value::String("m".into()));
            expr.insert("expression".into(), expression_value(&text));
            expressions.push(Value::Object(expr));
        }
        Ok(expressions)
    }
}

impl PartSerializer<Value> for TabularModelSerializer<'_> {
    fn base_path(&self) -> &str {
        &self.base_path
    }

    fn serialize(&mut self, database: &Value) -> Result<bool, SerializationError> {
        let mut database = database.clone();
        strip_properties(&mut database, TIMESTAMP_PROPERTIES);

        if self.mode == SerializationMode::Raw {
            self.folder.write_json(DATABASE_FILE, &database)?;
            return Ok(true);
        }

        let Some(Value::Object(model)) = database.get_mut("model") else {
            self.folder.write_json(DATABASE_FILE, &database)?;
            return Ok(true);
        };

        if let Some(Value::Array(data_sources)) = model.remove("dataSources") {
            let (inline, cache) = self.serialize_data_sources(data_sources)?;
            if !inline.is_empty() {
                model.insert("dataSources".into(), Value::Array(inline));
            }
            if let Some(Value::Array(tables)) = model.get_mut("tables") {
                for table in tables.iter_mut() {
                    substitute_partition_sources(table, &cache);
                }
            }
            self.queries = cache.into_queries();
        }

        if let Some(Value::Array(tables)) = model.remove("tables") {
            let folder = self.folder.subfolder(TABLES_FOLDER);
            let mut inline = Vec::new();
            for table in tables {
                match (table_name(&table).map(escape_path_segment), table) {
                    (Some(dir), Value::Object(table)) => {
                        write_table(&folder.subfolder(&dir), table)?;
                    }
                    (_, other) => inline.push(other),
                }
            }
            if !inline.is_empty() {
                model.insert("tables".into(), Value::Array(inline));
            }
        }

        if let Some(Value::Array(expressions)) = model.remove("expressions") {
            let inline = self.serialize_expressions(expressions)?;
            if !inline.is_empty() {
                model.insert("expressions".into(), Value::Array(inline));
            }
        }

        self.folder.write_json(DATABASE_FILE, &database)?;
        Ok(true)
    }

    fn deserialize(&self) -> Result<Option<Value>, SerializationError> {
        let Some(mut database) = self.folder.read_json(DATABASE_FILE)? else {
            return Ok(None);
        };
        let data_sources = self.deserialize_data_sources()?;
        let mut tables = self.deserialize_tables()?;
        let expressions = self.deserialize_queries(&mut tables)?;

        let path = format!("{}/{DATABASE_FILE}", self.base_path);
        let Value::Object(root) = &mut database else {
            return Err(SerializationError::invalid(path, "database is not an object"));
        };
        if data_sources.is_empty() && tables.is_empty() && expressions.is_empty() {
            return Ok(Some(database));
        }
        let model = root
            .entry("model")
            .or_insert_with(|| Value::Object(Map::new()));
        let Value::Object(model) = model else {
            return Err(SerializationError::invalid(path, "model is not an object"));
        };
        append_array(model, "dataSources", data_sources);
        append_array(model, "tables", tables);
        append_array(model, "expressions", expressions);
        Ok(Some(database))
    }
}

fn table_name(table: &Value) -> Option<&str> {
    table.get("name").and_then(Value::as_str)
}

fn append_array(model: &mut Map<String, Value>, key: &str, items: Vec<Value>) {
    if items.is_empty() {
        return;
    }
    match model.get_mut(key) {
        Some(Value::Array(existing)) => existing.extend(items),
        _ => {
            model.insert(key.to_string(), Value::Array(items));
        }
    }
}

fn substitute_partition_sources(table: &mut Value, lookup: &dyn QueriesLookup) {
    let Some(Value::Array(partitions)) = table.get_mut("partitions") else {
        return;
    };
    for partition in partitions {
        if let Some(Value::String(ds)) = partition
            .get_mut("source")
            .and_then(|source| source.get_mut("dataSource"))
        {
            *ds = lookup.lookup_original_data_source_id(ds);
        }
    }
}

fn write_table(folder: &ProjectFolder<'_>, mut table: Map<String, Value>) -> Result<(), SerializationError> {
    for (collection, formula) in TABLE_COLLECTIONS {
        let Some(Value::Array(items)) = table.remove(*collection) else {
            continue;
        };
        let sub = folder.subfolder(collection);
        let mut inline = Vec::new();
        for item in items {
            let name = item.get("name").and_then(Value::as_str).map(escape_path_segment);
            match (name, item) {
                (Some(stem), Value::Object(item)) => write_table_item(&sub, &stem, item, *formula)?,
                (_, other) => inline.push(other),
            }
        }
        if !inline.is_empty() {
            table.insert(collection.to_string(), Value::Array(inline));
        }
    }
    folder.write_json(TABLE_FILE, &Value::Object(table))?;
    Ok(())
}

fn write_table_item(
    folder: &ProjectFolder<'_>,
    stem: &str,
    mut item: Map<String, Value>,
    formula: Formula,
) -> Result<(), SerializationError> {
    match formula {
        Formula::None => {}
        Formula::Dax => {
            if let Some(text) = item.get("expression").and_then(expression_text) {
                item.remove("expression");
                folder.write_text(&format!("{stem}.dax"), &text)?;
            }
        }
        Formula::PartitionSource => {
            if let Some(Value::Object(source)) = item.get_mut("source") {
                let ext = match source.get("type").and_then(Value::as_str) {
                    Some("m") => Some("m"),
                    Some("calculated") => Some("dax"),
                    _ => None,
                };
                if let Some(ext) = ext
                    && let Some(text) = source.get("expression").and_then(expression_text)
                {
                    source.remove("expression");
                    folder.write_text(&format!("{stem}.{ext}"), &text)?;
                }
            }
        }
    }
    folder.write_json(&format!("{stem}.json"), &Value::Object(item))?;
    Ok(())
}

fn read_table_items(folder: &ProjectFolder<'_>, formula: Formula) -> Result<Vec<Value>, SerializationError> {
    let mut items = Vec::new();
    for file in folder.file_names()? {
        let Some(stem) = file.strip_suffix(".json") else {
            continue;
        };
        let Some(Value::Object(mut item)) = folder.read_json(&file)? else {
            continue;
        };
        match formula {
            Formula::None => {}
            Formula::Dax => {
                if let Some(text) = folder.read_text(&format!("{stem}.dax"))? {
                    item.insert("expression".into(), expression_value(&text));
                }
            }
            Formula::PartitionSource => {
                if let Some(Value::Object(source)) = item.get_mut("source") {
                    let ext = match source.get("type").and_then(Value::as_str) {
                        Some("m") => Some("m"),
                        Some("calculated") => Some("dax"),
                        _ => None,
                    };
                    if let Some(ext) = ext
                        && let Some(text) = folder.read_text(&format!("{stem}.{ext}"))?
                    {
                        source.insert("expression".into(), expression_value(&text));
                    }
                }
            }
        }
        items.push(Value::Object(item));
    }
    Ok(items)
}

fn has_m_partition(table: &Value) -> bool {
    table
        .get("partitions")
        .and_then(Value::as_array)
        .is_some_and(|partitions| {
            partitions.iter().any(|p| {
                p.get("source")
                    .and_then(|s| s.get("type"))
                    .and_then(Value::as_str)
                    == Some("m")
            })
        })
}

fn push_partition(table: &mut Value, name: &str, text: &str) {
    let mut source = Map::new();
    source.insert("type".into(), Value::String("m".into()));
    source.insert("expression".into(), expression_value(text));
    let mut partition = Map::new();
    partition.insert("name".into(), Value::String(name.to_string()));
    partition.insert("mode".into(), Value::String("import".into()));
    partition.insert("source".into(), Value::Object(source));

    let Value::Object(table) = table else {
        return;
    };
    match table.get_mut("partitions") {
        Some(Value::Array(partitions)) => partitions.push(Value::Object(partition)),
        _ => {
            table.insert("partitions".into(), Value::Array(vec![Value::Object(partition)]));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn read(dir: &std::path::Path, rel: &str) -> String {
        std::fs::read_to_string(dir.join(rel)).unwrap_or_else(|e| panic!("{rel}: {e}"))
    }

    fn read_json(dir: &std::path::Path, rel: &str) -> Value {
        serde_json::from_str(&read(dir, rel)).expect("json")
    }

    fn sample_database() -> Value {
        json!({
            "name": "SemanticModel",
            "compatibilityLevel": 1550,
            "model": {
                "culture": "en-US",
                "modifiedTime": "2024-01-01T00:00:00",
                "tables": [{
                    "name": "Sales",
                    "lineageTag": "t1",
                    "columns": [
                        {"name": "Amount", "dataType": "double", "sourceColumn": "Amount"},
                        {"name": "Double", "type": "calculated", "expression": "[Amount] * 2"}
                    ],
                    "measures": [
                        {"name": "Total", "expression": "SUM([Amount])"},
                        {"name": "Ratio", "expression": ["", "DIVIDE(", "  [Total], 2)"]}
                    ],
                    "hierarchies": [{"name": "Dates", "levels": [{"name": "Year", "column": "Year"}]}],
                    "partitions": [{
                        "name": "Sales-1",
                        "mode": "import",
                        "source": {"type": "m", "expression": ["let", "    Source = 1", "in", "    Source"]}
                    }]
                }],
                "expressions": [
                    {"name": "Server", "kind": "m", "expression": "\"localhost\" meta [IsParameterQuery=true]", "annotations": [{"name": "a", "value": "b"}]}
                ]
            }
        })
    }

    #[test]
    fn measures_and_formulas_are_peeled_into_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = ProjectRootFolder::new(dir.path());
        let mut serializer = TabularModelSerializer::new(&root, SerializationMode::Default, BTreeMap::new());
        serializer.serialize(&sample_database()).expect("serialize");

        let base = dir.path().join("Model");
        assert_eq!(read(&base, "tables/Sales/measures/Total.dax"), "SUM([Amount])");
        assert_eq!(read(&base, "tables/Sales/measures/Ratio.dax"), "\nDIVIDE(\n  [Total], 2)");
        assert_eq!(read_json(&base, "tables/Sales/measures/Total.json"), json!({"name": "Total"}));
        assert_eq!(read(&base, "tables/Sales/columns/Double.dax"), "[Amount] * 2");
        assert!(!base.join("tables/Sales/columns/Amount.dax").exists());
        assert_eq!(
            read(&base, "tables/Sales/partitions/Sales-1.m"),
            "let\n    Source = 1\nin\n    Source"
        );
        assert!(base.join("tables/Sales/hierarchies/Dates.json").is_file());

        let table = read_json(&base, "tables/Sales/table.json");
        assert_eq!(table, json!({"name": "Sales", "lineageTag": "t1"}));

        assert_eq!(read(&base, "queries/Server.m"), "\"localhost\" meta [IsParameterQuery=true]");
        let meta = read_json(&base, "queries/Server.json");
        assert!(meta.get("expression").is_none());
        assert_eq!(meta["annotations"][0]["name"], "a");

        let database = read_json(&base, "database.json");
        assert_eq!(database["model"], json!({"culture": "en-US"}));
    }

    #[test]
    fn folder_tree_rebuilds_the_model() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = ProjectRootFolder::new(dir.path());
        let mut serializer = TabularModelSerializer::new(&root, SerializationMode::Default, BTreeMap::new());
        serializer.serialize(&sample_database()).expect("serialize");

        let rebuilt = serializer.deserialize().expect("deserialize").expect("present");
        let table = &rebuilt["model"]["tables"][0];
        assert_eq!(table["name"], "Sales");
        let measures = table["measures"].as_array().expect("measures");
        assert_eq!(measures[0]["name"], "Ratio");
        assert_eq!(measures[0]["expression"], json!(["", "DIVIDE(", "  [Total], 2)"]));
        assert_eq!(measures[1]["expression"], "SUM([Amount])");
        assert_eq!(
            table["partitions"][0]["source"]["expression"],
            json!(["let", "    Source = 1", "in", "    Source"])
        );
        assert_eq!(rebuilt["model"]["expressions"][0]["kind"], "m");
        assert!(rebuilt["model"].get("modifiedTime").is_none());
    }

    #[test]
    fn query_file_without_metadata_becomes_a_partition_or_expression() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = ProjectRootFolder::new(dir.path());
        let model = root.folder("Model");
        model
            .write_json("database.json", &json!({"name": "db", "model": {}}))
            .expect("database");
        model
            .write_json("tables/Budget/table.json", &json!({"name": "Budget"}))
            .expect("table");
        model.write_text("queries/Budget.m", "let\n  x = 1\nin\n  x").expect("query");
        model.write_text("queries/Helper.m", "1 + 1").expect("query");

        let serializer = TabularModelSerializer::new(&root, SerializationMode::Default, BTreeMap::new());
        let rebuilt = serializer.deserialize().expect("deserialize").expect("present");
        let partition = &rebuilt["model"]["tables"][0]["partitions"][0];
        assert_eq!(partition["name"], "Budget");
        assert_eq!(partition["mode"], "import");
        assert_eq!(partition["source"]["type"], "m");
        assert_eq!(partition["source"]["expression"], json!(["let", "  x = 1", "in", "  x"]));
        assert_eq!(
            rebuilt["model"]["expressions"],
            json!([{"name": "Helper", "kind": "m", "expression": "1 + 1"}])
        );
    }

    #[test]
    fn query_file_for_a_table_with_an_m_partition_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = ProjectRootFolder::new(dir.path());
        let mut serializer = TabularModelSerializer::new(&root, SerializationMode::Default, BTreeMap::new());
        serializer.serialize(&sample_database()).expect("serialize");
        root.folder("Model").write_text("queries/Sales.m", "1").expect("query");

        let err = serializer.deserialize().expect_err("name clash");
        assert!(matches!(err, SerializationError::InvalidDocument { ref path, .. } if path.ends_with("queries/Sales.m")));
    }

    #[test]
    fn dot_prefixed_names_survive_a_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = ProjectRootFolder::new(dir.path());
        let mut serializer = TabularModelSerializer::new(&root, SerializationMode::Default, BTreeMap::new());
        let database = json!({"model": {
            "tables": [
                {"name": ".Measures", "measures": [{"name": "X", "expression": "1"}]},
                {"name": "Sales", "measures": [
                    {"name": ".Margin", "expression": "[Total] - [Cost]"},
                    {"name": "Total", "expression": "2"}
                ]}
            ],
            "expressions": [{"name": ".Param", "kind": "m", "expression": "42"}]
        }});
        serializer.serialize(&database).expect("serialize");

        let base = dir.path().join("Model");
        assert_eq!(read(&base, "tables/Sales/measures/%2EMargin.dax"), "[Total] - [Cost]");
        assert!(base.join("tables/%2EMeasures/table.json").is_file());
        assert_eq!(read(&base, "queries/%2EParam.m"), "42");

        let rebuilt = serializer.deserialize().expect("deserialize").expect("present");
        let tables = rebuilt["model"]["tables"].as_array().expect("tables");
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[0]["name"], ".Measures");
        assert_eq!(tables[0]["measures"][0]["name"], "X");
        let measures = tables[1]["measures"].as_array().expect("measures");
        assert_eq!(measures.len(), 2);
        assert_eq!(measures[0]["name"], ".Margin");
        assert_eq!(measures[0]["expression"], "[Total] - [Cost]");
        assert_eq!(rebuilt["model"]["expressions"][0]["name"], ".Param");
        assert_eq!(rebuilt["model"]["expressions"][0]["expression"], "42");
    }

    #[test]
    fn empty_collections_are_removed() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = ProjectRootFolder::new(dir.path());
        let mut serializer = TabularModelSerializer::new(&root, SerializationMode::Default, BTreeMap::new());
        serializer
            .serialize(&json!({"model": {"tables": [{"name": "T", "partitions": [], "measures": [{"expression": "1"}]}]}}))
            .expect("serialize");
        let table = read_json(&dir.path().join("Model"), "tables/T/table.json");
        assert_eq!(table, json!({"name": "T", "measures": [{"expression": "1"}]}));
    }

    #[test]
    fn plain_data_sources_are_peeled_and_restored() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = ProjectRootFolder::new(dir.path());
        let mut serializer = TabularModelSerializer::new(&root, SerializationMode::Default, BTreeMap::new());
        let ds = json!({"name": "SqlServer localhost;db", "connectionString": "Provider=SQLNCLI11;Data Source=localhost"});
        serializer
            .serialize(&json!({"model": {"dataSources": [ds.clone()]}}))
            .expect("serialize");
        assert!(
            dir.path()
                .join("Model/dataSources/SqlServer localhost;db/dataSource.json")
                .is_file()
        );
        assert!(serializer.queries().is_empty());
        let rebuilt = serializer.deserialize().expect("deserialize").expect("present");
        assert_eq!(rebuilt["model"]["dataSources"], json!([ds]));
    }

    #[test]
    fn legacy_data_source_folder_is_not_supported() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = ProjectRootFolder::new(dir.path());
        let model = root.folder("Model");
        model.write_json("database.json", &json!({"model": {}})).expect("db");
        model
            .write_json("dataSources/Query1/dataSource.json", &json!({"name": "id"}))
            .expect("ds");
        model
            .write_bytes("dataSources/Query1/mashup/DataMashup.bin", &[0])
            .expect("mashup");
        let serializer = TabularModelSerializer::new(&root, SerializationMode::Default, BTreeMap::new());
        let err = serializer.deserialize().expect_err("legacy");
        assert!(matches!(err, SerializationError::NotSupported { .. }));
    }

    #[test]
    fn raw_mode_writes_one_document() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = ProjectRootFolder::new(dir.path());
        let mut serializer = TabularModelSerializer::new(&root, SerializationMode::Raw, BTreeMap::new());
        serializer.serialize(&sample_database()).expect("serialize");
        assert_eq!(root.written_files(), vec!["Model/database.json"]);
        let rebuilt = serializer.deserialize().expect("deserialize").expect("present");
        assert_eq!(rebuilt["model"]["tables"][0]["measures"][0]["name"], "Total");
    }
}
