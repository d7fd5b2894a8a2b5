use log::{debug, warn};
use serde_json::{Map, Value};

use super::naming::{FolderNamer, rebuild_order, section_folder_name};
use crate::canonical::canonicalize;
use crate::project_folder::{ProjectFolder, ProjectRootFolder};
use crate::serialization::{PartSerializer, SerializationError};
use crate::settings::SerializationMode;

pub const REPORT_FOLDER: &str = "Report";
const REPORT_FILE: &str = "report.json";
const SECTION_FILE: &str = "section.json";
const VISUAL_FILE: &str = "visualContainer.json";
const SECTIONS: &str = "sections";
const VISUAL_CONTAINERS: &str = "visualContainers";

/// Properties holding a JSON document encoded as a string.
const EMBEDDED_DOCUMENTS: &[&str] = &["config", "filters", "query", "dataTransforms"];

/// Report `Layout` <-> the `Report/` folder.
pub struct ReportSerializer<'a> {
    folder: ProjectFolder<'a>,
    base_path: String,
    mode: SerializationMode,
    volatile_properties: Vec<String>,
}

impl<'a> ReportSerializer<'a> {
    pub fn new(
        root: &'a ProjectRootFolder,
        mode: SerializationMode,
        volatile_properties: Vec<String>,
    ) -> Self {
        let folder = root.folder(REPORT_FOLDER);
        Self {
            base_path: folder.relative_path(),
            folder,
            mode,
            volatile_properties,
        }
    }

    /// Writes `object` as `file_name` next to one file per embedded document.
    fn write_object(
        &self,
        folder: &ProjectFolder<'_>,
        file_name: &str,
        mut object: Map<String, Value>,
    ) -> Result<(), SerializationError> {
        for property in EMBEDDED_DOCUMENTS {
            let Some(Value::String(text)) = object.get(*property) else {
                continue;
            };
            match serde_json::from_str::<Value>(text) {
                Ok(parsed) => {
                    folder.write_json(
                        &format!("{property}.json"),
                        &canonicalize(&parsed, &self.volatile_properties),
                    )?;
                    object.remove(*property);
                }
                Err(e) => {
                    warn!(
                        "{}/{file_name}: '{property}' is not JSON ({e}); keeping it inline",
                        folder.relative_path()
                    );
                }
            }
        }
        let canonical = canonicalize(&Value::Object(object), &self.volatile_properties);
        folder.write_json(file_name, &canonical)?;
        Ok(())
    }

    fn write_section(
        &self,
        folder: &ProjectFolder<'_>,
        mut section: Map<String, Value>,
    ) -> Result<(), SerializationError> {
        if let Some(Value::Array(containers)) = section.remove(VISUAL_CONTAINERS) {
            let mut namer = FolderNamer::new();
            let mut inline = Vec::new();
            for container in containers {
                let Value::Object(container) = container else {
                    inline.push(container);
                    continue;
                };
                let config = container
                    .get("config")
                    .and_then(Value::as_str)
                    .and_then(|text| serde_json::from_str::<Value>(text).ok());
                let name = namer.visual_folder_name(&Value::Object(container.clone()), config.as_ref());
                debug!("visual container -> {name}");
                self.write_object(
                    &folder.subfolder(VISUAL_CONTAINERS).subfolder(&name),
                    VISUAL_FILE,
                    container,
                )?;
            }
            if !inline.is_empty() {
                section.insert(VISUAL_CONTAINERS.into(), Value::Array(inline));
            }
        }
        self.write_object(folder, SECTION_FILE, section)
    }
}

impl PartSerializer<Value> for ReportSerializer<'_> {
    fn base_path(&self) -> &str {
        &self.base_path
    }

    fn serialize(&mut self, layout: &Value) -> Result<bool, SerializationError> {
        if self.mode == SerializationMode::Raw {
            self.folder
                .write_json(REPORT_FILE, &canonicalize(layout, &self.volatile_properties))?;
            return Ok(true);
        }
        let Value::Object(mut report) = layout.clone() else {
            return Err(SerializationError::invalid(
                format!("{}/{REPORT_FILE}", self.base_path),
                "layout is not an object",
            ));
        };
        if let Some(Value::Array(sections)) = report.remove(SECTIONS) {
            let mut namer = FolderNamer::new();
            let mut inline = Vec::new();
            for section in sections {
                let Value::Object(section) = section else {
                    inline.push(section);
                    continue;
                };
                let name = namer.unique(&section_folder_name(&Value::Object(section.clone())));
                self.write_section(&self.folder.subfolder(SECTIONS).subfolder(&name), section)?;
            }
            if !inline.is_empty() {
                report.insert(SECTIONS.into(), Value::Array(inline));
            }
        }
        self.write_object(&self.folder, REPORT_FILE, report)?;
        Ok(true)
    }

    fn deserialize(&self) -> Result<Option<Value>, SerializationError> {
        let Some(mut report) = read_object(&self.folder, REPORT_FILE)? else {
            return Ok(None);
        };
        let sections_folder = self.folder.subfolder(SECTIONS);
        let mut sections = Vec::new();
        for name in rebuild_order(sections_folder.subfolder_names()?) {
            let folder = sections_folder.subfolder(&name);
            let Some(mut section) = read_object(&folder, SECTION_FILE)? else {
                continue;
            };
            let containers_folder = folder.subfolder(VISUAL_CONTAINERS);
            let mut containers = Vec::new();
            for visual in rebuild_order(containers_folder.subfolder_names()?) {
                if let Some(container) = read_object(&containers_folder.subfolder(&visual), VISUAL_FILE)? {
                    containers.push(Value::Object(container));
                }
            }
            append(&mut section, VISUAL_CONTAINERS, containers);
            sections.push(Value::Object(section));
        }
        append(&mut report, SECTIONS, sections);
        Ok(Some(Value::Object(report)))
    }
}

/// Reads `file_name` and folds sibling document files back in as strings.
fn read_object(
    folder: &ProjectFolder<'_>,
    file_name: &str,
) -> Result<Option<Map<String, Value>>, SerializationError> {
    let Some(value) = folder.read_json(file_name)? else {
        return Ok(None);
    };
    let Value::Object(mut object) = value else {
        return Err(SerializationError::invalid(
            format!("{}/{file_name}", folder.relative_path()),
            "expected an object",
        ));
    };
    for property in EMBEDDED_DOCUMENTS {
        let sibling = format!("{property}.json");
        if let Some(document) = folder.read_json(&sibling)? {
            let text = serde_json::to_string(&document)
                .map_err(|e| SerializationError::invalid(&sibling, e.to_string()))?;
            object.insert(property.to_string(), Value::String(text));
        }
    }
    Ok(Some(object))
}

fn append(object: &mut Map<String, Value>, key: &str, items: Vec<Value>) {
    if items.is_empty() {
        return;
    }
    match object.get_mut(key) {
        Some(Value::Array(existing)) => existing.extend(items),
        _ => {
            object.insert(key.to_string(), Value::Array(items));
        }
    }
}
