//! `DataMashup` bytes <-> the `Mashup/` folder.
//!
//! Layout below the base folder:
//!
//! ```text
//! Package/...                      inner package entries, XML indented
//! Package/Formulas/Section1.m/     section.json + one <Member>.m per member
//! Metadata/<item>/metadata.json    per-item property bag
//! Metadata/<item>/RootFormulaText.m, ReferencedQueries/<Query>.m
//! Contents/...                     metadata content ZIP entries
//! queryGroups.json, permissions.json
//! DataMashup.bin                   raw bytes (raw mode or undecodable input)
//! ```

use std::collections::BTreeSet;

use log::{debug, warn};
use serde_json::{Map, Value};

use super::framing::{RawDataMashup, build_data_mashup, parse_data_mashup};
use super::metadata::{
    MetadataEntry, MetadataItem, PackageMetadata, build_metadata, entry_value_to_json,
    json_to_entry_value, parse_metadata,
};
use super::package::{PackageEntry, is_zip, read_package_entries, write_package_entries};
use super::permissions::{Permissions, parse_permissions, permissions_xml};
use super::section::{SectionDocument, SectionLayout, SectionMember, parse_section_document};
use super::{DataMashupError, DataMashupLimits};
use crate::container::CONTENT_TYPES_PART;
use crate::escaping::{escape_path_segment, escape_relative_path, unescape_path_segment, url_decode};
use crate::project_folder::ProjectFolder;
use crate::serialization::{PartSerializer, SerializationError};
use crate::settings::SerializationMode;
use crate::xml::XmlDocument;

const RAW_FILE: &str = "DataMashup.bin";
const PACKAGE_FOLDER: &str = "Package";
const METADATA_FOLDER: &str = "Metadata";
const CONTENTS_FOLDER: &str = "Contents";
const CONTENTS_RAW_FILE: &str = "contents.bin";
const SECTION_FILE: &str = "section.json";
const METADATA_FILE: &str = "metadata.json";
const QUERY_GROUPS_FILE: &str = "queryGroups.json";
const PERMISSIONS_FILE: &str = "permissions.json";
const ROOT_FORMULA_FILE: &str = "RootFormulaText.m";
const REFERENCED_QUERIES_FOLDER: &str = "ReferencedQueries";

const ALL_FORMULAS: &str = "AllFormulas";
const QUERY_GROUPS: &str = "QueryGroups";
const LAST_AS_FORMULA_TEXT: &str = "LastAnalysisServicesFormulaText";
const ROOT_FORMULA_TEXT: &str = "RootFormulaText";
const REFERENCED_QUERIES_FORMULA_TEXT: &str = "ReferencedQueriesFormulaText";

/// A decoded mashup, ready to be laid out on disk.
struct MashupContents {
    package: Vec<PackageEntry>,
    permissions: Option<Permissions>,
    metadata: PackageMetadata,
    contents: Option<Vec<PackageEntry>>,
}

pub struct MashupSerializer<'a> {
    folder: ProjectFolder<'a>,
    base_path: String,
    mode: SerializationMode,
    limits: DataMashupLimits,
}

impl<'a> MashupSerializer<'a> {
    pub fn new(folder: ProjectFolder<'a>, mode: SerializationMode) -> Self {
        Self {
            base_path: folder.relative_path(),
            folder,
            mode,
            limits: DataMashupLimits::default(),
        }
    }

    pub fn with_limits(mut self, limits: DataMashupLimits) -> Self {
        self.limits = limits;
        self
    }

    fn decode(&self, bytes: &[u8]) -> Result<MashupContents, DataMashupError> {
        let raw = parse_data_mashup(bytes)?;
        let package = if raw.package_parts.is_empty() {
            Vec::new()
        } else {
            read_package_entries(&raw.package_parts, self.limits)?
        };
        let permissions = if raw.permissions.is_empty() {
            None
        } else {
            Some(parse_permissions(&raw.permissions)?)
        };
        let metadata = parse_metadata(&raw.metadata)?;
        let contents = if is_zip(&metadata.content) {
            Some(read_package_entries(&metadata.content, self.limits)?)
        } else {
            None
        };
        if !raw.permission_bindings.is_empty() {
            debug!(
                "dropping {} bytes of permission bindings",
                raw.permission_bindings.len()
            );
        }
        Ok(MashupContents {
            package,
            permissions,
            metadata,
            contents,
        })
    }

    fn write_package(&self, entries: &[PackageEntry]) -> Result<(), SerializationError> {
        let folder = self.folder.subfolder(PACKAGE_FOLDER);
        for entry in entries {
            let path = escape_relative_path(&entry.name);
            if entry.name.ends_with(".m")
                && let Ok(text) = std::str::from_utf8(&entry.bytes)
            {
                match parse_section_document(text) {
                    Ok(doc) => {
                        write_section(&folder.subfolder(&path), &doc)?;
                        continue;
                    }
                    Err(e) => debug!("{}: storing section verbatim ({e})", entry.name),
                }
            }
            if entry.name.to_ascii_lowercase().ends_with(".xml")
                && let Ok(text) = std::str::from_utf8(&entry.bytes)
                && let Ok(doc) = XmlDocument::parse(text)
            {
                folder.write_xml(&path, &doc)?;
                continue;
            }
            folder.write_bytes(&path, &entry.bytes)?;
        }
        Ok(())
    }

    fn write_metadata(&self, metadata: &PackageMetadata) -> Result<(), SerializationError> {
        let folder = self.folder.subfolder(METADATA_FOLDER);
        let mut used = BTreeSet::new();
        for item in &metadata.items {
            let item_folder = folder.subfolder(&unique_item_folder(item, &mut used));
            let mut entries = Map::new();
            for entry in &item.entries {
                if entries.contains_key(&entry.entry_type) {
                    warn!(
                        "metadata item '{}' repeats entry '{}'; keeping the first",
                        item.item_path, entry.entry_type
                    );
                    continue;
                }
                let value = entry_value_to_json(&entry.entry_type, &entry.value);
                if item.item_type == ALL_FORMULAS && entry.entry_type == QUERY_GROUPS {
                    self.folder.write_json(QUERY_GROUPS_FILE, &value)?;
                    entries.insert(entry.entry_type.clone(), Value::Null);
                    continue;
                }
                let value = if entry.entry_type == LAST_AS_FORMULA_TEXT {
                    extract_formula_texts(&item_folder, value)?
                } else {
                    value
                };
                entries.insert(entry.entry_type.clone(), value);
            }
            if item.item_type == ALL_FORMULAS {
                entries.remove(QUERY_GROUPS);
            }
            let mut doc = Map::new();
            doc.insert("itemType".into(), Value::String(item.item_type.clone()));
            doc.insert("itemPath".into(), Value::String(item.item_path.clone()));
            doc.insert("entries".into(), Value::Object(entries));
            item_folder.write_json(METADATA_FILE, &Value::Object(doc))?;
        }
        if !metadata.content.is_empty() && !is_zip(&metadata.content) {
            self.folder.write_bytes(CONTENTS_RAW_FILE, &metadata.content)?;
        }
        Ok(())
    }

    fn write_contents(&self, entries: &[PackageEntry]) -> Result<(), SerializationError> {
        let folder = self.folder.subfolder(CONTENTS_FOLDER);
        for entry in entries {
            folder.write_bytes(&escape_relative_path(&entry.name), &entry.bytes)?;
        }
        Ok(())
    }

    fn read_package(&self) -> Result<Vec<PackageEntry>, SerializationError> {
        let folder = self.folder.subfolder(PACKAGE_FOLDER);
        let files = folder.files_recursive()?;
        let section_dirs: BTreeSet<String> = files
            .iter()
            .filter_map(|f| f.strip_suffix(&format!("/{SECTION_FILE}")))
            .filter(|dir| dir.ends_with(".m"))
            .map(str::to_string)
            .collect();

        let mut entries = Vec::new();
        for dir in &section_dirs {
            let doc = read_section(&folder.subfolder(dir), dir)?;
            entries.push(PackageEntry {
                name: unescape_relative_path(dir),
                bytes: doc.to_text().into_bytes(),
            });
        }
        for file in &files {
            let in_section = file
                .rsplit_once('/')
                .is_some_and(|(parent, _)| section_dirs.contains(parent));
            if in_section {
                continue;
            }
            if let Some(bytes) = folder.read_bytes(file)? {
                entries.push(PackageEntry {
                    name: unescape_relative_path(file),
                    bytes,
                });
            }
        }
        entries.sort_by(|a, b| {
            (a.name != CONTENT_TYPES_PART, &a.name).cmp(&(b.name != CONTENT_TYPES_PART, &b.name))
        });
        Ok(entries)
    }

    fn read_metadata(&self) -> Result<Vec<MetadataItem>, SerializationError> {
        let folder = self.folder.subfolder(METADATA_FOLDER);
        let mut items = Vec::new();
        for file in folder.files_recursive()? {
            let dir = match file.rsplit_once('/') {
                Some((dir, METADATA_FILE)) => dir.to_string(),
                None if file == METADATA_FILE => String::new(),
                _ => continue,
            };
            let item_folder = folder.subfolder(&dir);
            let path = format!("{}/{METADATA_FOLDER}/{file}", self.base_path);
            let Some(doc) = item_folder.read_json(METADATA_FILE)? else {
                continue;
            };
            let item_type = doc
                .get("itemType")
                .and_then(Value::as_str)
                .ok_or_else(|| SerializationError::invalid(&path, "missing itemType"))?
                .to_string();
            let item_path = doc
                .get("itemPath")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let mut entries = match doc.get("entries") {
                Some(Value::Object(map)) => map.clone(),
                None => Map::new(),
                Some(_) => return Err(SerializationError::invalid(&path, "entries is not an object")),
            };

            if let Some(value) = restore_formula_texts(&item_folder, entries.remove(LAST_AS_FORMULA_TEXT))? {
                entries.insert(LAST_AS_FORMULA_TEXT.to_string(), value);
            }
            if item_type == ALL_FORMULAS
                && let Some(groups) = self.folder.read_json(QUERY_GROUPS_FILE)?
            {
                entries.insert(QUERY_GROUPS.to_string(), groups);
            }

            let mut ordered: Vec<(String, Value)> = entries.into_iter().collect();
            ordered.sort_by(|a, b| a.0.cmp(&b.0));
            items.push(MetadataItem {
                item_type,
                item_path,
                entries: ordered
                    .into_iter()
                    .map(|(entry_type, value)| MetadataEntry {
                        value: json_to_entry_value(&value),
                        entry_type,
                    })
                    .collect(),
            });
        }
        items.sort_by_key(|item| !item.item_path.is_empty());
        Ok(items)
    }

    fn read_contents(&self) -> Result<Vec<u8>, SerializationError> {
        if let Some(bytes) = self.folder.read_bytes(CONTENTS_RAW_FILE)? {
            return Ok(bytes);
        }
        let folder = self.folder.subfolder(CONTENTS_FOLDER);
        if !folder.exists() {
            return Ok(Vec::new());
        }
        let mut entries = Vec::new();
        for file in folder.files_recursive()? {
            if let Some(bytes) = folder.read_bytes(&file)? {
                entries.push(PackageEntry {
                    name: unescape_relative_path(&file),
                    bytes,
                });
            }
        }
        Ok(write_package_entries(&entries)?)
    }
}

impl PartSerializer<Vec<u8>> for MashupSerializer<'_> {
    fn base_path(&self) -> &str {
        &self.base_path
    }

    fn serialize(&mut self, bytes: &Vec<u8>) -> Result<bool, SerializationError> {
        if self.mode == SerializationMode::Raw {
            self.folder.write_bytes(RAW_FILE, bytes)?;
            return Ok(true);
        }
        let contents = match self.decode(bytes) {
            Ok(contents) => contents,
            Err(e) => {
                warn!("{}: cannot decode mashup ({e}); storing raw bytes", self.base_path);
                self.folder.write_bytes(RAW_FILE, bytes)?;
                return Ok(true);
            }
        };
        self.write_package(&contents.package)?;
        if let Some(permissions) = &contents.permissions {
            let value = serde_json::to_value(permissions)
                .map_err(|e| SerializationError::invalid(PERMISSIONS_FILE, e.to_string()))?;
            self.folder.write_json(PERMISSIONS_FILE, &value)?;
        }
        self.write_metadata(&contents.metadata)?;
        if let Some(entries) = &contents.contents {
            self.write_contents(entries)?;
        }
        Ok(true)
    }

    fn deserialize(&self) -> Result<Option<Vec<u8>>, SerializationError> {
        if !self.folder.exists() {
            return Ok(None);
        }
        if let Some(bytes) = self.folder.read_bytes(RAW_FILE)? {
            return Ok(Some(bytes));
        }

        let package = self.read_package()?;
        let package_parts = if package.is_empty() {
            Vec::new()
        } else {
            write_package_entries(&package)?
        };

        let permissions = match self.folder.read_json(PERMISSIONS_FILE)? {
            Some(value) => {
                let permissions: Permissions = serde_json::from_value(value).map_err(|e| {
                    SerializationError::invalid(
                        format!("{}/{PERMISSIONS_FILE}", self.base_path),
                        e.to_string(),
                    )
                })?;
                permissions_xml(&permissions).into_bytes()
            }
            None => Vec::new(),
        };

        let items = self.read_metadata()?;
        let content = self.read_contents()?;
        let metadata = if items.is_empty() && content.is_empty() {
            Vec::new()
        } else {
            build_metadata(&PackageMetadata {
                version: 0,
                items,
                content,
            })?
        };

        let raw = RawDataMashup {
            version: 0,
            package_parts,
            permissions,
            metadata,
            permission_bindings: Vec::new(),
        };
        Ok(Some(build_data_mashup(&raw)?))
    }
}

fn write_section(folder: &ProjectFolder<'_>, doc: &SectionDocument) -> Result<(), SerializationError> {
    let layout = serde_json::to_value(doc.layout())
        .map_err(|e| SerializationError::invalid(SECTION_FILE, e.to_string()))?;
    folder.write_json(SECTION_FILE, &layout)?;
    for member in &doc.members {
        folder.write_text(&member_file_name(&member.name), &member.expression)?;
    }
    Ok(())
}

fn read_section(folder: &ProjectFolder<'_>, dir: &str) -> Result<SectionDocument, SerializationError> {
    let path = format!("{dir}/{SECTION_FILE}");
    let value = folder
        .read_json(SECTION_FILE)?
        .ok_or_else(|| SerializationError::invalid(&path, "missing"))?;
    let layout: SectionLayout = serde_json::from_value(value)
        .map_err(|e| SerializationError::invalid(&path, e.to_string()))?;
    let mut members = Vec::with_capacity(layout.members.len());
    for name in &layout.members {
        let file = member_file_name(name);
        let expression = folder
            .read_text(&file)?
            .ok_or_else(|| SerializationError::invalid(format!("{dir}/{file}"), "member file missing"))?;
        members.push(SectionMember {
            name: name.clone(),
            expression,
        });
    }
    Ok(SectionDocument {
        name: layout.name,
        members,
        line_ending: layout.line_ending,
        trailing_line_ending: layout.trailing_line_ending,
    })
}

fn member_file_name(name: &str) -> String {
    format!("{}.m", escape_path_segment(name))
}

/// `Section1/My%20Query` becomes `Section1/My Query`; an item without a path
/// is filed under its type.
fn unique_item_folder(item: &MetadataItem, used: &mut BTreeSet<String>) -> String {
    let base = if item.item_path.is_empty() {
        escape_path_segment(&item.item_type)
    } else {
        item.item_path
            .split('/')
            .map(|segment| escape_path_segment(&url_decode(segment)))
            .collect::<Vec<_>>()
            .join("/")
    };
    let mut candidate = base.clone();
    let mut n = 2;
    while !used.insert(candidate.clone()) {
        candidate = format!("{base} ({n})");
        n += 1;
    }
    candidate
}

fn extract_formula_texts(folder: &ProjectFolder<'_>, value: Value) -> Result<Value, SerializationError> {
    let Value::Object(mut map) = value else {
        return Ok(value);
    };
    if let Some(Value::String(root)) = map.get(ROOT_FORMULA_TEXT) {
        folder.write_text(ROOT_FORMULA_FILE, root)?;
        map.remove(ROOT_FORMULA_TEXT);
    }
    if let Some(Value::Object(queries)) = map.get(REFERENCED_QUERIES_FORMULA_TEXT)
        && !queries.is_empty()
        && queries.values().all(Value::is_string)
    {
        let refs = folder.subfolder(REFERENCED_QUERIES_FOLDER);
        for (name, text) in queries {
            refs.write_text(&member_file_name(name), text.as_str().unwrap_or_default())?;
        }
        map.remove(REFERENCED_QUERIES_FORMULA_TEXT);
    }
    Ok(Value::Object(map))
}

fn restore_formula_texts(
    folder: &ProjectFolder<'_>,
    inline: Option<Value>,
) -> Result<Option<Value>, SerializationError> {
    let root = folder.read_text(ROOT_FORMULA_FILE)?;
    let refs_folder = folder.subfolder(REFERENCED_QUERIES_FOLDER);
    let mut refs = Map::new();
    for file in refs_folder.file_names()? {
        let Some(stem) = file.strip_suffix(".m") else {
            continue;
        };
        if let Some(text) = refs_folder.read_text(&file)? {
            refs.insert(unescape_path_segment(stem), Value::String(text));
        }
    }
    if root.is_none() && refs.is_empty() {
        return Ok(inline);
    }
    let mut map = match inline {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    };
    if let Some(root) = root {
        map.insert(ROOT_FORMULA_TEXT.to_string(), Value::String(root));
    }
    if !refs.is_empty() {
        map.insert(REFERENCED_QUERIES_FORMULA_TEXT.to_string(), Value::Object(refs));
    }
    Ok(Some(Value::Object(map)))
}

fn unescape_relative_path(path: &str) -> String {
    path.split('/')
        .map(unescape_path_segment)
        .collect::<Vec<_>>()
        .join("/")
}
