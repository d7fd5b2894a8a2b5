//! Part serializers: generic part values <-> files in the project folder.

use std::collections::BTreeMap;

use serde_json::Value;
use thiserror::Error;

use crate::error_codes;
use crate::escaping::{escape_relative_path, unescape_path_segment};
use crate::mashup::DataMashupError;
use crate::project_folder::{FolderError, ProjectFolder, ProjectRootFolder};
use crate::xml::XmlDocument;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SerializationError {
    #[error(transparent)]
    Folder(#[from] FolderError),
    #[error(transparent)]
    Mashup(#[from] DataMashupError),
    #[error("invalid document {path}: {reason}")]
    InvalidDocument { path: String, reason: String },
    #[error("not supported: {feature}")]
    NotSupported { feature: String },
}

impl SerializationError {
    pub fn code(&self) -> &'static str {
        match self {
            SerializationError::Folder(err) => err.code(),
            SerializationError::Mashup(err) => err.code(),
            SerializationError::InvalidDocument { .. } => error_codes::SERIALIZE_INVALID_DOCUMENT,
            SerializationError::NotSupported { .. } => error_codes::SERIALIZE_NOT_SUPPORTED,
        }
    }

    pub(crate) fn invalid(path: impl Into<String>, reason: impl Into<String>) -> Self {
        SerializationError::InvalidDocument {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Writes one part family into the project folder and reads it back.
pub trait PartSerializer<T> {
    /// File or folder owned by this serializer, relative to the project root.
    fn base_path(&self) -> &str;

    /// Returns `false` when there was nothing to write.
    fn serialize(&mut self, value: &T) -> Result<bool, SerializationError>;

    /// Returns `None` when the project holds no content for this part.
    fn deserialize(&self) -> Result<Option<T>, SerializationError>;
}

/// A JSON part stored as one canonical file.
pub struct JsonFileSerializer<'a> {
    root: &'a ProjectRootFolder,
    path: &'static str,
}

impl<'a> JsonFileSerializer<'a> {
    pub fn new(root: &'a ProjectRootFolder, path: &'static str) -> Self {
        Self { root, path }
    }
}

impl PartSerializer<Value> for JsonFileSerializer<'_> {
    fn base_path(&self) -> &str {
        self.path
    }

    fn serialize(&mut self, value: &Value) -> Result<bool, SerializationError> {
        self.root.root_folder().write_json(self.path, value)?;
        Ok(true)
    }

    fn deserialize(&self) -> Result<Option<Value>, SerializationError> {
        Ok(self.root.root_folder().read_json(self.path)?)
    }
}

/// An XML part stored as one indented file.
pub struct XmlFileSerializer<'a> {
    root: &'a ProjectRootFolder,
    path: &'static str,
}

impl<'a> XmlFileSerializer<'a> {
    pub fn new(root: &'a ProjectRootFolder, path: &'static str) -> Self {
        Self { root, path }
    }
}

impl PartSerializer<XmlDocument> for XmlFileSerializer<'_> {
    fn base_path(&self) -> &str {
        self.path
    }

    fn serialize(&mut self, value: &XmlDocument) -> Result<bool, SerializationError> {
        self.root.root_folder().write_xml(self.path, value)?;
        Ok(true)
    }

    fn deserialize(&self) -> Result<Option<XmlDocument>, SerializationError> {
        Ok(self.root.root_folder().read_xml(self.path)?)
    }
}

/// A string part stored verbatim as UTF-8 text.
pub struct TextFileSerializer<'a> {
    root: &'a ProjectRootFolder,
    path: &'static str,
}

impl<'a> TextFileSerializer<'a> {
    pub fn new(root: &'a ProjectRootFolder, path: &'static str) -> Self {
        Self { root, path }
    }
}

impl PartSerializer<String> for TextFileSerializer<'_> {
    fn base_path(&self) -> &str {
        self.path
    }

    fn serialize(&mut self, value: &String) -> Result<bool, SerializationError> {
        self.root.root_folder().write_text(self.path, value)?;
        Ok(true)
    }

    fn deserialize(&self) -> Result<Option<String>, SerializationError> {
        Ok(self.root.root_folder().read_text(self.path)?)
    }
}

/// Binary parts below a package prefix (custom visuals, static resources),
/// keyed by their path relative to that prefix.
pub struct ResourcesSerializer<'a> {
    folder: ProjectFolder<'a>,
    path: &'static str,
}

impl<'a> ResourcesSerializer<'a> {
    pub fn new(root: &'a ProjectRootFolder, path: &'static str) -> Self {
        Self {
            folder: root.folder(path),
            path,
        }
    }
}

impl PartSerializer<BTreeMap<String, Vec<u8>>> for ResourcesSerializer<'_> {
    fn base_path(&self) -> &str {
        self.path
    }

    fn serialize(&mut self, value: &BTreeMap<String, Vec<u8>>) -> Result<bool, SerializationError> {
        for (name, bytes) in value {
            self.folder.write_bytes(&escape_relative_path(name), bytes)?;
        }
        Ok(!value.is_empty())
    }

    fn deserialize(&self) -> Result<Option<BTreeMap<String, Vec<u8>>>, SerializationError> {
        if !self.folder.exists() {
            return Ok(None);
        }
        let mut out = BTreeMap::new();
        for file in self.folder.files_recursive()? {
            let Some(bytes) = self.folder.read_bytes(&file)? else {
                continue;
            };
            let name = file
                .split('/')
                .map(unescape_path_segment)
                .collect::<Vec<_>>()
                .join("/");
            out.insert(name, bytes);
        }
        Ok(if out.is_empty() { None } else { Some(out) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn simple_parts_round_trip_through_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = ProjectRootFolder::new(dir.path());

        let mut version = TextFileSerializer::new(&root, "Version.txt");
        version.serialize(&"1.28".to_string()).expect("write");
        assert_eq!(version.deserialize().expect("read").as_deref(), Some("1.28"));

        let mut settings = JsonFileSerializer::new(&root, "ReportSettings.json");
        let value = json!({"useStylableVisualContainerHeader": true});
        settings.serialize(&value).expect("write");
        assert_eq!(settings.deserialize().expect("read"), Some(value));

        let missing = JsonFileSerializer::new(&root, "DiagramLayout.json");
        assert_eq!(missing.deserialize().expect("read"), None);
    }

    #[test]
    fn resources_keep_nested_paths() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = ProjectRootFolder::new(dir.path());
        let mut resources = ResourcesSerializer::new(&root, "StaticResources");
        let mut parts = BTreeMap::new();
        parts.insert(
            "SharedResources/BaseThemes/CY19SU12.json".to_string(),
            b"{}".to_vec(),
        );
        parts.insert("RegisteredResources/logo:1.png".to_string(), vec![0x89, 0x50]);
        assert!(resources.serialize(&parts).expect("write"));
        assert!(
            dir.path()
                .join("StaticResources/RegisteredResources/logo%3A1.png")
                .is_file()
        );
        assert_eq!(resources.deserialize().expect("read"), Some(parts));
    }

    #[test]
    fn error_codes_follow_the_wrapped_error() {
        let err = SerializationError::NotSupported {
            feature: "legacy data sources".into(),
        };
        assert_eq!(err.code(), error_codes::SERIALIZE_NOT_SUPPORTED);
        let err = SerializationError::from(DataMashupError::Base64Invalid);
        assert_eq!(err.code(), error_codes::MASHUP_BASE64);
    }
}
