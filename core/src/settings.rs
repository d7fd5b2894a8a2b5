//! The `.pbixproj.json` manifest at the root of every project folder.

use std::collections::BTreeMap;

use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::error_codes;
use crate::project_folder::{FolderError, ProjectFolder};

pub const SETTINGS_FILE_NAME: &str = ".pbixproj.json";
pub const CURRENT_VERSION: &str = "1.0";

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SettingsError {
    #[error(transparent)]
    Folder(#[from] FolderError),
    #[error("{SETTINGS_FILE_NAME}: {source}")]
    Json {
        #[source]
        source: serde_json::Error,
    },
    #[error("{SETTINGS_FILE_NAME}: unreadable version '{version}'")]
    Version { version: String },
}

impl SettingsError {
    pub fn code(&self) -> &'static str {
        match self {
            SettingsError::Folder(err) => err.code(),
            SettingsError::Json { .. } => error_codes::SETTINGS_JSON,
            SettingsError::Version { .. } => error_codes::SETTINGS_VERSION,
        }
    }
}

/// `Default` decomposes a part into a folder tree; `Raw` keeps it as a
/// single canonical file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SerializationMode {
    #[default]
    Default,
    Raw,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PartSettings {
    pub serialization_mode: SerializationMode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReportSettings {
    pub serialization_mode: SerializationMode,
    /// Properties dropped from every report JSON file, at any depth.
    pub volatile_properties: Vec<String>,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            serialization_mode: SerializationMode::Default,
            volatile_properties: vec!["objectId".to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProjectSettings {
    pub model: PartSettings,
    pub report: ReportSettings,
    pub mashup: PartSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PbixProject {
    pub version: String,
    /// Data source location (or id) -> stable id.
    pub queries: BTreeMap<String, String>,
    pub settings: ProjectSettings,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deployments: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for PbixProject {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION.to_string(),
            queries: BTreeMap::new(),
            settings: ProjectSettings::default(),
            deployments: None,
            extra: Map::new(),
        }
    }
}

impl PbixProject {
    /// Reads the manifest from `root`, or returns defaults when there is none.
    pub fn load(root: &ProjectFolder<'_>) -> Result<Self, SettingsError> {
        match root.read_json(SETTINGS_FILE_NAME)? {
            Some(value) => Self::from_value(value),
            None => Ok(Self::default()),
        }
    }

    pub fn from_value(mut value: Value) -> Result<Self, SettingsError> {
        let found = match value.get("version") {
            None | Some(Value::Null) => None,
            Some(Value::String(v)) => Some(v.clone()),
            Some(other) => Some(other.to_string()),
        };
        if let Value::Object(map) = &mut value {
            map.remove("version");
        }
        let mut project: PbixProject =
            serde_json::from_value(value).map_err(|source| SettingsError::Json { source })?;
        project.version = migrate_version(found.as_deref())?;
        Ok(project)
    }

    pub fn save(&self, root: &ProjectFolder<'_>) -> Result<(), SettingsError> {
        let value = serde_json::to_value(self).map_err(|source| SettingsError::Json { source })?;
        root.write_json(SETTINGS_FILE_NAME, &value)?;
        Ok(())
    }
}

fn migrate_version(found: Option<&str>) -> Result<String, SettingsError> {
    let current = parse_version(CURRENT_VERSION).unwrap_or((1, 0));
    let Some(found) = found else {
        info!("{SETTINGS_FILE_NAME} has no version; upgrading to {CURRENT_VERSION}");
        return Ok(CURRENT_VERSION.to_string());
    };
    let parsed = parse_version(found).ok_or_else(|| SettingsError::Version {
        version: found.to_string(),
    })?;
    if parsed < current {
        info!("upgrading {SETTINGS_FILE_NAME} from version {found} to {CURRENT_VERSION}");
        Ok(CURRENT_VERSION.to_string())
    } else {
        if parsed > current {
            warn!("{SETTINGS_FILE_NAME} version {found} is newer than {CURRENT_VERSION}; reading it best-effort");
        }
        Ok(found.to_string())
    }
}

/// `"1.2"` -> `(1, 2)`; a bare major (`"1"`) has minor 0.
fn parse_version(text: &str) -> Option<(u32, u32)> {
    let mut parts = text.trim().splitn(2, '.');
    let major = parts.next()?.parse().ok()?;
    let minor = match parts.next() {
        Some(minor) => minor.parse().ok()?,
        None => 0,
    };
    Some((major, minor))
}
