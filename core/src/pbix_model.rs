//! A PBIX/PBIT package held in memory as generic part values.
//!
//! [`PbixModel`] is loaded from a package or from a project folder and can be
//! written to either. Each part is handled by its own serializer; the model
//! only sequences them.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Cursor, Seek, Write};
use std::path::{Path, PathBuf};

use log::{debug, error, info, warn};
use serde_json::Value;
use thiserror::Error;

use crate::container::{CONTENT_TYPES_PART, ContainerError, OpcContainer, PackageWriter};
use crate::converters::{
    CUSTOM_VISUALS_PREFIX, ConverterError, PartConverter, PartConverters, PbixPart,
    STATIC_RESOURCES_PREFIX,
};
use crate::error_codes;
use crate::mashup::MashupSerializer;
use crate::project_folder::{FolderError, ProjectRootFolder, PruneSummary};
use crate::report::ReportSerializer;
use crate::serialization::{
    JsonFileSerializer, PartSerializer, ResourcesSerializer, SerializationError,
    TextFileSerializer, XmlFileSerializer,
};
use crate::settings::{PbixProject, SettingsError};
use crate::tabular::TabularModelSerializer;
use crate::xml::XmlDocument;

pub const VERSION_FILE: &str = "Version.txt";
pub const CONNECTIONS_FILE: &str = "Connections.json";
pub const DIAGRAM_LAYOUT_FILE: &str = "DiagramLayout.json";
pub const REPORT_METADATA_FILE: &str = "ReportMetadata.json";
pub const REPORT_SETTINGS_FILE: &str = "ReportSettings.json";
pub const LINGUISTIC_SCHEMA_FILE: &str = "Report/LinguisticSchema.xml";
pub const MASHUP_FOLDER: &str = "Mashup";
pub const CUSTOM_VISUALS_FOLDER: &str = "CustomVisuals";
pub const STATIC_RESOURCES_FOLDER: &str = "StaticResources";

/// Parts a PBIX carries that are never extracted.
const UNSUPPORTED_PARTS: &[&str] = &["DataModel", "SecurityBindings"];

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PbixError {
    #[error(transparent)]
    Container(#[from] ContainerError),
    #[error(transparent)]
    Converter(#[from] ConverterError),
    #[error(transparent)]
    Serialization(#[from] SerializationError),
    #[error(transparent)]
    Folder(#[from] FolderError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error("{} is not a project folder", path.display())]
    ProjectNotFound { path: PathBuf },
}

impl PbixError {
    pub fn code(&self) -> &'static str {
        match self {
            PbixError::Container(err) => err.code(),
            PbixError::Converter(err) => err.code(),
            PbixError::Serialization(err) => err.code(),
            PbixError::Folder(err) => err.code(),
            PbixError::Settings(err) => err.code(),
            PbixError::ProjectNotFound { .. } => error_codes::PROJECT_NOT_FOUND,
        }
    }
}

/// A part that could not be extracted; its previous files were kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartFailure {
    pub part: String,
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractSummary {
    pub written_files: usize,
    pub failed_parts: Vec<PartFailure>,
    pub pruned: PruneSummary,
}

/// One entry of [`describe_package`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartInfo {
    pub path: String,
    pub size: u64,
    /// Converter kind for known parts.
    pub kind: Option<&'static str>,
    pub optional: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PbixModel {
    pub version: Option<String>,
    pub connections: Option<Value>,
    pub data_mashup: Option<Vec<u8>>,
    pub data_model_schema: Option<Value>,
    pub diagram_layout: Option<Value>,
    pub report_layout: Option<Value>,
    pub linguistic_schema: Option<XmlDocument>,
    pub report_metadata: Option<Value>,
    pub report_settings: Option<Value>,
    /// Keyed by path below `Report/CustomVisuals/`.
    pub custom_visuals: BTreeMap<String, Vec<u8>>,
    /// Keyed by path below `Report/StaticResources/`.
    pub static_resources: BTreeMap<String, Vec<u8>>,
}

impl PbixModel {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PbixError> {
        let path = path.as_ref();
        info!("loading package {}", path.display());
        let mut container = OpcContainer::open(path)?;
        Self::from_container(&mut container)
    }

    pub fn from_container(container: &mut OpcContainer) -> Result<Self, PbixError> {
        let converters = PartConverters::new();
        let mut model = PbixModel {
            version: converters.version.from_package_part(container)?,
            connections: converters.connections.from_package_part(container)?,
            data_mashup: converters.data_mashup.from_package_part(container)?,
            data_model_schema: converters.data_model_schema.from_package_part(container)?,
            diagram_layout: converters.diagram_layout.from_package_part(container)?,
            report_layout: converters.report_layout.from_package_part(container)?,
            linguistic_schema: converters.linguistic_schema.from_package_part(container)?,
            report_metadata: converters.report_metadata.from_package_part(container)?,
            report_settings: converters.report_settings.from_package_part(container)?,
            ..PbixModel::default()
        };

        for name in container.part_names() {
            if let Some(rel) = name.strip_prefix(CUSTOM_VISUALS_PREFIX) {
                let bytes = container.read_part(&name)?;
                model.custom_visuals.insert(rel.to_string(), bytes);
            } else if let Some(rel) = name.strip_prefix(STATIC_RESOURCES_PREFIX) {
                let bytes = container.read_part(&name)?;
                model.static_resources.insert(rel.to_string(), bytes);
            } else if UNSUPPORTED_PARTS.contains(&name.as_str()) {
                warn!("part '{name}' is not extracted");
            } else if name != CONTENT_TYPES_PART && PbixPart::from_path(&name).is_none() {
                debug!("skipping unknown part '{name}'");
            }
        }
        Ok(model)
    }

    /// Reads a project folder written by [`PbixModel::extract_to`].
    pub fn from_folder(path: impl AsRef<Path>) -> Result<Self, PbixError> {
        let path = path.as_ref();
        if !path.is_dir() {
            return Err(PbixError::ProjectNotFound {
                path: path.to_path_buf(),
            });
        }
        info!("reading project folder {}", path.display());
        let root = ProjectRootFolder::new(path);
        let project = PbixProject::load(&root.root_folder())?;
        let settings = &project.settings;

        let tabular = TabularModelSerializer::new(
            &root,
            settings.model.serialization_mode,
            project.queries.clone(),
        );
        let report = ReportSerializer::new(
            &root,
            settings.report.serialization_mode,
            settings.report.volatile_properties.clone(),
        );
        let mashup = MashupSerializer::new(root.folder(MASHUP_FOLDER), settings.mashup.serialization_mode);

        Ok(PbixModel {
            version: TextFileSerializer::new(&root, VERSION_FILE).deserialize()?,
            connections: JsonFileSerializer::new(&root, CONNECTIONS_FILE).deserialize()?,
            data_mashup: mashup.deserialize()?,
            data_model_schema: tabular.deserialize()?,
            diagram_layout: JsonFileSerializer::new(&root, DIAGRAM_LAYOUT_FILE).deserialize()?,
            report_layout: report.deserialize()?,
            linguistic_schema: XmlFileSerializer::new(&root, LINGUISTIC_SCHEMA_FILE).deserialize()?,
            report_metadata: JsonFileSerializer::new(&root, REPORT_METADATA_FILE).deserialize()?,
            report_settings: JsonFileSerializer::new(&root, REPORT_SETTINGS_FILE).deserialize()?,
            custom_visuals: ResourcesSerializer::new(&root, CUSTOM_VISUALS_FOLDER)
                .deserialize()?
                .unwrap_or_default(),
            static_resources: ResourcesSerializer::new(&root, STATIC_RESOURCES_FOLDER)
                .deserialize()?
                .unwrap_or_default(),
        })
    }

    /// Writes every part into `path`, then removes files a previous
    /// extraction left that were not rewritten. A part that fails is logged
    /// and its previous files are kept; the other parts are still written.
    pub fn extract_to(&self, path: impl AsRef<Path>) -> Result<ExtractSummary, PbixError> {
        let path = path.as_ref();
        info!("extracting into {}", path.display());
        let root = ProjectRootFolder::new(path);
        let mut project = PbixProject::load(&root.root_folder())?;
        let settings = project.settings.clone();
        let mut failures = Vec::new();

        extract_part(
            &root,
            "Version",
            &mut TextFileSerializer::new(&root, VERSION_FILE),
            self.version.as_ref(),
            &mut failures,
        );
        extract_part(
            &root,
            "Connections",
            &mut JsonFileSerializer::new(&root, CONNECTIONS_FILE),
            self.connections.as_ref(),
            &mut failures,
        );
        extract_part(
            &root,
            "DataMashup",
            &mut MashupSerializer::new(root.folder(MASHUP_FOLDER), settings.mashup.serialization_mode),
            self.data_mashup.as_ref(),
            &mut failures,
        );

        let mut tabular = TabularModelSerializer::new(
            &root,
            settings.model.serialization_mode,
            project.queries.clone(),
        )
        .with_mashup_mode(settings.mashup.serialization_mode);
        if extract_part(
            &root,
            "DataModelSchema",
            &mut tabular,
            self.data_model_schema.as_ref(),
            &mut failures,
        ) {
            project.queries = tabular.into_queries();
        }

        extract_part(
            &root,
            "DiagramLayout",
            &mut JsonFileSerializer::new(&root, DIAGRAM_LAYOUT_FILE),
            self.diagram_layout.as_ref(),
            &mut failures,
        );
        extract_part(
            &root,
            "Report/Layout",
            &mut ReportSerializer::new(
                &root,
                settings.report.serialization_mode,
                settings.report.volatile_properties.clone(),
            ),
            self.report_layout.as_ref(),
            &mut failures,
        );
        extract_part(
            &root,
            "Report/LinguisticSchema",
            &mut XmlFileSerializer::new(&root, LINGUISTIC_SCHEMA_FILE),
            self.linguistic_schema.as_ref(),
            &mut failures,
        );
        extract_part(
            &root,
            "Metadata",
            &mut JsonFileSerializer::new(&root, REPORT_METADATA_FILE),
            self.report_metadata.as_ref(),
            &mut failures,
        );
        extract_part(
            &root,
            "Settings",
            &mut JsonFileSerializer::new(&root, REPORT_SETTINGS_FILE),
            self.report_settings.as_ref(),
            &mut failures,
        );
        extract_part(
            &root,
            "Report/CustomVisuals",
            &mut ResourcesSerializer::new(&root, CUSTOM_VISUALS_FOLDER),
            Some(&self.custom_visuals),
            &mut failures,
        );
        extract_part(
            &root,
            "Report/StaticResources",
            &mut ResourcesSerializer::new(&root, STATIC_RESOURCES_FOLDER),
            Some(&self.static_resources),
            &mut failures,
        );

        project.save(&root.root_folder())?;
        let written_files = root.written_files().len();
        let pruned = root.commit()?;
        if pruned.deleted_files > 0 {
            info!("removed {} stale files", pruned.deleted_files);
        }
        Ok(ExtractSummary {
            written_files,
            failed_parts: failures,
            pruned,
        })
    }

    /// Writes the model as a package. The embedded `DataModel` and
    /// `SecurityBindings` parts are never produced.
    pub fn write_package<W: Write + Seek>(&self, writer: W) -> Result<W, PbixError> {
        let converters = PartConverters::new();
        let mut package = PackageWriter::new(writer);

        write_converted(&mut package, &converters.version, self.version.as_ref())?;
        write_converted(&mut package, &converters.connections, self.connections.as_ref())?;
        write_converted(&mut package, &converters.data_mashup, self.data_mashup.as_ref())?;
        write_converted(
            &mut package,
            &converters.data_model_schema,
            self.data_model_schema.as_ref(),
        )?;
        write_converted(&mut package, &converters.diagram_layout, self.diagram_layout.as_ref())?;
        write_converted(&mut package, &converters.report_layout, self.report_layout.as_ref())?;
        write_converted(
            &mut package,
            &converters.linguistic_schema,
            self.linguistic_schema.as_ref(),
        )?;
        write_converted(&mut package, &converters.report_metadata, self.report_metadata.as_ref())?;
        write_converted(&mut package, &converters.report_settings, self.report_settings.as_ref())?;

        for (prefix, parts) in [
            (CUSTOM_VISUALS_PREFIX, &self.custom_visuals),
            (STATIC_RESOURCES_PREFIX, &self.static_resources),
        ] {
            for (rel, bytes) in parts {
                let converter = PartConverters::binary(&format!("{prefix}{rel}"));
                let encoded = converter.to_package_part(bytes)?;
                package.write_part(converter.part_path(), &encoded)?;
            }
        }
        Ok(package.finish()?)
    }

    pub fn to_package_bytes(&self) -> Result<Vec<u8>, PbixError> {
        Ok(self.write_package(Cursor::new(Vec::new()))?.into_inner())
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), PbixError> {
        let path = path.as_ref();
        info!("writing package {}", path.display());
        let file = File::create(path).map_err(ContainerError::from)?;
        let mut writer = self.write_package(BufWriter::new(file))?;
        writer.flush().map_err(ContainerError::from)?;
        Ok(())
    }
}

/// Runs one part serializer. Returns `true` when the part was written.
fn extract_part<T, S>(
    root: &ProjectRootFolder,
    part: &str,
    serializer: &mut S,
    value: Option<&T>,
    failures: &mut Vec<PartFailure>,
) -> bool
where
    S: PartSerializer<T>,
{
    let Some(value) = value else {
        debug!("part '{part}' absent");
        return false;
    };
    match serializer.serialize(value) {
        Ok(written) => written,
        Err(err) => {
            error!("failed to extract part '{part}': {err}");
            root.retain(serializer.base_path());
            failures.push(PartFailure {
                part: part.to_string(),
                code: err.code(),
                message: err.to_string(),
            });
            false
        }
    }
}

fn write_converted<C, W>(
    package: &mut PackageWriter<W>,
    converter: &C,
    value: Option<&C::Value>,
) -> Result<(), PbixError>
where
    C: PartConverter,
    W: Write + Seek,
{
    if let Some(value) = value {
        let bytes = converter.to_package_part(value)?;
        package.write_part(converter.part_path(), &bytes)?;
    }
    Ok(())
}

/// Lists every part of a package with its size and, for known parts, its
/// converter kind and optionality.
pub fn describe_package(container: &mut OpcContainer) -> Vec<PartInfo> {
    let mut parts = Vec::new();
    for name in container.part_names() {
        let size = container.part_size(&name).unwrap_or_default();
        let known = PbixPart::from_path(&name);
        let kind = match known {
            Some(part) => Some(part.kind().as_str()),
            None if name.starts_with(CUSTOM_VISUALS_PREFIX)
                || name.starts_with(STATIC_RESOURCES_PREFIX) =>
            {
                Some("bytes")
            }
            None => None,
        };
        parts.push(PartInfo {
            optional: known.map(PbixPart::is_optional),
            path: name,
            size,
            kind,
        });
    }
    parts
}
