//! PbixProj: Power BI Desktop packages as diffable folder trees.
//!
//! This crate provides functionality for:
//! - Reading PBIX/PBIT packages (OPC/ZIP containers) part by part
//! - Extracting the parts into a canonical, deterministic folder tree
//!   (tabular model, report layout, Power Query mashup, resources)
//! - Compiling such a folder tree back into a package
//!
//! # Quick Start
//!
//! ```ignore
//! use pbixproj::PbixModel;
//!
//! let model = PbixModel::load("Sales.pbit")?;
//! let summary = model.extract_to("Sales")?;
//! println!("{} files written", summary.written_files);
//!
//! let rebuilt = PbixModel::from_folder("Sales")?;
//! rebuilt.save("Sales.rebuilt.pbit")?;
//! ```

pub mod canonical;
mod container;
pub mod converters;
pub mod error_codes;
pub mod escaping;
pub mod mashup;
mod pbix_model;
mod project_folder;
pub mod report;
mod serialization;
mod settings;
pub mod tabular;
mod xml;

pub use container::{
    CONTENT_TYPES_PART, ContainerError, ContainerLimits, OpcContainer, PackageWriter,
};
pub use converters::{ConverterError, PartConverter, PartConverters, PbixPart};
pub use mashup::{DataMashupError, DataMashupLimits, MashupSerializer};
pub use pbix_model::{
    CONNECTIONS_FILE, CUSTOM_VISUALS_FOLDER, DIAGRAM_LAYOUT_FILE, ExtractSummary,
    LINGUISTIC_SCHEMA_FILE, MASHUP_FOLDER, PartFailure, PartInfo, PbixError, PbixModel,
    REPORT_METADATA_FILE, REPORT_SETTINGS_FILE, STATIC_RESOURCES_FOLDER, VERSION_FILE,
    describe_package,
};
pub use project_folder::{FolderError, ProjectFolder, ProjectRootFolder, PruneSummary};
pub use report::ReportSerializer;
pub use serialization::{
    JsonFileSerializer, PartSerializer, ResourcesSerializer, SerializationError,
    TextFileSerializer, XmlFileSerializer,
};
pub use settings::{
    CURRENT_VERSION, PartSettings, PbixProject, ProjectSettings, ReportSettings,
    SETTINGS_FILE_NAME, SerializationMode, SettingsError,
};
pub use tabular::{DataSourceIdCache, QueriesLookup, TabularModelSerializer};
pub use xml::{XmlDocument, XmlError};
