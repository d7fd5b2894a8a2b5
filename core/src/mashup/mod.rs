//! The `DataMashup` part: an MS-QDEFF binary holding the Power Query package.

pub mod framing;
pub mod metadata;
pub mod package;
pub mod permissions;
pub mod section;
mod serializer;

pub use framing::{RawDataMashup, build_data_mashup, decode_datamashup_base64, parse_data_mashup};
pub use metadata::{MetadataEntry, MetadataItem, PackageMetadata};
pub use package::PackageEntry;
pub use permissions::Permissions;
pub use section::{SectionDocument, SectionMember, SectionParseError};
pub use serializer::MashupSerializer;

use thiserror::Error;

use crate::error_codes;

#[derive(Debug, Clone, Copy)]
pub struct DataMashupLimits {
    pub max_inner_entries: usize,
    pub max_inner_part_bytes: u64,
    pub max_inner_total_bytes: u64,
}

impl Default for DataMashupLimits {
    fn default() -> Self {
        Self {
            max_inner_entries: 10_000,
            max_inner_part_bytes: 100 * 1024 * 1024,
            max_inner_total_bytes: 500 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DataMashupError {
    #[error("base64 decoding failed")]
    Base64Invalid,
    #[error("unsupported version: {0}")]
    UnsupportedVersion(u32),
    #[error("invalid framing structure: {0}")]
    FramingInvalid(&'static str),
    #[error("XML parse error: {0}")]
    XmlError(String),
    #[error("inner package has too many entries ({entries}, max {max_entries})")]
    InnerTooManyEntries { entries: usize, max_entries: usize },
    #[error("inner part '{path}' is too large ({size} bytes, limit {limit})")]
    InnerPartTooLarge { path: String, size: u64, limit: u64 },
    #[error("inner package exceeds total size limit ({limit} bytes)")]
    InnerTotalTooLarge { limit: u64 },
    #[error("inner ZIP error: {0}")]
    Zip(String),
}

impl DataMashupError {
    pub fn code(&self) -> &'static str {
        match self {
            DataMashupError::Base64Invalid => error_codes::MASHUP_BASE64,
            DataMashupError::UnsupportedVersion(_) => error_codes::MASHUP_VERSION,
            DataMashupError::FramingInvalid(_) => error_codes::MASHUP_FRAMING,
            DataMashupError::XmlError(_) => error_codes::MASHUP_XML,
            DataMashupError::InnerTooManyEntries { .. }
            | DataMashupError::InnerPartTooLarge { .. }
            | DataMashupError::InnerTotalTooLarge { .. } => error_codes::MASHUP_LIMITS,
            DataMashupError::Zip(_) => error_codes::MASHUP_ZIP,
        }
    }
}
