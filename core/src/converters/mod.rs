//! Part converters: package part bytes <-> generic in-memory representation.
//!
//! One converter is bound to one part path and knows the part's encoding
//! and whether the part may be absent. Converters do no file-system work;
//! laying the values out on disk is the serializers' job.

mod encoding;
mod registry;

pub use encoding::TextEncoding;
pub use registry::{
    CUSTOM_VISUALS_PREFIX, PartConverters, PartKind, PbixPart, STATIC_RESOURCES_PREFIX,
};

use serde_json::Value;
use thiserror::Error;

use crate::container::{ContainerError, OpcContainer};
use crate::error_codes;
use crate::xml::{XmlDocument, XmlError};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConverterError {
    #[error("required part '{path}' is missing")]
    MissingPart { path: String },
    #[error("part '{path}' could not be decoded as {encoding}: {reason}")]
    Encoding {
        path: String,
        encoding: &'static str,
        reason: String,
    },
    #[error("part '{path}' is not valid JSON: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("part '{path}' is not valid XML: {source}")]
    Xml {
        path: String,
        #[source]
        source: XmlError,
    },
    #[error(transparent)]
    Container(#[from] ContainerError),
}

impl ConverterError {
    pub fn code(&self) -> &'static str {
        match self {
            ConverterError::MissingPart { .. } => error_codes::PART_MISSING,
            ConverterError::Encoding { .. } => error_codes::PART_ENCODING,
            ConverterError::Json { .. } => error_codes::PART_JSON,
            ConverterError::Xml { .. } => error_codes::PART_XML,
            ConverterError::Container(err) => err.code(),
        }
    }
}

/// Converts one package part to and from its generic representation.
pub trait PartConverter {
    type Value;

    fn part_path(&self) -> &str;

    fn is_optional(&self) -> bool;

    fn from_bytes(&self, bytes: &[u8]) -> Result<Self::Value, ConverterError>;

    fn to_package_part(&self, value: &Self::Value) -> Result<Vec<u8>, ConverterError>;

    /// Reads and decodes the part. A missing optional part yields `None`.
    fn from_package_part(
        &self,
        package: &mut OpcContainer,
    ) -> Result<Option<Self::Value>, ConverterError> {
        match package.read_part_optional(self.part_path())? {
            Some(bytes) => self.from_bytes(&bytes).map(Some),
            None if self.is_optional() => Ok(None),
            None => Err(ConverterError::MissingPart {
                path: self.part_path().to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct JsonPartConverter {
    path: String,
    encoding: TextEncoding,
    optional: bool,
}

impl JsonPartConverter {
    pub fn new(path: impl Into<String>, encoding: TextEncoding, optional: bool) -> Self {
        Self {
            path: path.into(),
            encoding,
            optional,
        }
    }
}

impl PartConverter for JsonPartConverter {
    type Value = Value;

    fn part_path(&self) -> &str {
        &self.path
    }

    fn is_optional(&self) -> bool {
        self.optional
    }

    fn from_bytes(&self, bytes: &[u8]) -> Result<Value, ConverterError> {
        let text = decode_text(&self.path, self.encoding, bytes)?;
        serde_json::from_str(&text).map_err(|source| ConverterError::Json {
            path: self.path.clone(),
            source,
        })
    }

    fn to_package_part(&self, value: &Value) -> Result<Vec<u8>, ConverterError> {
        let text = serde_json::to_string(value).map_err(|source| ConverterError::Json {
            path: self.path.clone(),
            source,
        })?;
        Ok(self.encoding.encode(&text))
    }
}

#[derive(Debug, Clone)]
pub struct XmlPartConverter {
    path: String,
    encoding: TextEncoding,
    optional: bool,
}

impl XmlPartConverter {
    pub fn new(path: impl Into<String>, encoding: TextEncoding, optional: bool) -> Self {
        Self {
            path: path.into(),
            encoding,
            optional,
        }
    }
}

impl PartConverter for XmlPartConverter {
    type Value = XmlDocument;

    fn part_path(&self) -> &str {
        &self.path
    }

    fn is_optional(&self) -> bool {
        self.optional
    }

    fn from_bytes(&self, bytes: &[u8]) -> Result<XmlDocument, ConverterError> {
        let text = decode_text(&self.path, self.encoding, bytes)?;
        XmlDocument::parse(text).map_err(|source| ConverterError::Xml {
            path: self.path.clone(),
            source,
        })
    }

    fn to_package_part(&self, value: &XmlDocument) -> Result<Vec<u8>, ConverterError> {
        Ok(self.encoding.encode(value.as_str()))
    }
}

#[derive(Debug, Clone)]
pub struct StringPartConverter {
    path: String,
    encoding: TextEncoding,
    optional: bool,
}

impl StringPartConverter {
    pub fn new(path: impl Into<String>, encoding: TextEncoding, optional: bool) -> Self {
        Self {
            path: path.into(),
            encoding,
            optional,
        }
    }
}

impl PartConverter for StringPartConverter {
    type Value = String;

    fn part_path(&self) -> &str {
        &self.path
    }

    fn is_optional(&self) -> bool {
        self.optional
    }

    fn from_bytes(&self, bytes: &[u8]) -> Result<String, ConverterError> {
        decode_text(&self.path, self.encoding, bytes)
    }

    fn to_package_part(&self, value: &String) -> Result<Vec<u8>, ConverterError> {
        Ok(self.encoding.encode(value))
    }
}

/// Passes bytes through unchanged.
#[derive(Debug, Clone)]
pub struct BytesPartConverter {
    path: String,
    optional: bool,
}

impl BytesPartConverter {
    pub fn new(path: impl Into<String>, optional: bool) -> Self {
        Self {
            path: path.into(),
            optional,
        }
    }
}

impl PartConverter for BytesPartConverter {
    type Value = Vec<u8>;

    fn part_path(&self) -> &str {
        &self.path
    }

    fn is_optional(&self) -> bool {
        self.optional
    }

    fn from_bytes(&self, bytes: &[u8]) -> Result<Vec<u8>, ConverterError> {
        Ok(bytes.to_vec())
    }

    fn to_package_part(&self, value: &Vec<u8>) -> Result<Vec<u8>, ConverterError> {
        Ok(value.clone())
    }
}

fn decode_text(path: &str, encoding: TextEncoding, bytes: &[u8]) -> Result<String, ConverterError> {
    encoding
        .decode(bytes)
        .map_err(|reason| ConverterError::Encoding {
            path: path.to_string(),
            encoding: encoding.as_str(),
            reason,
        })
}
