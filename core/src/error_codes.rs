//! Stable machine-readable error codes.
//!
//! Codes are part of the CLI contract: they are printed next to the error
//! message and must not change between releases.

pub const CONTAINER_IO: &str = "PBX_CONTAINER_IO";
pub const CONTAINER_ZIP: &str = "PBX_CONTAINER_ZIP";
pub const CONTAINER_NOT_ZIP: &str = "PBX_CONTAINER_NOT_ZIP";
pub const CONTAINER_NOT_OPC: &str = "PBX_CONTAINER_NOT_OPC";
pub const CONTAINER_TOO_MANY_ENTRIES: &str = "PBX_CONTAINER_TOO_MANY_ENTRIES";
pub const CONTAINER_PART_TOO_LARGE: &str = "PBX_CONTAINER_PART_TOO_LARGE";
pub const CONTAINER_TOTAL_TOO_LARGE: &str = "PBX_CONTAINER_TOTAL_TOO_LARGE";
pub const CONTAINER_WRITE: &str = "PBX_CONTAINER_WRITE";

pub const PART_MISSING: &str = "PBX_PART_MISSING";
pub const PART_ENCODING: &str = "PBX_PART_ENCODING";
pub const PART_JSON: &str = "PBX_PART_JSON";
pub const PART_XML: &str = "PBX_PART_XML";

pub const FOLDER_IO: &str = "PBX_FOLDER_IO";
pub const FOLDER_JSON: &str = "PBX_FOLDER_JSON";
pub const FOLDER_XML: &str = "PBX_FOLDER_XML";
pub const FOLDER_ENCODING: &str = "PBX_FOLDER_ENCODING";

pub const MASHUP_BASE64: &str = "PBX_MASHUP_BASE64";
pub const MASHUP_VERSION: &str = "PBX_MASHUP_VERSION";
pub const MASHUP_FRAMING: &str = "PBX_MASHUP_FRAMING";
pub const MASHUP_XML: &str = "PBX_MASHUP_XML";
pub const MASHUP_LIMITS: &str = "PBX_MASHUP_LIMITS";
pub const MASHUP_ZIP: &str = "PBX_MASHUP_ZIP";

pub const SECTION_PARSE: &str = "PBX_SECTION_PARSE";

pub const SERIALIZE_INVALID_DOCUMENT: &str = "PBX_SERIALIZE_INVALID_DOCUMENT";
pub const SERIALIZE_NOT_SUPPORTED: &str = "PBX_SERIALIZE_NOT_SUPPORTED";

pub const SETTINGS_JSON: &str = "PBX_SETTINGS_JSON";
pub const SETTINGS_VERSION: &str = "PBX_SETTINGS_VERSION";

pub const PROJECT_NOT_FOUND: &str = "PBX_PROJECT_NOT_FOUND";
