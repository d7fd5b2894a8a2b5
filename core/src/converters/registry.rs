use super::{
    BytesPartConverter, JsonPartConverter, StringPartConverter, TextEncoding, XmlPartConverter,
};

pub const CUSTOM_VISUALS_PREFIX: &str = "Report/CustomVisuals/";
pub const STATIC_RESOURCES_PREFIX: &str = "Report/StaticResources/";

/// The fixed parts of a PBIX/PBIT package that have a converter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PbixPart {
    Version,
    Connections,
    DataMashup,
    DataModelSchema,
    DiagramLayout,
    ReportLayout,
    LinguisticSchema,
    ReportMetadata,
    ReportSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartKind {
    Json(TextEncoding),
    Xml(TextEncoding),
    String(TextEncoding),
    Bytes,
}

impl PartKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PartKind::Json(_) => "json",
            PartKind::Xml(_) => "xml",
            PartKind::String(_) => "string",
            PartKind::Bytes => "bytes",
        }
    }
}

impl PbixPart {
    pub const ALL: [PbixPart; 9] = [
        PbixPart::Version,
        PbixPart::Connections,
        PbixPart::DataMashup,
        PbixPart::DataModelSchema,
        PbixPart::DiagramLayout,
        PbixPart::ReportLayout,
        PbixPart::LinguisticSchema,
        PbixPart::ReportMetadata,
        PbixPart::ReportSettings,
    ];

    pub fn path(self) -> &'static str {
        match self {
            PbixPart::Version => "Version",
            PbixPart::Connections => "Connections",
            PbixPart::DataMashup => "DataMashup",
            PbixPart::DataModelSchema => "DataModelSchema",
            PbixPart::DiagramLayout => "DiagramLayout",
            PbixPart::ReportLayout => "Report/Layout",
            PbixPart::LinguisticSchema => "Report/LinguisticSchema",
            PbixPart::ReportMetadata => "Metadata",
            PbixPart::ReportSettings => "Settings",
        }
    }

    pub fn kind(self) -> PartKind {
        match self {
            PbixPart::Version => PartKind::String(TextEncoding::Unicode),
            PbixPart::Connections => PartKind::Json(TextEncoding::Utf8),
            PbixPart::DataMashup => PartKind::Bytes,
            PbixPart::DataModelSchema
            | PbixPart::DiagramLayout
            | PbixPart::ReportLayout
            | PbixPart::ReportMetadata
            | PbixPart::ReportSettings => PartKind::Json(TextEncoding::Unicode),
            PbixPart::LinguisticSchema => PartKind::Xml(TextEncoding::Unicode),
        }
    }

    pub fn is_optional(self) -> bool {
        !matches!(self, PbixPart::Version)
    }

    pub fn from_path(path: &str) -> Option<PbixPart> {
        let path = path.trim_start_matches('/');
        PbixPart::ALL.into_iter().find(|part| part.path() == path)
    }
}

/// Converters for every [`PbixPart`], built once per model load.
#[derive(Debug, Clone)]
pub struct PartConverters {
    pub version: StringPartConverter,
    pub connections: JsonPartConverter,
    pub data_mashup: BytesPartConverter,
    pub data_model_schema: JsonPartConverter,
    pub diagram_layout: JsonPartConverter,
    pub report_layout: JsonPartConverter,
    pub linguistic_schema: XmlPartConverter,
    pub report_metadata: JsonPartConverter,
    pub report_settings: JsonPartConverter,
}

impl Default for PartConverters {
    fn default() -> Self {
        Self::new()
    }
}

impl PartConverters {
    pub fn new() -> Self {
        Self {
            version: string_converter(PbixPart::Version),
            connections: json_converter(PbixPart::Connections),
            data_mashup: BytesPartConverter::new(
                PbixPart::DataMashup.path(),
                PbixPart::DataMashup.is_optional(),
            ),
            data_model_schema: json_converter(PbixPart::DataModelSchema),
            diagram_layout: json_converter(PbixPart::DiagramLayout),
            report_layout: json_converter(PbixPart::ReportLayout),
            linguistic_schema: xml_converter(PbixPart::LinguisticSchema),
            report_metadata: json_converter(PbixPart::ReportMetadata),
            report_settings: json_converter(PbixPart::ReportSettings),
        }
    }

    /// Converter for a part stored verbatim (custom visuals, static resources).
    pub fn binary(path: &str) -> BytesPartConverter {
        BytesPartConverter::new(path, true)
    }
}

fn encoding_of(part: PbixPart) -> TextEncoding {
    match part.kind() {
        PartKind::Json(encoding) | PartKind::Xml(encoding) | PartKind::String(encoding) => encoding,
        PartKind::Bytes => TextEncoding::Utf8,
    }
}

fn json_converter(part: PbixPart) -> JsonPartConverter {
    JsonPartConverter::new(part.path(), encoding_of(part), part.is_optional())
}

fn xml_converter(part: PbixPart) -> XmlPartConverter {
    XmlPartConverter::new(part.path(), encoding_of(part), part.is_optional())
}

fn string_converter(part: PbixPart) -> StringPartConverter {
    StringPartConverter::new(part.path(), encoding_of(part), part.is_optional())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converters::PartConverter;

    #[test]
    fn every_part_resolves_by_path() {
        for part in PbixPart::ALL {
            assert_eq!(PbixPart::from_path(part.path()), Some(part));
        }
        assert_eq!(PbixPart::from_path("/Report/Layout"), Some(PbixPart::ReportLayout));
        assert_eq!(PbixPart::from_path("SecurityBindings"), None);
    }

    #[test]
    fn converters_are_bound_to_their_parts() {
        let converters = PartConverters::new();
        assert_eq!(converters.report_layout.part_path(), "Report/Layout");
        assert!(!converters.version.is_optional());
        assert!(converters.data_mashup.is_optional());
        assert_eq!(
            PbixPart::DataModelSchema.kind(),
            PartKind::Json(TextEncoding::Unicode)
        );
        assert_eq!(PbixPart::Connections.kind(), PartKind::Json(TextEncoding::Utf8));
    }
}
