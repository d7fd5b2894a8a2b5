//! Top-level MS-QDEFF framing: a version followed by four length-prefixed
//! segments (package parts, permissions, metadata, permission bindings).

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use super::DataMashupError;

/// The four segments of a `DataMashup` stream, kept as opaque bytes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawDataMashup {
    pub version: u32,
    pub package_parts: Vec<u8>,
    pub permissions: Vec<u8>,
    pub metadata: Vec<u8>,
    pub permission_bindings: Vec<u8>,
}

pub fn parse_data_mashup(bytes: &[u8]) -> Result<RawDataMashup, DataMashupError> {
    let mut frame = FrameReader::new(bytes);
    let version = frame.u32("version")?;
    if version != 0 {
        return Err(DataMashupError::UnsupportedVersion(version));
    }
    let raw = RawDataMashup {
        version,
        package_parts: frame.segment("package parts")?.to_vec(),
        permissions: frame.segment("permissions")?.to_vec(),
        metadata: frame.segment("metadata")?.to_vec(),
        permission_bindings: frame.segment("permission bindings")?.to_vec(),
    };
    frame.finish("trailing bytes")?;
    Ok(raw)
}

pub fn build_data_mashup(raw: &RawDataMashup) -> Result<Vec<u8>, DataMashupError> {
    let mut frame = FrameWriter::new(raw.version);
    frame.segment(&raw.package_parts)?;
    frame.segment(&raw.permissions)?;
    frame.segment(&raw.metadata)?;
    frame.segment(&raw.permission_bindings)?;
    Ok(frame.into_bytes())
}

/// Decodes the base64 blob embedded in legacy connection strings. Whitespace
/// (line wrapping) is ignored.
pub fn decode_datamashup_base64(text: &str) -> Result<Vec<u8>, DataMashupError> {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    STANDARD
        .decode(compact)
        .map_err(|_| DataMashupError::Base64Invalid)
}

pub fn encode_datamashup_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Little-endian cursor over length-prefixed segments.
pub(crate) struct FrameReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> FrameReader<'a> {
    pub(crate) fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    pub(crate) fn is_at_end(&self) -> bool {
        self.pos == self.bytes.len()
    }

    pub(crate) fn u32(&mut self, what: &'static str) -> Result<u32, DataMashupError> {
        let word = self.take(4, what)?;
        Ok(u32::from_le_bytes([word[0], word[1], word[2], word[3]]))
    }

    pub(crate) fn segment(&mut self, what: &'static str) -> Result<&'a [u8], DataMashupError> {
        let len = self.u32(what)?;
        let len = usize::try_from(len).map_err(|_| DataMashupError::FramingInvalid(what))?;
        self.take(len, what)
    }

    pub(crate) fn finish(self, what: &'static str) -> Result<(), DataMashupError> {
        if self.is_at_end() {
            Ok(())
        } else {
            Err(DataMashupError::FramingInvalid(what))
        }
    }

    fn take(&mut self, len: usize, what: &'static str) -> Result<&'a [u8], DataMashupError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.bytes.len())
            .ok_or(DataMashupError::FramingInvalid(what))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }
}

/// Builds a version word followed by length-prefixed segments.
pub(crate) struct FrameWriter {
    out: Vec<u8>,
}

impl FrameWriter {
    pub(crate) fn new(version: u32) -> Self {
        Self {
            out: version.to_le_bytes().to_vec(),
        }
    }

    pub(crate) fn segment(&mut self, bytes: &[u8]) -> Result<(), DataMashupError> {
        let len = u32::try_from(bytes.len())
            .map_err(|_| DataMashupError::FramingInvalid("segment larger than 4 GiB"))?;
        self.out.extend_from_slice(&len.to_le_bytes());
        self.out.extend_from_slice(bytes);
        Ok(())
    }

    pub(crate) fn into_bytes(self) -> Vec<u8> {
        self.out
    }
}

/// XML segments are UTF-8 (BOM optional) or UTF-16 with a BOM.
pub(crate) fn decode_xml_text(xml: &[u8]) -> Result<String, DataMashupError> {
    let utf16 = |body: &[u8], from: fn([u8; 2]) -> u16| {
        if body.len() % 2 != 0 {
            return Err(DataMashupError::XmlError("odd UTF-16 byte length".into()));
        }
        let units: Vec<u16> = body.chunks_exact(2).map(|c| from([c[0], c[1]])).collect();
        String::from_utf16(&units).map_err(|_| DataMashupError::XmlError("invalid UTF-16 XML".into()))
    };
    match xml {
        [0xFF, 0xFE, body @ ..] => utf16(body, u16::from_le_bytes),
        [0xFE, 0xFF, body @ ..] => utf16(body, u16::from_be_bytes),
        _ => {
            let body = xml.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(xml);
            String::from_utf8(body.to_vec())
                .map_err(|_| DataMashupError::XmlError("XML segment is not valid UTF-8".into()))
        }
    }
}
