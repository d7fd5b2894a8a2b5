/// Text encoding of a package part.
///
/// Power BI Desktop writes most JSON parts (`DataModelSchema`,
/// `Report/Layout`, `DiagramLayout`, ...) as UTF-16LE without a byte order
/// mark and reads them back the same way, so the encoding is fixed per part.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Utf8,
    /// UTF-16 little endian.
    Unicode,
}

impl TextEncoding {
    pub fn as_str(self) -> &'static str {
        match self {
            TextEncoding::Utf8 => "utf-8",
            TextEncoding::Unicode => "utf-16le",
        }
    }

    /// Decodes `bytes`, dropping a leading byte order mark.
    pub fn decode(self, bytes: &[u8]) -> Result<String, String> {
        match self {
            TextEncoding::Utf8 => {
                let body = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes);
                String::from_utf8(body.to_vec()).map_err(|e| format!("invalid UTF-8: {e}"))
            }
            TextEncoding::Unicode => {
                let body = bytes.strip_prefix(&[0xFF, 0xFE]).unwrap_or(bytes);
                if body.len() % 2 != 0 {
                    return Err("invalid UTF-16 byte length".to_string());
                }
                let units: Vec<u16> = body
                    .chunks_exact(2)
                    .map(|chunk| u16::from_le_bytes([chunk[0], chunk[1]]))
                    .collect();
                String::from_utf16(&units).map_err(|_| "invalid UTF-16".to_string())
            }
        }
    }

    pub fn encode(self, text: &str) -> Vec<u8> {
        match self {
            TextEncoding::Utf8 => text.as_bytes().to_vec(),
            TextEncoding::Unicode => {
                let mut out = Vec::with_capacity(text.len() * 2);
                for unit in text.encode_utf16() {
                    out.extend_from_slice(&unit.to_le_bytes());
                }
                out
            }
        }
    }
}
