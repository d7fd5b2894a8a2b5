//! OPC (Open Packaging Conventions) container handling.
//!
//! A PBIX/PBIT file is a ZIP archive with a `[Content_Types].xml` entry and
//! a fixed set of named parts (`Version`, `DataModelSchema`, `Report/Layout`,
//! `DataMashup`, ...). [`OpcContainer`] reads parts with size limits and
//! optional-part semantics; [`PackageWriter`] assembles a new package and
//! generates the content-types manifest on finish.

use std::io::{Read, Seek, Write};
use thiserror::Error;
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error_codes;

pub const CONTENT_TYPES_PART: &str = "[Content_Types].xml";

#[derive(Debug, Clone, Copy)]
pub struct ContainerLimits {
    pub max_entries: usize,
    pub max_part_uncompressed_bytes: u64,
    pub max_total_uncompressed_bytes: u64,
}

impl Default for ContainerLimits {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            max_part_uncompressed_bytes: 100 * 1024 * 1024,
            max_total_uncompressed_bytes: 500 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ContainerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("not a ZIP container")]
    NotZipContainer,
    #[error("not an OPC package (missing [Content_Types].xml)")]
    NotOpcPackage,
    #[error("archive has too many entries: {entries} (limit: {max_entries})")]
    TooManyEntries { entries: usize, max_entries: usize },
    #[error("part '{path}' is too large: {size} bytes (limit: {limit} bytes)")]
    PartTooLarge { path: String, size: u64, limit: u64 },
    #[error("total uncompressed size exceeds limit: would exceed {limit} bytes")]
    TotalTooLarge { limit: u64 },
    #[error("failed to read ZIP entry '{path}': {reason}")]
    ZipRead { path: String, reason: String },
    #[error("failed to write ZIP entry '{path}': {reason}")]
    ZipWrite { path: String, reason: String },
    #[error("part not found in package: {path}")]
    FileNotFound { path: String },
}

impl ContainerError {
    pub fn code(&self) -> &'static str {
        match self {
            ContainerError::Io(_) => error_codes::CONTAINER_IO,
            ContainerError::NotZipContainer => error_codes::CONTAINER_NOT_ZIP,
            ContainerError::NotOpcPackage => error_codes::CONTAINER_NOT_OPC,
            ContainerError::TooManyEntries { .. } => error_codes::CONTAINER_TOO_MANY_ENTRIES,
            ContainerError::PartTooLarge { .. } => error_codes::CONTAINER_PART_TOO_LARGE,
            ContainerError::TotalTooLarge { .. } => error_codes::CONTAINER_TOTAL_TOO_LARGE,
            ContainerError::ZipRead { .. } => error_codes::CONTAINER_ZIP,
            ContainerError::ZipWrite { .. } => error_codes::CONTAINER_WRITE,
            ContainerError::FileNotFound { .. } => error_codes::CONTAINER_ZIP,
        }
    }
}

pub(crate) trait ReadSeek: Read + Seek {}
impl<T: Read + Seek> ReadSeek for T {}

/// A PBIX/PBIT package opened for reading. Every read counts against the
/// per-part and total budgets in [`ContainerLimits`].
pub struct OpcContainer {
    archive: ZipArchive<Box<dyn ReadSeek>>,
    limits: ContainerLimits,
    total_read: u64,
}

impl OpcContainer {
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<OpcContainer, ContainerError> {
        Self::open_from_reader(std::fs::File::open(path)?)
    }

    pub fn open_from_reader<R: Read + Seek + 'static>(
        reader: R,
    ) -> Result<OpcContainer, ContainerError> {
        Self::open_from_reader_with_limits(reader, ContainerLimits::default())
    }

    pub fn open_from_reader_with_limits<R: Read + Seek + 'static>(
        reader: R,
        limits: ContainerLimits,
    ) -> Result<OpcContainer, ContainerError> {
        let reader: Box<dyn ReadSeek> = Box::new(reader);
        let archive = ZipArchive::new(reader).map_err(open_error)?;
        if archive.len() > limits.max_entries {
            return Err(ContainerError::TooManyEntries {
                entries: archive.len(),
                max_entries: limits.max_entries,
            });
        }
        if archive.index_for_name(CONTENT_TYPES_PART).is_none() {
            return Err(ContainerError::NotOpcPackage);
        }
        Ok(OpcContainer {
            archive,
            limits,
            total_read: 0,
        })
    }

    pub fn read_part(&mut self, name: &str) -> Result<Vec<u8>, ContainerError> {
        let read_error = |reason: String| ContainerError::ZipRead {
            path: name.to_string(),
            reason,
        };
        let mut entry = self.archive.by_name(name).map_err(|e| match e {
            ZipError::FileNotFound => ContainerError::FileNotFound {
                path: name.to_string(),
            },
            other => read_error(other.to_string()),
        })?;

        let size = entry.size();
        if size > self.limits.max_part_uncompressed_bytes {
            return Err(ContainerError::PartTooLarge {
                path: name.to_string(),
                size,
                limit: self.limits.max_part_uncompressed_bytes,
            });
        }
        let total = self.total_read.saturating_add(size);
        if total > self.limits.max_total_uncompressed_bytes {
            return Err(ContainerError::TotalTooLarge {
                limit: self.limits.max_total_uncompressed_bytes,
            });
        }

        let mut buf = Vec::with_capacity(usize::try_from(size).unwrap_or_default());
        entry
            .read_to_end(&mut buf)
            .map_err(|e| read_error(e.to_string()))?;
        self.total_read = total;
        Ok(buf)
    }

    /// Like [`read_part`](Self::read_part), with an absent part as `None`.
    pub fn read_part_optional(&mut self, name: &str) -> Result<Option<Vec<u8>>, ContainerError> {
        match self.read_part(name) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(ContainerError::FileNotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.archive.index_for_name(name).is_some()
    }

    /// Part names in archive order, directories excluded.
    pub fn part_names(&self) -> Vec<String> {
        self.archive
            .file_names()
            .filter(|name| !name.ends_with('/'))
            .map(str::to_string)
            .collect()
    }

    /// Uncompressed size of a part without reading it.
    pub fn part_size(&mut self, name: &str) -> Option<u64> {
        self.archive.by_name(name).ok().map(|file| file.size())
    }
}

fn open_error(err: ZipError) -> ContainerError {
    match err {
        ZipError::InvalidArchive(_) | ZipError::UnsupportedArchive(_) => {
            ContainerError::NotZipContainer
        }
        ZipError::Io(e) => ContainerError::Io(e),
        other => ContainerError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            other.to_string(),
        )),
    }
}

/// Writes a new OPC package part by part.
///
/// `[Content_Types].xml` is generated on [`PackageWriter::finish`] from the
/// parts written; callers never write it themselves.
pub struct PackageWriter<W: Write + Seek> {
    zip: ZipWriter<W>,
    parts: Vec<String>,
}

impl<W: Write + Seek> PackageWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            zip: ZipWriter::new(inner),
            parts: Vec::new(),
        }
    }

    pub fn write_part(&mut self, name: &str, bytes: &[u8]) -> Result<(), ContainerError> {
        let name = name.trim_start_matches('/');
        if name == CONTENT_TYPES_PART {
            return Ok(());
        }
        write_zip_entry(&mut self.zip, name, bytes)?;
        self.parts.push(name.to_string());
        Ok(())
    }

    pub fn finish(mut self) -> Result<W, ContainerError> {
        let content_types = content_types_xml(&self.parts);
        write_zip_entry(&mut self.zip, CONTENT_TYPES_PART, content_types.as_bytes())?;
        self.zip.finish().map_err(|e| ContainerError::ZipWrite {
            path: CONTENT_TYPES_PART.to_string(),
            reason: e.to_string(),
        })
    }
}

pub(crate) fn write_zip_entry<W: Write + Seek>(
    zip: &mut ZipWriter<W>,
    name: &str,
    bytes: &[u8],
) -> Result<(), ContainerError> {
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    zip.start_file(name, options)
        .map_err(|e| ContainerError::ZipWrite {
            path: name.to_string(),
            reason: e.to_string(),
        })?;
    zip.write_all(bytes).map_err(|e| ContainerError::ZipWrite {
        path: name.to_string(),
        reason: e.to_string(),
    })
}

/// Power BI Desktop writes empty content types for every part; the generated
/// manifest follows that convention.
pub(crate) fn content_types_xml(parts: &[String]) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="utf-8"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="json" ContentType="" />"#,
    );
    for part in parts {
        xml.push_str(r#"<Override PartName="/"#);
        xml.push_str(&part_uri(part));
        xml.push_str(r#"" ContentType="" />"#);
    }
    xml.push_str("</Types>");
    xml
}

fn part_uri(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for b in name.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' | b'/' => {
                out.push(b as char)
            }
            b'&' => out.push_str("&amp;"),
            other => out.push_str(&format!("%{other:02X}")),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn build_package(parts: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = PackageWriter::new(Cursor::new(Vec::new()));
        for (name, bytes) in parts {
            writer.write_part(name, bytes).expect("write part");
        }
        writer.finish().expect("finish").into_inner()
    }

    #[test]
    fn written_package_reopens_with_content_types() {
        let bytes = build_package(&[("Version", b"1.28"), ("Report/Layout", b"{}")]);
        let mut container =
            OpcContainer::open_from_reader(Cursor::new(bytes)).expect("package should open");
        assert_eq!(container.read_part("Version").expect("version"), b"1.28");
        assert!(container.contains("Report/Layout"));
        assert!(container.contains(CONTENT_TYPES_PART));
    }

    #[test]
    fn missing_optional_part_is_none() {
        let bytes = build_package(&[("Version", b"1.28")]);
        let mut container = OpcContainer::open_from_reader(Cursor::new(bytes)).expect("open");
        assert!(
            container
                .read_part_optional("DataMashup")
                .expect("optional read")
                .is_none()
        );
        let err = container.read_part("DataMashup").expect_err("required read");
        assert!(matches!(err, ContainerError::FileNotFound { .. }));
    }

    #[test]
    fn zip_without_content_types_is_not_opc() {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        write_zip_entry(&mut zip, "Version", b"1").expect("entry");
        let bytes = zip.finish().expect("finish").into_inner();
        let err = OpcContainer::open_from_reader(Cursor::new(bytes)).err();
        assert!(matches!(err, Some(ContainerError::NotOpcPackage)));
    }

    #[test]
    fn garbage_is_not_a_zip() {
        let err = OpcContainer::open_from_reader(Cursor::new(b"not a zip".to_vec())).err();
        assert!(matches!(err, Some(ContainerError::NotZipContainer)));
    }

    #[test]
    fn part_limit_is_enforced() {
        let bytes = build_package(&[("Report/Layout", &[b'x'; 64])]);
        let limits = ContainerLimits {
            max_part_uncompressed_bytes: 16,
            ..ContainerLimits::default()
        };
        let mut container =
            OpcContainer::open_from_reader_with_limits(Cursor::new(bytes), limits).expect("open");
        let err = container.read_part("Report/Layout").expect_err("too large");
        assert!(matches!(err, ContainerError::PartTooLarge { .. }));
    }

    #[test]
    fn content_types_escape_part_names() {
        let xml = content_types_xml(&["Report/StaticResources/My Image.png".to_string()]);
        assert!(xml.contains(r#"PartName="/Report/StaticResources/My%20Image.png""#));
    }
}
