//! ZIP archives nested in a mashup: the package parts segment and the
//! metadata content blob.

use std::io::{Cursor, Read};

use zip::{ZipArchive, ZipWriter};

use super::{DataMashupError, DataMashupLimits};
use crate::container::write_zip_entry;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageEntry {
    /// Normalized entry path (`/`-separated, never starts with `/`).
    pub name: String,
    pub bytes: Vec<u8>,
}

pub fn is_zip(bytes: &[u8]) -> bool {
    bytes.starts_with(b"PK\x03\x04") || bytes.starts_with(b"PK\x05\x06")
}

pub fn read_package_entries(
    bytes: &[u8],
    limits: DataMashupLimits,
) -> Result<Vec<PackageEntry>, DataMashupError> {
    let mut archive =
        ZipArchive::new(Cursor::new(bytes)).map_err(|e| DataMashupError::Zip(e.to_string()))?;

    if archive.len() > limits.max_inner_entries {
        return Err(DataMashupError::InnerTooManyEntries {
            entries: archive.len(),
            max_entries: limits.max_inner_entries,
        });
    }

    let mut total_read: u64 = 0;
    let mut entries = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let mut file = archive
            .by_index(i)
            .map_err(|e| DataMashupError::Zip(e.to_string()))?;
        if file.is_dir() {
            continue;
        }
        let name = normalize_path(file.name());
        reserve_inner_read_budget(&mut total_read, &name, file.size(), limits)?;
        let mut buf = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut buf)
            .map_err(|e| DataMashupError::Zip(format!("{name}: {e}")))?;
        entries.push(PackageEntry { name, bytes: buf });
    }
    Ok(entries)
}

pub fn write_package_entries(entries: &[PackageEntry]) -> Result<Vec<u8>, DataMashupError> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for entry in entries {
        write_zip_entry(&mut zip, &entry.name, &entry.bytes)
            .map_err(|e| DataMashupError::Zip(e.to_string()))?;
    }
    let cursor = zip
        .finish()
        .map_err(|e| DataMashupError::Zip(e.to_string()))?;
    Ok(cursor.into_inner())
}

fn normalize_path(name: &str) -> String {
    let trimmed = name.trim_start_matches(['/', '\\']);
    trimmed.replace('\\', "/")
}

fn reserve_inner_read_budget(
    total_read: &mut u64,
    path: &str,
    size: u64,
    limits: DataMashupLimits,
) -> Result<(), DataMashupError> {
    if size > limits.max_inner_part_bytes {
        return Err(DataMashupError::InnerPartTooLarge {
            path: path.to_string(),
            size,
            limit: limits.max_inner_part_bytes,
        });
    }

    let new_total = total_read.saturating_add(size);
    if new_total > limits.max_inner_total_bytes {
        return Err(DataMashupError::InnerTotalTooLarge {
            limit: limits.max_inner_total_bytes,
        });
    }

    *total_read = new_total;
    Ok(())
}
