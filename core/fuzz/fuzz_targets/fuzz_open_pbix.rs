#![no_main]

use libfuzzer_sys::fuzz_target;
use std::io::Cursor;

use pbixproj::{ContainerLimits, OpcContainer, PbixModel};

fuzz_target!(|data: &[u8]| {
    let limits = ContainerLimits {
        max_entries: 2000,
        max_part_uncompressed_bytes: 5 * 1024 * 1024,
        max_total_uncompressed_bytes: 50 * 1024 * 1024,
    };

    let cursor = Cursor::new(data.to_vec());
    if let Ok(mut container) = OpcContainer::open_from_reader_with_limits(cursor, limits) {
        let _ = PbixModel::from_container(&mut container);
    }
});
