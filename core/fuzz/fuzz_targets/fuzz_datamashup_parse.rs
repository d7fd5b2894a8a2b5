#![no_main]

use libfuzzer_sys::fuzz_target;

use pbixproj::mashup::metadata::parse_metadata;
use pbixproj::mashup::permissions::parse_permissions;
use pbixproj::mashup::{build_data_mashup, parse_data_mashup};

fuzz_target!(|data: &[u8]| {
    if let Ok(raw) = parse_data_mashup(data) {
        let _ = parse_permissions(&raw.permissions);
        let _ = parse_metadata(&raw.metadata);
        let _ = build_data_mashup(&raw);
    }
});
