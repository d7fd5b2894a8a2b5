#![no_main]

use libfuzzer_sys::fuzz_target;

use pbixproj::mashup::section::parse_section_document;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        let _ = parse_section_document(text);
    }
});
