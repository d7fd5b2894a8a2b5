#![no_main]

use libfuzzer_sys::fuzz_target;

use pbixproj::DataMashupLimits;
use pbixproj::mashup::package::read_package_entries;

fuzz_target!(|data: &[u8]| {
    let limits = DataMashupLimits {
        max_inner_entries: 2000,
        max_inner_part_bytes: 5 * 1024 * 1024,
        max_inner_total_bytes: 50 * 1024 * 1024,
    };
    let _ = read_package_entries(data, limits);
});
