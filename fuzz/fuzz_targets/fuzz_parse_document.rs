#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(content) = std::str::from_utf8(data) {
        // Fuzz document dispatch - this should never panic
        let _ = stevedore::parse_document(content, std::path::Path::new("Dockerfile.yml"));
    }
});
