//! Fuzz the query parser
//!
//! Any text must parse to a query or to an error, never panic. Parsed
//! queries must render to a canonical text that parses back.

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        if let Ok(query) = daf::parse_query(input) {
            let canonical = query.to_string();
            let reparsed = daf::parse_query(&canonical).expect("canonical query parses");
            assert_eq!(reparsed, query);
        }
    }
});
