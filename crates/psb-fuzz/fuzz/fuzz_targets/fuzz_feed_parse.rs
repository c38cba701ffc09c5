#![no_main]

use libfuzzer_sys::fuzz_target;
use project_search_bar::client::{parse_atom, parse_list_records};

fuzz_target!(|data: &[u8]| {
    let xml = String::from_utf8_lossy(data);
    let _ = parse_atom(&xml);
    let _ = parse_list_records(&xml);
});
