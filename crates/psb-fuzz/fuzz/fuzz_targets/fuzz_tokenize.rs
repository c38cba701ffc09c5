#![no_main]

use libfuzzer_sys::fuzz_target;
use project_search_bar::latex::{extract_document, parse_query, tokenize};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    // Unbalanced braces and dangling `$` must never panic.
    let _ = tokenize(text);
    let _ = parse_query(text);
    let _ = extract_document(text);
});
