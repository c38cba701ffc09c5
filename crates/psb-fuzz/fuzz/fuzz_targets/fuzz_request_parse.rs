#![no_main]

use libfuzzer_sys::fuzz_target;
use project_search_bar::models::{AgentRequest, ChatRequest, SearchRequest};

fuzz_target!(|data: &[u8]| {
    if let Ok(request) = serde_json::from_slice::<SearchRequest>(data) {
        let _ = request.validate();
    }
    if let Ok(request) = serde_json::from_slice::<ChatRequest>(data) {
        let _ = request.validate();
    }
    if let Ok(request) = serde_json::from_slice::<AgentRequest>(data) {
        let _ = request.validate();
    }
});
