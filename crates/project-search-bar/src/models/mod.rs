//! Data models shared across the crate.
//!
//! Serialized models use `#[serde(rename_all = "camelCase")]` to match the
//! JSON the HTTP API and MCP tools speak.

mod enums;
mod inputs;
mod paper;

pub use enums::{RankingMode, ResponseFormat, TokenKind};
pub use inputs::*;
pub use paper::{ArxivId, ArxivMetadata, NewPaper, Paper, TexDocument, year_from_id};
