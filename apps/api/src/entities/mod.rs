//! Entity pipeline: raw spans → occurrences → canonical entities.

pub mod canonicalizer;
pub mod collector;
pub mod models;
pub mod recognizer;

pub use canonicalizer::{normalize, Canonicalizer};
pub use collector::{collect, merge_in_document_order, SourceDocument};
pub use recognizer::{EntityRecognizer, GazetteerRecognizer};
