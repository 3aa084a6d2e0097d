//! Screening — orchestration of one resume against one job description,
//! plus the ingestion, reporting and HTTP layers around it.

pub mod handlers;
pub mod ingest;
pub mod pipeline;
pub mod prompts;
pub mod report;

pub use pipeline::{run_screening, ScreeningRequest, ScreeningResult};
