//! Scoring — job-description facts and the rubric scoring engine.

pub mod engine;
pub mod facts;

pub use engine::{compute_scorecard, RubricScorecard, SubScoreDetail};
pub use facts::JobDescriptionFacts;
