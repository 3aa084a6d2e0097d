//! Rule documents loaded once at startup: the alias map and the scoring rubric.

pub mod alias_map;
pub mod rubric;

pub use alias_map::{AliasMap, AliasMapDetails};
pub use rubric::RubricConfig;
