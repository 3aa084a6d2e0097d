pub mod config;
pub mod entities;
pub mod errors;
pub mod llm_client;
pub mod routes;
pub mod rules;
pub mod scoring;
pub mod screening;
pub mod state;
