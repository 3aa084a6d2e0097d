use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::config::Config;
use crate::entities::recognizer::{EntityRecognizer, GazetteerRecognizer};
use crate::entities::Canonicalizer;
use crate::llm_client::LlmClient;
use crate::rules::{AliasMap, RubricConfig};

/// Shared application state injected into all route handlers via Axum extractors.
///
/// Rules are loaded once and never mutated; every run reads them through `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub alias_map: Arc<AliasMap>,
    /// Index of `alias_map`; building it rejects conflicting aliases at startup.
    pub canonicalizer: Arc<Canonicalizer>,
    pub rubric: Arc<RubricConfig>,
    /// Pluggable NER backend. Default: GazetteerRecognizer.
    pub recognizer: Arc<dyn EntityRecognizer>,
    /// Present only when an OpenRouter API key is configured.
    pub llm: Option<LlmClient>,
}

impl AppState {
    /// Loads rule documents named by `config` and builds the default backends.
    pub fn from_config(config: Config) -> Result<Self> {
        let alias_map = AliasMap::load(&config.alias_map_paths)?;
        let rubric = RubricConfig::load(config.rubric_path.as_deref())?;
        let recognizer = Arc::new(GazetteerRecognizer::new(&alias_map)?);
        Self::new(config, alias_map, rubric, recognizer)
    }

    pub fn new(
        config: Config,
        alias_map: AliasMap,
        rubric: RubricConfig,
        recognizer: Arc<dyn EntityRecognizer>,
    ) -> Result<Self> {
        let canonicalizer =
            Canonicalizer::new(&alias_map).context("Alias map contains conflicting rules")?;
        rubric.validate().context("Rubric is invalid")?;

        let details = alias_map.details();
        info!(
            "Alias map loaded: {} canonical terms, {} aliases, locale overrides: [{}]",
            details.canonical_count,
            details.alias_count,
            details.locale_codes.join(", ")
        );
        info!(
            "Rubric {} loaded with {} weighted categories",
            rubric.version,
            rubric.scored_categories().count()
        );

        let llm = match &config.openrouter_api_key {
            Some(key) => {
                let client = LlmClient::new(key.clone(), config.openrouter_model.clone())
                    .context("Failed to build LLM HTTP client")?;
                info!("LLM client initialized (model: {})", client.model());
                Some(client)
            }
            None => {
                warn!("OPENROUTER_API_KEY not set; LLM assessments are disabled");
                None
            }
        };

        Ok(Self {
            config,
            alias_map: Arc::new(alias_map),
            canonicalizer: Arc::new(canonicalizer),
            rubric: Arc::new(rubric),
            recognizer,
            llm,
        })
    }
}
