use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::entities::collector::DEFAULT_SNIPPET_WINDOW;
use crate::llm_client::DEFAULT_MODEL;

/// Application configuration loaded from environment variables.
/// Every variable is optional; the LLM assessment is disabled without an API key.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,
    /// Extra alias map files merged after the embedded default, in order.
    pub alias_map_paths: Vec<PathBuf>,
    /// Replaces the embedded default rubric when set.
    pub rubric_path: Option<PathBuf>,
    pub snippet_window: usize,
    pub openrouter_api_key: Option<String>,
    pub openrouter_model: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            rust_log: "info".to_string(),
            alias_map_paths: Vec::new(),
            rubric_path: None,
            snippet_window: DEFAULT_SNIPPET_WINDOW,
            openrouter_api_key: None,
            openrouter_model: DEFAULT_MODEL.to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup; blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Config::default();

        Ok(Config {
            port: get("PORT")
                .map(|v| v.parse::<u16>())
                .transpose()
                .context("PORT must be a valid port number")?
                .unwrap_or(defaults.port),
            rust_log: get("RUST_LOG").unwrap_or(defaults.rust_log),
            alias_map_paths: get("ALIAS_MAP_PATHS")
                .map(|v| {
                    v.split(',')
                        .map(str::trim)
                        .filter(|p| !p.is_empty())
                        .map(PathBuf::from)
                        .collect()
                })
                .unwrap_or_default(),
            rubric_path: get("RUBRIC_PATH").map(PathBuf::from),
            snippet_window: get("SNIPPET_WINDOW")
                .map(|v| v.parse::<usize>())
                .transpose()
                .context("SNIPPET_WINDOW must be a non-negative integer")?
                .unwrap_or(defaults.snippet_window),
            openrouter_api_key: get("OPENROUTER_API_KEY"),
            openrouter_model: get("OPENROUTER_MODEL").unwrap_or(defaults.openrouter_model),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.snippet_window, 40);
        assert_eq!(config.openrouter_model, "openrouter/auto");
        assert!(config.openrouter_api_key.is_none());
        assert!(config.alias_map_paths.is_empty());
    }

    #[test]
    fn test_reads_overrides() {
        let config = config_from(&[
            ("PORT", "9090"),
            ("ALIAS_MAP_PATHS", "a.yaml, ,b.yaml"),
            ("RUBRIC_PATH", "rubric.yaml"),
            ("SNIPPET_WINDOW", "12"),
            ("OPENROUTER_API_KEY", "sk-test"),
        ])
        .unwrap();
        assert_eq!(config.port, 9090);
        assert_eq!(
            config.alias_map_paths,
            vec![PathBuf::from("a.yaml"), PathBuf::from("b.yaml")]
        );
        assert_eq!(config.rubric_path, Some(PathBuf::from("rubric.yaml")));
        assert_eq!(config.snippet_window, 12);
        assert_eq!(config.openrouter_api_key.as_deref(), Some("sk-test"));
    }

    #[test]
    fn test_blank_api_key_is_unset() {
        let config = config_from(&[("OPENROUTER_API_KEY", "  ")]).unwrap();
        assert!(config.openrouter_api_key.is_none());
    }

    #[test]
    fn test_invalid_port_is_rejected() {
        let err = config_from(&[("PORT", "eighty")]).unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }
}
