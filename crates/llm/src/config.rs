//! Client configuration read from the environment.

use deck_core::{Error, Result};
use serde::{Deserialize, Serialize};

pub const API_KEY_VAR: &str = "ANTHROPIC_API_KEY";
pub const MODEL_VAR: &str = "DOC2DECK_MODEL";
pub const MAX_TOKENS_VAR: &str = "DOC2DECK_MAX_TOKENS";
pub const BASE_URL_VAR: &str = "ANTHROPIC_BASE_URL";

pub const DEFAULT_MODEL: &str = "claude-3-5-sonnet-20241022";
pub const DEFAULT_MAX_TOKENS: u32 = 4096;
pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

/// Credentials and request settings for the Messages API.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlmConfig {
    pub api_key: String,
    pub model: String,
    pub max_tokens: u32,
    pub base_url: String,
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl LlmConfig {
    /// Config with the given key and default model, token limit and endpoint.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Read the config from process environment variables.
    ///
    /// Fails with [`Error::MissingCredential`] when `ANTHROPIC_API_KEY` is
    /// unset or blank.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read the config through `lookup`, which maps a variable name to its
    /// value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup(API_KEY_VAR)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| Error::MissingCredential(API_KEY_VAR.to_string()))?;

        let mut config = Self::new(api_key);

        if let Some(model) = lookup(MODEL_VAR).filter(|v| !v.trim().is_empty()) {
            config.model = model.trim().to_string();
        }

        if let Some(raw) = lookup(MAX_TOKENS_VAR) {
            match raw.trim().parse::<u32>() {
                Ok(n) if n > 0 => config.max_tokens = n,
                _ => log::warn!(
                    "Ignoring {}={:?}, using {}",
                    MAX_TOKENS_VAR,
                    raw,
                    DEFAULT_MAX_TOKENS
                ),
            }
        }

        if let Some(url) = lookup(BASE_URL_VAR).filter(|v| !v.trim().is_empty()) {
            config.base_url = url.trim().trim_end_matches('/').to_string();
        }

        Ok(config)
    }

    /// Full URL of the Messages endpoint.
    pub fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.base_url.trim_end_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_missing_key_is_missing_credential() {
        let err = LlmConfig::from_lookup(lookup_from(&[])).unwrap_err();
        assert!(matches!(err, Error::MissingCredential(ref name) if name == API_KEY_VAR));

        let err = LlmConfig::from_lookup(lookup_from(&[(API_KEY_VAR, "   ")])).unwrap_err();
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_defaults() {
        let config = LlmConfig::from_lookup(lookup_from(&[(API_KEY_VAR, "sk-test")])).unwrap();
        assert_eq!(config.api_key, "sk-test");
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.max_tokens, 4096);
        assert_eq!(config.messages_url(), "https://api.anthropic.com/v1/messages");
    }

    #[test]
    fn test_overrides() {
        let config = LlmConfig::from_lookup(lookup_from(&[
            (API_KEY_VAR, "sk-test"),
            (MODEL_VAR, "claude-3-haiku-20240307"),
            (MAX_TOKENS_VAR, "1024"),
            (BASE_URL_VAR, "http://localhost:8080/"),
        ]))
        .unwrap();
        assert_eq!(config.model, "claude-3-haiku-20240307");
        assert_eq!(config.max_tokens, 1024);
        assert_eq!(config.messages_url(), "http://localhost:8080/v1/messages");
    }

    #[test]
    fn test_bad_max_tokens_falls_back() {
        let config = LlmConfig::from_lookup(lookup_from(&[
            (API_KEY_VAR, "sk-test"),
            (MAX_TOKENS_VAR, "lots"),
        ]))
        .unwrap();
        assert_eq!(config.max_tokens, DEFAULT_MAX_TOKENS);
    }

    #[test]
    fn test_debug_hides_key() {
        let config = LlmConfig::new("sk-secret");
        assert!(!format!("{:?}", config).contains("sk-secret"));
    }
}
