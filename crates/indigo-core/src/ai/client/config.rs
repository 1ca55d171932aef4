//! AI Client configuration
//!
//! Provider-agnostic configuration for AI API clients.

use crate::ai::providers::{AuthHeader, ProviderId};
use crate::ai::retry::RetryConfig;
use crate::constants;

/// Configuration for the AI client
#[derive(Debug, Clone)]
pub struct AiClientConfig {
    /// Model ID to use for API calls
    pub model: String,
    /// Maximum output tokens
    pub max_tokens: usize,
    pub temperature: f32,
    /// Optional base URL override (defaults to provider default)
    pub base_url: Option<String>,
    /// Which provider this config is for
    pub provider_id: ProviderId,
    pub retry: RetryConfig,
}

impl Default for AiClientConfig {
    fn default() -> Self {
        Self::for_provider(ProviderId::default())
    }
}

impl AiClientConfig {
    pub fn for_provider(provider_id: ProviderId) -> Self {
        Self {
            model: provider_id.default_model().to_string(),
            max_tokens: constants::ai::MAX_OUTPUT_TOKENS,
            temperature: constants::ai::DEFAULT_TEMPERATURE,
            base_url: None,
            provider_id,
            retry: RetryConfig::default(),
        }
    }

    /// Get the API URL to use
    ///
    /// For Google the base is the API root and the model path is appended;
    /// for OpenAI the base is the full chat/completions endpoint.
    pub fn api_url(&self) -> String {
        match self.provider_id {
            ProviderId::Google => {
                let base = self
                    .base_url
                    .as_deref()
                    .unwrap_or(constants::ai::GOOGLE_API_BASE)
                    .trim_end_matches('/');
                format!("{}/models/{}:generateContent", base, self.model)
            }
            ProviderId::OpenAI => self
                .base_url
                .clone()
                .unwrap_or_else(|| constants::ai::OPENAI_API_URL.to_string()),
        }
    }

    pub fn auth_header(&self) -> AuthHeader {
        self.provider_id.auth_header()
    }

    /// Check if this config uses Google/Gemini format
    pub fn uses_google_format(&self) -> bool {
        matches!(self.provider_id, ProviderId::Google)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_google_url_includes_model() {
        let config = AiClientConfig::default();
        assert_eq!(
            config.api_url(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash:generateContent"
        );
        assert!(config.uses_google_format());
    }

    #[test]
    fn test_openai_url_override() {
        let mut config = AiClientConfig::for_provider(ProviderId::OpenAI);
        assert_eq!(config.api_url(), "https://api.openai.com/v1/chat/completions");
        config.base_url = Some("http://localhost:11434/v1/chat/completions".into());
        assert_eq!(config.api_url(), "http://localhost:11434/v1/chat/completions");
    }
}
