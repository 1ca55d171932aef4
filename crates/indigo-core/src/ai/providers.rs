//! AI provider identities
//!
//! Indigo speaks two wire formats: Google Gemini (default) and OpenAI
//! chat/completions, which also covers OpenAI-compatible gateways via a
//! base URL override.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::constants;

/// Unique identifier for each supported provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    #[default]
    Google,
    OpenAI,
}

/// How the API key is attached to requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthHeader {
    /// `Authorization: Bearer <key>`
    Bearer,
    /// `x-goog-api-key: <key>`
    GoogApiKey,
}

impl ProviderId {
    pub fn storage_key(&self) -> &'static str {
        match self {
            ProviderId::Google => "google",
            ProviderId::OpenAI => "openai",
        }
    }

    pub fn auth_header(&self) -> AuthHeader {
        match self {
            ProviderId::Google => AuthHeader::GoogApiKey,
            ProviderId::OpenAI => AuthHeader::Bearer,
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderId::Google => constants::ai::DEFAULT_GOOGLE_MODEL,
            ProviderId::OpenAI => constants::ai::DEFAULT_OPENAI_MODEL,
        }
    }

    /// Environment variable holding this provider's API key
    pub fn api_key_env(&self) -> &'static str {
        match self {
            ProviderId::Google => "GEMINI_API_KEY",
            ProviderId::OpenAI => "OPENAI_API_KEY",
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.storage_key())
    }
}

impl FromStr for ProviderId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "google" | "gemini" => Ok(ProviderId::Google),
            "openai" => Ok(ProviderId::OpenAI),
            other => Err(format!("unknown provider '{other}' (expected google or openai)")),
        }
    }
}
