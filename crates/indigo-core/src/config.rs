//! Runtime configuration
//!
//! Read from `~/.indigo/config.toml` (every field optional), then
//! overridden by environment variables.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::agents::AgentSettings;
use crate::ai::client::AiClientConfig;
use crate::ai::providers::ProviderId;
use crate::constants;
use crate::paths;
use crate::time::parse_timezone;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid value for {key}: '{value}'")]
    InvalidValue { key: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CalendarKind {
    #[default]
    Google,
    /// Process-local calendar, nothing persisted
    Memory,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IndigoConfig {
    pub ai: AiSection,
    pub calendar: CalendarSection,
    pub agent: AgentSection,
    pub server: ServerSection,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AiSection {
    pub provider: ProviderId,
    /// Defaults to the provider's default model
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub temperature: f32,
    pub max_tokens: usize,
}

impl Default for AiSection {
    fn default() -> Self {
        Self {
            provider: ProviderId::default(),
            model: None,
            base_url: None,
            api_key: None,
            temperature: constants::ai::DEFAULT_TEMPERATURE,
            max_tokens: constants::ai::MAX_OUTPUT_TOKENS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CalendarSection {
    pub backend: CalendarKind,
    pub calendar_id: String,
    /// OAuth client secrets; defaults to `~/.indigo/credentials.json`
    pub credentials_path: Option<PathBuf>,
    /// Authorized-user token; defaults to `~/.indigo/tokens/token.json`
    pub token_path: Option<PathBuf>,
    pub context_days: i64,
}

impl Default for CalendarSection {
    fn default() -> Self {
        Self {
            backend: CalendarKind::default(),
            calendar_id: constants::calendar::DEFAULT_CALENDAR_ID.to_string(),
            credentials_path: None,
            token_path: None,
            context_days: constants::calendar::CONTEXT_WINDOW_DAYS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AgentSection {
    /// IANA name of the user's timezone
    pub timezone: String,
    pub max_steps: usize,
    pub tool_timeout_secs: u64,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            timezone: constants::calendar::DEFAULT_TIMEZONE.to_string(),
            max_steps: constants::graph::DEFAULT_MAX_STEPS,
            tool_timeout_secs: constants::calendar::TOOL_TIMEOUT.as_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerSection {
    pub port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            port: constants::server::DEFAULT_PORT,
        }
    }
}

impl IndigoConfig {
    /// Config file plus environment overrides
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::load_from(&paths::config_path())?;
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a config file; a missing file yields the defaults
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No config file; using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply environment overrides read through `lookup`
    pub fn apply_env(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(provider) = var("INDIGO_PROVIDER") {
            self.ai.provider = provider.parse().map_err(|_| ConfigError::InvalidValue {
                key: "INDIGO_PROVIDER",
                value: provider,
            })?;
        }
        if let Some(model) = var("INDIGO_MODEL") {
            self.ai.model = Some(model);
        }
        if let Some(base_url) = var("INDIGO_BASE_URL") {
            self.ai.base_url = Some(base_url);
        }
        if let Some(key) = var("INDIGO_API_KEY").or_else(|| var(self.ai.provider.api_key_env())) {
            self.ai.api_key = Some(key);
        }
        if let Some(timezone) = var("INDIGO_TIMEZONE") {
            self.agent.timezone = timezone;
        }
        if let Some(backend) = var("INDIGO_CALENDAR") {
            self.calendar.backend = match backend.trim().to_ascii_lowercase().as_str() {
                "google" => CalendarKind::Google,
                "memory" => CalendarKind::Memory,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: "INDIGO_CALENDAR",
                        value: backend,
                    })
                }
            };
        }
        if let Some(calendar_id) = var("INDIGO_CALENDAR_ID") {
            self.calendar.calendar_id = calendar_id;
        }
        if let Some(port) = var("PORT") {
            self.server.port = port.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: "PORT",
                value: port,
            })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.timezone()?;
        if self.calendar.context_days < 1 {
            return Err(ConfigError::InvalidValue {
                key: "calendar.context_days",
                value: self.calendar.context_days.to_string(),
            });
        }
        Ok(())
    }

    pub fn timezone(&self) -> Result<Tz, ConfigError> {
        parse_timezone(&self.agent.timezone).map_err(|_| ConfigError::InvalidValue {
            key: "agent.timezone",
            value: self.agent.timezone.clone(),
        })
    }

    pub fn ai_client_config(&self) -> AiClientConfig {
        let mut config = AiClientConfig::for_provider(self.ai.provider);
        if let Some(model) = &self.ai.model {
            config.model = model.clone();
        }
        config.base_url = self.ai.base_url.clone();
        config.temperature = self.ai.temperature;
        config.max_tokens = self.ai.max_tokens;
        config
    }

    pub fn agent_settings(&self) -> AgentSettings {
        AgentSettings {
            context_days: self.calendar.context_days,
            max_steps: self.agent.max_steps,
            tool_timeout: Duration::from_secs(self.agent.tool_timeout_secs.max(1)),
        }
    }

    pub fn token_path(&self) -> PathBuf {
        self.calendar
            .token_path
            .clone()
            .unwrap_or_else(paths::google_token_path)
    }

    pub fn credentials_path(&self) -> PathBuf {
        self.calendar
            .credentials_path
            .clone()
            .unwrap_or_else(paths::google_credentials_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = IndigoConfig::load_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config, IndigoConfig::default());
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.agent.timezone, "America/New_York");
        assert_eq!(config.ai.temperature, 0.2);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[ai]\nprovider = \"openai\"\nmodel = \"gpt-4o\"\n\n[calendar]\nbackend = \"memory\"\n",
        )
        .unwrap();

        let config = IndigoConfig::load_from(&path).unwrap();
        assert_eq!(config.ai.provider, ProviderId::OpenAI);
        assert_eq!(config.calendar.backend, CalendarKind::Memory);
        assert_eq!(config.calendar.calendar_id, "primary");
        assert_eq!(config.ai_client_config().model, "gpt-4o");
    }

    #[test]
    fn test_bad_file_is_a_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[server]\nport = \"eight thousand\"\n").unwrap();
        assert!(matches!(
            IndigoConfig::load_from(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = IndigoConfig::default();
        config
            .apply_env(env(&[
                ("INDIGO_PROVIDER", "openai"),
                ("OPENAI_API_KEY", "sk-test"),
                ("GEMINI_API_KEY", "ignored"),
                ("INDIGO_TIMEZONE", "Europe/Paris"),
                ("INDIGO_CALENDAR", "memory"),
                ("PORT", "9000"),
            ]))
            .unwrap();
        assert_eq!(config.ai.provider, ProviderId::OpenAI);
        assert_eq!(config.ai.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.timezone().unwrap(), chrono_tz::Europe::Paris);
        assert_eq!(config.calendar.backend, CalendarKind::Memory);
        assert_eq!(config.server.port, 9000);

        let mut config = IndigoConfig::default();
        config
            .apply_env(env(&[("GEMINI_API_KEY", "g"), ("INDIGO_API_KEY", "explicit")]))
            .unwrap();
        assert_eq!(config.ai.api_key.as_deref(), Some("explicit"));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let mut config = IndigoConfig::default();
        assert!(config.apply_env(env(&[("PORT", "http")])).is_err());
        assert!(config.apply_env(env(&[("INDIGO_CALENDAR", "outlook")])).is_err());

        config.agent.timezone = "Atlantis/Capital".into();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { key: "agent.timezone", .. })
        ));
    }
}
