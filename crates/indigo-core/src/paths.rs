//! Centralized path utilities
//!
//! All application paths in one place for consistency

use std::path::PathBuf;

use crate::constants::paths;

/// Get the indigo config directory (~/.indigo)
pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(paths::CONFIG_DIR_NAME)
}

/// Get the config file (~/.indigo/config.toml)
pub fn config_path() -> PathBuf {
    config_dir().join(paths::CONFIG_FILE_NAME)
}

/// Get the logs directory (~/.indigo/logs)
pub fn logs_dir() -> PathBuf {
    config_dir().join("logs")
}

/// Get the tokens directory (~/.indigo/tokens)
pub fn tokens_dir() -> PathBuf {
    config_dir().join("tokens")
}

/// Google authorized-user token (~/.indigo/tokens/token.json)
pub fn google_token_path() -> PathBuf {
    tokens_dir().join(paths::TOKEN_FILE_NAME)
}

/// OAuth client secrets downloaded from the Google console
/// (~/.indigo/credentials.json)
pub fn google_credentials_path() -> PathBuf {
    config_dir().join(paths::CREDENTIALS_FILE_NAME)
}

/// Ensure the tokens directory exists, creating it if necessary
pub fn ensure_tokens_dir() -> std::io::Result<PathBuf> {
    let dir = tokens_dir();
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
