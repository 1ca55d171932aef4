//! Authorized-user tokens and refresh

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::constants::calendar::{GOOGLE_AUTH_URI, GOOGLE_TOKEN_URI};

/// Refresh this long before the recorded expiry.
const EXPIRY_SKEW_SECS: i64 = 60;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("failed to read or write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid token file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("token has expired and no refresh token is available; run `indigo auth`")]
    MissingRefreshToken,
    #[error("token refresh failed ({status}): {body}")]
    Refresh { status: u16, body: String },
    #[error("token request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Google "authorized user" credentials (`token.json`)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthorizedUser {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub expiry: Option<DateTime<Utc>>,
}

fn default_token_uri() -> String {
    GOOGLE_TOKEN_URI.to_string()
}

impl AuthorizedUser {
    pub fn load(path: &Path) -> Result<Self, AuthError> {
        let raw = std::fs::read_to_string(path).map_err(|source| AuthError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| AuthError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), AuthError> {
        let io_err = |source| AuthError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|source| AuthError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, json).map_err(io_err)
    }

    /// Access token usable at `now`, if any
    pub fn valid_token(&self, now: DateTime<Utc>) -> Option<&str> {
        let token = self.token.as_deref().filter(|t| !t.is_empty())?;
        match self.expiry {
            Some(expiry) if expiry - Duration::seconds(EXPIRY_SKEW_SECS) <= now => None,
            _ => Some(token),
        }
    }

    /// Apply a token endpoint response
    pub(crate) fn absorb(&mut self, response: TokenResponse, now: DateTime<Utc>) {
        self.token = Some(response.access_token);
        if let Some(refresh) = response.refresh_token {
            self.refresh_token = Some(refresh);
        }
        self.expiry = response.expires_in.map(|secs| now + Duration::seconds(secs));
        if let Some(scope) = response.scope {
            self.scopes = scope.split_whitespace().map(str::to_string).collect();
        }
    }
}

/// OAuth client from the Google console (`credentials.json`)
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ClientSecrets {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_auth_uri() -> String {
    GOOGLE_AUTH_URI.to_string()
}

#[derive(Deserialize)]
struct ClientSecretsFile {
    #[serde(alias = "web")]
    installed: ClientSecrets,
}

impl ClientSecrets {
    pub fn load(path: &Path) -> Result<Self, AuthError> {
        let raw = std::fs::read_to_string(path).map_err(|source| AuthError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str::<ClientSecretsFile>(&raw)
            .map(|file| file.installed)
            .map_err(|source| AuthError::Parse {
                path: path.to_path_buf(),
                source,
            })
    }
}

/// Token endpoint response
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub scope: Option<String>,
}

/// Hands out fresh access tokens, refreshing and persisting as needed
pub struct TokenManager {
    path: PathBuf,
    http: reqwest::Client,
    credentials: Mutex<AuthorizedUser>,
}

impl TokenManager {
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, AuthError> {
        let path = path.into();
        let credentials = AuthorizedUser::load(&path)?;
        Ok(Self::new(path, credentials))
    }

    pub fn new(path: PathBuf, credentials: AuthorizedUser) -> Self {
        Self {
            path,
            http: reqwest::Client::new(),
            credentials: Mutex::new(credentials),
        }
    }

    pub async fn access_token(&self) -> Result<String, AuthError> {
        let mut credentials = self.credentials.lock().await;
        let now = Utc::now();
        if let Some(token) = credentials.valid_token(now) {
            return Ok(token.to_string());
        }

        let refresh_token = credentials
            .refresh_token
            .clone()
            .ok_or(AuthError::MissingRefreshToken)?;
        info!("Refreshing Google access token");

        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token.as_str()),
            ("client_id", credentials.client_id.as_str()),
            ("client_secret", credentials.client_secret.as_str()),
        ];
        let response = self
            .http
            .post(&credentials.token_uri)
            .form(&params)
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Refresh { status, body });
        }
        let token: TokenResponse = response.json().await?;
        credentials.absorb(token, now);

        if let Err(e) = credentials.save(&self.path) {
            warn!(error = %e, "Could not persist refreshed token");
        }
        credentials
            .token
            .clone()
            .ok_or(AuthError::MissingRefreshToken)
    }
}
