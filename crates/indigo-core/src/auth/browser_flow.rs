//! Installed-app OAuth flow for Google Calendar
//!
//! Authorization code flow with PKCE:
//! 1. Generate PKCE verifier and state
//! 2. Start local HTTP server for the callback
//! 3. Open browser to Google's consent screen
//! 4. Wait for callback with authorization code
//! 5. Exchange code for tokens and build an [`AuthorizedUser`]

use std::collections::HashMap;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use url::Url;

use super::pkce::{random_state, PkceVerifier};
use super::token::{AuthorizedUser, ClientSecrets, TokenResponse};
use crate::constants::calendar::CALENDAR_SCOPE;

/// Default port for the local OAuth callback server
pub const DEFAULT_CALLBACK_PORT: u16 = 8085;

const CALLBACK_TIMEOUT: Duration = Duration::from_secs(300);

pub struct InstalledAppFlow {
    secrets: ClientSecrets,
    port: u16,
}

impl InstalledAppFlow {
    pub fn new(secrets: ClientSecrets) -> Self {
        Self {
            secrets,
            port: DEFAULT_CALLBACK_PORT,
        }
    }

    pub fn with_port(secrets: ClientSecrets, port: u16) -> Self {
        Self { secrets, port }
    }

    pub fn callback_url(&self) -> String {
        format!("http://localhost:{}/", self.port)
    }

    fn build_auth_url(&self, verifier: &PkceVerifier, state: &str) -> Result<Url> {
        let mut url =
            Url::parse(&self.secrets.auth_uri).context("Failed to parse authorization URL")?;
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.secrets.client_id)
            .append_pair("redirect_uri", &self.callback_url())
            .append_pair("scope", CALENDAR_SCOPE)
            .append_pair("state", state)
            .append_pair("code_challenge", &verifier.challenge())
            .append_pair("code_challenge_method", verifier.challenge_method())
            // Needed for Google to issue a refresh token
            .append_pair("access_type", "offline")
            .append_pair("prompt", "consent");
        Ok(url)
    }

    async fn exchange_code(&self, code: &str, verifier: &PkceVerifier) -> Result<AuthorizedUser> {
        let redirect_uri = self.callback_url();
        let params = [
            ("grant_type", "authorization_code"),
            ("client_id", self.secrets.client_id.as_str()),
            ("client_secret", self.secrets.client_secret.as_str()),
            ("code", code),
            ("redirect_uri", redirect_uri.as_str()),
            ("code_verifier", verifier.as_str()),
        ];

        let response = reqwest::Client::new()
            .post(&self.secrets.token_uri)
            .form(&params)
            .send()
            .await
            .context("Failed to send token request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(anyhow!("Token exchange failed ({}): {}", status, body));
        }

        let token: TokenResponse = response
            .json()
            .await
            .context("Failed to parse token response")?;

        let mut user = AuthorizedUser {
            token: None,
            refresh_token: None,
            token_uri: self.secrets.token_uri.clone(),
            client_id: self.secrets.client_id.clone(),
            client_secret: self.secrets.client_secret.clone(),
            scopes: vec![CALENDAR_SCOPE.to_string()],
            expiry: None,
        };
        user.absorb(token, Utc::now());
        Ok(user)
    }

    /// Run the flow end to end
    pub async fn run(&self) -> Result<AuthorizedUser> {
        let verifier = PkceVerifier::new();
        let state = random_state();
        let auth_url = self.build_auth_url(&verifier, &state)?;

        let (tx, rx) = mpsc::channel::<CallbackResult>();
        let port = self.port;
        let expected_state = state.clone();
        let server_handle = thread::spawn(move || {
            run_callback_server(port, expected_state, tx);
        });

        // Give the server a moment to start
        thread::sleep(Duration::from_millis(100));

        println!("Opening browser for Google authorization:\n{}\n", auth_url);
        if let Err(e) = open_browser(auth_url.as_str()) {
            tracing::warn!(error = %e, "Could not open browser; visit the URL manually");
        }

        let callback_result = tokio::task::spawn_blocking(move || rx.recv_timeout(CALLBACK_TIMEOUT))
            .await
            .context("Callback listener panicked")?
            .context("OAuth callback timeout - no response received within 5 minutes")?;

        let _ = server_handle.join();

        match callback_result {
            CallbackResult::Success { code } => self.exchange_code(&code, &verifier).await,
            CallbackResult::Error { error, description } => {
                Err(anyhow!("OAuth error: {} - {}", error, description))
            }
        }
    }
}

enum CallbackResult {
    Success { code: String },
    Error { error: String, description: String },
}

fn parse_query_params(path: &str) -> HashMap<String, String> {
    path.split_once('?')
        .map(|(_, query)| {
            url::form_urlencoded::parse(query.as_bytes())
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect()
        })
        .unwrap_or_default()
}

/// Decide the outcome of one callback request
fn evaluate_callback(params: &HashMap<String, String>, expected_state: &str) -> CallbackResult {
    if params.get("state").map(String::as_str) != Some(expected_state) {
        return CallbackResult::Error {
            error: "state_mismatch".to_string(),
            description: "State parameter does not match".to_string(),
        };
    }
    if let Some(error) = params.get("error") {
        return CallbackResult::Error {
            error: error.clone(),
            description: params
                .get("error_description")
                .cloned()
                .unwrap_or_else(|| "Unknown error".to_string()),
        };
    }
    match params.get("code") {
        Some(code) => CallbackResult::Success { code: code.clone() },
        None => CallbackResult::Error {
            error: "missing_code".to_string(),
            description: "No authorization code received".to_string(),
        },
    }
}

fn run_callback_server(port: u16, expected_state: String, tx: mpsc::Sender<CallbackResult>) {
    let addr = format!("127.0.0.1:{}", port);
    let server = match tiny_http::Server::http(&addr) {
        Ok(s) => s,
        Err(e) => {
            let _ = tx.send(CallbackResult::Error {
                error: "server_error".to_string(),
                description: format!("Failed to start callback server: {}", e),
            });
            return;
        }
    };

    // Browsers may probe /favicon.ico first; keep serving until a request
    // carries OAuth parameters.
    while let Ok(Some(request)) = server.recv_timeout(CALLBACK_TIMEOUT) {
        let params = parse_query_params(request.url());
        if params.is_empty() {
            let _ = request.respond(tiny_http::Response::empty(404));
            continue;
        }
        let result = evaluate_callback(&params, &expected_state);
        let (status, message) = match &result {
            CallbackResult::Success { .. } => {
                (200, "Indigo can now reach your calendar. You can close this window.".to_string())
            }
            CallbackResult::Error { description, .. } => (400, description.clone()),
        };
        respond(request, status, &message);
        let _ = tx.send(result);
        return;
    }
}

fn respond(request: tiny_http::Request, status: u16, message: &str) {
    let title = if status == 200 {
        "Authorization complete"
    } else {
        "Authorization failed"
    };
    let html = format!(
        "<!DOCTYPE html><html><head><title>{title}</title></head>\
         <body style=\"font-family: sans-serif; text-align: center; margin-top: 20vh\">\
         <h1>{title}</h1><p>{}</p></body></html>",
        html_escape(message)
    );
    let mut response = tiny_http::Response::from_string(html).with_status_code(status);
    if let Ok(header) =
        tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"text/html; charset=utf-8"[..])
    {
        response = response.with_header(header);
    }
    let _ = request.respond(response);
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

/// Open a URL in the default browser
pub fn open_browser(url: &str) -> Result<()> {
    use std::process::Stdio;

    #[cfg(target_os = "linux")]
    let mut command = std::process::Command::new("xdg-open");
    #[cfg(target_os = "macos")]
    let mut command = std::process::Command::new("open");
    #[cfg(target_os = "windows")]
    let mut command = {
        let mut c = std::process::Command::new("cmd");
        c.args(["/C", "start", ""]);
        c
    };

    command
        .arg(url)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .context("Failed to open browser")?;
    Ok(())
}
