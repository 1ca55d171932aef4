//! Core AI client: request building, error mapping, and the
//! [`TextGenerator`] implementation

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::config::AiClientConfig;
use crate::ai::format::google::GoogleFormat;
use crate::ai::format::openai::OpenAIFormat;
use crate::ai::format::{FormatHandler, RequestSpec};
use crate::ai::generator::{GenerationError, TextGenerator};
use crate::ai::providers::{AuthHeader, ProviderId};
use crate::ai::retry::with_retry;
use crate::ai::schema::Schema;
use crate::ai::types::{AiTool, Generation, Message, ToolChoice};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

pub struct AiClient {
    http: Client,
    config: AiClientConfig,
    api_key: String,
}

impl AiClient {
    pub fn new(config: AiClientConfig, api_key: String) -> Result<Self, GenerationError> {
        if api_key.trim().is_empty() {
            return Err(GenerationError::MissingCredentials(
                config.provider_id.api_key_env(),
            ));
        }
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            config,
            api_key,
        })
    }

    pub fn config(&self) -> &AiClientConfig {
        &self.config
    }

    pub fn provider_id(&self) -> ProviderId {
        self.config.provider_id
    }

    fn format(&self) -> &'static dyn FormatHandler {
        match self.config.provider_id {
            ProviderId::Google => &GoogleFormat,
            ProviderId::OpenAI => &OpenAIFormat,
        }
    }

    /// Build a POST request with auth and content headers
    pub fn build_request(&self, url: &str) -> reqwest::RequestBuilder {
        let request = self
            .http
            .post(url)
            .header("content-type", "application/json");
        match self.config.auth_header() {
            AuthHeader::Bearer => request.bearer_auth(&self.api_key),
            AuthHeader::GoogApiKey => request.header("x-goog-api-key", &self.api_key),
        }
    }

    /// Turn non-success responses into [`GenerationError::Api`], pulling the
    /// provider's error message out of the body when there is one.
    pub async fn handle_error_response(
        &self,
        response: reqwest::Response,
    ) -> Result<reqwest::Response, GenerationError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|json| {
                json.pointer("/error/message")
                    .and_then(|m| m.as_str())
                    .map(str::to_string)
            })
            .unwrap_or(body);
        warn!(status = status.as_u16(), provider = %self.provider_id(), "API error: {}", message);
        Err(GenerationError::Api {
            status: status.as_u16(),
            message,
        })
    }

    async fn send(&self, body: &Value) -> Result<Value, GenerationError> {
        let url = self.config.api_url();
        let url = url.as_str();
        let client = self;
        with_retry(&self.config.retry, move || async move {
            let response = client.build_request(url).json(body).send().await?;
            let response = client.handle_error_response(response).await?;
            Ok(response.json::<Value>().await?)
        })
        .await
    }

    async fn complete(
        &self,
        kind: &'static str,
        spec: RequestSpec<'_>,
    ) -> Result<Generation, GenerationError> {
        let start = Instant::now();
        let body = self.format().build_body(&spec);
        debug!(kind, messages = spec.history.len(), "Sending completion request");

        let json = self.send(&body).await?;
        let generation = self.format().parse_response(&json)?;
        info!(
            kind,
            model = %self.config.model,
            provider = %self.provider_id(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Completion received"
        );
        Ok(generation)
    }

    fn spec<'a>(&'a self, system: &'a str, history: &'a [Message]) -> RequestSpec<'a> {
        RequestSpec {
            model: &self.config.model,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            system,
            history,
            tools: &[],
            tool_choice: None,
            schema: None,
        }
    }
}

fn text_of(generation: Generation) -> String {
    match generation {
        Generation::Text(text) | Generation::ToolCalls { text, .. } => text,
    }
}

#[async_trait]
impl TextGenerator for AiClient {
    async fn generate(&self, system: &str, history: &[Message]) -> Result<String, GenerationError> {
        let generation = self.complete("text", self.spec(system, history)).await?;
        Ok(text_of(generation))
    }

    async fn generate_json(
        &self,
        system: &str,
        history: &[Message],
        schema: &Schema,
    ) -> Result<String, GenerationError> {
        let spec = RequestSpec {
            schema: Some(schema),
            ..self.spec(system, history)
        };
        let generation = self.complete("structured", spec).await?;
        Ok(text_of(generation))
    }

    async fn generate_with_tools(
        &self,
        system: &str,
        history: &[Message],
        tools: &[AiTool],
        choice: &ToolChoice,
    ) -> Result<Generation, GenerationError> {
        let spec = RequestSpec {
            tools,
            tool_choice: Some(choice),
            ..self.spec(system, history)
        };
        self.complete("tools", spec).await
    }
}
