//! The text-generation seam every agent talks through

use async_trait::async_trait;

use crate::ai::schema::{Record, Schema, SchemaError};
use crate::ai::types::{AiTool, Generation, Message, ToolChoice};

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("provider returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("unexpected provider response: {0}")]
    Response(String),
    #[error("no API key configured for {0}")]
    MissingCredentials(&'static str),
}

impl GenerationError {
    pub fn status(&self) -> Option<u16> {
        match self {
            GenerationError::Api { status, .. } => Some(*status),
            GenerationError::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Outcome of a structured generation.
///
/// A response that fails validation is not an error: callers decide how
/// to degrade, usually by surfacing the raw text.
#[derive(Debug, Clone, PartialEq)]
pub enum Structured {
    Record(Record),
    Malformed { raw: String, error: SchemaError },
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Free-form text reply
    async fn generate(&self, system: &str, history: &[Message]) -> Result<String, GenerationError>;

    /// Raw text of a reply constrained (as far as the provider allows) to `schema`
    async fn generate_json(
        &self,
        system: &str,
        history: &[Message],
        schema: &Schema,
    ) -> Result<String, GenerationError>;

    /// Reply that may request tool calls
    async fn generate_with_tools(
        &self,
        system: &str,
        history: &[Message],
        tools: &[AiTool],
        choice: &ToolChoice,
    ) -> Result<Generation, GenerationError>;

    async fn generate_structured(
        &self,
        system: &str,
        history: &[Message],
        schema: &Schema,
    ) -> Result<Structured, GenerationError> {
        let raw = self.generate_json(system, history, schema).await?;
        Ok(match schema.parse(&raw) {
            Ok(record) => Structured::Record(record),
            Err(error) => {
                tracing::warn!(schema = schema.name, %error, "Structured output failed validation");
                Structured::Malformed { raw, error }
            }
        })
    }
}
