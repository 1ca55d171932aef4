//! Provider wire formats
//!
//! Each handler turns a [`RequestSpec`] into a provider request body and a
//! provider response back into a [`Generation`].

pub mod google;
pub mod openai;

use serde_json::Value;

use crate::ai::generator::GenerationError;
use crate::ai::schema::Schema;
use crate::ai::types::{AiTool, Generation, Message, ToolChoice};

/// Everything a single completion request needs
#[derive(Debug, Clone, Copy)]
pub struct RequestSpec<'a> {
    pub model: &'a str,
    pub max_tokens: usize,
    pub temperature: f32,
    pub system: &'a str,
    pub history: &'a [Message],
    pub tools: &'a [AiTool],
    pub tool_choice: Option<&'a ToolChoice>,
    pub schema: Option<&'a Schema>,
}

pub trait FormatHandler: Send + Sync {
    fn build_body(&self, spec: &RequestSpec<'_>) -> Value;

    fn parse_response(&self, json: &Value) -> Result<Generation, GenerationError>;
}

/// Text sent in place of a collapsed result for every call id after the first.
pub(crate) fn shared_result_pointer(first_id: &str) -> String {
    format!("Result shared with call {first_id} above.")
}

/// Placeholder for a call the history never answered.
pub(crate) const MISSING_RESULT: &str = "No result was recorded for this call.";

/// A tool result the provider cannot pair with a pending call is replayed
/// as plain user text so the information is not lost.
pub(crate) fn orphan_result_text(msg: &Message) -> String {
    let name = msg.name.as_deref().unwrap_or("tool");
    format!("[Tool result: {name}]\n{}", msg.content)
}

/// True when every id of the (possibly collapsed) result is still pending.
pub(crate) fn answers_pending(msg: &Message, pending: &[String]) -> bool {
    let ids = msg.tool_call_ids();
    !ids.is_empty() && ids.iter().all(|id| pending.iter().any(|p| p == id))
}
