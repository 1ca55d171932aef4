//! AI provider layer
//!
//! Handles communication with text-generation providers (Gemini and
//! OpenAI-compatible APIs) behind the [`TextGenerator`] trait.

pub mod client;
pub mod format;
pub mod generator;
pub mod providers;
pub mod retry;
pub mod schema;
pub mod types;

pub use client::{AiClient, AiClientConfig};
pub use generator::{GenerationError, Structured, TextGenerator};
pub use schema::{FieldType, Record, Schema, SchemaError};
pub use types::{AiTool, AiToolCall, Generation, Message, Role, ToolChoice};
