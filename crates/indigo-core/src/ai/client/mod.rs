//! AI client
//!
//! HTTP client for the configured provider, implementing [`TextGenerator`].
//!
//! [`TextGenerator`]: crate::ai::generator::TextGenerator

mod config;
mod core;

pub use config::AiClientConfig;
pub use self::core::AiClient;
