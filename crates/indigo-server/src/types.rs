//! Request and response types for the API

use std::collections::HashMap;

use indigo_core::constants::server::{DEFAULT_MESSAGE, DEFAULT_THREAD_ID};
use serde::{Deserialize, Serialize};

/// Query string of `GET /stream`
#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    #[serde(default = "default_thread_id")]
    pub thread_id: String,
    #[serde(default = "default_message")]
    pub message: String,
}

fn default_thread_id() -> String {
    DEFAULT_THREAD_ID.to_string()
}

fn default_message() -> String {
    DEFAULT_MESSAGE.to_string()
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub features: HashMap<String, bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_query_defaults() {
        let query: StreamQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(query.thread_id, "1");
        assert_eq!(query.message, "Hello!");

        let query: StreamQuery =
            serde_json::from_str(r#"{"thread_id": "abc", "message": "Cancel lunch"}"#).unwrap();
        assert_eq!(query.thread_id, "abc");
        assert_eq!(query.message, "Cancel lunch");
    }
}
