//! Indigo Server
//!
//! Streams assistant turns to the browser extension over server-sent events.
//! This is a library crate — the server is started via `start_server()`.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{http::Method, routing::get, Json, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use indigo_core::{Assistant, IndigoConfig};

pub mod error;
pub mod routes;
pub mod types;

use types::HealthResponse;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Orchestration graph plus the per-thread conversation store.
    pub assistant: Arc<Assistant>,
}

impl AppState {
    pub fn new(assistant: Arc<Assistant>) -> Self {
        Self { assistant }
    }
}

/// Build the Axum router with all routes.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .merge(routes::api_router())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the Indigo server and block until shutdown.
pub async fn start_server(config: IndigoConfig) -> anyhow::Result<()> {
    let assistant = Arc::new(Assistant::from_config(&config).await?);
    let app = build_router(AppState::new(assistant));

    let addr: SocketAddr = format!("0.0.0.0:{}", config.server.port).parse()?;
    tracing::info!("Indigo server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        features: HashMap::from([("stream".to_string(), true)]),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use indigo_core::agents::{AgentServices, AgentSettings};
    use indigo_core::ai::{
        AiTool, Generation, GenerationError, Message, Schema, TextGenerator, ToolChoice,
    };
    use indigo_core::calendar::InMemoryCalendar;
    use indigo_core::time::Clock;

    /// Answers every structured request with the next router reply
    struct RouterReplies(Mutex<VecDeque<&'static str>>);

    #[async_trait]
    impl TextGenerator for RouterReplies {
        async fn generate(&self, _: &str, _: &[Message]) -> Result<String, GenerationError> {
            Err(GenerationError::Response("unexpected text request".into()))
        }

        async fn generate_json(
            &self,
            _: &str,
            _: &[Message],
            _: &Schema,
        ) -> Result<String, GenerationError> {
            let message = self
                .0
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| GenerationError::Response("no reply left".into()))?;
            Ok(serde_json::json!({"message": message, "helper_agent": "none"}).to_string())
        }

        async fn generate_with_tools(
            &self,
            _: &str,
            _: &[Message],
            _: &[AiTool],
            _: &ToolChoice,
        ) -> Result<Generation, GenerationError> {
            Err(GenerationError::Response("unexpected tool request".into()))
        }
    }

    async fn serve(replies: Vec<&'static str>) -> (String, Arc<Assistant>) {
        let tz = chrono_tz::America::New_York;
        let services = AgentServices::new(
            Arc::new(RouterReplies(Mutex::new(replies.into()))),
            Arc::new(InMemoryCalendar::new(tz)),
            Clock::new(tz),
            AgentSettings::default(),
        )
        .await;
        let assistant = Arc::new(Assistant::new(&services).unwrap());
        let app = build_router(AppState::new(assistant.clone()));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}"), assistant)
    }

    #[tokio::test]
    async fn test_health() {
        let (base, _) = serve(vec![]).await;
        let body: serde_json::Value = reqwest::get(format!("{base}/health"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_stream_defaults_and_event_data() {
        let (base, assistant) = serve(vec!["Hey! Ready to plan your week?"]).await;

        let response = reqwest::get(format!("{base}/stream")).await.unwrap();
        assert!(response.status().is_success());
        assert!(response.headers()["content-type"]
            .to_str()
            .unwrap()
            .starts_with("text/event-stream"));
        let body = response.text().await.unwrap();

        let data: Vec<&str> = body
            .split("\n\n")
            .filter_map(|event| event.strip_prefix("data: ").or(event.strip_prefix("data:")))
            .collect();
        assert_eq!(data.last(), Some(&"Hey! Ready to plan your week?"));

        let state = assistant.thread_state("1").await.unwrap();
        assert_eq!(state.messages[0].content, "Hello!");
    }

    #[tokio::test]
    async fn test_blank_thread_id_is_rejected() {
        let (base, _) = serve(vec![]).await;
        let response = reqwest::get(format!("{base}/stream?thread_id=&message=hi"))
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
    }
}
