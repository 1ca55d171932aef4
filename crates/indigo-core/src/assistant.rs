//! The assistant as the outside world sees it: a thread id and a message
//! in, a stream of graph steps out.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{info, warn};

use crate::agents::{assistant_graph, AgentServices};
use crate::ai::client::AiClient;
use crate::ai::generator::GenerationError;
use crate::ai::types::Message;
use crate::auth::{AuthError, TokenManager};
use crate::calendar::{CalendarBackend, CalendarError, GoogleCalendar, InMemoryCalendar};
use crate::config::{CalendarKind, ConfigError, IndigoConfig};
use crate::graph::{Agent, GraphError, SharedState, Step, StepSink, StateUpdate};
use crate::threads::{ThreadBusy, ThreadStore};
use crate::time::Clock;

#[derive(Debug, thiserror::Error)]
pub enum AssistantError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("model client: {0}")]
    Generation(#[from] GenerationError),
    #[error("calendar: {0}")]
    Calendar(#[from] CalendarError),
    #[error("Google authorization: {0} (run `indigo auth` first)")]
    Auth(#[from] AuthError),
    #[error("agent graph: {0}")]
    Graph(#[from] GraphError),
}

pub struct Assistant {
    graph: Arc<Agent>,
    threads: ThreadStore,
}

impl Assistant {
    pub fn new(services: &AgentServices) -> Result<Self, AssistantError> {
        Ok(Self {
            graph: Arc::new(assistant_graph(services)?),
            threads: ThreadStore::new(),
        })
    }

    /// Wire up the model client and calendar named by `config`
    pub async fn from_config(config: &IndigoConfig) -> Result<Self, AssistantError> {
        let timezone = config.timezone()?;
        let client_config = config.ai_client_config();
        let provider = client_config.provider_id;
        let api_key = config
            .ai
            .api_key
            .clone()
            .ok_or(GenerationError::MissingCredentials(provider.api_key_env()))?;
        let generator = Arc::new(AiClient::new(client_config, api_key)?);

        let calendar: Arc<dyn CalendarBackend> = match config.calendar.backend {
            CalendarKind::Google => {
                let tokens = TokenManager::load(config.token_path())?;
                Arc::new(GoogleCalendar::new(
                    Arc::new(tokens),
                    config.calendar.calendar_id.clone(),
                )?)
            }
            CalendarKind::Memory => {
                warn!("Using the in-memory calendar; events are lost on exit");
                Arc::new(InMemoryCalendar::new(timezone))
            }
        };
        info!(
            provider = %provider,
            calendar = ?config.calendar.backend,
            timezone = timezone.name(),
            "Assistant configured"
        );

        let services = AgentServices::new(
            generator,
            calendar,
            Clock::new(timezone),
            config.agent_settings(),
        )
        .await;
        Self::new(&services)
    }

    /// Start a turn on `thread_id`.
    ///
    /// The returned stream yields a step after every node and ends with the
    /// turn. Dropping it does not cancel the turn: the run finishes in the
    /// background and the thread keeps the resulting state.
    pub async fn stream_turn(
        &self,
        thread_id: &str,
        message: &str,
    ) -> Result<UnboundedReceiverStream<Step>, ThreadBusy> {
        let mut guard = self.threads.acquire(thread_id).await?;
        guard.apply(StateUpdate::message(Message::user(message)));

        let (tx, rx) = mpsc::unbounded_channel();
        let graph = Arc::clone(&self.graph);
        let thread = thread_id.to_string();
        tokio::spawn(async move {
            info!(thread = %thread, "Turn started");
            let done = graph.run_with_sink(guard.clone(), &StepSink::new(tx)).await;
            *guard = done;
            info!(thread = %thread, messages = guard.messages.len(), "Turn finished");
        });
        Ok(UnboundedReceiverStream::new(rx))
    }

    /// Run a whole turn and return the thread's new state
    pub async fn turn(&self, thread_id: &str, message: &str) -> Result<SharedState, ThreadBusy> {
        let mut guard = self.threads.acquire(thread_id).await?;
        guard.apply(StateUpdate::message(Message::user(message)));
        let done = self.graph.invoke(guard.clone()).await;
        *guard = done.clone();
        Ok(done)
    }

    pub async fn thread_state(&self, thread_id: &str) -> Option<SharedState> {
        self.threads.snapshot(thread_id).await
    }
}
