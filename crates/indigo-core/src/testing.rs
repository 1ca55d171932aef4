//! Deterministic stand-ins for agent and scenario tests

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde_json::Value;

use crate::agents::{AgentServices, AgentSettings};
use crate::ai::generator::{GenerationError, TextGenerator};
use crate::ai::schema::Schema;
use crate::ai::types::{AiTool, AiToolCall, Generation, Message, ToolChoice};
use crate::calendar::{CalendarBackend, Event, EventDateTime};
use crate::time::Clock;

/// One scripted model reply
#[derive(Debug, Clone)]
pub enum Reply {
    Text(String),
    Json(Value),
    Raw(String),
    Tools(Vec<AiToolCall>),
    Fail(String),
}

impl Reply {
    pub fn text(text: &str) -> Self {
        Reply::Text(text.to_string())
    }

    pub fn tool(name: &str, arguments: Value) -> Self {
        Reply::Tools(vec![call(name, arguments)])
    }
}

pub fn call(name: &str, arguments: Value) -> AiToolCall {
    AiToolCall {
        id: format!("call_{}", uuid::Uuid::new_v4().simple()),
        name: name.to_string(),
        arguments,
    }
}

/// What a generator was asked
#[derive(Debug, Clone)]
pub struct Request {
    pub kind: &'static str,
    pub system: String,
    pub history: Vec<Message>,
    pub tools: Vec<String>,
    pub choice: Option<ToolChoice>,
}

/// Replays a fixed queue of replies and records every request
#[derive(Default)]
pub struct ScriptedGenerator {
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<Request>>,
}

impl ScriptedGenerator {
    pub fn new(replies: Vec<Reply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }

    pub fn remaining(&self) -> usize {
        self.replies.lock().unwrap().len()
    }

    fn next(&self, request: Request) -> Result<Reply, GenerationError> {
        let kind = request.kind;
        self.requests.lock().unwrap().push(request);
        match self.replies.lock().unwrap().pop_front() {
            Some(Reply::Fail(message)) => Err(GenerationError::Api {
                status: 500,
                message,
            }),
            Some(reply) => Ok(reply),
            None => Err(GenerationError::Response(format!(
                "script exhausted at {kind} request"
            ))),
        }
    }
}

fn request(kind: &'static str, system: &str, history: &[Message]) -> Request {
    Request {
        kind,
        system: system.to_string(),
        history: history.to_vec(),
        tools: Vec::new(),
        choice: None,
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, system: &str, history: &[Message]) -> Result<String, GenerationError> {
        match self.next(request("text", system, history))? {
            Reply::Text(text) | Reply::Raw(text) => Ok(text),
            other => Err(GenerationError::Response(format!("expected text, scripted {other:?}"))),
        }
    }

    async fn generate_json(
        &self,
        system: &str,
        history: &[Message],
        _schema: &Schema,
    ) -> Result<String, GenerationError> {
        match self.next(request("json", system, history))? {
            Reply::Json(value) => Ok(value.to_string()),
            Reply::Raw(text) | Reply::Text(text) => Ok(text),
            other => Err(GenerationError::Response(format!("expected json, scripted {other:?}"))),
        }
    }

    async fn generate_with_tools(
        &self,
        system: &str,
        history: &[Message],
        tools: &[AiTool],
        choice: &ToolChoice,
    ) -> Result<Generation, GenerationError> {
        let mut req = request("tools", system, history);
        req.tools = tools.iter().map(|t| t.name.clone()).collect();
        req.choice = Some(choice.clone());
        match self.next(req)? {
            Reply::Tools(calls) => Ok(Generation::ToolCalls {
                text: String::new(),
                calls,
            }),
            Reply::Text(text) | Reply::Raw(text) => Ok(Generation::Text(text)),
            other => Err(GenerationError::Response(format!("expected tools, scripted {other:?}"))),
        }
    }
}

/// 2024-10-17 14:00 in New York
pub fn fixed_clock() -> Clock {
    Clock::fixed(
        chrono_tz::America::New_York,
        Utc.with_ymd_and_hms(2024, 10, 17, 18, 0, 0).unwrap(),
    )
}

pub fn timed_event(summary: &str, start: &str, end: &str) -> Event {
    Event {
        summary: Some(summary.to_string()),
        start: Some(EventDateTime::timed(start, "America/New_York")),
        end: Some(EventDateTime::timed(end, "America/New_York")),
        ..Default::default()
    }
}

pub async fn services(
    generator: Arc<ScriptedGenerator>,
    calendar: Arc<dyn CalendarBackend>,
) -> AgentServices {
    AgentServices::new(generator, calendar, fixed_clock(), AgentSettings::default()).await
}
