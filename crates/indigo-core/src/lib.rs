//! Indigo core
//!
//! Scheduling agents, the graph they run on, Google Calendar access and
//! the model clients behind them. The server and CLI crates are thin
//! shells around [`Assistant`].

pub mod agents;
pub mod ai;
pub mod assistant;
pub mod auth;
pub mod calendar;
pub mod config;
pub mod constants;
pub mod graph;
pub mod paths;
pub mod threads;
pub mod time;
pub mod tools;

#[cfg(test)]
mod testing;

pub use assistant::{Assistant, AssistantError};
pub use config::IndigoConfig;
pub use graph::Step;
pub use threads::ThreadBusy;
