//! Calendar backends
//!
//! The assistant reads and writes events through [`CalendarBackend`]. The
//! Google implementation talks to Calendar API v3; the in-memory one backs
//! offline mode and tests.

mod backend;
pub mod google;
pub mod memory;
mod types;

pub use backend::{CalendarBackend, CalendarError};
pub use google::GoogleCalendar;
pub use memory::InMemoryCalendar;
pub use types::{prune_event, Event, EventDateTime, ListFilters, OrderBy};
