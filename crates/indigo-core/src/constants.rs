//! Shared constants

pub mod paths {
    pub const CONFIG_DIR_NAME: &str = ".indigo";
    pub const CONFIG_FILE_NAME: &str = "config.toml";
    pub const TOKEN_FILE_NAME: &str = "token.json";
    pub const CREDENTIALS_FILE_NAME: &str = "credentials.json";
}

pub mod ai {
    pub const DEFAULT_GOOGLE_MODEL: &str = "gemini-1.5-flash";
    pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
    pub const MAX_OUTPUT_TOKENS: usize = 4096;
    pub const DEFAULT_TEMPERATURE: f32 = 0.2;
    pub const GOOGLE_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
    pub const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";
}

pub mod calendar {
    use std::time::Duration;

    pub const GOOGLE_CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3";
    pub const GOOGLE_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
    pub const GOOGLE_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
    pub const CALENDAR_SCOPE: &str = "https://www.googleapis.com/auth/calendar";
    pub const DEFAULT_CALENDAR_ID: &str = "primary";
    pub const DEFAULT_TIMEZONE: &str = "America/New_York";

    /// Fields stripped from every event before it reaches a model.
    pub const BOOKKEEPING_FIELDS: &[&str] = &[
        "etag",
        "kind",
        "sequence",
        "reminders",
        "creator",
        "organizer",
        "iCalUID",
        "htmlLink",
        "created",
        "updated",
        "eventType",
        "hangoutLink",
        "conferenceData",
    ];

    /// Days of upcoming events the contextualizer summarizes.
    pub const CONTEXT_WINDOW_DAYS: i64 = 10;

    pub const TOOL_TIMEOUT: Duration = Duration::from_secs(30);
}

pub mod graph {
    /// Node executions allowed in a single run before it is cut off.
    pub const DEFAULT_MAX_STEPS: usize = 25;

    pub const STEP_LIMIT_MESSAGE: &str =
        "I got stuck going back and forth on that request. Could you rephrase it or break it into smaller steps?";
}

pub mod server {
    pub const DEFAULT_PORT: u16 = 8000;
    pub const DEFAULT_THREAD_ID: &str = "1";
    pub const DEFAULT_MESSAGE: &str = "Hello!";
}
