//! Google authorization for the calendar backend
//!
//! Tokens are kept in Google's "authorized user" JSON format so a token
//! produced by other Google tooling works unchanged.

pub mod browser_flow;
pub mod pkce;
pub mod token;

pub use browser_flow::{open_browser, InstalledAppFlow, DEFAULT_CALLBACK_PORT};
pub use pkce::PkceVerifier;
pub use token::{AuthError, AuthorizedUser, ClientSecrets, TokenManager};
