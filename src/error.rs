//! Error types for the mail.tm client.

use reqwest::StatusCode;

/// Errors that can occur while talking to mail.tm or managing local state.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Transport failure or non-2xx response from the provider.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The provider answered, but not in the expected shape.
    #[error("unexpected response: {0}")]
    ResponseParse(&'static str),

    /// JSON (de)serialization failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Account registration was rejected by the provider.
    #[error("account creation failed with status {0}")]
    AccountCreation(StatusCode),

    /// The provider offered no active domains to register under.
    #[error("no domains available")]
    NoDomains,

    /// The requested message does not exist in the mailbox.
    #[error("message not found: {0}")]
    MessageNotFound(String),

    /// Reading or writing the session history file failed.
    #[error("history file error: {0}")]
    History(#[from] std::io::Error),
}

impl Error {
    /// Whether the failure is worth retrying on the next poll.
    ///
    /// Timeouts, connection errors and 5xx responses are transient; bad
    /// credentials or malformed payloads are not.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Request(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.status().is_some_and(|s| s.is_server_error())
                    || e.status() == Some(StatusCode::TOO_MANY_REQUESTS)
            }
            _ => false,
        }
    }
}
