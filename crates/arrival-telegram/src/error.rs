/// Failure of a single `sendMessage` attempt.
///
/// Display strings are what ends up in the run outcome; none of these is
/// retried by the dispatcher itself.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    #[error("Invalid bot token format. Expected format: 123456789:ABC...")]
    InvalidCredential,

    #[error("Network error: {0}")]
    Transport(String),

    #[error("HTTP {status}: {detail}")]
    Http { status: u16, detail: String },

    #[error("Telegram API Error: {detail}")]
    Api { detail: String },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}
