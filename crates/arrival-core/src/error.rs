use thiserror::Error;

/// A workflow configuration rule was violated.
///
/// Raised before the monitor is armed; never retried.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Invalid bot token format. Expected format: 123456789:ABC...")]
    InvalidCredential,

    #[error("Invalid chat ID format. Use numeric ID or @username")]
    InvalidChannel,

    #[error("Message body must not be empty")]
    EmptyMessage,

    #[error("Destination is not set")]
    DestinationUnset,

    #[error("Destination out of range: ({latitude}, {longitude})")]
    DestinationOutOfRange { latitude: f64, longitude: f64 },

    #[error("Radius must be greater than zero")]
    ZeroRadius,
}

impl ValidationError {
    /// Short error code string, stable across releases.
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::InvalidCredential => "INVALID_CREDENTIAL",
            ValidationError::InvalidChannel => "INVALID_CHANNEL",
            ValidationError::EmptyMessage => "EMPTY_MESSAGE",
            ValidationError::DestinationUnset => "DESTINATION_UNSET",
            ValidationError::DestinationOutOfRange { .. } => "DESTINATION_OUT_OF_RANGE",
            ValidationError::ZeroRadius => "ZERO_RADIUS",
        }
    }
}

/// Runtime configuration could not be loaded.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration error: {0}")]
    Load(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
