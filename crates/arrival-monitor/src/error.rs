use arrival_core::ValidationError;
use arrival_store::StoreError;
use thiserror::Error;

/// Errors surfaced to the controller by [`GeofenceMonitor`](crate::GeofenceMonitor).
///
/// Failures that happen after arming (dispatch errors, late storage errors)
/// are not reported here; they end up in the persisted status and the logs.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// The configuration cannot be armed. Nothing was persisted.
    #[error("Invalid configuration: {0}")]
    Invalid(#[from] ValidationError),

    /// The positioning subsystem refused updates; the run was aborted.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// The positioning subsystem could not start updates; the run was aborted.
    #[error("Position updates unavailable: {0}")]
    PositionUnavailable(String),

    #[error("Storage failure: {0}")]
    Storage(#[from] StoreError),

    /// Only one run per monitor at a time.
    #[error("A tracking run is already active")]
    AlreadyRunning,
}

pub type Result<T> = std::result::Result<T, MonitorError>;
