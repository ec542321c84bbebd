//! `arrival-core`: shared data model, geofence math, validation rules and
//! runtime configuration for the arrival workflow.

pub mod config;
pub mod error;
pub mod geo;
pub mod types;
pub mod validate;

pub use config::ArrivalConfig;
pub use error::{ConfigError, ValidationError};
pub use geo::{distance_meters, is_within};
pub use types::{
    Coordinate, DispatchOutcome, PositionSample, UpdateRequest, WorkflowConfig, WorkflowStatus,
    DEFAULT_RADIUS_METERS,
};
