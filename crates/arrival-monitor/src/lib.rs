//! `arrival-monitor`: the geofence state machine.
//!
//! # Overview
//!
//! [`GeofenceMonitor`] is armed with a [`WorkflowConfig`](arrival_core::WorkflowConfig),
//! subscribes to a [`PositionSource`] and evaluates every sample against the
//! destination. The first sample inside the radius triggers exactly one
//! dispatch through a [`Dispatcher`](arrival_telegram::Dispatcher); the outcome
//! is persisted and the run ends.
//!
//! # Phases
//!
//! | Phase       | Meaning                                                |
//! |-------------|--------------------------------------------------------|
//! | `Idle`      | Not subscribed. Initial state and after every run      |
//! | `Armed`     | Subscribed, evaluating samples                         |
//! | `Triggered` | Arrival seen, the single dispatch is in flight         |
//!
//! Stopping while `Armed` aborts the run (status `inactive`). Stopping while
//! `Triggered` cancels updates but lets the dispatch finish and record its
//! outcome.

pub mod error;
pub mod monitor;
pub mod source;

pub use error::{MonitorError, Result};
pub use monitor::{GeofenceMonitor, MonitorPhase, RunOutcome, RunSummary, StartOutcome};
pub use source::{ChannelSource, PositionError, PositionSource};
