//! `arrival-store`: durable workflow configuration and status.
//!
//! # Overview
//!
//! The workflow is persisted as a flat key/value table in SQLite so it
//! survives process restarts. [`WorkflowStore`] maps the fixed key set onto a
//! [`WorkflowConfig`](arrival_core::WorkflowConfig) and a
//! [`WorkflowStatus`](arrival_core::WorkflowStatus).
//!
//! # Keys
//!
//! | Key               | Value                                   |
//! |-------------------|-----------------------------------------|
//! | `bot_token`       | endpoint credential                     |
//! | `chat_id`         | target channel                          |
//! | `message`         | message body                            |
//! | `destination_lat` | f64, decimal degrees                    |
//! | `destination_lng` | f64, decimal degrees                    |
//! | `radius`          | u32 meters                              |
//! | `is_active`       | `true` / `false`                        |
//! | `workflow_status` | `inactive` / `tracking` / `message_sent` / `error` |

pub mod db;
pub mod error;
pub mod store;

pub use error::{Result, StoreError};
pub use store::WorkflowStore;
