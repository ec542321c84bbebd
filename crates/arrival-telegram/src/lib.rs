pub mod client;
pub mod dispatch;
pub mod error;
pub mod send;

pub use client::TelegramDispatcher;
pub use dispatch::Dispatcher;
pub use error::DispatchError;
pub use send::{redact_token, send_test_message, TEST_MESSAGE};
