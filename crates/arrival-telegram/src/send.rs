//! Helpers around the dispatcher: the credential check message and
//! log-safe token rendering.

use tracing::info;

use crate::dispatch::Dispatcher;
use crate::error::DispatchError;

/// Body sent by [`send_test_message`].
pub const TEST_MESSAGE: &str = "Test message from Location Tracker";

/// Send a fixed test message so the user can confirm token and chat before arming.
///
/// Goes through the same single-attempt path as the real dispatch; the
/// workflow status is not touched.
pub async fn send_test_message(
    dispatcher: &dyn Dispatcher,
    credential: &str,
    channel: &str,
) -> Result<(), DispatchError> {
    let result = dispatcher.send(credential, channel, TEST_MESSAGE).await;
    info!(
        dispatcher = dispatcher.name(),
        ok = result.is_ok(),
        "test message attempted"
    );
    result
}

/// Render a bot token for logs: keeps the numeric bot id, hides the secret.
///
/// `"123456:ABCdef"` → `"123456:***"`. Anything without a colon is fully hidden.
pub fn redact_token(token: &str) -> String {
    match token.split_once(':') {
        Some((bot_id, _)) => format!("{bot_id}:***"),
        None => "***".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;

    struct Recording {
        bodies: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Dispatcher for Recording {
        fn name(&self) -> &str {
            "recording"
        }
        async fn send(
            &self,
            _credential: &str,
            _channel: &str,
            body: &str,
        ) -> Result<(), DispatchError> {
            self.bodies.lock().unwrap().push(body.to_string());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_message_uses_fixed_body() {
        let d = Recording {
            bodies: Mutex::new(Vec::new()),
        };
        send_test_message(&d, "1:a", "@x").await.unwrap();
        assert_eq!(*d.bodies.lock().unwrap(), vec![TEST_MESSAGE.to_string()]);
    }

    #[test]
    fn redaction_keeps_bot_id_only() {
        assert_eq!(redact_token("123456:ABCdef"), "123456:***");
        assert_eq!(redact_token("garbage"), "***");
        assert_eq!(redact_token(""), "***");
    }
}
