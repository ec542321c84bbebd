use async_trait::async_trait;

use crate::error::DispatchError;

/// One-shot text delivery to an external messaging endpoint.
///
/// Implementations must be `Send + Sync` so the monitor can hand them to a
/// spawned dispatch task. A call performs at most one network request and
/// never retries; retry policy belongs to the caller.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    /// Stable lowercase identifier used in logs (e.g. `"telegram"`).
    fn name(&self) -> &str;

    /// Deliver `body` to `channel` using `credential`.
    async fn send(&self, credential: &str, channel: &str, body: &str)
        -> Result<(), DispatchError>;
}
