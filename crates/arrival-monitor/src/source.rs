use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use arrival_core::{PositionSample, UpdateRequest};
use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Why the positioning subsystem did not start delivering samples.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PositionError {
    #[error("location permission denied: {0}")]
    PermissionDenied(String),

    #[error("location updates unavailable: {0}")]
    Unavailable(String),
}

/// Push-based producer of position samples.
///
/// The monitor subscribes once per run and cancels when the run ends.
/// Samples must be delivered in observation order.
#[async_trait]
pub trait PositionSource: Send + Sync {
    /// Start delivering samples at roughly the requested cadence.
    async fn request_updates(
        &self,
        request: &UpdateRequest,
    ) -> Result<mpsc::Receiver<PositionSample>, PositionError>;

    /// Stop delivering samples. Idempotent.
    async fn cancel_updates(&self);
}

/// In-process position source: whatever is [`publish`](Self::publish)ed is
/// forwarded to the current subscriber.
///
/// Used by the daemon's NDJSON feed and by tests.
pub struct ChannelSource {
    buffer: usize,
    subscriber: Mutex<Option<mpsc::Sender<PositionSample>>>,
    permission: AtomicBool,
    subscriptions: AtomicUsize,
    last_request: Mutex<Option<UpdateRequest>>,
}

impl ChannelSource {
    pub fn new(buffer: usize) -> Self {
        Self {
            buffer: buffer.max(1),
            subscriber: Mutex::new(None),
            permission: AtomicBool::new(true),
            subscriptions: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    /// Grant or revoke location access. Revoking does not end a live subscription.
    pub fn set_permission(&self, granted: bool) {
        self.permission.store(granted, Ordering::SeqCst);
    }

    /// Deliver one sample. Returns `false` when nobody is subscribed.
    pub async fn publish(&self, sample: PositionSample) -> bool {
        let tx = self
            .subscriber
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        match tx {
            Some(tx) => tx.send(sample).await.is_ok(),
            None => false,
        }
    }

    /// End the current stream from the producer side.
    pub fn close(&self) {
        if self
            .subscriber
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .is_some()
        {
            info!("position source closed");
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscriber
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Number of successful `request_updates` calls so far.
    pub fn subscriptions(&self) -> usize {
        self.subscriptions.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<UpdateRequest> {
        *self.last_request.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ChannelSource {
    fn default() -> Self {
        Self::new(64)
    }
}

#[async_trait]
impl PositionSource for ChannelSource {
    async fn request_updates(
        &self,
        request: &UpdateRequest,
    ) -> Result<mpsc::Receiver<PositionSample>, PositionError> {
        if !self.permission.load(Ordering::SeqCst) {
            return Err(PositionError::PermissionDenied(
                "location access not granted".to_string(),
            ));
        }
        let (tx, rx) = mpsc::channel(self.buffer);
        *self.subscriber.lock().unwrap_or_else(PoisonError::into_inner) = Some(tx);
        *self.last_request.lock().unwrap_or_else(PoisonError::into_inner) = Some(*request);
        self.subscriptions.fetch_add(1, Ordering::SeqCst);
        debug!(
            interval_ms = request.min_interval_millis,
            min_distance_m = request.min_distance_meters,
            max_delay_ms = request.max_update_delay_millis,
            "position updates requested"
        );
        Ok(rx)
    }

    async fn cancel_updates(&self) {
        if self
            .subscriber
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .is_some()
        {
            debug!("position updates cancelled");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_without_subscriber_is_dropped() {
        let source = ChannelSource::new(4);
        assert!(!source.publish(PositionSample::new(1.0, 2.0, 0)).await);
    }

    #[tokio::test]
    async fn samples_arrive_in_order() {
        let source = ChannelSource::new(4);
        let mut rx = source.request_updates(&UpdateRequest::default()).await.unwrap();
        for i in 0..3 {
            assert!(source.publish(PositionSample::new(1.0, 2.0, i)).await);
        }
        for i in 0..3 {
            assert_eq!(rx.recv().await.unwrap().observed_at_millis, i);
        }
        assert_eq!(source.subscriptions(), 1);
        assert_eq!(source.last_request(), Some(UpdateRequest::default()));
    }

    #[tokio::test]
    async fn cancel_ends_the_stream() {
        let source = ChannelSource::new(4);
        let mut rx = source.request_updates(&UpdateRequest::default()).await.unwrap();
        assert!(source.is_subscribed());
        source.cancel_updates().await;
        assert!(!source.is_subscribed());
        assert!(rx.recv().await.is_none());
        // idempotent
        source.cancel_updates().await;
    }

    #[tokio::test]
    async fn denied_permission_refuses_subscription() {
        let source = ChannelSource::new(4);
        source.set_permission(false);
        let err = source.request_updates(&UpdateRequest::default()).await.unwrap_err();
        assert!(matches!(err, PositionError::PermissionDenied(_)));
        assert_eq!(source.subscriptions(), 0);
        assert!(!source.is_subscribed());
    }
}
