//! Subcommand handlers. Each one opens the workflow store named by the
//! runtime config; `run` is the only long-lived one.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use arrival_core::{ArrivalConfig, WorkflowConfig};
use arrival_monitor::{
    ChannelSource, GeofenceMonitor, MonitorPhase, PositionSource, RunOutcome, RunSummary,
    StartOutcome,
};
use arrival_store::WorkflowStore;
use arrival_telegram::{redact_token, send_test_message, TelegramDispatcher};
use tracing::{error, info, warn};

use crate::feed;

fn open_store(config: &ArrivalConfig) -> anyhow::Result<Arc<WorkflowStore>> {
    let store = WorkflowStore::open(&config.database.path)
        .with_context(|| format!("opening workflow store at {}", config.database.path))?;
    Ok(Arc::new(store))
}

fn build_monitor(
    config: &ArrivalConfig,
    store: Arc<WorkflowStore>,
    source: Arc<ChannelSource>,
) -> anyhow::Result<GeofenceMonitor> {
    let dispatcher = TelegramDispatcher::from_config(&config.telegram)?;
    Ok(GeofenceMonitor::new(
        store,
        Arc::new(dispatcher),
        source as Arc<dyn PositionSource>,
        config.tracking.update_request(),
    ))
}

pub fn configure(config: &ArrivalConfig, workflow: WorkflowConfig) -> anyhow::Result<()> {
    let workflow = workflow.trimmed().with_active(false);
    if let Err(e) = workflow.validate() {
        warn!(code = e.code(), error = %e, "workflow rejected");
        return Err(e.into());
    }

    let store = open_store(config)?;
    store.save(&workflow)?;
    info!(
        token = %redact_token(&workflow.endpoint_credential),
        chat = %workflow.target_channel,
        destination = %workflow.destination,
        radius_m = workflow.radius_meters,
        "workflow configured"
    );
    println!("Workflow saved. Start tracking with `arrival run`.");
    Ok(())
}

/// Arm the stored workflow, pump positions into it and wait for the run to end.
pub async fn run(config: &ArrivalConfig, feed_path: Option<PathBuf>) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let source = Arc::new(ChannelSource::default());
    let monitor = build_monitor(config, Arc::clone(&store), Arc::clone(&source))?;

    let workflow = store.load()?.with_active(true);
    match monitor.start(workflow).await? {
        StartOutcome::Armed => {}
        StartOutcome::NotArmed => {
            println!("Workflow is not active, nothing to track.");
            return Ok(());
        }
    }
    println!("Tracking. Press Ctrl-C to stop.");

    let feed_source = Arc::clone(&source);
    let feed = tokio::spawn(async move {
        if let Err(e) = feed::run_feed(feed_path, feed_source).await {
            error!(error = %e, "position feed failed");
        }
    });

    let summary = supervise(&monitor, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "ctrl-c handler failed, stopping");
        }
        info!("interrupt received, stopping");
    })
    .await?;
    feed.abort();

    match summary.map(|s| s.outcome) {
        Some(RunOutcome::Delivered) => println!("Arrived. Message sent."),
        Some(RunOutcome::Failed { detail }) => {
            println!("Arrived, but the message could not be sent: {detail}");
            println!("Run `arrival run` again to retry.");
        }
        Some(RunOutcome::Aborted) => println!("Tracking stopped."),
        None => println!("Tracking ended."),
    }
    println!("Status: {}", monitor.current_status());
    Ok(())
}

/// Wait until the armed run returns to `Idle`, or stop it when `interrupt`
/// resolves first.
async fn supervise<F>(monitor: &GeofenceMonitor, interrupt: F) -> anyhow::Result<Option<RunSummary>>
where
    F: Future<Output = ()>,
{
    let mut phases = monitor.subscribe_phase();
    tokio::select! {
        _ = interrupt => monitor.stop().await?,
        _ = phases.wait_for(|p| *p == MonitorPhase::Idle) => {}
    }
    Ok(monitor.wait().await)
}

pub async fn stop(config: &ArrivalConfig) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let monitor = build_monitor(config, store, Arc::new(ChannelSource::default()))?;
    monitor.stop().await?;
    println!("Tracking stopped. Status: {}", monitor.current_status());
    Ok(())
}

pub fn status(config: &ArrivalConfig) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let workflow = store.load()?;
    let status = store.status().unwrap_or_else(|e| {
        warn!(error = %e, "status read failed");
        Default::default()
    });

    println!("status:      {status}");
    println!("active:      {}", workflow.active);
    if workflow.endpoint_credential.is_empty() {
        println!("workflow:    not configured");
        return Ok(());
    }
    println!("token:       {}", redact_token(&workflow.endpoint_credential));
    println!("chat:        {}", workflow.target_channel);
    println!("message:     {}", workflow.message_body);
    println!("destination: {}", workflow.destination);
    println!("radius:      {} m", workflow.radius_meters);
    Ok(())
}

pub async fn test_message(config: &ArrivalConfig) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let workflow = store.load()?;
    let dispatcher = TelegramDispatcher::from_config(&config.telegram)?;

    send_test_message(
        &dispatcher,
        &workflow.endpoint_credential,
        &workflow.target_channel,
    )
    .await
    .context("test message failed")?;
    println!("Test message sent to {}.", workflow.target_channel);
    Ok(())
}

pub fn clear(config: &ArrivalConfig) -> anyhow::Result<()> {
    let store = open_store(config)?;
    store.clear()?;
    println!("Workflow cleared.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use arrival_core::{Coordinate, PositionSample, UpdateRequest, ValidationError, WorkflowStatus};

    use super::*;

    fn temp_config(dir: &tempfile::TempDir) -> ArrivalConfig {
        let mut config = ArrivalConfig::default();
        config.database.path = dir.path().join("arrival.db").to_string_lossy().into_owned();
        config
    }

    fn workflow(token: &str) -> WorkflowConfig {
        WorkflowConfig {
            endpoint_credential: token.to_string(),
            target_channel: " @x ".to_string(),
            message_body: "  on my way  ".to_string(),
            destination: Coordinate::new(37.7749, -122.4194),
            radius_meters: 150,
            active: true,
        }
    }

    #[test]
    fn configure_trims_and_stores_inactive() {
        let dir = tempfile::tempdir().unwrap();
        let config = temp_config(&dir);

        configure(&config, workflow(" 123:abc ")).unwrap();

        let store = WorkflowStore::open(&config.database.path).unwrap();
        let stored = store.load().unwrap();
        assert_eq!(stored.endpoint_credential, "123:abc");
        assert_eq!(stored.target_channel, "@x");
        assert_eq!(stored.message_body, "on my way");
        assert_eq!(stored.radius_meters, 150);
        assert!(!stored.active);
        assert_eq!(store.status().unwrap(), WorkflowStatus::Inactive);
    }

    #[test]
    fn configure_keeps_last_status() {
        let dir = tempfile::tempdir().unwrap();
        let config = temp_config(&dir);
        WorkflowStore::open(&config.database.path)
            .unwrap()
            .set_status(WorkflowStatus::MessageSent)
            .unwrap();

        configure(&config, workflow("123:abc")).unwrap();

        let store = WorkflowStore::open(&config.database.path).unwrap();
        assert_eq!(store.status().unwrap(), WorkflowStatus::MessageSent);
    }

    #[test]
    fn configure_rejects_bad_token_without_touching_disk() {
        let dir = tempfile::tempdir().unwrap();
        let config = temp_config(&dir);

        let err = configure(&config, workflow("abc")).unwrap_err();

        assert_eq!(
            err.downcast_ref::<ValidationError>(),
            Some(&ValidationError::InvalidCredential)
        );
        assert!(!std::path::Path::new(&config.database.path).exists());
    }

    fn offline_monitor(source: &Arc<ChannelSource>) -> GeofenceMonitor {
        // nothing listens on port 1: every send fails fast
        let dispatcher = TelegramDispatcher::new("http://127.0.0.1:1", Duration::from_secs(2))
            .unwrap();
        GeofenceMonitor::new(
            Arc::new(WorkflowStore::open_in_memory().unwrap()),
            Arc::new(dispatcher),
            Arc::clone(source) as Arc<dyn PositionSource>,
            UpdateRequest::default(),
        )
    }

    #[tokio::test]
    async fn supervise_stops_the_run_on_interrupt() {
        let source = Arc::new(ChannelSource::new(8));
        let monitor = offline_monitor(&source);
        monitor.start(workflow("123:abc").trimmed()).await.unwrap();

        let summary = supervise(&monitor, std::future::ready(())).await.unwrap();

        assert_eq!(summary.unwrap().outcome, RunOutcome::Aborted);
        assert_eq!(monitor.current_status(), WorkflowStatus::Inactive);
        assert!(!source.is_subscribed());
    }

    #[tokio::test]
    async fn supervise_returns_when_the_run_ends() {
        let source = Arc::new(ChannelSource::new(8));
        let monitor = offline_monitor(&source);
        monitor.start(workflow("123:abc").trimmed()).await.unwrap();

        source
            .publish(PositionSample::new(37.7749, -122.4194, 1))
            .await;
        let summary = supervise(&monitor, std::future::pending()).await.unwrap();

        match summary.unwrap().outcome {
            RunOutcome::Failed { detail } => assert!(detail.starts_with("Network error")),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(monitor.current_status(), WorkflowStatus::Error);
    }
}
