//! Newline-delimited JSON position feed.
//!
//! One `PositionSample` per line:
//! `{"latitude":37.7749,"longitude":-122.4194,"observed_at_millis":1700000000000}`.
//! Blank lines are ignored, malformed lines are logged and skipped.

use std::path::PathBuf;
use std::sync::Arc;

use arrival_core::PositionSample;
use arrival_monitor::ChannelSource;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FeedSummary {
    pub published: u64,
    pub skipped: u64,
}

/// Feed samples from `path`, or stdin when `None`.
pub async fn run_feed(
    path: Option<PathBuf>,
    source: Arc<ChannelSource>,
) -> anyhow::Result<FeedSummary> {
    let summary = match path {
        Some(path) => {
            info!(path = %path.display(), "reading positions from file");
            let file = tokio::fs::File::open(&path).await?;
            pump(BufReader::new(file), &source).await?
        }
        None => {
            info!("reading positions from stdin");
            pump(BufReader::new(tokio::io::stdin()), &source).await?
        }
    };
    info!(
        published = summary.published,
        skipped = summary.skipped,
        "position feed finished"
    );
    Ok(summary)
}

/// Publish every sample read from `reader` until EOF or until the source
/// has no subscriber left (the run ended).
pub async fn pump<R>(reader: R, source: &ChannelSource) -> anyhow::Result<FeedSummary>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut summary = FeedSummary::default();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let sample: PositionSample = match serde_json::from_str(line) {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "skipping malformed position line");
                summary.skipped += 1;
                continue;
            }
        };
        if !source.publish(sample).await {
            debug!("no subscriber, stopping feed");
            break;
        }
        summary.published += 1;
    }

    // EOF ends the stream; the monitor stays armed until stopped.
    source.close();
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use arrival_core::UpdateRequest;
    use arrival_monitor::PositionSource;

    use super::*;

    #[tokio::test]
    async fn publishes_valid_lines_and_skips_garbage() {
        let source = ChannelSource::new(8);
        let mut rx = source.request_updates(&UpdateRequest::default()).await.unwrap();

        let input = b"{\"latitude\":1.0,\"longitude\":2.0,\"observed_at_millis\":5}\n\
                      \n\
                      not json\n\
                      {\"latitude\":3.0,\"longitude\":4.0}\n";
        let summary = pump(&input[..], &source).await.unwrap();

        assert_eq!(
            summary,
            FeedSummary {
                published: 2,
                skipped: 1
            }
        );
        let first = rx.recv().await.unwrap();
        assert_eq!(first.observed_at_millis, 5);
        let second = rx.recv().await.unwrap();
        assert_eq!(second.latitude, 3.0);
        assert_eq!(second.observed_at_millis, 0);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn stops_when_nobody_listens() {
        let source = ChannelSource::new(8);
        let input = b"{\"latitude\":1.0,\"longitude\":2.0}\n{\"latitude\":1.0,\"longitude\":2.0}\n";
        let summary = pump(&input[..], &source).await.unwrap();
        assert_eq!(summary.published, 0);
    }
}
