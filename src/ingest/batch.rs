//! Batch drivers: one pass over every subscribed feed.
//!
//! The feed list is snapshotted at batch start. Each feed runs in isolation:
//! its error is captured in its [`FeedOutcome`] and never reaches siblings.
//! With `concurrency = 1` feeds are processed strictly one after another.

use futures::stream::{self, StreamExt};
use std::future::Future;

use crate::storage::Feed;

use super::engine::Ingestor;
use super::{BatchReport, FeedOutcome, IngestError, IngestSummary};

impl Ingestor {
    /// Ingest every subscribed feed once.
    ///
    /// # Errors
    ///
    /// Only fails if the feed list itself cannot be read. Per-feed failures
    /// are logged and reported in the returned [`BatchReport`].
    pub async fn run_batch(&self) -> Result<BatchReport<IngestSummary>, IngestError> {
        let feeds = self.db().list_feeds().await?;
        tracing::info!(feeds = feeds.len(), "Starting ingestion batch");

        let report = self
            .for_each_feed(feeds, |feed| async move {
                self.ingest_feed(feed.id, &feed.url, false).await
            })
            .await;

        tracing::info!(
            succeeded = report.succeeded(),
            failed = report.failed(),
            inserted = report.total_inserted(),
            "Ingestion batch finished"
        );
        Ok(report)
    }

    /// Run [`refresh_dates`](Ingestor::refresh_dates) over every subscribed
    /// feed. Never part of the regular ingestion cycle.
    pub async fn refresh_all_dates(&self) -> Result<BatchReport<u64>, IngestError> {
        let feeds = self.db().list_feeds().await?;
        tracing::info!(feeds = feeds.len(), "Starting date refresh");

        let report = self
            .for_each_feed(feeds, |feed| async move {
                self.refresh_dates(Some(feed.id), &feed.url).await
            })
            .await;

        tracing::info!(
            succeeded = report.succeeded(),
            failed = report.failed(),
            updated = report.total_updated(),
            "Date refresh finished"
        );
        Ok(report)
    }

    async fn for_each_feed<'a, T, F, Fut>(&'a self, feeds: Vec<Feed>, run: F) -> BatchReport<T>
    where
        F: Fn(Feed) -> Fut,
        Fut: Future<Output = Result<T, IngestError>> + 'a,
    {
        let concurrency = self.options().concurrency.max(1);

        let outcomes: Vec<FeedOutcome<T>> = stream::iter(feeds)
            .map(|feed| {
                let feed_id = feed.id;
                let url = feed.url.clone();
                let task = run(feed);
                async move {
                    let result = task.await;
                    if let Err(e) = &result {
                        tracing::warn!(feed_id = feed_id, url = %url, error = %e, "Feed failed, continuing");
                    }
                    FeedOutcome {
                        feed_id,
                        url,
                        result,
                    }
                }
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;

        BatchReport { outcomes }
    }
}
