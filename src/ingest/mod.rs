//! The ingestion pipeline: fetch a feed, merge its entries into the store.
//!
//! [`Ingestor`] owns a [`Database`](crate::storage::Database) handle and an
//! HTTP client and exposes the operations the scheduler and view layer call:
//! adding feeds (with a read-at-creation seed pass), regular ingestion, the
//! out-of-band date refresh, and batch drivers for both.

mod batch;
mod engine;

use thiserror::Error;

use crate::feed::{FetchError, FetchOptions};
use crate::storage::DatabaseError;
use crate::util::UrlValidationError;

pub use engine::Ingestor;

/// Errors surfaced by the ingestion engine.
///
/// Callers branch on the variant (or on [`is_duplicate`](Self::is_duplicate) /
/// [`is_fetch_failure`](Self::is_fetch_failure)) rather than on messages.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Invalid feed URL: {0}")]
    InvalidUrl(#[from] UrlValidationError),

    #[error("Failed to fetch feed: {0}")]
    Fetch(#[from] FetchError),

    #[error("Feed already exists: {0}")]
    DuplicateFeed(String),

    #[error("Feed not found: {0}")]
    FeedNotFound(String),

    #[error("Storage error: {0}")]
    Store(DatabaseError),
}

impl From<DatabaseError> for IngestError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::DuplicateFeed(url) => Self::DuplicateFeed(url),
            other => Self::Store(other),
        }
    }
}

impl IngestError {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::DuplicateFeed(_))
    }

    /// Transport or decoding failure: the feed, not the store, is at fault.
    pub fn is_fetch_failure(&self) -> bool {
        matches!(self, Self::Fetch(_))
    }
}

/// Tuning for an [`Ingestor`].
#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub fetch: FetchOptions,
    /// Feeds fetched at once by the batch drivers. 1 = strictly sequential.
    pub concurrency: usize,
    /// Allow `add_feed` to accept localhost and private-network URLs
    pub allow_private_hosts: bool,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            fetch: FetchOptions::default(),
            concurrency: 1,
            allow_private_hosts: false,
        }
    }
}

/// Counters for one ingestion pass over one feed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestSummary {
    /// Entries in the fetched document
    pub fetched: usize,
    /// New articles written
    pub inserted: usize,
    /// Entries already stored (or whose link another feed owns)
    pub ignored: usize,
    /// Entries without a title or link
    pub skipped: usize,
    /// Entries whose insert hit a store error
    pub failed: usize,
    pub homepage_backfilled: bool,
}

/// Result of one feed's pass within a batch.
#[derive(Debug)]
pub struct FeedOutcome<T> {
    pub feed_id: i64,
    pub url: String,
    pub result: Result<T, IngestError>,
}

/// Per-feed outcomes of a batch, in completion order.
#[derive(Debug)]
pub struct BatchReport<T> {
    pub outcomes: Vec<FeedOutcome<T>>,
}

impl<T> BatchReport<T> {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub fn outcome_for(&self, feed_id: i64) -> Option<&FeedOutcome<T>> {
        self.outcomes.iter().find(|o| o.feed_id == feed_id)
    }
}

impl BatchReport<IngestSummary> {
    pub fn total_inserted(&self) -> usize {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok())
            .map(|s| s.inserted)
            .sum()
    }
}

impl BatchReport<u64> {
    pub fn total_updated(&self) -> u64 {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_feed_maps_to_own_variant() {
        let err: IngestError = DatabaseError::DuplicateFeed("https://a.com/rss".into()).into();
        assert!(err.is_duplicate());
        assert!(!err.is_fetch_failure());
        assert_eq!(err.to_string(), "Feed already exists: https://a.com/rss");
    }

    #[test]
    fn test_other_store_errors_stay_store() {
        let err: IngestError = DatabaseError::InstanceLocked.into();
        assert!(matches!(err, IngestError::Store(DatabaseError::InstanceLocked)));
        assert!(!err.is_duplicate());
    }

    #[test]
    fn test_fetch_failure_classification() {
        let err: IngestError = FetchError::HttpStatus(404).into();
        assert!(err.is_fetch_failure());
    }

    #[test]
    fn test_batch_report_counts() {
        let report = BatchReport {
            outcomes: vec![
                FeedOutcome {
                    feed_id: 1,
                    url: "a".into(),
                    result: Ok(IngestSummary {
                        inserted: 3,
                        ..Default::default()
                    }),
                },
                FeedOutcome {
                    feed_id: 2,
                    url: "b".into(),
                    result: Err(FetchError::Timeout.into()),
                },
                FeedOutcome {
                    feed_id: 3,
                    url: "c".into(),
                    result: Ok(IngestSummary {
                        inserted: 2,
                        ..Default::default()
                    }),
                },
            ],
        };
        assert_eq!(report.succeeded(), 2);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.total_inserted(), 5);
        assert!(report.outcome_for(2).is_some_and(|o| o.result.is_err()));
        assert!(report.outcome_for(9).is_none());
    }
}
