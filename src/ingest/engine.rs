use crate::feed::{fetch_feed, normalize_pub_date, resolve_homepage, ParsedEntry, ParsedFeed};
use crate::storage::{Article, Database, Feed, InsertOutcome, NewArticle, NewFeed};
use crate::util::validate_feed_url;

use super::{IngestError, IngestOptions, IngestSummary};

/// Orchestrates fetching feeds and merging their entries into the store.
///
/// Cloning is cheap: the database pool and HTTP client are both reference
/// counted.
#[derive(Clone)]
pub struct Ingestor {
    db: Database,
    client: reqwest::Client,
    options: IngestOptions,
}

impl Ingestor {
    pub fn new(db: Database, client: reqwest::Client, options: IngestOptions) -> Self {
        Self {
            db,
            client,
            options,
        }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn options(&self) -> &IngestOptions {
        &self.options
    }

    // ========================================================================
    // Subscription
    // ========================================================================

    /// Subscribe to a feed and seed it with its current entries.
    ///
    /// The document is fetched once: its metadata becomes the feed row and
    /// its entries are stored already read, so subscribing never floods the
    /// unread list with backlog.
    ///
    /// # Errors
    ///
    /// - [`IngestError::InvalidUrl`] if the URL is rejected before fetching
    /// - [`IngestError::Fetch`] if the feed cannot be retrieved or decoded
    /// - [`IngestError::DuplicateFeed`] if the URL is already subscribed
    pub async fn add_feed(&self, url: &str) -> Result<i64, IngestError> {
        let url = url.trim();
        validate_feed_url(url, self.options.allow_private_hosts)?;

        let parsed = fetch_feed(&self.client, url, &self.options.fetch).await?;
        let homepage_url = resolve_homepage(parsed.link.as_deref(), parsed.feed_url.as_deref(), url);

        let feed_id = self
            .db
            .insert_feed(&NewFeed {
                url: url.to_string(),
                title: parsed.title.clone(),
                description: parsed.description.clone(),
                homepage_url,
            })
            .await?;

        tracing::info!(feed_id = feed_id, url = %url, "Feed added");

        let summary = self.merge_entries(feed_id, &parsed, true).await;
        if let Err(e) = self.db.update_feed_fetched(feed_id).await {
            tracing::warn!(feed_id = feed_id, error = %e, "Failed to record seed fetch time");
        }
        tracing::info!(
            feed_id = feed_id,
            inserted = summary.inserted,
            skipped = summary.skipped,
            "Seeded feed"
        );

        Ok(feed_id)
    }

    // ========================================================================
    // Ingestion
    // ========================================================================

    /// Fetch a feed and insert-or-ignore every entry.
    ///
    /// Stored articles are never modified. New articles get `is_read = seed`.
    /// An empty stored homepage is backfilled from the fetched document.
    ///
    /// # Errors
    ///
    /// A fetch failure leaves the store untouched (no `last_fetched` bump).
    /// Individual article insert failures are logged and counted but do not
    /// fail the pass.
    pub async fn ingest_feed(
        &self,
        feed_id: i64,
        feed_url: &str,
        seed: bool,
    ) -> Result<IngestSummary, IngestError> {
        let parsed = match fetch_feed(&self.client, feed_url, &self.options.fetch).await {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!(feed_id = feed_id, url = %feed_url, error = %e, "Feed fetch failed");
                return Err(e.into());
            }
        };

        let feed = self
            .db
            .get_feed(feed_id)
            .await?
            .ok_or_else(|| IngestError::FeedNotFound(feed_url.to_string()))?;

        let mut homepage_backfilled = false;
        if feed.homepage().is_none() {
            let homepage = resolve_homepage(
                parsed.link.as_deref(),
                parsed.feed_url.as_deref(),
                feed_url,
            );
            if !homepage.is_empty() {
                match self.db.set_feed_homepage(feed_id, &homepage).await {
                    Ok(()) => {
                        tracing::info!(feed_id = feed_id, homepage = %homepage, "Backfilled feed homepage");
                        homepage_backfilled = true;
                    }
                    Err(e) => {
                        tracing::warn!(feed_id = feed_id, error = %e, "Homepage backfill failed, continuing");
                    }
                }
            }
        }

        let mut summary = self.merge_entries(feed_id, &parsed, seed).await;
        summary.homepage_backfilled = homepage_backfilled;

        self.db.update_feed_fetched(feed_id).await?;

        tracing::info!(
            feed_id = feed_id,
            fetched = summary.fetched,
            inserted = summary.inserted,
            ignored = summary.ignored,
            "Feed ingested"
        );
        Ok(summary)
    }

    async fn merge_entries(&self, feed_id: i64, parsed: &ParsedFeed, seed: bool) -> IngestSummary {
        let mut summary = IngestSummary {
            fetched: parsed.entries.len(),
            ..Default::default()
        };

        for entry in &parsed.entries {
            let Some(article) = to_new_article(entry, seed) else {
                tracing::debug!(feed_id = feed_id, "Skipping entry without title or link");
                summary.skipped += 1;
                continue;
            };

            match self.db.insert_article(feed_id, &article).await {
                Ok(InsertOutcome::Inserted) => summary.inserted += 1,
                Ok(InsertOutcome::Ignored) => summary.ignored += 1,
                Err(e) => {
                    tracing::warn!(
                        feed_id = feed_id,
                        link = %article.link,
                        error = %e,
                        "Failed to store article"
                    );
                    summary.failed += 1;
                }
            }
        }

        summary
    }

    // ========================================================================
    // Date maintenance
    // ========================================================================

    /// Re-fetch a feed and overwrite the stored publication date of every
    /// article it still lists.
    ///
    /// This is the only path that changes a stored date. When `feed_id` is
    /// `None` the feed is looked up by URL. Returns the number of rows updated.
    pub async fn refresh_dates(
        &self,
        feed_id: Option<i64>,
        feed_url: &str,
    ) -> Result<u64, IngestError> {
        let feed_id = match feed_id {
            Some(id) => id,
            None => {
                self.db
                    .get_feed_by_url(feed_url)
                    .await?
                    .ok_or_else(|| IngestError::FeedNotFound(feed_url.to_string()))?
                    .id
            }
        };

        let parsed = fetch_feed(&self.client, feed_url, &self.options.fetch).await?;

        let mut updated = 0;
        for entry in &parsed.entries {
            let Some(key) = entry.dedup_key() else {
                continue;
            };
            let link = entry.link.as_deref().unwrap_or(key);
            let pub_date = normalize_pub_date(entry.iso_date.as_deref(), entry.pub_date.as_deref());

            match self
                .db
                .update_article_pub_date(feed_id, link, key, pub_date.as_deref())
                .await
            {
                Ok(rows) => updated += rows,
                Err(e) => {
                    tracing::warn!(feed_id = feed_id, link = %link, error = %e, "Failed to update date");
                }
            }
        }

        tracing::info!(feed_id = feed_id, updated = updated, "Refreshed publication dates");
        Ok(updated)
    }

    // ========================================================================
    // View layer operations
    // ========================================================================

    pub async fn list_feeds(&self) -> Result<Vec<Feed>, IngestError> {
        Ok(self.db.list_feeds().await?)
    }

    pub async fn list_unread(&self) -> Result<Vec<Article>, IngestError> {
        Ok(self.db.list_unread().await?)
    }

    pub async fn list_all(&self, limit: i64) -> Result<Vec<Article>, IngestError> {
        Ok(self.db.list_all(limit).await?)
    }

    /// Returns whether the article existed and was unread.
    pub async fn mark_read(&self, article_id: i64) -> Result<bool, IngestError> {
        Ok(self.db.mark_article_read(article_id).await?)
    }

    pub async fn mark_all_read(&self) -> Result<u64, IngestError> {
        Ok(self.db.mark_all_read().await?)
    }

    /// Unsubscribe; returns how many articles went with the feed.
    pub async fn delete_feed(&self, feed_id: i64) -> Result<u64, IngestError> {
        let removed = self.db.delete_feed(feed_id).await?;
        tracing::info!(feed_id = feed_id, articles = removed, "Feed deleted");
        Ok(removed)
    }
}

/// Normalize a parsed entry into an insertable article.
///
/// `None` when the entry lacks a title or link, which the store requires.
fn to_new_article(entry: &ParsedEntry, is_read: bool) -> Option<NewArticle> {
    let title = entry.title.as_deref().filter(|t| !t.is_empty())?;
    let link = entry.link.as_deref().filter(|l| !l.is_empty())?;
    let guid = entry.dedup_key().unwrap_or(link);

    Some(NewArticle {
        title: title.to_string(),
        link: link.to_string(),
        description: entry.summary.clone(),
        pub_date: normalize_pub_date(entry.iso_date.as_deref(), entry.pub_date.as_deref()),
        guid: guid.to_string(),
        is_read,
    })
}
