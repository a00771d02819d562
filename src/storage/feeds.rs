use super::schema::Database;
use super::types::{DatabaseError, Feed, NewFeed};

const FEED_COLUMNS: &str =
    "id, url, title, description, homepage_url, last_fetched, created_at";

impl Database {
    // ========================================================================
    // Feed Operations
    // ========================================================================

    /// Subscribe to a new feed, returning its id.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::DuplicateFeed`] if the URL is already stored.
    /// The UNIQUE constraint on `feeds.url` is the source of truth, so two
    /// racing inserts cannot both succeed.
    pub async fn insert_feed(&self, feed: &NewFeed) -> Result<i64, DatabaseError> {
        let result = sqlx::query(
            "INSERT INTO feeds (url, title, description, homepage_url) VALUES (?, ?, ?, ?)",
        )
        .bind(&feed.url)
        .bind(&feed.title)
        .bind(&feed.description)
        .bind(&feed.homepage_url)
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) => Ok(done.last_insert_rowid()),
            Err(e) if DatabaseError::is_unique_violation(&e) => {
                Err(DatabaseError::DuplicateFeed(feed.url.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// All feeds ordered by title.
    pub async fn list_feeds(&self) -> Result<Vec<Feed>, DatabaseError> {
        let feeds = sqlx::query_as::<_, Feed>(&format!(
            "SELECT {FEED_COLUMNS} FROM feeds ORDER BY title"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(feeds)
    }

    pub async fn get_feed(&self, feed_id: i64) -> Result<Option<Feed>, DatabaseError> {
        let feed = sqlx::query_as::<_, Feed>(&format!(
            "SELECT {FEED_COLUMNS} FROM feeds WHERE id = ?"
        ))
        .bind(feed_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(feed)
    }

    pub async fn get_feed_by_url(&self, url: &str) -> Result<Option<Feed>, DatabaseError> {
        let feed = sqlx::query_as::<_, Feed>(&format!(
            "SELECT {FEED_COLUMNS} FROM feeds WHERE url = ?"
        ))
        .bind(url)
        .fetch_optional(&self.pool)
        .await?;
        Ok(feed)
    }

    /// Set the homepage URL of a feed (used by the lazy backfill).
    pub async fn set_feed_homepage(
        &self,
        feed_id: i64,
        homepage_url: &str,
    ) -> Result<(), DatabaseError> {
        sqlx::query("UPDATE feeds SET homepage_url = ? WHERE id = ?")
            .bind(homepage_url)
            .bind(feed_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Update the last_fetched timestamp for a feed
    pub async fn update_feed_fetched(&self, feed_id: i64) -> Result<(), DatabaseError> {
        sqlx::query("UPDATE feeds SET last_fetched = CURRENT_TIMESTAMP WHERE id = ?")
            .bind(feed_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Delete a feed and, through `ON DELETE CASCADE`, all of its articles.
    ///
    /// Returns the number of articles removed with it. Deleting an unknown id
    /// is a no-op returning 0.
    pub async fn delete_feed(&self, feed_id: i64) -> Result<u64, DatabaseError> {
        let mut tx = self.pool.begin().await?;

        let (article_count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM articles WHERE feed_id = ?")
                .bind(feed_id)
                .fetch_one(&mut *tx)
                .await?;

        let result = sqlx::query("DELETE FROM feeds WHERE id = ?")
            .bind(feed_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        if result.rows_affected() == 0 {
            return Ok(0);
        }
        Ok(article_count as u64)
    }
}
