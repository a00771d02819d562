use super::schema::Database;
use super::types::{Article, DatabaseError, InsertOutcome, NewArticle};

// ============================================================================
// Query Limit Constants
// ============================================================================

/// Default number of rows returned by the archive listing
pub const DEFAULT_ARCHIVE_LIMIT: i64 = 500;

/// Maximum number of articles to return from any single query (OOM protection)
const MAX_ARTICLES: i64 = 5000;

const ARTICLE_SELECT: &str = r#"
    SELECT a.id, a.feed_id, a.title, a.link, a.description, a.pub_date, a.guid,
           a.is_read, a.created_at,
           f.title AS feed_title, f.homepage_url AS feed_homepage
    FROM articles a
    JOIN feeds f ON a.feed_id = f.id
"#;

// Undated articles sort by when we first saw them
const ARTICLE_ORDER: &str = "ORDER BY COALESCE(a.pub_date, a.created_at) DESC, a.id DESC";

impl Database {
    // ========================================================================
    // Article Ingestion
    // ========================================================================

    /// Insert an article unless one already exists for this feed and dedup key.
    ///
    /// Two rules make a row a duplicate, and both are silent no-ops:
    /// - same `(feed_id, guid)`: checked by the `NOT EXISTS` guard in the same
    ///   statement, so it is atomic under SQLite's single writer
    /// - same `link` anywhere in the store: the table's UNIQUE constraint,
    ///   swallowed by `OR IGNORE` (first feed to publish a link wins)
    ///
    /// Existing rows are never modified here.
    pub async fn insert_article(
        &self,
        feed_id: i64,
        article: &NewArticle,
    ) -> Result<InsertOutcome, DatabaseError> {
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO articles (feed_id, title, link, description, pub_date, guid, is_read)
            SELECT ?, ?, ?, ?, ?, ?, ?
            WHERE NOT EXISTS (
                SELECT 1 FROM articles WHERE feed_id = ? AND guid = ?
            )
        "#,
        )
        .bind(feed_id)
        .bind(&article.title)
        .bind(&article.link)
        .bind(&article.description)
        .bind(&article.pub_date)
        .bind(&article.guid)
        .bind(article.is_read)
        .bind(feed_id)
        .bind(&article.guid)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            Ok(InsertOutcome::Inserted)
        } else {
            Ok(InsertOutcome::Ignored)
        }
    }

    /// Overwrite the publication date of a stored article matched by link or guid.
    ///
    /// This is the only write path that touches `pub_date` after creation.
    /// Returns the number of rows updated.
    pub async fn update_article_pub_date(
        &self,
        feed_id: i64,
        link: &str,
        guid: &str,
        pub_date: Option<&str>,
    ) -> Result<u64, DatabaseError> {
        let result = sqlx::query(
            "UPDATE articles SET pub_date = ? WHERE feed_id = ? AND (link = ? OR guid = ?)",
        )
        .bind(pub_date)
        .bind(feed_id)
        .bind(link)
        .bind(guid)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    // ========================================================================
    // Article Queries
    // ========================================================================

    /// Unread articles across all feeds, newest first.
    pub async fn list_unread(&self) -> Result<Vec<Article>, DatabaseError> {
        let articles = sqlx::query_as::<_, Article>(&format!(
            "{ARTICLE_SELECT} WHERE a.is_read = FALSE {ARTICLE_ORDER}"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(articles)
    }

    /// Most recent articles regardless of read state.
    ///
    /// `limit` is capped at MAX_ARTICLES; callers normally pass
    /// [`DEFAULT_ARCHIVE_LIMIT`].
    pub async fn list_all(&self, limit: i64) -> Result<Vec<Article>, DatabaseError> {
        let limit = limit.clamp(0, MAX_ARTICLES);
        tracing::debug!(limit = limit, "list_all with limit cap");

        let articles = sqlx::query_as::<_, Article>(&format!(
            "{ARTICLE_SELECT} {ARTICLE_ORDER} LIMIT ?"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(articles)
    }

    /// All articles of one feed, newest first.
    pub async fn get_articles_for_feed(&self, feed_id: i64) -> Result<Vec<Article>, DatabaseError> {
        let articles = sqlx::query_as::<_, Article>(&format!(
            "{ARTICLE_SELECT} WHERE a.feed_id = ? {ARTICLE_ORDER} LIMIT ?"
        ))
        .bind(feed_id)
        .bind(MAX_ARTICLES)
        .fetch_all(&self.pool)
        .await?;
        Ok(articles)
    }

    // ========================================================================
    // Article Mutations
    // ========================================================================

    /// Mark article as read (idempotent), returns whether it was changed
    pub async fn mark_article_read(&self, article_id: i64) -> Result<bool, DatabaseError> {
        let result =
            sqlx::query("UPDATE articles SET is_read = TRUE WHERE id = ? AND is_read = FALSE")
                .bind(article_id)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Mark all articles as read across all feeds, returns count of articles marked
    pub async fn mark_all_read(&self) -> Result<u64, DatabaseError> {
        let result = sqlx::query("UPDATE articles SET is_read = TRUE WHERE is_read = FALSE")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use crate::storage::{Database, InsertOutcome, NewArticle, NewFeed};

    async fn test_db() -> Database {
        Database::open(":memory:").await.unwrap()
    }

    async fn add_feed(db: &Database, id: i64) -> i64 {
        db.insert_feed(&NewFeed {
            url: format!("https://feed{}.example.com/rss", id),
            title: Some(format!("Test Feed {}", id)),
            description: None,
            homepage_url: format!("https://feed{}.example.com", id),
        })
        .await
        .unwrap()
    }

    fn test_article(guid: &str, title: &str) -> NewArticle {
        NewArticle {
            title: title.to_string(),
            link: format!("https://example.com/{}", guid),
            description: Some("Test summary".to_string()),
            pub_date: Some("2024-01-01T00:00:00.000Z".to_string()),
            guid: guid.to_string(),
            is_read: false,
        }
    }

    #[tokio::test]
    async fn test_insert_article_then_ignore_same_key() {
        let db = test_db().await;
        let feed_id = add_feed(&db, 1).await;

        let first = db
            .insert_article(feed_id, &test_article("guid-1", "Original"))
            .await
            .unwrap();
        assert_eq!(first, InsertOutcome::Inserted);

        // Same dedup key, different link: still a duplicate
        let mut again = test_article("guid-1", "Updated");
        again.link = "https://example.com/moved".into();
        let second = db.insert_article(feed_id, &again).await.unwrap();
        assert_eq!(second, InsertOutcome::Ignored);

        let articles = db.get_articles_for_feed(feed_id).await.unwrap();
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].title, "Original");
        assert_eq!(articles[0].link, "https://example.com/guid-1");
    }

    #[tokio::test]
    async fn test_link_is_unique_across_feeds() {
        let db = test_db().await;
        let feed_a = add_feed(&db, 1).await;
        let feed_b = add_feed(&db, 2).await;

        let outcome = db
            .insert_article(feed_a, &test_article("shared", "From A"))
            .await
            .unwrap();
        assert_eq!(outcome, InsertOutcome::Inserted);

        let outcome = db
            .insert_article(feed_b, &test_article("shared", "From B"))
            .await
            .unwrap();
        assert_eq!(outcome, InsertOutcome::Ignored);

        assert_eq!(db.get_articles_for_feed(feed_a).await.unwrap().len(), 1);
        assert!(db.get_articles_for_feed(feed_b).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_insert_preserves_existing_read_flag_and_date() {
        let db = test_db().await;
        let feed_id = add_feed(&db, 1).await;
        db.insert_article(feed_id, &test_article("g", "T"))
            .await
            .unwrap();
        let id = db.get_articles_for_feed(feed_id).await.unwrap()[0].id;
        db.mark_article_read(id).await.unwrap();

        let mut refetched = test_article("g", "T");
        refetched.pub_date = Some("2030-01-01T00:00:00.000Z".into());
        db.insert_article(feed_id, &refetched).await.unwrap();

        let stored = &db.get_articles_for_feed(feed_id).await.unwrap()[0];
        assert!(stored.is_read);
        assert_eq!(stored.pub_date.as_deref(), Some("2024-01-01T00:00:00.000Z"));
    }

    #[tokio::test]
    async fn test_list_unread_joins_feed_and_orders_newest_first() {
        let db = test_db().await;
        let feed_id = add_feed(&db, 1).await;

        let mut older = test_article("old", "Older");
        older.pub_date = Some("2023-06-01T00:00:00.000Z".into());
        let mut newer = test_article("new", "Newer");
        newer.pub_date = Some("2024-06-01T00:00:00.000Z".into());
        let mut read = test_article("read", "Already read");
        read.is_read = true;

        for a in [&older, &newer, &read] {
            db.insert_article(feed_id, a).await.unwrap();
        }

        let unread = db.list_unread().await.unwrap();
        let titles: Vec<_> = unread.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, vec!["Newer", "Older"]);
        assert_eq!(unread[0].feed_title.as_deref(), Some("Test Feed 1"));
        assert_eq!(
            unread[0].feed_homepage.as_deref(),
            Some("https://feed1.example.com")
        );
    }

    #[tokio::test]
    async fn test_same_date_ties_break_on_newest_id() {
        let db = test_db().await;
        let feed_id = add_feed(&db, 1).await;
        db.insert_article(feed_id, &test_article("a", "First"))
            .await
            .unwrap();
        db.insert_article(feed_id, &test_article("b", "Second"))
            .await
            .unwrap();

        let all = db.list_all(500).await.unwrap();
        assert_eq!(all[0].title, "Second");
        assert_eq!(all[1].title, "First");
    }

    #[tokio::test]
    async fn test_list_all_respects_limit_and_includes_read() {
        let db = test_db().await;
        let feed_id = add_feed(&db, 1).await;
        for i in 0..10 {
            let mut a = test_article(&format!("guid-{}", i), &format!("Article {}", i));
            a.is_read = i % 2 == 0;
            db.insert_article(feed_id, &a).await.unwrap();
        }

        assert_eq!(db.list_all(500).await.unwrap().len(), 10);
        assert_eq!(db.list_all(3).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_mark_article_read() {
        let db = test_db().await;
        let feed_id = add_feed(&db, 1).await;
        db.insert_article(feed_id, &test_article("1", "Test"))
            .await
            .unwrap();

        let articles = db.get_articles_for_feed(feed_id).await.unwrap();
        assert!(!articles[0].is_read);

        let changed = db.mark_article_read(articles[0].id).await.unwrap();
        assert!(changed);
        assert!(db.list_unread().await.unwrap().is_empty());

        let changed = db.mark_article_read(articles[0].id).await.unwrap();
        assert!(!changed);
    }

    #[tokio::test]
    async fn test_mark_all_read_idempotent() {
        let db = test_db().await;
        let feed_a = add_feed(&db, 1).await;
        let feed_b = add_feed(&db, 2).await;
        db.insert_article(feed_a, &test_article("1", "A1"))
            .await
            .unwrap();
        db.insert_article(feed_b, &test_article("2", "B1"))
            .await
            .unwrap();

        assert_eq!(db.mark_all_read().await.unwrap(), 2);
        assert_eq!(db.mark_all_read().await.unwrap(), 0);
        assert!(db.list_unread().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_pub_date_matches_link_or_guid() {
        let db = test_db().await;
        let feed_id = add_feed(&db, 1).await;
        let mut undated = test_article("g-1", "Undated");
        undated.pub_date = None;
        db.insert_article(feed_id, &undated).await.unwrap();

        // Matched by guid even though the link changed upstream
        let updated = db
            .update_article_pub_date(
                feed_id,
                "https://example.com/other",
                "g-1",
                Some("2024-02-02T00:00:00.000Z"),
            )
            .await
            .unwrap();
        assert_eq!(updated, 1);

        let stored = &db.get_articles_for_feed(feed_id).await.unwrap()[0];
        assert_eq!(stored.pub_date.as_deref(), Some("2024-02-02T00:00:00.000Z"));
    }

    #[tokio::test]
    async fn test_update_pub_date_scoped_to_feed() {
        let db = test_db().await;
        let feed_a = add_feed(&db, 1).await;
        let feed_b = add_feed(&db, 2).await;
        db.insert_article(feed_a, &test_article("g", "A"))
            .await
            .unwrap();

        let updated = db
            .update_article_pub_date(feed_b, "https://example.com/g", "g", None)
            .await
            .unwrap();
        assert_eq!(updated, 0);
    }
}
