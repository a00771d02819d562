//! Integration tests for the store-level feed lifecycle: subscribe, store
//! articles, read, delete.
//!
//! Each test creates its own in-memory SQLite database for isolation.

use whackamole::storage::{Database, DatabaseError, InsertOutcome, NewArticle, NewFeed};

async fn test_db() -> Database {
    Database::open(":memory:").await.unwrap()
}

fn new_feed(url: &str, title: &str) -> NewFeed {
    NewFeed {
        url: url.to_string(),
        title: Some(title.to_string()),
        description: None,
        homepage_url: String::new(),
    }
}

fn new_article(key: &str, title: &str, pub_date: Option<&str>) -> NewArticle {
    let link = format!("https://example.com/{}", key);
    NewArticle {
        title: title.to_string(),
        link: link.clone(),
        description: Some("Test summary".to_string()),
        pub_date: pub_date.map(String::from),
        guid: link,
        is_read: false,
    }
}

// ============================================================================
// Subscribe Tests
// ============================================================================

#[tokio::test]
async fn test_subscribe_feed_appears_in_list() {
    let db = test_db().await;

    let feed_id = db
        .insert_feed(&new_feed("https://example.com/feed.xml", "Example Feed"))
        .await
        .unwrap();
    assert!(feed_id > 0);

    let feeds = db.list_feeds().await.unwrap();
    assert_eq!(feeds.len(), 1);
    assert_eq!(feeds[0].url, "https://example.com/feed.xml");
    assert_eq!(feeds[0].title.as_deref(), Some("Example Feed"));
    assert!(feeds[0].last_fetched.is_none());
    assert!(feeds[0].created_at.is_some());
}

#[tokio::test]
async fn test_subscribe_duplicate_url_rejected() {
    let db = test_db().await;

    db.insert_feed(&new_feed("https://example.com/feed.xml", "Old Title"))
        .await
        .unwrap();
    let err = db
        .insert_feed(&new_feed("https://example.com/feed.xml", "New Title"))
        .await
        .unwrap_err();
    assert!(matches!(err, DatabaseError::DuplicateFeed(url) if url == "https://example.com/feed.xml"));

    // Original row untouched
    let feeds = db.list_feeds().await.unwrap();
    assert_eq!(feeds.len(), 1);
    assert_eq!(feeds[0].title.as_deref(), Some("Old Title"));
}

#[tokio::test]
async fn test_feeds_listed_by_title() {
    let db = test_db().await;
    for (url, title) in [
        ("https://c.com/rss", "Charlie"),
        ("https://a.com/rss", "Alpha"),
        ("https://b.com/rss", "Bravo"),
    ] {
        db.insert_feed(&new_feed(url, title)).await.unwrap();
    }

    let titles: Vec<_> = db
        .list_feeds()
        .await
        .unwrap()
        .into_iter()
        .filter_map(|f| f.title)
        .collect();
    assert_eq!(titles, vec!["Alpha", "Bravo", "Charlie"]);
}

// ============================================================================
// Read State Tests
// ============================================================================

#[tokio::test]
async fn test_read_flow() {
    let db = test_db().await;
    let feed_id = db
        .insert_feed(&new_feed("https://example.com/feed.xml", "Feed"))
        .await
        .unwrap();

    for key in ["a", "b", "c"] {
        db.insert_article(feed_id, &new_article(key, key, None))
            .await
            .unwrap();
    }
    assert_eq!(db.list_unread().await.unwrap().len(), 3);

    let first = db.list_unread().await.unwrap()[0].id;
    assert!(db.mark_article_read(first).await.unwrap());
    assert!(!db.mark_article_read(first).await.unwrap(), "second mark is a no-op");
    assert_eq!(db.list_unread().await.unwrap().len(), 2);

    assert_eq!(db.mark_all_read().await.unwrap(), 2);
    assert!(db.list_unread().await.unwrap().is_empty());

    // Archive still shows everything
    assert_eq!(db.list_all(500).await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_listing_order_and_join() {
    let db = test_db().await;
    let feed_id = db
        .insert_feed(&NewFeed {
            homepage_url: "https://example.com".to_string(),
            ..new_feed("https://example.com/feed.xml", "Example")
        })
        .await
        .unwrap();

    db.insert_article(feed_id, &new_article("old", "Old", Some("2023-01-01T00:00:00.000Z")))
        .await
        .unwrap();
    db.insert_article(feed_id, &new_article("new", "New", Some("2024-06-01T00:00:00.000Z")))
        .await
        .unwrap();

    let unread = db.list_unread().await.unwrap();
    assert_eq!(unread[0].title, "New");
    assert_eq!(unread[1].title, "Old");
    assert_eq!(unread[0].feed_title.as_deref(), Some("Example"));
    assert_eq!(unread[0].feed_homepage.as_deref(), Some("https://example.com"));
}

// ============================================================================
// Delete Feed Tests
// ============================================================================

#[tokio::test]
async fn test_delete_feed_removes_only_its_articles() {
    let db = test_db().await;

    let doomed = db
        .insert_feed(&new_feed("https://doomed.com/feed.xml", "Doomed"))
        .await
        .unwrap();
    let kept = db
        .insert_feed(&new_feed("https://kept.com/feed.xml", "Kept"))
        .await
        .unwrap();

    for key in ["d1", "d2", "d3"] {
        db.insert_article(doomed, &new_article(key, key, None))
            .await
            .unwrap();
    }
    db.insert_article(kept, &new_article("k1", "k1", None))
        .await
        .unwrap();

    let removed = db.delete_feed(doomed).await.unwrap();
    assert_eq!(removed, 3);

    let feeds = db.list_feeds().await.unwrap();
    assert_eq!(feeds.len(), 1);
    assert_eq!(feeds[0].id, kept);

    let remaining = db.list_all(500).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].feed_id, kept);
    assert!(db.get_articles_for_feed(doomed).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_delete_unknown_feed_is_noop() {
    let db = test_db().await;
    assert_eq!(db.delete_feed(42).await.unwrap(), 0);
}

#[tokio::test]
async fn test_resubscribe_after_delete() {
    let db = test_db().await;
    let url = "https://example.com/feed.xml";

    let first = db.insert_feed(&new_feed(url, "Feed")).await.unwrap();
    db.insert_article(first, &new_article("a", "a", None))
        .await
        .unwrap();
    db.delete_feed(first).await.unwrap();

    // URL and article link are free again
    let second = db.insert_feed(&new_feed(url, "Feed")).await.unwrap();
    assert_ne!(first, second);
    let outcome = db
        .insert_article(second, &new_article("a", "a", None))
        .await
        .unwrap();
    assert_eq!(outcome, InsertOutcome::Inserted);
}

#[tokio::test]
async fn test_database_persists_across_reopen() {
    let dir = std::env::temp_dir().join("whackamole_lifecycle_reopen");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("test.db");
    let _ = std::fs::remove_file(&path);
    let path_str = path.to_str().unwrap();

    {
        let db = Database::open(path_str).await.unwrap();
        let feed_id = db
            .insert_feed(&new_feed("https://example.com/feed.xml", "Feed"))
            .await
            .unwrap();
        db.insert_article(feed_id, &new_article("a", "a", None))
            .await
            .unwrap();
    }

    // Reopening re-runs the idempotent DDL without touching data
    let db = Database::open(path_str).await.unwrap();
    assert_eq!(db.list_feeds().await.unwrap().len(), 1);
    assert_eq!(db.list_unread().await.unwrap().len(), 1);

    std::fs::remove_dir_all(&dir).ok();
}
