use serde::Serialize;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Database-specific errors with user-friendly messages
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Another process holds the database lock
    #[error("The database is locked by another process. Please close it and try again.")]
    InstanceLocked,

    /// Migration failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// A feed with this URL is already subscribed
    #[error("Feed already exists: {0}")]
    DuplicateFeed(String),

    /// Generic database error
    #[error("Database error: {0}")]
    Other(#[from] sqlx::Error),
}

impl DatabaseError {
    /// Check if a sqlx error indicates database locking
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        let error_string = err.to_string().to_lowercase();

        // SQLITE_BUSY (5): database is locked
        // SQLITE_LOCKED (6): database table is locked
        // SQLITE_CANTOPEN (14): unable to open database file
        if error_string.contains("database is locked")
            || error_string.contains("database table is locked")
            || error_string.contains("sqlite_busy")
            || error_string.contains("sqlite_locked")
            || error_string.contains("unable to open database file")
        {
            return DatabaseError::InstanceLocked;
        }

        DatabaseError::Other(err)
    }

    /// Whether the underlying failure was a UNIQUE constraint violation.
    pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
        match err {
            sqlx::Error::Database(db_err) => db_err.is_unique_violation(),
            _ => false,
        }
    }
}

// ============================================================================
// Write Types
// ============================================================================

/// Metadata for a feed about to be subscribed.
#[derive(Debug, Clone)]
pub struct NewFeed {
    pub url: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub homepage_url: String,
}

/// A normalized entry ready for insert-or-ignore.
///
/// `guid` holds the dedup key (the entry's guid, else its link), which is
/// what the `articles.guid` column has always stored.
#[derive(Debug, Clone)]
pub struct NewArticle {
    pub title: String,
    pub link: String,
    pub description: Option<String>,
    pub pub_date: Option<String>,
    pub guid: String,
    pub is_read: bool,
}

// ============================================================================
// Data Structures
// ============================================================================

/// Feed row as stored.
///
/// Timestamps are SQLite `CURRENT_TIMESTAMP` text (`YYYY-MM-DD HH:MM:SS`).
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Feed {
    pub id: i64,
    pub url: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub homepage_url: Option<String>,
    pub last_fetched: Option<String>,
    pub created_at: Option<String>,
}

impl Feed {
    /// Stored homepage, treating an empty string the same as NULL.
    pub fn homepage(&self) -> Option<&str> {
        self.homepage_url.as_deref().filter(|h| !h.is_empty())
    }
}

/// Article row joined with its owning feed's title and homepage.
///
/// `pub_date` is normally RFC 3339, but may hold a feed's raw date text when
/// it could not be parsed.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Article {
    pub id: i64,
    pub feed_id: i64,
    pub title: String,
    pub link: String,
    pub description: Option<String>,
    pub pub_date: Option<String>,
    pub guid: Option<String>,
    pub is_read: bool,
    pub created_at: Option<String>,
    pub feed_title: Option<String>,
    pub feed_homepage: Option<String>,
}

/// Outcome of a single insert-or-ignore.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// A new row was written
    Inserted,
    /// A row with the same (feed, dedup key) or the same link already existed
    Ignored,
}
