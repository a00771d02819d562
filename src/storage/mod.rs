//! Persistent SQLite store for feeds and articles.
//!
//! The schema is fixed (see [`schema`]): `feeds.url` is unique, `articles.link`
//! is unique across the whole store, and deleting a feed cascades to its
//! articles. Every operation lives on [`Database`], a cloneable pool handle.

mod articles;
mod feeds;
mod schema;
mod types;

pub use articles::DEFAULT_ARCHIVE_LIMIT;
pub use schema::Database;
pub use types::{Article, DatabaseError, Feed, InsertOutcome, NewArticle, NewFeed};
