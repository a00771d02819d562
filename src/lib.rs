//! Feed ingestion for a self-hosted RSS/Atom aggregator.
//!
//! Feeds are fetched and decoded by [`feed`], merged idempotently into a
//! SQLite store ([`storage`]) by the [`ingest`] engine, and exposed through a
//! small command-line front end.

pub mod config;
pub mod feed;
pub mod ingest;
pub mod storage;
pub mod util;
