//! Feed retrieval and decoding.
//!
//! - [`fetcher`] - HTTP retrieval with timeout, size limit and retry/backoff
//! - [`parser`] - RSS/Atom/JSON Feed decoding into [`ParsedFeed`]
//! - [`dates`] - publication date normalization
//! - [`homepage`] - homepage URL resolution
//!
//! Nothing in here touches the database; see [`crate::ingest`] for that.

mod dates;
mod fetcher;
mod homepage;
mod parser;

pub use dates::{normalize_pub_date, parse_date, to_iso};
pub use fetcher::{build_client, fetch_feed, FetchError, FetchOptions};
pub use homepage::resolve_homepage;
pub use parser::{parse_feed, ParseError, ParsedEntry, ParsedFeed};
