//! Utility functions for common operations.
//!
//! - **URL validation**: policy checks for new subscriptions
//! - **Text processing**: control-character stripping and HTML-to-text snippets

mod text;
mod url_validator;

pub use text::{html_to_text, strip_control_chars};
pub use url_validator::{validate_feed_url, UrlValidationError};
