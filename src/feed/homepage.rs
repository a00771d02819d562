use url::Url;

/// Best-effort homepage for a feed.
///
/// Tried in order, first hit wins:
/// 1. the feed's self-declared site link, verbatim
/// 2. `scheme://host` of the feed document's own URL (Atom `rel="self"`)
/// 3. `scheme://host` of the URL we were asked to fetch
///
/// Malformed or host-less URLs fall through to the next tier; if nothing
/// works the result is an empty string.
///
/// # Examples
///
/// ```
/// use whackamole::feed::resolve_homepage;
///
/// assert_eq!(resolve_homepage(Some("https://example.com/"), None, ""), "https://example.com/");
/// assert_eq!(
///     resolve_homepage(None, Some("https://cdn.example.com/feed.xml"), ""),
///     "https://cdn.example.com"
/// );
/// assert_eq!(resolve_homepage(None, None, "https://site.org/rss"), "https://site.org");
/// assert_eq!(resolve_homepage(None, Some("::bad::"), "also bad"), "");
/// ```
pub fn resolve_homepage(site_link: Option<&str>, feed_url: Option<&str>, requested_url: &str) -> String {
    if let Some(link) = site_link.filter(|l| !l.is_empty()) {
        return link.to_string();
    }

    feed_url
        .and_then(origin_of)
        .or_else(|| origin_of(requested_url))
        .unwrap_or_default()
}

/// `scheme://host` of a URL (no port, path or query), if it parses and has a host.
fn origin_of(raw: &str) -> Option<String> {
    if raw.is_empty() {
        return None;
    }
    let url = Url::parse(raw).ok()?;
    let host = url.host_str()?;
    Some(format!("{}://{}", url.scheme(), host))
}
