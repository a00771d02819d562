use feed_rs::model::Link;
use feed_rs::parser;
use quick_xml::events::Event;
use quick_xml::Reader;
use thiserror::Error;

use super::dates::to_iso;
use crate::util::{html_to_text, strip_control_chars};

/// The feed document could not be decoded as RSS, Atom or JSON Feed.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("not a valid feed: {0}")]
    Invalid(#[from] parser::ParseFeedError),
}

/// A decoded feed, identical in shape for every dialect.
#[derive(Debug, Clone, Default)]
pub struct ParsedFeed {
    pub title: Option<String>,
    pub description: Option<String>,
    /// The site link the feed declares for itself
    pub link: Option<String>,
    /// The feed document's own URL (Atom `rel="self"`), if declared
    pub feed_url: Option<String>,
    /// Entries in document order
    pub entries: Vec<ParsedEntry>,
}

#[derive(Debug, Clone, Default)]
pub struct ParsedEntry {
    pub title: Option<String>,
    pub link: Option<String>,
    /// Only set when the document carried an explicit `<guid>`/`<id>`
    pub guid: Option<String>,
    /// Plain-text snippet of the summary, or of the content body
    pub summary: Option<String>,
    /// Date already normalized by the feed parser
    pub iso_date: Option<String>,
    /// Date text exactly as it appeared in the document
    pub pub_date: Option<String>,
}

impl ParsedEntry {
    /// The entry's dedup key: its guid if present, else its link.
    pub fn dedup_key(&self) -> Option<&str> {
        self.guid
            .as_deref()
            .filter(|g| !g.is_empty())
            .or_else(|| self.link.as_deref().filter(|l| !l.is_empty()))
    }
}

/// Decode a feed document.
///
/// Structure comes from `feed-rs`. Because it synthesizes ids for entries
/// without one and drops dates it cannot parse, a second shallow XML pass
/// recovers the explicit guid and raw date text of each entry. When the two
/// passes disagree on the entry count, the raw fields are left unset and
/// entries dedup on their link. JSON Feed ids are used as-is.
pub fn parse_feed(bytes: &[u8]) -> Result<ParsedFeed, ParseError> {
    let feed = parser::parse(bytes)?;

    let is_json = bytes.trim_ascii_start().first() == Some(&b'{');
    let raw_entries = if is_json {
        None
    } else {
        scan_raw_entries(bytes).filter(|raw| raw.len() == feed.entries.len())
    };
    if raw_entries.is_none() && !is_json && !feed.entries.is_empty() {
        tracing::debug!(
            entries = feed.entries.len(),
            "Raw entry scan unavailable, using parser ids and dates only"
        );
    }

    let link = pick_link(&feed.links, false);
    let feed_url = feed
        .links
        .iter()
        .find(|l| l.rel.as_deref() == Some("self"))
        .map(|l| l.href.clone());

    let entries = feed
        .entries
        .into_iter()
        .enumerate()
        .map(|(idx, entry)| {
            let raw = raw_entries.as_ref().map(|r| &r[idx]);

            // feed-rs invents ids for XML entries without one, so only a
            // JSON Feed id (always explicit) is trusted without the scan
            let guid = match raw {
                Some(raw) => raw.guid.clone(),
                None if is_json => Some(entry.id.trim().to_string()).filter(|id| !id.is_empty()),
                None => None,
            };

            let summary = entry
                .summary
                .map(|s| s.content)
                .or_else(|| entry.content.and_then(|c| c.body))
                .map(|html| html_to_text(&html))
                .filter(|s| !s.is_empty());

            ParsedEntry {
                title: entry
                    .title
                    .map(|t| strip_control_chars(t.content.trim()).into_owned())
                    .filter(|t| !t.is_empty()),
                link: pick_link(&entry.links, true),
                guid,
                summary,
                iso_date: entry.published.or(entry.updated).map(|dt| to_iso(&dt)),
                pub_date: raw.and_then(|r| r.date.clone()),
            }
        })
        .collect();

    Ok(ParsedFeed {
        title: feed
            .title
            .map(|t| strip_control_chars(t.content.trim()).into_owned()),
        description: feed
            .description
            .map(|d| strip_control_chars(d.content.trim()).into_owned()),
        link,
        feed_url,
        entries,
    })
}

/// The alternate (human-facing) link: rel absent or "alternate", else
/// optionally any link at all.
fn pick_link(links: &[Link], any_fallback: bool) -> Option<String> {
    links
        .iter()
        .find(|l| matches!(l.rel.as_deref(), None | Some("alternate")))
        .or_else(|| if any_fallback { links.first() } else { None })
        .map(|l| l.href.trim().to_string())
        .filter(|href| !href.is_empty())
}

// ============================================================================
// Raw entry scan
// ============================================================================

#[derive(Debug, Default)]
struct RawEntry {
    guid: Option<String>,
    date: Option<String>,
    date_rank: usize,
}

#[derive(Debug, Clone, Copy)]
enum RawField {
    Guid,
    /// Lower rank wins: pubDate, published, dc:date, updated
    Date(usize),
}

impl RawField {
    fn from_local_name(name: &[u8]) -> Option<Self> {
        match name {
            b"guid" | b"id" => Some(Self::Guid),
            b"pubDate" => Some(Self::Date(0)),
            b"published" | b"issued" => Some(Self::Date(1)),
            b"date" => Some(Self::Date(2)),
            b"updated" | b"modified" => Some(Self::Date(3)),
            _ => None,
        }
    }
}

impl RawEntry {
    fn store(&mut self, field: RawField, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        match field {
            RawField::Guid => {
                if self.guid.is_none() {
                    self.guid = Some(text.to_string());
                }
            }
            RawField::Date(rank) => {
                if self.date.is_none() || rank < self.date_rank {
                    self.date = Some(text.to_string());
                    self.date_rank = rank;
                }
            }
        }
    }
}

/// Walk `<item>`/`<entry>` elements and collect their direct-child guid and
/// date text. Returns `None` if the document is not well-formed XML.
fn scan_raw_entries(bytes: &[u8]) -> Option<Vec<RawEntry>> {
    let mut reader = Reader::from_reader(bytes);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut entries: Vec<RawEntry> = Vec::new();
    let mut depth = 0usize;
    let mut entry_depth: Option<usize> = None;
    let mut field: Option<RawField> = None;
    let mut text = String::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                depth += 1;
                let local = e.local_name();
                match entry_depth {
                    None if matches!(local.as_ref(), b"item" | b"entry") => {
                        entry_depth = Some(depth);
                        entries.push(RawEntry::default());
                    }
                    Some(d) if depth == d + 1 => {
                        field = RawField::from_local_name(local.as_ref());
                        text.clear();
                    }
                    _ => {}
                }
            }
            Ok(Event::Empty(e))
                if entry_depth.is_none() && matches!(e.local_name().as_ref(), b"item" | b"entry") =>
            {
                entries.push(RawEntry::default());
            }
            Ok(Event::Text(t)) if field.is_some() => match t.unescape() {
                Ok(s) => text.push_str(&s),
                Err(_) => text.push_str(&String::from_utf8_lossy(&t)),
            },
            Ok(Event::CData(c)) if field.is_some() => {
                text.push_str(&String::from_utf8_lossy(&c));
            }
            Ok(Event::End(_)) => {
                if let Some(d) = entry_depth {
                    if depth == d + 1 {
                        if let (Some(f), Some(entry)) = (field.take(), entries.last_mut()) {
                            entry.store(f, &text);
                        }
                    } else if depth == d {
                        entry_depth = None;
                    }
                }
                depth = depth.saturating_sub(1);
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                tracing::debug!(error = %e, "Raw entry scan stopped on malformed XML");
                return None;
            }
            _ => {}
        }
        buf.clear();
    }

    Some(entries)
}
