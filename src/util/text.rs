use std::borrow::Cow;

fn is_stripped_control(c: char) -> bool {
    c == '\u{7f}' || (c.is_ascii_control() && !matches!(c, '\t' | '\n' | '\r'))
}

/// Strip control characters and ANSI CSI sequences from feed-supplied text.
///
/// Feed titles end up printed to a terminal by the CLI, so an attacker-controlled
/// document must not be able to smuggle escape sequences through. Tab, newline
/// and carriage return are kept.
///
/// Returns `Cow::Borrowed` when nothing needs stripping (the common case).
///
/// ```
/// use whackamole::util::strip_control_chars;
///
/// assert_eq!(strip_control_chars("Evil\x1b[31m Feed"), "Evil Feed");
/// assert_eq!(strip_control_chars("plain"), "plain");
/// ```
pub fn strip_control_chars(s: &str) -> Cow<'_, str> {
    if !s.chars().any(is_stripped_control) {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\u{1b}' {
            // CSI: ESC [ params... final byte in 0x40..=0x7e
            if chars.peek() == Some(&'[') {
                chars.next();
                for next in chars.by_ref() {
                    if ('\u{40}'..='\u{7e}').contains(&next) {
                        break;
                    }
                }
            }
            continue;
        }
        if !is_stripped_control(c) {
            out.push(c);
        }
    }
    Cow::Owned(out)
}

/// Wrap width handed to html2text. Lines are re-joined afterwards, so this
/// only needs to exceed any realistic word length.
const RENDER_WIDTH: usize = 10_000;

/// Reduce an HTML fragment to a single-line plain-text snippet.
///
/// Rendering is done by `html2text` without decorations; the result has its
/// whitespace collapsed and control characters stripped.
pub fn html_to_text(html: &str) -> String {
    let rendered = match html2text::config::plain_no_decorate()
        .string_from_read(html.as_bytes(), RENDER_WIDTH)
    {
        Ok(text) => text,
        Err(e) => {
            tracing::debug!(error = %e, "Failed to render HTML snippet");
            return String::new();
        }
    };

    let collapsed = rendered.split_whitespace().collect::<Vec<_>>().join(" ");
    strip_control_chars(&collapsed).into_owned()
}
