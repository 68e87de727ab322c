//! RSS/Atom parsing into [`RawEntry`] maps.
//!
//! Every direct child of an `<item>` or `<entry>` element becomes a field
//! keyed by its local name, so `pubDate`, `published`, `updated` and
//! `dc:date` (stored as `date`) all survive for the date priority list.
//! Atom `<link href="..."/>` elements (no `rel` or `rel="alternate"`) fill
//! the `link` field.

use crate::error::ParseError;
use crate::models::RawEntry;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use tracing::{debug, instrument};

const FEED_ROOTS: &[&str] = &["rss", "RDF", "feed"];
const ENTRY_ELEMENTS: &[&str] = &["item", "entry"];

/// Parse a feed document.
///
/// # Errors
///
/// [`ParseError::Feed`] for malformed XML or a root element that is not a feed.
#[instrument(level = "debug", skip_all, fields(bytes = bytes.len()))]
pub fn parse_feed(bytes: &[u8]) -> Result<Vec<RawEntry>, ParseError> {
    let mut reader = Reader::from_reader(bytes);
    let mut buf = Vec::new();

    let mut seen_root = false;
    let mut entries = Vec::new();
    let mut current: Option<RawEntry> = None;
    // Element depth below the open entry element.
    let mut depth = 0usize;
    let mut field: Option<(String, String)> = None;

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| ParseError::Feed(format!("at byte {}: {e}", reader.buffer_position())))?;

        match event {
            Event::Eof => break,
            Event::Start(ref e) | Event::Empty(ref e) if !seen_root => {
                let name = local_name(e);
                if !FEED_ROOTS.contains(&name.as_str()) {
                    return Err(ParseError::Feed(format!("unexpected root element <{name}>")));
                }
                seen_root = true;
            }
            Event::Start(e) => {
                let name = local_name(&e);
                if let Some(entry) = current.as_mut() {
                    depth += 1;
                    if depth == 1 {
                        if name == "link" {
                            if let Some(href) = link_href(&e) {
                                entry.insert_first("link", href);
                            }
                        }
                        field = Some((name, String::new()));
                    }
                } else if ENTRY_ELEMENTS.contains(&name.as_str()) {
                    current = Some(RawEntry::new());
                    depth = 0;
                }
            }
            Event::Empty(e) => {
                if let Some(entry) = current.as_mut() {
                    if depth == 0 && local_name(&e) == "link" {
                        if let Some(href) = link_href(&e) {
                            entry.insert_first("link", href);
                        }
                    }
                }
            }
            Event::Text(t) => {
                if let Some((_, text)) = field.as_mut() {
                    text.push_str(&html_escape::decode_html_entities(&String::from_utf8_lossy(&t)));
                }
            }
            Event::CData(c) => {
                if let Some((_, text)) = field.as_mut() {
                    text.push_str(&String::from_utf8_lossy(&c));
                }
            }
            Event::GeneralRef(r) => {
                if let Some((_, text)) = field.as_mut() {
                    let reference = format!("&{};", String::from_utf8_lossy(&r));
                    text.push_str(&html_escape::decode_html_entities(&reference));
                }
            }
            Event::End(_) => {
                if depth > 0 {
                    if depth == 1 {
                        if let (Some(entry), Some((name, text))) = (current.as_mut(), field.take()) {
                            entry.insert_first(&name, text.trim().to_string());
                        }
                    }
                    depth -= 1;
                } else if let Some(entry) = current.take() {
                    debug!(title = ?entry.get("title"), "Parsed feed entry");
                    entries.push(entry);
                }
            }
            _ => {}
        }
        buf.clear();
    }

    if !seen_root {
        return Err(ParseError::Feed("document has no root element".to_string()));
    }
    Ok(entries)
}

fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

/// `href` of an Atom link that points at the article itself.
fn link_href(e: &BytesStart<'_>) -> Option<String> {
    let mut href = None;
    let mut rel = None;
    for attr in e.attributes().flatten() {
        let value = html_escape::decode_html_entities(&String::from_utf8_lossy(&attr.value)).into_owned();
        match attr.key.local_name().as_ref() {
            b"href" => href = Some(value),
            b"rel" => rel = Some(value),
            _ => {}
        }
    }
    match rel.as_deref() {
        None | Some("alternate") => href.filter(|h| !h.trim().is_empty()).map(|h| h.trim().to_string()),
        Some(_) => None,
    }
}
