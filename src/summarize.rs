//! Extractive summaries for feed descriptions and article bodies.
//!
//! Markup is stripped and entities decoded before the text is split into
//! sentences (Unicode UAX #29 boundaries). Whole sentences are kept until
//! the next one would overflow the limit; when none fit, the cleaned text is
//! hard-truncated instead. Lengths are counted in characters.

use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;
use unicode_segmentation::UnicodeSegmentation;

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").expect("static tag pattern"));

/// Strip tags, decode HTML entities, collapse whitespace runs and trim.
pub fn clean_text(raw: &str) -> String {
    let stripped = TAG_RE.replace_all(raw, " ");
    let decoded = html_escape::decode_html_entities(&stripped);
    decoded.split_whitespace().join(" ")
}

/// Build a summary of at most `max_chars` characters.
///
/// Text that already fits is returned as cleaned. Otherwise the summary is
/// the longest prefix of the cleaned text ending on a sentence boundary, so
/// the spacing between sentences is exactly that of the source.
/// Empty input yields an empty string.
pub fn summarize(text: &str, max_chars: usize) -> String {
    let cleaned = clean_text(text);
    if cleaned.chars().count() <= max_chars {
        return cleaned;
    }

    let mut end = 0usize;
    for (start, sentence) in cleaned.split_sentence_bound_indices() {
        let candidate = start + sentence.trim_end().len();
        if candidate <= end {
            continue;
        }
        if cleaned[..candidate].chars().count() > max_chars {
            break;
        }
        end = candidate;
    }

    if end == 0 {
        take_chars(&cleaned, max_chars).trim_end().to_string()
    } else {
        cleaned[..end].to_string()
    }
}

/// Prefix of `s` holding at most `n` characters.
fn take_chars(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
