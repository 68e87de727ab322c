//! Full-article text extraction.
//!
//! Used only when a feed entry has no usable summary and extraction is
//! enabled. The page is fetched once and the readable body is taken from the
//! first selector that yields paragraph text:
//!
//! 1. `article p`
//! 2. `main p` / `[role=main] p`
//! 3. any `p`

use crate::error::ExtractionError;
use crate::fetch::{FeedFetcher, FetchAsync};
use itertools::Itertools;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use tracing::{debug, info, instrument, warn};

static CONTENT_SELECTORS: Lazy<Vec<Selector>> = Lazy::new(|| {
    ["article p", "main p, [role=main] p", "p"]
        .into_iter()
        .map(|s| Selector::parse(s).expect("static content selector"))
        .collect()
});

/// Fetch `url` and return its readable main text.
///
/// # Errors
///
/// [`ExtractionError::Fetch`] when the page cannot be retrieved,
/// [`ExtractionError::NoContent`] when no paragraph text is found.
#[instrument(level = "info", skip_all, fields(%url))]
pub async fn fetch_article_text<T: FetchAsync>(
    fetcher: &FeedFetcher<T>,
    url: &str,
) -> Result<String, ExtractionError> {
    let body = fetcher.fetch_page(url).await.map_err(|e| {
        warn!(error = %e, "Article fetch failed");
        e
    })?;
    let html = String::from_utf8_lossy(&body);
    let text = extract_main_text(&html).ok_or(ExtractionError::NoContent)?;
    info!(chars = text.chars().count(), "Extracted article text");
    Ok(text)
}

/// Readable paragraph text of an HTML document, or `None` if there is none.
pub fn extract_main_text(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    for selector in CONTENT_SELECTORS.iter() {
        let text = document
            .select(selector)
            .map(|el| el.text().collect::<Vec<_>>().join(" "))
            .map(|p| p.split_whitespace().join(" "))
            .filter(|p| !p.is_empty())
            .join(" ");
        if !text.is_empty() {
            debug!(chars = text.len(), "Content selector matched");
            return Some(text);
        }
    }
    None
}
