//! Data models for feed entries and the published snapshot.
//!
//! - [`RawEntry`]: one unprocessed feed item, field name → text
//! - [`ArticleRecord`]: a normalized article with its bias signals
//! - [`Snapshot`]: the consolidated, deduplicated output of one run
//!
//! Field order on the serialized types is part of the output contract, so the
//! struct fields are declared in the order downstream consumers expect.

use chrono::{DateTime, FixedOffset, SecondsFormat};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// An unprocessed feed item as produced by the feed parser.
///
/// Keys are element local names (`title`, `link`, `pubDate`, `updated`,
/// `description`, ...). Values are entity-decoded and trimmed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawEntry {
    fields: HashMap<String, String>,
}

impl RawEntry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a field unless it is already present. The first occurrence wins.
    pub fn insert_first(&mut self, key: &str, value: String) {
        self.fields.entry(key.to_string()).or_insert(value);
    }

    /// Non-empty value of `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .get(key)
            .map(|v| v.as_str())
            .filter(|v| !v.trim().is_empty())
    }

    /// First non-empty value among `keys`, in priority order.
    pub fn first_of<'a>(&'a self, keys: &[&str]) -> Option<&'a str> {
        keys.iter().find_map(|k| self.get(k))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RawEntry {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut entry = RawEntry::new();
        for (k, v) in iter {
            let k: String = k.into();
            entry.insert_first(&k, v.into());
        }
        entry
    }
}

/// Whether the article is reporting or commentary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArticleType {
    News,
    Opinion,
}

/// Coarse lexical subjectivity bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubjectivityHint {
    Low,
    Medium,
    High,
}

/// Editorial-bias signals attached to every article.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiasReport {
    pub article_type: ArticleType,
    /// Compound polarity in `[-1, 1]`, rounded to 3 decimals.
    pub sentiment: f64,
    pub subjectivity_hint: SubjectivityHint,
}

/// A normalized article.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleRecord {
    /// SHA-1 hex digest of the URL, or of the title when there is no URL.
    pub id: String,
    /// Serialized as `null` when absent, never omitted.
    pub url: Option<String>,
    pub title: String,
    #[serde(with = "iso8601")]
    pub published_at: DateTime<FixedOffset>,
    /// Display name of the feed the article came from.
    pub section: String,
    pub summary_auto: String,
    pub bias_heuristic: BiasReport,
}

/// The single artifact produced per run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub source: String,
    #[serde(with = "iso8601")]
    pub generated_at: DateTime<FixedOffset>,
    /// IANA timezone name every timestamp is rendered in.
    pub timezone: String,
    /// Newest first, deduplicated.
    pub items: Vec<ArticleRecord>,
}

/// Render a timestamp as ISO-8601 with an explicit offset (`+00:00`, never `Z`).
pub fn to_iso8601(dt: &DateTime<FixedOffset>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::AutoSi, false)
}

mod iso8601 {
    use chrono::{DateTime, FixedOffset};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(dt: &DateTime<FixedOffset>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::to_iso8601(dt))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<FixedOffset>, D::Error> {
        let raw = String::deserialize(d)?;
        DateTime::parse_from_rfc3339(&raw).map_err(serde::de::Error::custom)
    }
}
