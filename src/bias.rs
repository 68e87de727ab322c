//! Lightweight editorial-bias signals.
//!
//! Three explainable heuristics, none of them a trained classifier:
//!
//! | Signal | Input | Rule |
//! |--------|-------|------|
//! | `article_type` | URL | `Opinion` when a path segment is `opinion` (any case) |
//! | `sentiment` | title + summary | VADER compound score, 3 decimals |
//! | `subjectivity_hint` | title + summary | count of marker words: 0 low, 1-2 medium, 3+ high |
//!
//! [`BiasHeuristic`] is built once at start-up (lexicon and patterns loaded
//! eagerly) and shared by reference; scoring never mutates it.

use crate::models::{ArticleType, BiasReport, SubjectivityHint};
use regex::Regex;
use tracing::instrument;
use url::Url;
use vader_sentiment::SentimentIntensityAnalyzer;

const FIRST_PERSON: &str = r"(?i)\b(I|we|me|us|my|our|mine|ours)\b";
const MODAL_VERBS: &str = r"(?i)\b(should|would|could|must|might|may|ought)\b";
const EVALUATIVES: &str =
    r"(?i)\b(important|significant|remarkable|terrible|wonderful|excellent|poor|good|bad)\b";

pub struct BiasHeuristic {
    analyzer: SentimentIntensityAnalyzer<'static>,
    markers: [Regex; 3],
}

impl std::fmt::Debug for BiasHeuristic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BiasHeuristic")
            .field("markers", &self.markers.iter().map(Regex::as_str).collect::<Vec<_>>())
            .finish()
    }
}

impl BiasHeuristic {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            analyzer: SentimentIntensityAnalyzer::new(),
            markers: [
                Regex::new(FIRST_PERSON)?,
                Regex::new(MODAL_VERBS)?,
                Regex::new(EVALUATIVES)?,
            ],
        })
    }

    /// Score one article. `url` may be empty.
    #[instrument(level = "debug", skip_all, fields(%url))]
    pub fn compute(&self, url: &str, title: &str, summary: &str) -> BiasReport {
        let text = format!("{title} {summary}");
        BiasReport {
            article_type: article_type(url),
            sentiment: round3(self.sentiment(text.trim())),
            subjectivity_hint: self.subjectivity(&text),
        }
    }

    /// VADER compound polarity in `[-1, 1]`.
    pub fn sentiment(&self, text: &str) -> f64 {
        if text.trim().is_empty() {
            return 0.0;
        }
        let scores = self.analyzer.polarity_scores(text);
        scores
            .get("compound")
            .copied()
            .unwrap_or(0.0)
            .clamp(-1.0, 1.0)
    }

    pub fn subjectivity(&self, text: &str) -> SubjectivityHint {
        let count: usize = self.markers.iter().map(|re| re.find_iter(text).count()).sum();
        match count {
            0 => SubjectivityHint::Low,
            1..=2 => SubjectivityHint::Medium,
            _ => SubjectivityHint::High,
        }
    }
}

pub fn article_type(url: &str) -> ArticleType {
    let is_opinion = match Url::parse(url) {
        Ok(parsed) => parsed
            .path_segments()
            .is_some_and(|mut segs| segs.any(|s| s.eq_ignore_ascii_case("opinion"))),
        Err(_) => url.to_lowercase().contains("/opinion/"),
    };
    if is_opinion {
        ArticleType::Opinion
    } else {
        ArticleType::News
    }
}

fn round3(x: f64) -> f64 {
    let r = (x * 1000.0).round() / 1000.0;
    // avoid serializing -0.0
    if r == 0.0 { 0.0 } else { r }
}
