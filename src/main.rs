//! # CBC Feed Snapshot
//!
//! Builds a single JSON snapshot of recent CBC News articles from a set of
//! configured RSS/Atom feeds. Each article gets a normalized local
//! timestamp, a sentence-bounded extractive summary and a lightweight bias
//! heuristic (article type, sentiment, subjectivity).
//!
//! ## Usage
//!
//! ```sh
//! cbc_feed_snapshot -c config.yml -o data/latest.json
//! ```
//!
//! ## Pipeline
//!
//! 1. **Gate**: exit early unless the local hour is allowed (or `--force`)
//! 2. **Fetch**: download each section feed with retries and polite pauses
//! 3. **Normalize**: parse entries, filter to the recency window, summarize and score
//! 4. **Aggregate**: sort newest first and drop cross-section duplicates
//! 5. **Output**: atomically write the snapshot JSON

use chrono::Utc;
use clap::Parser;
use std::error::Error;
use std::path::Path;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod aggregate;
mod bias;
mod cli;
mod config;
mod dates;
mod error;
mod fetch;
mod models;
mod outputs;
mod scrapers;
mod section;
mod summarize;
mod utils;

use aggregate::Aggregator;
use bias::BiasHeuristic;
use cli::Cli;
use config::{load_config, should_run};
use fetch::FeedFetcher;
use outputs::json;
use utils::ensure_writable_parent;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("cbc_feed_snapshot starting up");

    let args = Cli::parse();
    debug!(config = %args.config, output = %args.output, force = args.force, "Parsed CLI arguments");

    let config = match load_config(&args.config).await {
        Ok(c) => c,
        Err(e) => {
            error!(path = %args.config, error = %e, "Failed to load configuration");
            return Err(e.into());
        }
    };

    let now = Utc::now().with_timezone(&config.timezone);
    if !should_run(&config, &now, args.force) {
        return Ok(());
    }

    // Early check: fail before any network work if the output can't be written
    let output = Path::new(&args.output);
    if let Err(e) = ensure_writable_parent(output).await {
        error!(
            path = %args.output,
            error = %e,
            "Output directory is not writable (fix perms or choose a different path)"
        );
        return Err(e);
    }

    let bias = BiasHeuristic::new()?;
    let fetcher = FeedFetcher::http(config.fetch.clone())?;
    let aggregator = Aggregator::new(&config, &fetcher, &bias);

    let snapshot = tokio::select! {
        snapshot = aggregator.run(now) => snapshot,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted; no snapshot written");
            return Ok(());
        }
    };

    if let Err(e) = json::write_snapshot(&snapshot, output).await {
        error!(error = %e, "Failed to write snapshot");
        return Err(e);
    }

    let elapsed = start_time.elapsed();
    info!(
        items = snapshot.items.len(),
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );

    Ok(())
}
