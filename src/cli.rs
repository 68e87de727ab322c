//! Command-line interface definitions.
//!
//! All run behaviour lives in the YAML config; the CLI only locates the
//! config and output files and can bypass the schedule gate.

use clap::Parser;

/// Command-line arguments for the snapshot builder.
///
/// # Examples
///
/// ```sh
/// # Scheduled run using ./config.yml, writing data/latest.json
/// cbc_feed_snapshot
///
/// # Ad-hoc run outside the allowed hours
/// cbc_feed_snapshot -c deploy/config.yml -o /srv/www/latest.json --force
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Path to the YAML configuration file
    #[arg(short, long, default_value = "config.yml")]
    pub config: String,

    /// Where to write the JSON snapshot
    #[arg(short, long, default_value = "data/latest.json")]
    pub output: String,

    /// Run even when the current hour is not in `allowed_hours`
    #[arg(long)]
    pub force: bool,
}
