//! CLI argument definitions for tickvet.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `vet` | Validate observation rows and repair failures via fallback |
//! | `providers` | List fallback providers with capabilities and health |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--pretty` | `false` | Pretty-print JSON output |
//! | `--strict` | `false` | Exit non-zero when symbols end up blocked |
//! | `--live` | `false` | Query real upstreams instead of the offline catalog |
//!
//! # Examples
//!
//! ```bash
//! # Vet a batch file offline
//! tickvet vet rows.json --pretty
//!
//! # Vet stdin against real providers, preferring CoinMarketCap
//! cat rows.json | tickvet vet --live --prefer coinmarketcap
//!
//! # Fail the CI job if anything got blocked
//! tickvet vet rows.json --strict
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use tickvet_core::ProviderId;

/// Tickvet - trading-data validation and fallback CLI
///
/// Classifies scraped price observations, repairs untrustworthy symbols
/// from secondary providers, and reports what had to be blocked.
#[derive(Debug, Parser)]
#[command(
    name = "tickvet",
    author,
    version,
    about = "Trading-data validation and fallback CLI"
)]
pub struct Cli {
    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// Treat blocked symbols as a failure (exit code 5).
    ///
    /// Useful for CI/CD pipelines that gate on data quality.
    #[arg(long, global = true, default_value_t = false)]
    pub strict: bool,

    /// Query real upstream providers instead of the offline catalog.
    #[arg(long, global = true, default_value_t = false)]
    pub live: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Validate a batch of observation rows and repair failures via fallback.
    Vet(VetArgs),
    /// List registered fallback providers with capabilities and health.
    Providers,
}

#[derive(Debug, Args)]
pub struct VetArgs {
    /// Path to a JSON array of raw observation rows; reads stdin when omitted.
    pub input: Option<PathBuf>,

    /// Preferred fallback provider, tried before the rest of the chain.
    #[arg(long, default_value = "coingecko")]
    pub prefer: ProviderId,

    /// JSON file of `{"SYMBOL": {"low": .., "high": ..}}` entries that
    /// override the builtin bounds table.
    #[arg(long)]
    pub bounds: Option<PathBuf>,

    /// Per-provider call timeout in milliseconds.
    #[arg(long, default_value_t = 15_000)]
    pub timeout_ms: u64,
}
