mod providers;
mod vet;

use crate::cli::{Cli, Command};
use crate::error::CliError;

/// Shared command output consumed by the renderer and exit-code logic.
#[derive(Debug, Clone, Default)]
pub struct CommandResult {
    pub data: serde_json::Value,
    pub warnings: Vec<String>,
    pub latency_ms: u64,
    pub quality_failed: bool,
    pub blocked_count: usize,
}

pub async fn run(cli: &Cli) -> Result<CommandResult, CliError> {
    match &cli.command {
        Command::Vet(args) => vet::run(args, cli.live).await,
        Command::Providers => providers::run(cli.live).await,
    }
}
