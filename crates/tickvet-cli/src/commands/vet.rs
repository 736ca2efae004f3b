use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use std::time::Duration;

use serde::Serialize;

use tickvet_core::{
    BoundsTable, PipelineReport, PriceRange, RawObservation, ResolverBuilder, RowValidator,
    TradingPipeline,
};

use crate::cli::VetArgs;
use crate::error::CliError;

use super::CommandResult;

#[derive(Debug, Serialize)]
struct VetResponseData {
    report: PipelineReport,
    blocked_sentinels: Vec<tickvet_core::BlockedSentinel>,
}

pub async fn run(args: &VetArgs, live: bool) -> Result<CommandResult, CliError> {
    let rows = load_rows(args.input.as_deref())?;

    let bounds = match &args.bounds {
        Some(path) => load_bounds(path)?,
        None => BoundsTable::default(),
    };

    let builder = if live {
        ResolverBuilder::new().with_real_clients()
    } else {
        ResolverBuilder::new().with_mock_mode()
    };
    let resolver = builder
        .with_call_timeout(Duration::from_millis(args.timeout_ms))
        .build();

    let pipeline = TradingPipeline::new(RowValidator::new(bounds), resolver, args.prefer);
    let report = pipeline.process(&rows).await;

    let mut warnings = Vec::new();
    if !report.blocked.is_empty() {
        warnings.push(format!(
            "{} symbol(s) blocked for data quality: {}",
            report.blocked.len(),
            report
                .blocked
                .iter()
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        ));
    }
    for failure in &report.provider_failures {
        warnings.push(format!(
            "provider '{}' failed: {} ({})",
            failure.provider, failure.message, failure.code
        ));
    }

    let latency_ms = report.latency_ms;
    let blocked_count = report.blocked.len();
    let data = serde_json::to_value(VetResponseData {
        blocked_sentinels: report.blocked_sentinels(),
        report,
    })?;

    Ok(CommandResult {
        data,
        warnings,
        latency_ms,
        quality_failed: blocked_count > 0,
        blocked_count,
    })
}

fn load_rows(input: Option<&Path>) -> Result<Vec<RawObservation>, CliError> {
    let raw = match input {
        Some(path) => std::fs::read_to_string(path)?,
        None => {
            let mut buffer = String::new();
            std::io::stdin().read_to_string(&mut buffer)?;
            buffer
        }
    };

    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(&raw).map_err(CliError::from)
}

fn load_bounds(path: &Path) -> Result<BoundsTable, CliError> {
    let raw = std::fs::read_to_string(path)?;
    let entries: HashMap<String, PriceRange> = serde_json::from_str(&raw)?;
    BoundsTable::from_entries(entries).map_err(CliError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn bounds_file_overrides_are_loaded() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, r#"{{"BTC": {{"low": 100.0, "high": 200.0}}}}"#).expect("write");

        let table = load_bounds(file.path()).expect("bounds should load");
        assert_eq!(table.check("BTC", 150.0), Ok(true));
        assert_eq!(table.check("BTC", 50_000.0), Ok(false));
    }

    #[test]
    fn invalid_bounds_file_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, r#"{{"BTC": {{"low": 200.0, "high": 100.0}}}}"#).expect("write");

        assert!(load_bounds(file.path()).is_err());
    }
}
