//! Machine-readable output envelope.

use serde::Serialize;

use tickvet_core::UtcDateTime;

use crate::commands::CommandResult;
use crate::error::CliError;

/// Metadata attached to every rendered response.
#[derive(Debug, Clone, Serialize)]
pub struct RunMeta {
    pub run_id: String,
    pub generated_at: UtcDateTime,
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// Standard response envelope for tickvet's machine-readable output.
#[derive(Debug, Clone, Serialize)]
pub struct Envelope {
    pub meta: RunMeta,
    pub data: serde_json::Value,
}

pub fn render(result: &CommandResult, pretty: bool) -> Result<(), CliError> {
    let envelope = Envelope {
        meta: RunMeta {
            run_id: uuid::Uuid::new_v4().to_string(),
            generated_at: UtcDateTime::now(),
            latency_ms: result.latency_ms,
            warnings: result.warnings.clone(),
        },
        data: result.data.clone(),
    };

    let rendered = if pretty {
        serde_json::to_string_pretty(&envelope)?
    } else {
        serde_json::to_string(&envelope)?
    };
    println!("{rendered}");
    Ok(())
}
