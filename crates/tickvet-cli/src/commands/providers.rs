use std::time::Instant;

use serde::Serialize;

use tickvet_core::{ProviderSnapshot, ResolverBuilder};

use crate::error::CliError;

use super::CommandResult;

#[derive(Debug, Serialize)]
struct ProvidersResponseData {
    providers: Vec<ProviderSnapshot>,
}

pub async fn run(live: bool) -> Result<CommandResult, CliError> {
    let started = Instant::now();

    let builder = if live {
        ResolverBuilder::new().with_real_clients()
    } else {
        ResolverBuilder::new().with_mock_mode()
    };
    let resolver = builder.build();
    let providers = resolver.snapshots().await;

    let data = serde_json::to_value(ProvidersResponseData { providers })?;

    Ok(CommandResult {
        data,
        latency_ms: started.elapsed().as_millis() as u64,
        ..CommandResult::default()
    })
}
