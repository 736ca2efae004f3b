//! End-to-end orchestration: validate, repair via fallback, block the rest.
//!
//! Per run, every symbol moves through
//! `unseen -> validated-ok | validated-bad -> [fallback-attempted] ->
//! resolved | blocked`. Nothing persists across runs; each invocation
//! starts from a fresh batch.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

use serde::Serialize;

use crate::domain::{InvalidReason, RawObservation, ValidatedObservation};
use crate::provider::ProviderId;
use crate::resolver::{FallbackResolver, SourceFailure};
use crate::validator::RowValidator;

/// Sentinel emitted downstream for a symbol that could not be trusted this
/// cycle; consumers must skip trade-signal generation for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockedSentinel {
    pub coin: String,
    pub blocked: bool,
    pub reason: &'static str,
}

/// Final pipeline output.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineReport {
    /// Trustworthy rows, primary observations first, accepted fallback
    /// rows appended after them.
    pub cleaned: Vec<ValidatedObservation>,
    /// Symbols with no trustworthy price this cycle.
    pub blocked: BTreeSet<String>,
    /// Symbol-level stuck-feed flags carried over from validation.
    pub reasons: BTreeMap<String, InvalidReason>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub provider_failures: Vec<SourceFailure>,
    pub latency_ms: u64,
}

impl PipelineReport {
    /// `{coin, blocked: true, reason: "data_quality_blocked"}` rows for
    /// signal consumers.
    pub fn blocked_sentinels(&self) -> Vec<BlockedSentinel> {
        self.blocked
            .iter()
            .map(|symbol| BlockedSentinel {
                coin: symbol.clone(),
                blocked: true,
                reason: "data_quality_blocked",
            })
            .collect()
    }
}

/// Validation plus fallback, wired together.
pub struct TradingPipeline {
    validator: RowValidator,
    resolver: FallbackResolver,
    prefer: ProviderId,
}

impl Default for TradingPipeline {
    fn default() -> Self {
        Self::new(
            RowValidator::default(),
            FallbackResolver::default(),
            ProviderId::Coingecko,
        )
    }
}

impl TradingPipeline {
    pub fn new(validator: RowValidator, resolver: FallbackResolver, prefer: ProviderId) -> Self {
        Self {
            validator,
            resolver,
            prefer,
        }
    }

    /// Process one batch of raw rows.
    ///
    /// Data-quality problems never fail this call; an untrustworthy symbol
    /// is a normal terminal state surfaced in `blocked`, not an error.
    pub async fn process(&self, rows: &[RawObservation]) -> PipelineReport {
        let started = Instant::now();

        let validation = self.validator.validate(rows);
        let mut cleaned = validation.cleaned;
        let needs_fallback = validation.needs_fallback;
        let reasons = validation.reasons;

        let mut provider_failures = Vec::new();
        if !needs_fallback.is_empty() {
            let fallback = self
                .resolver
                .fallback_prices(&needs_fallback, self.prefer)
                .await;
            provider_failures = fallback.failures;

            if !fallback.rows.is_empty() {
                // fallback rows arrive normalized; this pass re-applies the
                // bounds and positivity checks before they are trusted
                let revalidated = self.validator.validate(&fallback.rows);
                cleaned.extend(revalidated.cleaned);
            }
        }

        let mut blocked = BTreeSet::new();
        for symbol in &needs_fallback {
            let recovered = cleaned.iter().any(|row| row.symbol == *symbol);
            if !recovered {
                blocked.insert(symbol.clone());
            }
        }
        // stuck feeds stay blocked even when a replacement row made it
        // through; see the reasons map for the flag
        for (symbol, reason) in &reasons {
            if reason.is_stuck_feed() {
                blocked.insert(symbol.clone());
            }
        }

        PipelineReport {
            cleaned,
            blocked,
            reasons,
            provider_failures,
            latency_ms: elapsed_ms(started),
        }
    }
}

/// Convenience entry point with default wiring (offline providers,
/// builtin bounds, CoinGecko preferred).
pub async fn process_trading_rows(rows: &[RawObservation]) -> PipelineReport {
    TradingPipeline::default().process(rows).await
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis().min(u128::from(u64::MAX)) as u64
}
