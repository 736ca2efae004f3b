//! Batch validation of raw observation rows.
//!
//! Each row gets at most one reason, assigned in priority order: missing
//! price, non-positive price, out-of-bounds price, unevaluable bounds
//! check. Two batch-relative passes follow: a cross-symbol collision check
//! (distinct symbols reporting the same price at the same instant) and a
//! stuck-feed check (a symbol whose trailing prices are frozen). The
//! stuck-feed flag is symbol-level only and never marks individual rows.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::bounds::BoundsTable;
use crate::domain::{InvalidReason, RawObservation, UtcDateTime, ValidatedObservation};
use crate::numeric::parse_numeric;

/// Number of trailing identical prices that marks a feed as stuck.
const STUCK_WINDOW: usize = 5;

/// Classifies observation rows and flags batch-relative anomalies.
#[derive(Debug, Clone, Default)]
pub struct RowValidator {
    bounds: BoundsTable,
}

/// Output of one validation pass.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    /// Rows that passed every per-row check, input order preserved.
    pub cleaned: Vec<ValidatedObservation>,
    /// Rows excluded from `cleaned`, retained with their reason for audit.
    pub rejected: Vec<ValidatedObservation>,
    /// Symbols that need a secondary-source lookup.
    pub needs_fallback: BTreeSet<String>,
    /// Symbol-level stuck-feed flags. Carries only the batch-relative
    /// reason, not every per-row rejection.
    pub reasons: BTreeMap<String, InvalidReason>,
}

impl RowValidator {
    pub fn new(bounds: BoundsTable) -> Self {
        Self { bounds }
    }

    pub fn bounds(&self) -> &BoundsTable {
        &self.bounds
    }

    /// Validate a batch of raw rows.
    ///
    /// Never fails: malformed rows degrade into tagged rejections and the
    /// batch-relative passes skip rows they cannot interpret.
    pub fn validate(&self, rows: &[RawObservation]) -> ValidationReport {
        if rows.is_empty() {
            return ValidationReport::default();
        }

        let assigned_at = UtcDateTime::now();
        let mut observations: Vec<ValidatedObservation> = rows
            .iter()
            .map(|row| self.normalize(row, assigned_at))
            .collect();

        for observation in &mut observations {
            if let Some(reason) = self.row_reason(observation) {
                observation.tag(reason);
            }
        }

        Self::collision_pass(&mut observations);

        let mut report = ValidationReport::default();
        Self::stuck_feed_pass(&observations, &mut report);

        for observation in observations {
            if observation.is_valid() {
                report.cleaned.push(observation);
            } else {
                if !observation.symbol.is_empty() {
                    report.needs_fallback.insert(observation.symbol.clone());
                }
                report.rejected.push(observation);
            }
        }

        report
    }

    fn normalize(&self, row: &RawObservation, assigned_at: UtcDateTime) -> ValidatedObservation {
        let timestamp = row
            .timestamp
            .as_deref()
            .and_then(UtcDateTime::parse_lenient)
            .unwrap_or(assigned_at);

        let currency = row
            .currency
            .as_deref()
            .map(str::trim)
            .filter(|currency| !currency.is_empty())
            .map(str::to_owned)
            .unwrap_or_else(|| String::from("USD"));

        ValidatedObservation::normalized(
            row.symbol.trim().to_ascii_uppercase(),
            parse_numeric(row.price.as_ref()),
            parse_numeric(row.volume.as_ref()),
            parse_numeric(row.change_24h.as_ref()),
            currency,
            timestamp,
            row.source.clone(),
        )
    }

    fn row_reason(&self, observation: &ValidatedObservation) -> Option<InvalidReason> {
        let Some(price) = observation.price else {
            return Some(InvalidReason::PriceNan);
        };
        if price <= 0.0 {
            return Some(InvalidReason::PriceNonpositive);
        }
        match self.bounds.check(&observation.symbol, price) {
            Ok(true) => None,
            Ok(false) => Some(InvalidReason::OutOfBounds),
            Err(_) => Some(InvalidReason::BoundsEvalError),
        }
    }

    /// Marks rows where more than one distinct symbol reports an identical
    /// price at the same instant. Only fills rows with no reason yet.
    fn collision_pass(observations: &mut [ValidatedObservation]) {
        let mut groups: HashMap<(UtcDateTime, u64), Vec<usize>> = HashMap::new();
        for (index, observation) in observations.iter().enumerate() {
            if observation.reason().is_some() {
                continue;
            }
            let Some(price) = observation.price else {
                continue;
            };
            groups
                .entry((observation.timestamp, price.to_bits()))
                .or_default()
                .push(index);
        }

        for indices in groups.into_values() {
            let distinct = {
                let symbols: BTreeSet<&str> = indices
                    .iter()
                    .map(|&index| observations[index].symbol.as_str())
                    .collect();
                symbols.len()
            };
            if distinct < 2 {
                continue;
            }
            for index in indices {
                observations[index].tag(InvalidReason::XSymbolSamePrice);
            }
        }
    }

    /// Flags symbols whose last `STUCK_WINDOW` non-null prices, in timestamp
    /// order, are all identical. Requires at least `STUCK_WINDOW` samples.
    fn stuck_feed_pass(observations: &[ValidatedObservation], report: &mut ValidationReport) {
        let mut by_symbol: BTreeMap<&str, Vec<(UtcDateTime, usize, f64)>> = BTreeMap::new();
        for (index, observation) in observations.iter().enumerate() {
            if observation.symbol.is_empty() {
                continue;
            }
            let Some(price) = observation.price else {
                continue;
            };
            by_symbol
                .entry(observation.symbol.as_str())
                .or_default()
                .push((observation.timestamp, index, price));
        }

        for (symbol, mut samples) in by_symbol {
            if samples.len() < STUCK_WINDOW {
                continue;
            }
            samples.sort_by_key(|&(timestamp, index, _)| (timestamp, index));
            let tail = &samples[samples.len() - STUCK_WINDOW..];
            let frozen = tail.windows(2).all(|pair| pair[0].2 == pair[1].2);
            if frozen {
                report
                    .reasons
                    .insert(symbol.to_owned(), InvalidReason::ConstantPriceLast5);
                report.needs_fallback.insert(symbol.to_owned());
            }
        }
    }
}
