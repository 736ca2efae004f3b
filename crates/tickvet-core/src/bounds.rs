//! Per-symbol price sanity ranges.
//!
//! The table is fixed at construction and injected into the validator, so
//! deployments can tune ranges (or load them from JSON) without touching
//! the validation logic. Symbols without an explicit entry fall back to a
//! wide default range.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{Symbol, ValidationError};

/// Inclusive price range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceRange {
    pub low: f64,
    pub high: f64,
}

impl PriceRange {
    /// Invariant: `0 < low < high`, both finite.
    pub fn new(low: f64, high: f64) -> Result<Self, ValidationError> {
        if !(low > 0.0 && low < high && high.is_finite()) {
            return Err(ValidationError::InvalidBoundsRange { low, high });
        }
        Ok(Self { low, high })
    }

    pub fn contains(self, price: f64) -> bool {
        price >= self.low && price <= self.high
    }
}

const DEFAULT_LOW: f64 = 0.000_001;
const DEFAULT_HIGH: f64 = 10_000_000.0;

const BUILTIN_RANGES: [(&str, f64, f64); 10] = [
    ("BTC", 10.0, 2_000_000.0),
    ("ETH", 1.0, 100_000.0),
    ("BNB", 0.1, 20_000.0),
    ("SOL", 0.01, 20_000.0),
    ("XRP", 0.000_1, 1_000.0),
    ("ADA", 0.000_1, 1_000.0),
    ("DOGE", 0.000_01, 100.0),
    ("DOT", 0.01, 5_000.0),
    ("LTC", 0.1, 50_000.0),
    ("AVAX", 0.01, 20_000.0),
];

/// Static sanity ranges keyed by canonical symbol.
#[derive(Debug, Clone)]
pub struct BoundsTable {
    entries: HashMap<String, PriceRange>,
    default_range: PriceRange,
}

impl Default for BoundsTable {
    fn default() -> Self {
        let mut table = Self::empty();
        for (symbol, low, high) in BUILTIN_RANGES {
            table
                .insert(symbol, low, high)
                .expect("builtin ranges are valid");
        }
        table
    }
}

impl BoundsTable {
    /// A table with no explicit entries; every symbol gets the wide default.
    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
            default_range: PriceRange {
                low: DEFAULT_LOW,
                high: DEFAULT_HIGH,
            },
        }
    }

    /// Build a table from deserialized entries, e.g. a JSON bounds file.
    pub fn from_entries(
        entries: impl IntoIterator<Item = (String, PriceRange)>,
    ) -> Result<Self, ValidationError> {
        let mut table = Self::empty();
        for (symbol, range) in entries {
            table.insert(&symbol, range.low, range.high)?;
        }
        Ok(table)
    }

    /// Add or override the range for one symbol.
    pub fn insert(&mut self, symbol: &str, low: f64, high: f64) -> Result<(), ValidationError> {
        let symbol = Symbol::parse(symbol)?;
        let range = PriceRange::new(low, high)?;
        self.entries.insert(symbol.as_str().to_owned(), range);
        Ok(())
    }

    pub fn range_for(&self, symbol: &Symbol) -> PriceRange {
        self.entries
            .get(symbol.as_str())
            .copied()
            .unwrap_or(self.default_range)
    }

    /// Inclusive bounds check against the symbol's range.
    ///
    /// `Err` means the check itself could not be evaluated because the
    /// symbol is malformed, which the validator reports separately from an
    /// out-of-range price.
    pub fn check(&self, symbol: &str, price: f64) -> Result<bool, ValidationError> {
        let symbol = Symbol::parse(symbol)?;
        Ok(self.range_for(&symbol).contains(price))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
