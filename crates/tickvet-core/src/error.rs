use thiserror::Error;

/// Validation and contract errors exposed by `tickvet-core`.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("symbol cannot be empty")]
    EmptySymbol,
    #[error("symbol length {len} exceeds max {max}")]
    SymbolTooLong { len: usize, max: usize },
    #[error("symbol contains invalid character '{ch}' at index {index}")]
    SymbolInvalidChar { ch: char, index: usize },

    #[error("invalid provider '{value}', expected one of coingecko, coinmarketcap")]
    InvalidProvider { value: String },

    #[error("timestamp is not a recognized ISO-8601 form: '{value}'")]
    TimestampUnparseable { value: String },

    #[error("bounds range must satisfy 0 < low < high (got {low}..{high})")]
    InvalidBoundsRange { low: f64, high: f64 },
}
