use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::domain::UtcDateTime;

/// Loosely-typed scalar as it arrives from upstream feeds.
///
/// Feeds report numbers as numbers, as formatted strings (`"$1,234.50"`,
/// `"2.5B"`), or not at all; deserialization preserves whichever shape was
/// sent so the numeric parser can decide.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Number(f64),
    Text(String),
}

impl From<f64> for RawValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i64> for RawValue {
    fn from(value: i64) -> Self {
        Self::Number(value as f64)
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for RawValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// One reported price sample prior to validation.
///
/// Every field except `symbol` is optional; unknown upstream keys are
/// ignored on deserialization rather than rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawObservation {
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub price: Option<RawValue>,
    #[serde(default)]
    pub volume: Option<RawValue>,
    #[serde(default)]
    pub change_24h: Option<RawValue>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
}

impl RawObservation {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            ..Self::default()
        }
    }

    pub fn with_price(mut self, price: impl Into<RawValue>) -> Self {
        self.price = Some(price.into());
        self
    }

    pub fn with_volume(mut self, volume: impl Into<RawValue>) -> Self {
        self.volume = Some(volume.into());
        self
    }

    pub fn with_change_24h(mut self, change: impl Into<RawValue>) -> Self {
        self.change_24h = Some(change.into());
        self
    }

    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = Some(currency.into());
        self
    }

    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = Some(timestamp.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// Reason code attached to a row or symbol that failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidReason {
    PriceNan,
    PriceNonpositive,
    OutOfBounds,
    BoundsEvalError,
    XSymbolSamePrice,
    #[serde(rename = "constant_price_last_5")]
    ConstantPriceLast5,
}

impl InvalidReason {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PriceNan => "price_nan",
            Self::PriceNonpositive => "price_nonpositive",
            Self::OutOfBounds => "out_of_bounds",
            Self::BoundsEvalError => "bounds_eval_error",
            Self::XSymbolSamePrice => "x_symbol_same_price",
            Self::ConstantPriceLast5 => "constant_price_last_5",
        }
    }

    /// Symbol-level stuck-feed flag, as opposed to a per-row verdict.
    pub const fn is_stuck_feed(self) -> bool {
        matches!(self, Self::ConstantPriceLast5)
    }
}

impl Display for InvalidReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A raw observation after normalization, carrying its validation verdict.
///
/// The reason is write-once: the first tag sticks and later passes cannot
/// overwrite it. A corrected observation is a new row, never a mutation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidatedObservation {
    pub symbol: String,
    pub price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change_24h: Option<f64>,
    pub currency: String,
    pub timestamp: UtcDateTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    invalid_reason: Option<InvalidReason>,
}

impl ValidatedObservation {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn normalized(
        symbol: String,
        price: Option<f64>,
        volume: Option<f64>,
        change_24h: Option<f64>,
        currency: String,
        timestamp: UtcDateTime,
        source: Option<String>,
    ) -> Self {
        Self {
            symbol,
            price,
            volume,
            change_24h,
            currency,
            timestamp,
            source,
            invalid_reason: None,
        }
    }

    /// Record a verdict. The first non-null reason wins.
    pub(crate) fn tag(&mut self, reason: InvalidReason) {
        if self.invalid_reason.is_none() {
            self.invalid_reason = Some(reason);
        }
    }

    pub const fn reason(&self) -> Option<InvalidReason> {
        self.invalid_reason
    }

    pub const fn is_valid(&self) -> bool {
        self.invalid_reason.is_none()
    }

    /// Rebuild a raw row from this observation, e.g. to feed a later
    /// pipeline run with a previous run's cleaned output.
    pub fn to_raw(&self) -> RawObservation {
        RawObservation {
            symbol: self.symbol.clone(),
            price: self.price.map(RawValue::Number),
            volume: self.volume.map(RawValue::Number),
            change_24h: self.change_24h.map(RawValue::Number),
            currency: Some(self.currency.clone()),
            timestamp: Some(self.timestamp.format_rfc3339()),
            source: self.source.clone(),
        }
    }
}
