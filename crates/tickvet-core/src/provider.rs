//! Fallback provider contract and request/response types.
//!
//! Secondary sources are capability-polymorphic: a provider exposes either
//! a batch simple-price lookup or a generic market scrape that returns a
//! nested cryptocurrency map. The resolver dispatches on the declared
//! capability instead of probing at runtime.
//!
//! | Capability | Method | Response |
//! |------------|--------|----------|
//! | Simple lookup | [`FallbackProvider::simple_lookup`] | [`PriceLookupBatch`] |
//! | Generic scrape | [`FallbackProvider::scrape`] | [`ScrapeSnapshot`] |

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Symbol, ValidationError};

/// Canonical secondary-provider identifiers.
///
/// `ALL` doubles as the fixed secondary preference order: a resolver chain
/// starts with the preferred provider and continues through the rest in
/// this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    Coingecko,
    Coinmarketcap,
}

impl ProviderId {
    pub const ALL: [Self; 2] = [Self::Coingecko, Self::Coinmarketcap];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Coingecko => "coingecko",
            Self::Coinmarketcap => "coinmarketcap",
        }
    }

    /// Source label applied to rows synthesized from this provider.
    pub fn fallback_tag(self) -> String {
        format!("{}_fallback", self.as_str())
    }
}

impl Display for ProviderId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "coingecko" => Ok(Self::Coingecko),
            "coinmarketcap" => Ok(Self::Coinmarketcap),
            other => Err(ValidationError::InvalidProvider {
                value: other.to_owned(),
            }),
        }
    }
}

/// Provider capability used for dispatch and error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    SimpleLookup,
    Scrape,
}

impl Capability {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SimpleLookup => "simple_lookup",
            Self::Scrape => "scrape",
        }
    }
}

impl Display for Capability {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capability matrix declared by a fallback provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderCapabilities {
    pub simple_lookup: bool,
    pub scrape: bool,
}

impl ProviderCapabilities {
    pub const fn simple_lookup_only() -> Self {
        Self {
            simple_lookup: true,
            scrape: false,
        }
    }

    pub const fn scrape_only() -> Self {
        Self {
            simple_lookup: false,
            scrape: true,
        }
    }

    pub const fn supports(self, capability: Capability) -> bool {
        match capability {
            Capability::SimpleLookup => self.simple_lookup,
            Capability::Scrape => self.scrape,
        }
    }
}

/// Health state used by provider snapshots and the `providers` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Runtime provider health snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub state: HealthState,
    pub rate_available: bool,
}

impl HealthStatus {
    pub const fn new(state: HealthState, rate_available: bool) -> Self {
        Self {
            state,
            rate_available,
        }
    }

    pub const fn healthy() -> Self {
        Self::new(HealthState::Healthy, true)
    }
}

/// Registered provider summary for status output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProviderSnapshot {
    pub id: ProviderId,
    pub capabilities: ProviderCapabilities,
    pub health: HealthStatus,
}

/// Provider-level error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceErrorKind {
    UnsupportedCapability,
    Unavailable,
    RateLimited,
    InvalidRequest,
    Internal,
}

/// Structured provider error used by resolver fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceError {
    kind: SourceErrorKind,
    message: String,
    retryable: bool,
}

impl SourceError {
    pub fn unsupported_capability(capability: Capability) -> Self {
        Self {
            kind: SourceErrorKind::UnsupportedCapability,
            message: format!("capability '{capability}' is not supported by this provider"),
            retryable: false,
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Unavailable,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::RateLimited,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::InvalidRequest,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Internal,
            message: message.into(),
            retryable: false,
        }
    }

    pub const fn kind(&self) -> SourceErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn retryable(&self) -> bool {
        self.retryable
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            SourceErrorKind::UnsupportedCapability => "source.unsupported_capability",
            SourceErrorKind::Unavailable => "source.unavailable",
            SourceErrorKind::RateLimited => "source.rate_limited",
            SourceErrorKind::InvalidRequest => "source.invalid_request",
            SourceErrorKind::Internal => "source.internal",
        }
    }
}

impl Display for SourceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code())
    }
}

impl std::error::Error for SourceError {}

/// Normalized per-symbol record returned by either capability.
///
/// The aliases absorb the key-naming variants the upstream APIs actually
/// use, so both capabilities deserialize into the same shape.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderPriceRecord {
    #[serde(default, alias = "current_price", alias = "usd")]
    pub price: Option<f64>,
    #[serde(default, alias = "usd_24h_vol", alias = "total_volume")]
    pub volume_24h: Option<f64>,
    #[serde(
        default,
        alias = "usd_24h_change",
        alias = "price_change_percentage_24h"
    )]
    pub change_24h: Option<f64>,
}

/// Batch result of a simple price lookup, keyed by canonical symbol.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceLookupBatch {
    pub records: BTreeMap<String, ProviderPriceRecord>,
}

/// Snapshot produced by the generic scrape capability.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScrapeSnapshot {
    pub cryptocurrencies: BTreeMap<String, ProviderPriceRecord>,
}

/// Secondary source adapter contract.
///
/// Implementations must be `Send + Sync`; the resolver may poll several
/// providers from the same task set. A provider that does not support a
/// capability returns [`SourceError::unsupported_capability`] from the
/// corresponding method rather than panicking.
pub trait FallbackProvider: Send + Sync {
    /// Unique provider identifier.
    fn id(&self) -> ProviderId;

    /// Declared capability matrix; the resolver dispatches on this.
    fn capabilities(&self) -> ProviderCapabilities;

    /// Batch price lookup for a symbol set.
    fn simple_lookup<'a>(
        &'a self,
        symbols: Vec<Symbol>,
    ) -> Pin<Box<dyn Future<Output = Result<PriceLookupBatch, SourceError>> + Send + 'a>>;

    /// Generic market snapshot with a nested cryptocurrency map.
    fn scrape<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<ScrapeSnapshot, SourceError>> + Send + 'a>>;

    /// Current provider health, used for status output.
    fn health<'a>(&'a self) -> Pin<Box<dyn Future<Output = HealthStatus> + Send + 'a>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn price_record_accepts_key_naming_variants() {
        let coingecko: ProviderPriceRecord =
            serde_json::from_str(r#"{"usd": 0.08, "usd_24h_vol": 1e9, "usd_24h_change": -1.2}"#)
                .expect("must parse");
        assert_eq!(coingecko.price, Some(0.08));
        assert_eq!(coingecko.volume_24h, Some(1e9));
        assert_eq!(coingecko.change_24h, Some(-1.2));

        let market: ProviderPriceRecord = serde_json::from_str(
            r#"{"current_price": 63000.0, "total_volume": 2e10, "price_change_percentage_24h": 0.4}"#,
        )
        .expect("must parse");
        assert_eq!(market.price, Some(63_000.0));
        assert_eq!(market.volume_24h, Some(2e10));
        assert_eq!(market.change_24h, Some(0.4));
    }

    #[test]
    fn provider_id_parses_case_insensitively() {
        assert_eq!(
            "CoinGecko".parse::<ProviderId>().expect("must parse"),
            ProviderId::Coingecko
        );
        assert!("kraken".parse::<ProviderId>().is_err());
    }

    #[test]
    fn fallback_tag_is_provider_name_suffixed() {
        assert_eq!(ProviderId::Coinmarketcap.fallback_tag(), "coinmarketcap_fallback");
    }
}
