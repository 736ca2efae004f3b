//! Cross-source fallback resolution for symbols that failed validation.
//!
//! Providers are tried in preference order: the preferred provider first,
//! then the remaining registered providers in their fixed registration
//! order. Each provider is queried once per pass for every still-unresolved
//! symbol; the first provider that yields a parseable, strictly positive
//! price for a symbol wins that symbol, and later providers are not
//! consulted for it. Provider failures never abort the pass: they are
//! logged, recorded, and the chain moves on.

use std::collections::BTreeSet;
use std::env;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::domain::{RawObservation, RawValue, UtcDateTime};
use crate::http_client::{HttpAuth, ReqwestHttpClient};
use crate::provider::{
    Capability, FallbackProvider, ProviderId, ProviderPriceRecord, ProviderSnapshot, SourceError,
};
use crate::providers::{CoingeckoProvider, CoinmarketcapProvider};
use crate::Symbol;

/// Upper bound on a single provider call, hung upstreams included.
const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(15);

/// One provider failure tolerated during resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceFailure {
    pub provider: ProviderId,
    pub code: &'static str,
    pub message: String,
    pub retryable: bool,
}

impl SourceFailure {
    fn from_error(provider: ProviderId, error: &SourceError) -> Self {
        Self {
            provider,
            code: error.code(),
            message: error.message().to_owned(),
            retryable: error.retryable(),
        }
    }
}

/// Outcome of one fallback pass.
#[derive(Debug, Clone, Default)]
pub struct FallbackBatch {
    /// Replacement rows, tagged `<provider>_fallback` and ready for
    /// re-validation. Symbols with no row here stay blocked.
    pub rows: Vec<RawObservation>,
    /// Provider failures observed along the way.
    pub failures: Vec<SourceFailure>,
}

/// Queries secondary providers for symbols the validator flagged.
pub struct FallbackResolver {
    providers: Vec<Arc<dyn FallbackProvider>>,
    call_timeout: Duration,
}

impl Default for FallbackResolver {
    fn default() -> Self {
        Self::new(vec![
            Arc::new(CoingeckoProvider::default()),
            Arc::new(CoinmarketcapProvider::default()),
        ])
    }
}

impl FallbackResolver {
    /// Registration order doubles as the secondary preference order.
    pub fn new(providers: Vec<Arc<dyn FallbackProvider>>) -> Self {
        Self {
            providers,
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    /// Resolve replacement prices for the given symbols.
    ///
    /// Symbols are deduplicated and upper-cased; unparseable entries are
    /// skipped. The output omits symbols no provider could price, and that
    /// absence is the signal the orchestrator acts on.
    pub async fn fallback_prices(
        &self,
        symbols: &BTreeSet<String>,
        prefer: ProviderId,
    ) -> FallbackBatch {
        let mut batch = FallbackBatch::default();
        if symbols.is_empty() {
            return batch;
        }

        let mut remaining: BTreeSet<Symbol> = BTreeSet::new();
        for raw in symbols {
            match Symbol::parse(raw) {
                Ok(symbol) => {
                    remaining.insert(symbol);
                }
                Err(error) => {
                    tracing::warn!(symbol = raw.as_str(), %error, "skipping unresolvable symbol");
                }
            }
        }

        for provider in self.ordered(prefer) {
            if remaining.is_empty() {
                break;
            }

            let wanted: Vec<Symbol> = remaining.iter().cloned().collect();
            match self.query_provider(provider.as_ref(), &wanted).await {
                Ok(records) => {
                    let resolved_at = UtcDateTime::now();
                    for (symbol, record) in records {
                        let Some(price) = record
                            .price
                            .filter(|price| price.is_finite() && *price > 0.0)
                        else {
                            continue;
                        };
                        batch
                            .rows
                            .push(fallback_row(&symbol, price, &record, provider.id(), resolved_at));
                        remaining.remove(&symbol);
                    }
                }
                Err(error) => {
                    tracing::warn!(
                        provider = provider.id().as_str(),
                        %error,
                        "fallback provider failed"
                    );
                    batch.failures.push(SourceFailure::from_error(provider.id(), &error));
                }
            }
        }

        batch
    }

    /// Health and capability summary for every registered provider.
    pub async fn snapshots(&self) -> Vec<ProviderSnapshot> {
        let mut snapshots = Vec::with_capacity(self.providers.len());
        for provider in &self.providers {
            snapshots.push(ProviderSnapshot {
                id: provider.id(),
                capabilities: provider.capabilities(),
                health: provider.health().await,
            });
        }
        snapshots
    }

    fn ordered(&self, prefer: ProviderId) -> Vec<Arc<dyn FallbackProvider>> {
        let mut chain = Vec::with_capacity(self.providers.len());
        for provider in self.providers.iter().filter(|p| p.id() == prefer) {
            chain.push(Arc::clone(provider));
        }
        for provider in self.providers.iter().filter(|p| p.id() != prefer) {
            chain.push(Arc::clone(provider));
        }
        chain
    }

    /// Dispatch on the provider's declared capability, preferring the
    /// batch simple lookup when both are present.
    async fn query_provider(
        &self,
        provider: &dyn FallbackProvider,
        symbols: &[Symbol],
    ) -> Result<Vec<(Symbol, ProviderPriceRecord)>, SourceError> {
        let capabilities = provider.capabilities();

        if capabilities.supports(Capability::SimpleLookup) {
            let lookup =
                tokio::time::timeout(self.call_timeout, provider.simple_lookup(symbols.to_vec()))
                    .await
                    .map_err(|_| SourceError::unavailable("provider call timed out"))??;

            let mut records = Vec::new();
            for symbol in symbols {
                if let Some(record) = lookup.records.get(symbol.as_str()) {
                    records.push((symbol.clone(), *record));
                }
            }
            return Ok(records);
        }

        if capabilities.supports(Capability::Scrape) {
            let snapshot = tokio::time::timeout(self.call_timeout, provider.scrape())
                .await
                .map_err(|_| SourceError::unavailable("provider call timed out"))??;

            let mut records = Vec::new();
            for symbol in symbols {
                if let Some(record) = snapshot.cryptocurrencies.get(symbol.as_str()) {
                    records.push((symbol.clone(), *record));
                }
            }
            return Ok(records);
        }

        Err(SourceError::invalid_request(
            "provider declares no usable capability",
        ))
    }
}

/// Builder wiring providers with real or offline transports.
///
/// # Environment Variables
///
/// | Provider | Primary | Fallback |
/// |----------|---------|----------|
/// | CoinGecko | `TICKVET_COINGECKO_API_KEY` | `COINGECKO_API_KEY` |
/// | CoinMarketCap | `TICKVET_COINMARKETCAP_API_KEY` | `COINMARKETCAP_API_KEY` |
///
/// CoinGecko works without a key (the free tier); CoinMarketCap falls back
/// to offline mode when no key is present.
#[derive(Debug, Default)]
pub struct ResolverBuilder {
    use_mock: bool,
    coingecko_api_key: Option<String>,
    coinmarketcap_api_key: Option<String>,
    disable_coingecko: bool,
    disable_coinmarketcap: bool,
    call_timeout: Option<Duration>,
}

impl ResolverBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// All providers serve deterministic offline data.
    pub fn with_mock_mode(mut self) -> Self {
        self.use_mock = true;
        self
    }

    /// Configure providers with real transports, reading API keys from the
    /// environment.
    pub fn with_real_clients(mut self) -> Self {
        self.use_mock = false;
        self.coingecko_api_key = env::var("TICKVET_COINGECKO_API_KEY")
            .or_else(|_| env::var("COINGECKO_API_KEY"))
            .ok();
        self.coinmarketcap_api_key = env::var("TICKVET_COINMARKETCAP_API_KEY")
            .or_else(|_| env::var("COINMARKETCAP_API_KEY"))
            .ok();
        self
    }

    pub fn with_coingecko_key(mut self, key: impl Into<String>) -> Self {
        self.coingecko_api_key = Some(key.into());
        self
    }

    pub fn with_coinmarketcap_key(mut self, key: impl Into<String>) -> Self {
        self.coinmarketcap_api_key = Some(key.into());
        self
    }

    pub fn with_coingecko_enabled(mut self, enabled: bool) -> Self {
        self.disable_coingecko = !enabled;
        self
    }

    pub fn with_coinmarketcap_enabled(mut self, enabled: bool) -> Self {
        self.disable_coinmarketcap = !enabled;
        self
    }

    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = Some(call_timeout);
        self
    }

    pub fn build(self) -> FallbackResolver {
        let mut providers: Vec<Arc<dyn FallbackProvider>> = Vec::new();

        if !self.disable_coingecko {
            providers.push(if self.use_mock {
                Arc::new(CoingeckoProvider::default())
            } else {
                let http_client = Arc::new(ReqwestHttpClient::new());
                let auth = match &self.coingecko_api_key {
                    Some(key) => HttpAuth::Header {
                        name: String::from("x-cg-demo-api-key"),
                        value: key.clone(),
                    },
                    None => HttpAuth::None,
                };
                Arc::new(CoingeckoProvider::with_http_client(http_client, auth))
            });
        }

        if !self.disable_coinmarketcap {
            providers.push(if self.use_mock {
                Arc::new(CoinmarketcapProvider::default())
            } else if let Some(key) = &self.coinmarketcap_api_key {
                let http_client = Arc::new(ReqwestHttpClient::new());
                Arc::new(CoinmarketcapProvider::with_http_client(
                    http_client,
                    key.clone(),
                ))
            } else {
                // no key means no real access; offline keeps the chain usable
                Arc::new(CoinmarketcapProvider::default())
            });
        }

        let resolver = if providers.is_empty() {
            FallbackResolver::default()
        } else {
            FallbackResolver::new(providers)
        };

        match self.call_timeout {
            Some(call_timeout) => resolver.with_call_timeout(call_timeout),
            None => resolver,
        }
    }
}

fn fallback_row(
    symbol: &Symbol,
    price: f64,
    record: &ProviderPriceRecord,
    provider: ProviderId,
    resolved_at: UtcDateTime,
) -> RawObservation {
    RawObservation {
        symbol: symbol.as_str().to_owned(),
        price: Some(RawValue::Number(price)),
        volume: record.volume_24h.map(RawValue::Number),
        change_24h: record.change_24h.map(RawValue::Number),
        currency: Some(String::from("USD")),
        timestamp: Some(resolved_at.format_rfc3339()),
        source: Some(provider.fallback_tag()),
    }
}
