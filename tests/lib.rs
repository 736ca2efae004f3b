// Shared fixtures for validation and fallback behavior tests
use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

pub use tickvet_core::{
    provider::{
        FallbackProvider, HealthStatus, PriceLookupBatch, ProviderCapabilities, ProviderId,
        ProviderPriceRecord, ScrapeSnapshot, SourceError,
    },
    BoundsTable, FallbackResolver, InvalidReason, RawObservation, RowValidator, Symbol,
    TradingPipeline,
};

pub fn row(symbol: &str) -> RawObservation {
    RawObservation::new(symbol)
}

/// Configurable in-memory provider for exercising resolver behavior.
pub struct StubProvider {
    id: ProviderId,
    capabilities: ProviderCapabilities,
    records: BTreeMap<String, ProviderPriceRecord>,
    delay: Option<Duration>,
    fail_message: Option<String>,
}

impl StubProvider {
    pub fn simple(id: ProviderId) -> Self {
        Self {
            id,
            capabilities: ProviderCapabilities::simple_lookup_only(),
            records: BTreeMap::new(),
            delay: None,
            fail_message: None,
        }
    }

    pub fn scraping(id: ProviderId) -> Self {
        Self {
            capabilities: ProviderCapabilities::scrape_only(),
            ..Self::simple(id)
        }
    }

    pub fn with_price(mut self, symbol: &str, price: f64) -> Self {
        self.records.insert(
            symbol.to_owned(),
            ProviderPriceRecord {
                price: Some(price),
                volume_24h: Some(1.0e6),
                change_24h: Some(0.1),
            },
        );
        self
    }

    pub fn with_record(mut self, symbol: &str, record: ProviderPriceRecord) -> Self {
        self.records.insert(symbol.to_owned(), record);
        self
    }

    /// Every call fails with an unavailable error.
    pub fn failing(mut self, message: &str) -> Self {
        self.fail_message = Some(message.to_owned());
        self
    }

    /// Every call sleeps this long before responding.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    async fn respond<T>(&self, payload: T) -> Result<T, SourceError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = &self.fail_message {
            return Err(SourceError::unavailable(message.clone()));
        }
        Ok(payload)
    }
}

impl FallbackProvider for StubProvider {
    fn id(&self) -> ProviderId {
        self.id
    }

    fn capabilities(&self) -> ProviderCapabilities {
        self.capabilities
    }

    fn simple_lookup<'a>(
        &'a self,
        symbols: Vec<Symbol>,
    ) -> Pin<Box<dyn Future<Output = Result<PriceLookupBatch, SourceError>> + Send + 'a>> {
        let _ = symbols;
        Box::pin(async move {
            self.respond(PriceLookupBatch {
                records: self.records.clone(),
            })
            .await
        })
    }

    fn scrape<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<ScrapeSnapshot, SourceError>> + Send + 'a>> {
        Box::pin(async move {
            self.respond(ScrapeSnapshot {
                cryptocurrencies: self.records.clone(),
            })
            .await
        })
    }

    fn health<'a>(&'a self) -> Pin<Box<dyn Future<Output = HealthStatus> + Send + 'a>> {
        Box::pin(async move { HealthStatus::healthy() })
    }
}
