//! CoinGecko adapter: batch simple-price lookups over the public JSON API.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::Deserialize;

use crate::circuit_breaker::{CircuitBreaker, CircuitState};
use crate::http_client::{HttpAuth, HttpClient, HttpRequest, NoopHttpClient};
use crate::policy::ProviderPolicy;
use crate::provider::{
    Capability, FallbackProvider, HealthState, HealthStatus, PriceLookupBatch,
    ProviderCapabilities, ProviderId, ProviderPriceRecord, ScrapeSnapshot, SourceError,
};
use crate::throttling::ThrottleQueue;
use crate::Symbol;

const SIMPLE_PRICE_URL: &str = "https://api.coingecko.com/api/v3/simple/price";

/// Known symbol -> CoinGecko coin id mappings. The simple-price endpoint is
/// keyed by coin id, not ticker.
const SYMBOL_TO_ID: [(&str, &str); 12] = [
    ("BTC", "bitcoin"),
    ("ETH", "ethereum"),
    ("BNB", "binancecoin"),
    ("SOL", "solana"),
    ("XRP", "ripple"),
    ("ADA", "cardano"),
    ("DOGE", "dogecoin"),
    ("DOT", "polkadot"),
    ("LTC", "litecoin"),
    ("AVAX", "avalanche-2"),
    ("LINK", "chainlink"),
    ("MATIC", "matic-network"),
];

/// CoinGecko adapter supporting both real API calls and offline mode.
pub struct CoingeckoProvider {
    http_client: Arc<dyn HttpClient>,
    auth: HttpAuth,
    policy: ProviderPolicy,
    throttle: ThrottleQueue,
    circuit_breaker: Arc<CircuitBreaker>,
    use_real_api: bool,
}

impl Default for CoingeckoProvider {
    fn default() -> Self {
        let policy = ProviderPolicy::coingecko();
        Self {
            http_client: Arc::new(NoopHttpClient),
            auth: HttpAuth::None,
            throttle: ThrottleQueue::from_policy(&policy),
            policy,
            circuit_breaker: Arc::new(CircuitBreaker::default()),
            use_real_api: false,
        }
    }
}

impl CoingeckoProvider {
    pub fn with_http_client(http_client: Arc<dyn HttpClient>, auth: HttpAuth) -> Self {
        let use_real_api = !http_client.is_mock();
        Self {
            http_client,
            auth,
            use_real_api,
            ..Self::default()
        }
    }

    pub fn with_circuit_breaker(circuit_breaker: Arc<CircuitBreaker>) -> Self {
        Self {
            circuit_breaker,
            ..Self::default()
        }
    }

    async fn fetch_real(&self, symbols: &[Symbol]) -> Result<PriceLookupBatch, SourceError> {
        let mut ids = Vec::new();
        let mut id_to_symbol = BTreeMap::new();
        for symbol in symbols {
            match coin_id(symbol) {
                Some(id) => {
                    ids.push(id);
                    id_to_symbol.insert(id, symbol.as_str().to_owned());
                }
                None => {
                    tracing::debug!(symbol = symbol.as_str(), "no coingecko id mapping");
                }
            }
        }
        if ids.is_empty() {
            return Ok(PriceLookupBatch::default());
        }

        let endpoint = format!(
            "{SIMPLE_PRICE_URL}?ids={}&vs_currencies=usd&include_24hr_vol=true&include_24hr_change=true",
            urlencoding::encode(&ids.join(","))
        );
        let body = self.execute_guarded(&endpoint).await?;

        let payload: BTreeMap<String, CoingeckoSimplePrice> = serde_json::from_str(&body)
            .map_err(|error| {
                SourceError::internal(format!("failed to parse coingecko response: {error}"))
            })?;

        let mut records = BTreeMap::new();
        for (id, entry) in payload {
            if let Some(symbol) = id_to_symbol.get(id.as_str()) {
                records.insert(
                    symbol.clone(),
                    ProviderPriceRecord {
                        price: entry.usd,
                        volume_24h: entry.usd_24h_vol,
                        change_24h: entry.usd_24h_change,
                    },
                );
            }
        }
        Ok(PriceLookupBatch { records })
    }

    /// Offline lookup serving the deterministic catalog. Runs through the
    /// same guards as the real path so throttling and breaker behavior are
    /// observable in tests.
    async fn fetch_offline(&self, symbols: &[Symbol]) -> Result<PriceLookupBatch, SourceError> {
        self.execute_guarded(SIMPLE_PRICE_URL).await?;

        let mut records = BTreeMap::new();
        for symbol in symbols {
            records.insert(symbol.as_str().to_owned(), offline_record(symbol));
        }
        Ok(PriceLookupBatch { records })
    }

    async fn execute_guarded(&self, endpoint: &str) -> Result<String, SourceError> {
        if let Err(wait) = self.throttle.acquire() {
            return Err(SourceError::rate_limited(format!(
                "coingecko rate budget exhausted; retry in {}ms",
                wait.as_millis()
            )));
        }
        if !self.circuit_breaker.allow_request() {
            return Err(SourceError::unavailable(
                "coingecko circuit breaker is open; skipping upstream call",
            ));
        }

        let mut attempt = 0;
        loop {
            let request = HttpRequest::get(endpoint)
                .with_auth(&self.auth)
                .with_timeout_ms(self.policy.call_timeout.as_millis() as u64);

            match self.http_client.execute(request).await {
                Ok(response) if response.is_success() => {
                    self.circuit_breaker.record_success();
                    return Ok(response.body);
                }
                Ok(response) => {
                    self.circuit_breaker.record_failure();
                    let transient = response.status == 429 || response.status >= 500;
                    match self.policy.retry_backoff.delay(attempt) {
                        Some(delay) if transient => tokio::time::sleep(delay).await,
                        _ => {
                            return Err(SourceError::unavailable(format!(
                                "coingecko returned status {}",
                                response.status
                            )))
                        }
                    }
                }
                Err(error) => {
                    self.circuit_breaker.record_failure();
                    match self.policy.retry_backoff.delay(attempt) {
                        Some(delay) if error.retryable() => tokio::time::sleep(delay).await,
                        _ => {
                            return Err(SourceError::unavailable(format!(
                                "coingecko transport error: {}",
                                error.message()
                            )))
                        }
                    }
                }
            }
            attempt += 1;
        }
    }
}

impl FallbackProvider for CoingeckoProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Coingecko
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities::simple_lookup_only()
    }

    fn simple_lookup<'a>(
        &'a self,
        symbols: Vec<Symbol>,
    ) -> Pin<Box<dyn Future<Output = Result<PriceLookupBatch, SourceError>> + Send + 'a>> {
        Box::pin(async move {
            if symbols.is_empty() {
                return Err(SourceError::invalid_request(
                    "coingecko lookup requires at least one symbol",
                ));
            }

            if self.use_real_api {
                self.fetch_real(&symbols).await
            } else {
                self.fetch_offline(&symbols).await
            }
        })
    }

    fn scrape<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<ScrapeSnapshot, SourceError>> + Send + 'a>> {
        Box::pin(async move { Err(SourceError::unsupported_capability(Capability::Scrape)) })
    }

    fn health<'a>(&'a self) -> Pin<Box<dyn Future<Output = HealthStatus> + Send + 'a>> {
        Box::pin(async move {
            match self.circuit_breaker.state() {
                CircuitState::Closed => HealthStatus::healthy(),
                CircuitState::HalfOpen => HealthStatus::new(HealthState::Degraded, true),
                CircuitState::Open => HealthStatus::new(HealthState::Unhealthy, false),
            }
        })
    }
}

fn coin_id(symbol: &Symbol) -> Option<&'static str> {
    SYMBOL_TO_ID
        .iter()
        .find(|(ticker, _)| *ticker == symbol.as_str())
        .map(|(_, id)| *id)
}

/// Deterministic offline record for a symbol; majors come from a small
/// catalog so the values sit inside their sanity ranges, everything else
/// gets a seed-derived price.
fn offline_record(symbol: &Symbol) -> ProviderPriceRecord {
    const CATALOG: [(&str, f64, f64); 8] = [
        ("BTC", 67_250.0, 2.8e10),
        ("ETH", 3_180.0, 1.4e10),
        ("BNB", 585.0, 1.9e9),
        ("SOL", 152.0, 2.6e9),
        ("XRP", 0.52, 1.1e9),
        ("ADA", 0.44, 3.8e8),
        ("DOGE", 0.12, 7.5e8),
        ("LTC", 84.0, 4.2e8),
    ];

    if let Some((_, price, volume)) = CATALOG
        .iter()
        .find(|(ticker, _, _)| *ticker == symbol.as_str())
    {
        return ProviderPriceRecord {
            price: Some(*price),
            volume_24h: Some(*volume),
            change_24h: Some(-0.8),
        };
    }

    let seed = symbol_seed(symbol);
    ProviderPriceRecord {
        price: Some(1.0 + (seed % 900) as f64 / 10.0),
        volume_24h: Some(1e6 + (seed % 10_000) as f64 * 1e3),
        change_24h: Some(((seed % 100) as f64 - 50.0) / 10.0),
    }
}

fn symbol_seed(symbol: &Symbol) -> u64 {
    symbol.as_str().bytes().fold(0_u64, |acc, byte| {
        acc.wrapping_mul(33).wrapping_add(byte as u64)
    })
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct CoingeckoSimplePrice {
    #[serde(default)]
    usd: Option<f64>,
    #[serde(default)]
    usd_24h_vol: Option<f64>,
    #[serde(default)]
    usd_24h_change: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http_client::{HttpError, HttpResponse};
    use crate::provider::SourceErrorKind;
    use std::future::Future;
    use std::sync::Mutex;
    use std::task::{Context, Poll, RawWaker, RawWakerVTable, Waker};

    #[derive(Debug)]
    struct CannedHttpClient {
        response: Result<HttpResponse, HttpError>,
        requests: Mutex<Vec<HttpRequest>>,
    }

    impl CannedHttpClient {
        fn with_body(body: &str) -> Self {
            Self {
                response: Ok(HttpResponse::ok_json(body)),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            Self {
                response: Err(HttpError::non_retryable("upstream refused")),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn recorded(&self) -> Vec<HttpRequest> {
            self.requests
                .lock()
                .expect("request store should not be poisoned")
                .clone()
        }
    }

    impl HttpClient for CannedHttpClient {
        fn execute<'a>(
            &'a self,
            request: HttpRequest,
        ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
            self.requests
                .lock()
                .expect("request store should not be poisoned")
                .push(request);
            let response = self.response.clone();
            Box::pin(async move { response })
        }
    }

    #[test]
    fn real_response_is_remapped_from_coin_ids_to_symbols() {
        let client = Arc::new(CannedHttpClient::with_body(
            r#"{"bitcoin":{"usd":64000.5,"usd_24h_vol":2.1e10,"usd_24h_change":1.4}}"#,
        ));
        let provider = CoingeckoProvider::with_http_client(client.clone(), HttpAuth::None);

        let batch = block_on(
            provider.simple_lookup(vec![Symbol::parse("BTC").expect("valid symbol")]),
        )
        .expect("lookup should succeed");

        let record = batch.records.get("BTC").expect("BTC record present");
        assert_eq!(record.price, Some(64_000.5));

        let requests = client.recorded();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].url.contains("ids=bitcoin"));
    }

    #[test]
    fn offline_lookup_covers_every_requested_symbol() {
        let provider = CoingeckoProvider::default();
        let symbols = vec![
            Symbol::parse("BTC").expect("valid symbol"),
            Symbol::parse("FLOKI").expect("valid symbol"),
        ];

        let batch = block_on(provider.simple_lookup(symbols)).expect("lookup should succeed");
        assert_eq!(batch.records.len(), 2);
        assert!(batch.records["BTC"].price.expect("price present") > 0.0);
        assert!(batch.records["FLOKI"].price.expect("price present") > 0.0);
    }

    #[test]
    fn scrape_capability_is_refused() {
        let provider = CoingeckoProvider::default();
        let error = block_on(provider.scrape()).expect_err("scrape must fail");
        assert_eq!(error.kind(), SourceErrorKind::UnsupportedCapability);
    }

    #[test]
    fn repeated_transport_failures_open_the_breaker() {
        let client = Arc::new(CannedHttpClient::failing());
        let provider = CoingeckoProvider::with_http_client(client, HttpAuth::None);
        let symbols = vec![Symbol::parse("BTC").expect("valid symbol")];

        for _ in 0..3 {
            let error = block_on(provider.simple_lookup(symbols.clone()))
                .expect_err("call should fail");
            assert_eq!(error.kind(), SourceErrorKind::Unavailable);
        }

        let health = block_on(provider.health());
        assert_eq!(health.state, HealthState::Unhealthy);
        assert!(!health.rate_available);

        let error =
            block_on(provider.simple_lookup(symbols)).expect_err("breaker should block request");
        assert!(error.message().contains("circuit breaker is open"));
    }

    fn block_on<F>(future: F) -> F::Output
    where
        F: Future,
    {
        let waker = noop_waker();
        let mut context = Context::from_waker(&waker);
        let mut future = std::pin::pin!(future);

        loop {
            match future.as_mut().poll(&mut context) {
                Poll::Ready(output) => return output,
                Poll::Pending => std::thread::yield_now(),
            }
        }
    }

    fn noop_waker() -> Waker {
        // SAFETY: The vtable functions never dereference the data pointer and are no-op operations.
        unsafe { Waker::from_raw(noop_raw_waker()) }
    }

    fn noop_raw_waker() -> RawWaker {
        RawWaker::new(std::ptr::null(), &NOOP_RAW_WAKER_VTABLE)
    }

    unsafe fn noop_raw_waker_clone(_: *const ()) -> RawWaker {
        noop_raw_waker()
    }

    unsafe fn noop_raw_waker_wake(_: *const ()) {}

    unsafe fn noop_raw_waker_wake_by_ref(_: *const ()) {}

    unsafe fn noop_raw_waker_drop(_: *const ()) {}

    static NOOP_RAW_WAKER_VTABLE: RawWakerVTable = RawWakerVTable::new(
        noop_raw_waker_clone,
        noop_raw_waker_wake,
        noop_raw_waker_wake_by_ref,
        noop_raw_waker_drop,
    );
}
