//! CoinMarketCap adapter: generic market scrape returning a nested
//! cryptocurrency map.

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

const LISTINGS_URL: &str =
    "https://pro-api.coinmarketcap.com/v1/cryptocurrency/listings/latest";
const LISTINGS_LIMIT: usize = 100;

/// CoinMarketCap adapter supporting both real API calls and offline mode.
pub struct CoinmarketcapProvider {
    http_client: Arc<dyn HttpClient>,
    auth: HttpAuth,
    policy: ProviderPolicy,
    throttle: ThrottleQueue,
    circuit_breaker: Arc<CircuitBreaker>,
    use_real_api: bool,
}

impl Default for CoinmarketcapProvider {
    fn default() -> Self {
        let policy = ProviderPolicy::coinmarketcap();
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

impl CoinmarketcapProvider {
    /// Real-mode constructor; `api_key` goes out as `X-CMC_PRO_API_KEY`.
    pub fn with_http_client(http_client: Arc<dyn HttpClient>, api_key: impl Into<String>) -> Self {
        let use_real_api = !http_client.is_mock();
        Self {
            http_client,
            auth: HttpAuth::Header {
                name: String::from("X-CMC_PRO_API_KEY"),
                value: api_key.into(),
            },
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

    async fn fetch_real(&self) -> Result<ScrapeSnapshot, SourceError> {
        let endpoint = format!(
            "{LISTINGS_URL}?limit={}&convert={}",
            LISTINGS_LIMIT,
            urlencoding::encode("USD")
        );
        let body = self.execute_guarded(&endpoint).await?;

        let payload: CmcListingsResponse = serde_json::from_str(&body).map_err(|error| {
            SourceError::internal(format!("failed to parse coinmarketcap response: {error}"))
        })?;

        if let Some(message) = payload.status.and_then(|status| status.error_message) {
            return Err(SourceError::unavailable(format!(
                "coinmarketcap API error: {message}"
            )));
        }

        let mut cryptocurrencies = BTreeMap::new();
        for listing in payload.data {
            let Ok(symbol) = Symbol::parse(&listing.symbol) else {
                continue;
            };
            let Some(quote) = listing.quote.and_then(|quote| quote.usd) else {
                continue;
            };
            cryptocurrencies.insert(
                symbol.as_str().to_owned(),
                ProviderPriceRecord {
                    price: quote.price,
                    volume_24h: quote.volume_24h,
                    change_24h: quote.percent_change_24h,
                },
            );
        }
        Ok(ScrapeSnapshot { cryptocurrencies })
    }

    /// Offline snapshot serving the deterministic catalog through the same
    /// guard path as real calls.
    async fn fetch_offline(&self) -> Result<ScrapeSnapshot, SourceError> {
        self.execute_guarded(LISTINGS_URL).await?;

        let cryptocurrencies = OFFLINE_LISTINGS
            .iter()
            .map(|(symbol, price, volume, change)| {
                (
                    String::from(*symbol),
                    ProviderPriceRecord {
                        price: Some(*price),
                        volume_24h: Some(*volume),
                        change_24h: Some(*change),
                    },
                )
            })
            .collect();
        Ok(ScrapeSnapshot { cryptocurrencies })
    }

    async fn execute_guarded(&self, endpoint: &str) -> Result<String, SourceError> {
        if let Err(wait) = self.throttle.acquire() {
            return Err(SourceError::rate_limited(format!(
                "coinmarketcap rate budget exhausted; retry in {}ms",
                wait.as_millis()
            )));
        }
        if !self.circuit_breaker.allow_request() {
            return Err(SourceError::unavailable(
                "coinmarketcap circuit breaker is open; skipping upstream call",
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
                                "coinmarketcap returned status {}",
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
                                "coinmarketcap transport error: {}",
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

impl FallbackProvider for CoinmarketcapProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Coinmarketcap
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities::scrape_only()
    }

    fn simple_lookup<'a>(
        &'a self,
        symbols: Vec<Symbol>,
    ) -> Pin<Box<dyn Future<Output = Result<PriceLookupBatch, SourceError>> + Send + 'a>> {
        let _ = symbols;
        Box::pin(async move {
            Err(SourceError::unsupported_capability(Capability::SimpleLookup))
        })
    }

    fn scrape<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<ScrapeSnapshot, SourceError>> + Send + 'a>> {
        Box::pin(async move {
            if self.use_real_api {
                self.fetch_real().await
            } else {
                self.fetch_offline().await
            }
        })
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

const OFFLINE_LISTINGS: [(&str, f64, f64, f64); 10] = [
    ("BTC", 67_410.0, 2.9e10, 0.6),
    ("ETH", 3_195.0, 1.5e10, -0.3),
    ("BNB", 590.0, 2.0e9, 0.1),
    ("SOL", 149.0, 2.4e9, -1.1),
    ("XRP", 0.53, 1.2e9, 0.4),
    ("ADA", 0.45, 4.1e8, -0.2),
    ("DOGE", 0.13, 8.0e8, 2.3),
    ("DOT", 7.2, 2.1e8, -0.6),
    ("LTC", 85.5, 4.4e8, 0.2),
    ("AVAX", 36.8, 5.0e8, -0.9),
];

#[derive(Debug, Clone, Deserialize)]
struct CmcListingsResponse {
    #[serde(default)]
    status: Option<CmcStatus>,
    #[serde(default)]
    data: Vec<CmcListing>,
}

#[derive(Debug, Clone, Deserialize)]
struct CmcStatus {
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct CmcListing {
    symbol: String,
    #[serde(default)]
    quote: Option<CmcQuote>,
}

#[derive(Debug, Clone, Deserialize)]
struct CmcQuote {
    #[serde(rename = "USD", default)]
    usd: Option<CmcUsdQuote>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct CmcUsdQuote {
    #[serde(default)]
    price: Option<f64>,
    #[serde(default)]
    volume_24h: Option<f64>,
    #[serde(default)]
    percent_change_24h: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http_client::HttpResponse;
    use crate::provider::SourceErrorKind;
    use std::future::Future;
    use std::sync::Mutex;
    use std::task::{Context, Poll, RawWaker, RawWakerVTable, Waker};

    #[derive(Debug)]
    struct CannedHttpClient {
        response: HttpResponse,
        requests: Mutex<Vec<HttpRequest>>,
    }

    impl CannedHttpClient {
        fn with_body(body: &str) -> Self {
            Self {
                response: HttpResponse::ok_json(body),
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
        ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, crate::http_client::HttpError>> + Send + 'a>>
        {
            self.requests
                .lock()
                .expect("request store should not be poisoned")
                .push(request);
            let response = self.response.clone();
            Box::pin(async move { Ok(response) })
        }
    }

    #[test]
    fn real_listings_are_flattened_into_the_nested_map() {
        let client = Arc::new(CannedHttpClient::with_body(
            r#"{
                "status": {"error_message": null},
                "data": [
                    {"symbol": "BTC", "quote": {"USD": {"price": 66100.0, "volume_24h": 2.7e10, "percent_change_24h": 0.9}}},
                    {"symbol": "???", "quote": {"USD": {"price": 1.0}}}
                ]
            }"#,
        ));
        let provider = CoinmarketcapProvider::with_http_client(client.clone(), "demo-key");

        let snapshot = block_on(provider.scrape()).expect("scrape should succeed");
        assert_eq!(snapshot.cryptocurrencies.len(), 1);
        assert_eq!(
            snapshot.cryptocurrencies["BTC"].price,
            Some(66_100.0)
        );

        let requests = client.recorded();
        assert_eq!(
            requests[0].headers.get("x-cmc_pro_api_key").map(String::as_str),
            Some("demo-key")
        );
    }

    #[test]
    fn api_error_message_becomes_unavailable() {
        let client = Arc::new(CannedHttpClient::with_body(
            r#"{"status": {"error_message": "API key invalid"}, "data": []}"#,
        ));
        let provider = CoinmarketcapProvider::with_http_client(client, "bad-key");

        let error = block_on(provider.scrape()).expect_err("scrape must fail");
        assert_eq!(error.kind(), SourceErrorKind::Unavailable);
        assert!(error.message().contains("API key invalid"));
    }

    #[test]
    fn offline_snapshot_serves_the_catalog() {
        let provider = CoinmarketcapProvider::default();
        let snapshot = block_on(provider.scrape()).expect("scrape should succeed");
        assert!(snapshot.cryptocurrencies.contains_key("DOGE"));
        assert!(snapshot.cryptocurrencies["DOGE"].price.expect("price") > 0.0);
    }

    #[test]
    fn simple_lookup_capability_is_refused() {
        let provider = CoinmarketcapProvider::default();
        let error = block_on(
            provider.simple_lookup(vec![Symbol::parse("BTC").expect("valid symbol")]),
        )
        .expect_err("lookup must fail");
        assert_eq!(error.kind(), SourceErrorKind::UnsupportedCapability);
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
