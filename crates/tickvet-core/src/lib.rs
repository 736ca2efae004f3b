//! # Tickvet Core
//!
//! Trading-data validation and fallback substitution for scraped market
//! feeds.
//!
//! ## Overview
//!
//! Upstream scrapers and JSON APIs deliver price observations of wildly
//! varying quality: currency-formatted strings, implausible values, stuck
//! feeds repeating the same price, and distinct symbols sharing one price.
//! This crate provides the components that decide which observations to
//! trust:
//!
//! - **Lenient numeric parsing** for heterogeneous raw values
//! - **Per-symbol sanity bounds** with an injectable table
//! - **Batch row validation** with priority-ordered reason codes and
//!   batch-relative anomaly detection
//! - **Capability-polymorphic fallback providers** (CoinGecko,
//!   CoinMarketCap) with throttling and circuit breaking
//! - **A pipeline orchestrator** producing cleaned rows, blocked symbols,
//!   and reason flags
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`bounds`] | Per-symbol price sanity ranges |
//! | [`circuit_breaker`] | Circuit breaker for provider calls |
//! | [`domain`] | Observation rows, reasons, symbols, timestamps |
//! | [`http_client`] | Transport abstraction (reqwest / no-op) |
//! | [`numeric`] | Lenient numeric field parsing |
//! | [`pipeline`] | Validate-fallback-block orchestration |
//! | [`policy`] | Per-provider quota and retry tuning |
//! | [`provider`] | Fallback provider contract |
//! | [`providers`] | Concrete provider adapters |
//! | [`resolver`] | Cross-source fallback resolution |
//! | [`throttling`] | Rate limiting backed by `governor` |
//! | [`validator`] | Batch row validation |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tickvet_core::{process_trading_rows, RawObservation};
//!
//! #[tokio::main]
//! async fn main() {
//!     let rows = vec![
//!         RawObservation::new("BTC").with_price("$50,000"),
//!         RawObservation::new("DOGE").with_price(-1.0),
//!     ];
//!
//!     let report = process_trading_rows(&rows).await;
//!     println!("cleaned: {}, blocked: {:?}", report.cleaned.len(), report.blocked);
//! }
//! ```
//!
//! ## Failure semantics
//!
//! Data-quality problems are data, not errors: unparseable values become
//! `None`, invalid rows become tagged rejections, provider outages become
//! recorded failures, and an unrepairable symbol lands in the blocked set.
//! The pipeline itself never fails on feed content.

pub mod bounds;
pub mod circuit_breaker;
pub mod domain;
pub mod error;
pub mod http_client;
pub mod numeric;
pub mod pipeline;
pub mod policy;
pub mod provider;
pub mod providers;
pub mod resolver;
pub mod throttling;
pub mod validator;

// Re-export commonly used types at crate root for convenience

// Bounds
pub use bounds::{BoundsTable, PriceRange};

// Circuit breaker
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};

// Domain models
pub use domain::{InvalidReason, RawObservation, RawValue, Symbol, UtcDateTime, ValidatedObservation};

// Error types
pub use error::ValidationError;

// HTTP client types
pub use http_client::{
    HttpAuth, HttpClient, HttpError, HttpRequest, HttpResponse, NoopHttpClient, ReqwestHttpClient,
};

// Numeric parsing
pub use numeric::parse_numeric;

// Pipeline
pub use pipeline::{process_trading_rows, BlockedSentinel, PipelineReport, TradingPipeline};

// Provider policies
pub use policy::{BackoffPolicy, ProviderPolicy};

// Provider contract
pub use provider::{
    Capability, FallbackProvider, HealthState, HealthStatus, PriceLookupBatch,
    ProviderCapabilities, ProviderId, ProviderPriceRecord, ProviderSnapshot, ScrapeSnapshot,
    SourceError, SourceErrorKind,
};

// Provider adapters
pub use providers::{CoingeckoProvider, CoinmarketcapProvider};

// Resolver
pub use resolver::{FallbackBatch, FallbackResolver, ResolverBuilder, SourceFailure};

// Throttling
pub use throttling::ThrottleQueue;

// Validator
pub use validator::{RowValidator, ValidationReport};
