//! Concrete secondary-provider adapters.
//!
//! Both adapters default to a deterministic offline mode backed by
//! [`NoopHttpClient`](crate::http_client::NoopHttpClient) and switch to
//! real upstream calls when constructed with a non-mock transport.

mod coingecko;
mod coinmarketcap;

pub use coingecko::CoingeckoProvider;
pub use coinmarketcap::CoinmarketcapProvider;
