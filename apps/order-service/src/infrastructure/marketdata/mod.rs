//! Market Data Adapters
//!
//! Implementations of `MarketDataPort`: an HTTP client for a remote
//! provider and a fixed-price provider for development.

mod http_client;
mod static_provider;

pub use http_client::{HttpMarketDataAdapter, HttpMarketDataConfig};
pub use static_provider::StaticMarketData;
