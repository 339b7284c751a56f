//! HTTP market data adapter.
//!
//! Talks to a provider exposing:
//!
//! - `GET {base}/v1/symbols/{symbol}` -> `{symbol, tradable, name?}`
//! - `GET {base}/v1/prices/{symbol}` -> `{price, as_of}`
//! - `GET {base}/v1/trading-hours/{symbol}` -> `{is_open, opens_at?, closes_at?}`

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;

use crate::application::ports::{
    MarketDataError, MarketDataPort, PriceQuote, SymbolInfo, TradingHours,
};
use crate::domain::shared::Symbol;

/// Default `Retry-After` when a 429 carries none.
const DEFAULT_RETRY_AFTER_SECS: u64 = 1;

/// HTTP adapter configuration.
#[derive(Debug, Clone)]
pub struct HttpMarketDataConfig {
    /// Provider base URL, without trailing slash.
    pub base_url: String,
    /// Bearer credential; empty for none.
    pub api_key: String,
    /// Per-request deadline.
    pub timeout: Duration,
}

/// Market data provider reached over HTTP.
pub struct HttpMarketDataAdapter {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
    timeout: Duration,
}

impl std::fmt::Debug for HttpMarketDataAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpMarketDataAdapter")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl HttpMarketDataAdapter {
    /// Create a new HTTP market data adapter.
    ///
    /// # Errors
    ///
    /// Returns `ConnectionError` if the HTTP client cannot be built.
    pub fn new(config: &HttpMarketDataConfig) -> Result<Self, MarketDataError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| MarketDataError::ConnectionError {
                message: e.to_string(),
            })?;

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            timeout: config.timeout,
        })
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        resource: &str,
        symbol: &Symbol,
    ) -> Result<T, MarketDataError> {
        let url = format!("{}/v1/{resource}/{}", self.base_url, symbol.as_str());

        let mut request = self.http_client.get(&url);
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                MarketDataError::Timeout {
                    timeout_ms: self.timeout.as_millis() as u64,
                }
            } else {
                MarketDataError::ConnectionError {
                    message: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        match status {
            StatusCode::NOT_FOUND => {
                return Err(MarketDataError::SymbolNotFound {
                    symbol: symbol.to_string(),
                });
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(MarketDataError::AuthenticationFailed);
            }
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after_secs = response
                    .headers()
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
                return Err(MarketDataError::RateLimited { retry_after_secs });
            }
            s if !s.is_success() => {
                let body = response.text().await.unwrap_or_default();
                return Err(MarketDataError::DataUnavailable {
                    message: format!("{resource} request failed ({status}): {body}"),
                });
            }
            _ => {}
        }

        response
            .json()
            .await
            .map_err(|e| MarketDataError::DataUnavailable {
                message: format!("Failed to parse {resource} response: {e}"),
            })
    }
}

#[async_trait]
impl MarketDataPort for HttpMarketDataAdapter {
    async fn symbol_info(&self, symbol: &Symbol) -> Result<SymbolInfo, MarketDataError> {
        self.fetch("symbols", symbol).await
    }

    async fn current_price(&self, symbol: &Symbol) -> Result<PriceQuote, MarketDataError> {
        self.fetch("prices", symbol).await
    }

    async fn trading_hours(&self, symbol: &Symbol) -> Result<TradingHours, MarketDataError> {
        self.fetch("trading-hours", symbol).await
    }
}
