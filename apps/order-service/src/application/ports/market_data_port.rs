//! Market Data Port (Driven Port)
//!
//! Interface for the market-data provider consulted during order acceptance.
//! This is a secondary/outbound port used by application use cases.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::shared::{Price, Symbol, Timestamp};

/// What the provider knows about a symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolInfo {
    /// Symbol (e.g., "AAPL").
    pub symbol: Symbol,
    /// Whether the symbol may be traded.
    pub tradable: bool,
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
}

/// Current price of a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceQuote {
    /// Last price.
    pub price: Price,
    /// When the provider observed it.
    pub as_of: Timestamp,
}

/// Trading session state for a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradingHours {
    /// Whether the market is open now.
    pub is_open: bool,
    /// Next (or current) session open.
    #[serde(default)]
    pub opens_at: Option<Timestamp>,
    /// Next (or current) session close.
    #[serde(default)]
    pub closes_at: Option<Timestamp>,
}

/// Market data error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MarketDataError {
    /// Connection error.
    #[error("Market data connection error: {message}")]
    ConnectionError {
        /// Error details.
        message: String,
    },

    /// Authentication failed.
    #[error("Market data authentication failed")]
    AuthenticationFailed,

    /// Symbol not found.
    #[error("Symbol not found: {symbol}")]
    SymbolNotFound {
        /// The unknown symbol.
        symbol: String,
    },

    /// Data unavailable.
    #[error("Market data unavailable: {message}")]
    DataUnavailable {
        /// Error details.
        message: String,
    },

    /// The provider did not answer in time.
    #[error("Market data request timed out after {timeout_ms} ms")]
    Timeout {
        /// Deadline that elapsed.
        timeout_ms: u64,
    },

    /// Rate limited.
    #[error("Rate limited, retry after {retry_after_secs} seconds")]
    RateLimited {
        /// Seconds to wait before retrying.
        retry_after_secs: u64,
    },
}

/// Market data port.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MarketDataPort: Send + Sync {
    /// Look up a symbol.
    ///
    /// # Errors
    ///
    /// Returns `SymbolNotFound` for unknown symbols, or a provider failure.
    async fn symbol_info(&self, symbol: &Symbol) -> Result<SymbolInfo, MarketDataError>;

    /// Fetch the current price.
    ///
    /// # Errors
    ///
    /// Returns error if the provider fails.
    async fn current_price(&self, symbol: &Symbol) -> Result<PriceQuote, MarketDataError>;

    /// Fetch the trading session state.
    ///
    /// # Errors
    ///
    /// Returns error if the provider fails.
    async fn trading_hours(&self, symbol: &Symbol) -> Result<TradingHours, MarketDataError>;
}
