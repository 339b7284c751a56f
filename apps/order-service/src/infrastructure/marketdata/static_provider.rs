//! Fixed-price market data for development and tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use rust_decimal::Decimal;

use crate::application::ports::{
    MarketDataError, MarketDataPort, PriceQuote, SymbolInfo, TradingHours,
};
use crate::domain::shared::{Price, Symbol, Timestamp};

/// Market data served from a configured price table.
///
/// Symbols absent from the table are unknown. The market state applies to
/// every symbol and can be flipped at runtime.
#[derive(Debug)]
pub struct StaticMarketData {
    prices: RwLock<HashMap<Symbol, Price>>,
    market_open: AtomicBool,
}

impl Default for StaticMarketData {
    fn default() -> Self {
        Self::new()
    }
}

impl StaticMarketData {
    /// Create a provider with an open market and no symbols.
    #[must_use]
    pub fn new() -> Self {
        Self {
            prices: RwLock::new(HashMap::new()),
            market_open: AtomicBool::new(true),
        }
    }

    /// Create a provider from a symbol -> price table.
    #[must_use]
    pub fn from_prices<I, S>(prices: I, market_open: bool) -> Self
    where
        I: IntoIterator<Item = (S, Decimal)>,
        S: AsRef<str>,
    {
        let prices = prices
            .into_iter()
            .map(|(symbol, price)| (Symbol::new(symbol.as_ref()), Price::new(price)))
            .collect();
        Self {
            prices: RwLock::new(prices),
            market_open: AtomicBool::new(market_open),
        }
    }

    /// Builder-style price insertion.
    #[must_use]
    pub fn with_price(self, symbol: &str, price: Decimal) -> Self {
        self.set_price(symbol, price);
        self
    }

    /// Set or replace a symbol's price.
    pub fn set_price(&self, symbol: &str, price: Decimal) {
        self.prices.write().insert(Symbol::new(symbol), Price::new(price));
    }

    /// Open or close the market.
    pub fn set_market_open(&self, open: bool) {
        self.market_open.store(open, Ordering::Release);
    }

    fn price_of(&self, symbol: &Symbol) -> Result<Price, MarketDataError> {
        self.prices
            .read()
            .get(symbol)
            .copied()
            .ok_or_else(|| MarketDataError::SymbolNotFound {
                symbol: symbol.to_string(),
            })
    }
}

#[async_trait]
impl MarketDataPort for StaticMarketData {
    async fn symbol_info(&self, symbol: &Symbol) -> Result<SymbolInfo, MarketDataError> {
        self.price_of(symbol)?;
        Ok(SymbolInfo {
            symbol: symbol.clone(),
            tradable: true,
            name: None,
        })
    }

    async fn current_price(&self, symbol: &Symbol) -> Result<PriceQuote, MarketDataError> {
        Ok(PriceQuote {
            price: self.price_of(symbol)?,
            as_of: Timestamp::now(),
        })
    }

    async fn trading_hours(&self, symbol: &Symbol) -> Result<TradingHours, MarketDataError> {
        self.price_of(symbol)?;
        Ok(TradingHours {
            is_open: self.market_open.load(Ordering::Acquire),
            opens_at: None,
            closes_at: None,
        })
    }
}
