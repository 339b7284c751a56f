//! Application Ports (Driver and Driven)
//!
//! Ports define interfaces for interacting with external systems.
//! - **Driver Ports** (Primary/Inbound): How the world uses our application
//! - **Driven Ports** (Secondary/Outbound): How our application uses external systems

mod market_data_port;
mod order_broker_port;
mod order_executor_port;
mod token_verifier_port;

#[cfg(test)]
pub use market_data_port::MockMarketDataPort;
pub use market_data_port::{MarketDataError, MarketDataPort, PriceQuote, SymbolInfo, TradingHours};
pub use order_broker_port::{
    BrokerError, BrokerMessage, DEAD_LETTER_QUEUE, DeadLetter, Delivery, MAIN_QUEUE, OrderBroker,
};
pub use order_executor_port::{ExecutionFailure, ExecutionReport, OrderExecutor};
pub use token_verifier_port::{AuthContext, AuthError, TokenVerifier, parse_bearer};
