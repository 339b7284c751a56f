//! Runtime wiring.
//!
//! Picks adapters from configuration and assembles the container.

pub mod backends;
mod container;

pub use backends::{IdempotencyStoreBackend, MarketDataProvider, OrderBrokerBackend, RepositoryBackend};
pub use container::{
    ConfiguredAppState, ConfiguredProcessOrder, ConfiguredSubmitOrder, Container, ContainerError,
};
