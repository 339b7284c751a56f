//! Order Broker Adapters
//!
//! Implementations of `OrderBroker`: a process-local queue for development
//! and tests, and a durable SQLite-backed queue.

pub mod in_memory;
pub mod sqlite;

pub use in_memory::InMemoryOrderBroker;
pub use sqlite::SqliteOrderBroker;
