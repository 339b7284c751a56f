//! Persistence Adapters
//!
//! Implementations of the order repository trait.

pub mod in_memory;
pub mod sqlite;

pub use in_memory::InMemoryOrderRepository;
pub use sqlite::SqliteOrderRepository;
