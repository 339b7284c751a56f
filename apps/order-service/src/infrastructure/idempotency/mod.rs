//! Idempotency Store Adapters
//!
//! Implementations of the idempotency store port.

pub mod in_memory;
pub mod redis_store;

pub use in_memory::InMemoryIdempotencyStore;
pub use redis_store::RedisIdempotencyStore;
