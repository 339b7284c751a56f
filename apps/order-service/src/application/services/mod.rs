//! Application Services
//!
//! Application services coordinate domain logic and infrastructure adapters.
//! They differ from use cases in that they run as background tasks.

mod worker_pool;

pub use worker_pool::{WorkerPool, WorkerPoolHandle};
