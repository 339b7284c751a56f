//! Order Executor Adapters

mod simulated;

pub use simulated::SimulatedExecutor;
