//! Infrastructure Layer
//!
//! Adapters for the ports defined in the domain and application layers.
//!
//! - **Driven adapters (outbound)**
//!   - `persistence/`: Order repository (in-memory, SQLite)
//!   - `idempotency/`: Idempotency store (in-memory, Redis)
//!   - `broker/`: Work queue with dead-letter queue (in-memory, SQLite)
//!   - `marketdata/`: Market data provider (static, HTTP)
//!   - `execution/`: Simulated execution venue
//!   - `auth/`: Bearer token verification
//!
//! - **Driver adapters (inbound)**
//!   - `http/`: REST API controllers
//!   - `grpc/`: gRPC authentication and status mapping
//!
//! - `config/`: Backend selection and dependency injection container

pub mod auth;
pub mod broker;
pub mod config;
pub mod execution;
pub mod grpc;
pub mod http;
pub mod idempotency;
pub mod marketdata;
pub mod persistence;
