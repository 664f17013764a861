//! PostgreSQL persistence module.
//!
//! Provides connection pooling for the PostgreSQL item repository.

pub mod pool;

pub use pool::{PostgresPool, PostgresPoolError};
