//! Live connection tracking.

mod registry;
mod stats;
mod types;

pub use registry::ConnectionRegistry;
pub use stats::ConnectionStats;
pub use types::{ConnectionError, ConnectionHandle, ConnectionLimits, DeliveryError};
