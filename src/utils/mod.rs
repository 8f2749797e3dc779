//! # Utility Modules
//!
//! Supporting utilities for logging, timing and counters.
//!
//! ## Components
//! - **Logging**: Structured logging configuration
//! - **Timeout**: Async timeout wrappers
//! - **Metrics**: Per-connection traffic counters

pub mod logging;
pub mod metrics;
pub mod timeout;

pub use metrics::{ConnectionMetrics, ConnectionStats};
