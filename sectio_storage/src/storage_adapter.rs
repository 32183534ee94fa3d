//! Storage adapters.
//!
//! Storage adapters can be layered on byte sources.

pub mod performance_metrics;
