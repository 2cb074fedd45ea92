//! Metrics for credvault.
//!
//! Thin layer over the `metrics` crate facade. Names live in one place so
//! dashboards and alerts can rely on them. Nothing is exported unless the
//! embedding application installs a recorder.
//!
//! ```rust,ignore
//! use credvault_metrics::{counter, rotation};
//!
//! counter!(rotation::RECORDS_ROTATED_TOTAL).increment(1);
//! ```

mod definitions;

pub use definitions::*;

// Re-export metrics macros for convenience
pub use metrics::{counter, gauge, histogram};
