//! Error taxonomy for the analysis pipeline (spec §7).
//!
//! Every public entry point returns `Result<T, CoreError>`. No partial
//! results are ever mixed with an error: a call returns the whole of its
//! output, or nothing.

use thiserror::Error;

/// Errors surfaced across the core's public boundary.
///
/// `NoData` (zero samples, zero static patterns) is not an error: `process`
/// simply returns an empty, successful result. `HotspotCapacityReached` is a
/// soft failure logged once per call, not propagated as an `Err`.
#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum CoreError {
    /// A required input was missing or malformed, or a config value is
    /// inconsistent (e.g. `min_samples_for_pattern == 0`).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Allocation failure while growing an aggregation or recommendation
    /// structure.
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    /// The supplied `CacheModel` has fewer than one level, or a
    /// non-positive size/associativity/latency somewhere in it.
    #[error("inconsistent cache model: {0}")]
    InconsistentCacheModel(String),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, CoreError>;
