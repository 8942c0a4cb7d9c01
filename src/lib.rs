// cachesight-core
// Offline/online CPU-cache behavior analysis: turns raw cache-miss samples
// and optional AST-derived static patterns into ranked optimization
// recommendations.

pub mod aggregator;
pub mod cache_model;
pub mod classifier;
pub mod config;
pub mod error;
pub mod hotspot;
pub mod orchestrator;
pub mod pattern_analyzer;
pub mod recommendation;
pub mod sample;
pub mod static_bridge;

pub use aggregator::{Aggregator, CapacityReport};
pub use cache_model::{CacheKind, CacheLevel, CacheModel};
pub use classifier::{Antipattern, ClassifiedPattern, PrimaryMissType};
pub use config::{AggregationPolicy, AnalysisConfig};
pub use error::{CoreError, Result};
pub use hotspot::{AccessPattern, AddressRange, CacheHotspot, PatternMetrics, ReuseDistanceStats};
pub use orchestrator::Core;
pub use recommendation::{RecType, Recommendation};
pub use sample::{MissSample, MissedLevel, SourceLocation};
pub use static_bridge::StaticPattern;
