//! Utils Module - Shared helpers
//!
//! Constants, the result cache and analysis statistics.

pub mod cache;
pub mod constants;
pub mod stats;

pub use cache::{CacheKey, CacheStats, ResultCache};
pub use constants::*;
pub use stats::{AnalysisStats, StatsSnapshot};
