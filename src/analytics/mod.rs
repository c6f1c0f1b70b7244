//! Result analytics
//!
//! Advisory annotations derived from a result table. Nothing here affects
//! which SQL runs.

pub mod insights;
pub mod quality;

pub use insights::InsightEngine;
pub use quality::DataQualityEngine;
