//! Score attribution, aggregation and color binning.
//!
//! Records are attributed to regions by [`join`], reduced to per-region
//! summaries by [`aggregate`], and mapped to fill colors by [`color`].

pub mod aggregate;
pub mod color;
pub mod join;
pub mod types;
pub mod utility;
