//! Segment definitions and population evaluation — declarative AND-combined
//! criteria over the customer base, with aggregate metrics for targeting.

pub mod builder;
pub mod criteria;
pub mod engine;

pub use builder::SegmentBuilder;
pub use criteria::{CustomFilters, Segment, SegmentCriteria, SegmentEvaluation, SegmentMetrics};
pub use engine::{evaluate_segment, matches, SegmentationEngine};
