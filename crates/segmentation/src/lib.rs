//! MECE audience segmentation: percentile decision-tree assignment, size
//! normalization by merge/split, and multi-factor segment scoring.

pub mod assignment;
pub mod builder;
pub mod computed;
pub mod engine;
pub mod keys;
pub mod normalizer;
pub mod predicates;
pub mod registry;
pub mod scorer;
pub mod thresholds;
pub mod window;

pub use assignment::{BucketAssigner, ClassifiedRecord};
pub use builder::EngineBuilder;
pub use engine::{SegmentationEngine, SegmentationOutcome};
pub use keys::{AovTier, SegmentKey, SplitPart, Tier};
pub use normalizer::{NormalizationEvent, NormalizationLog, SizeNormalizer};
pub use predicates::SegmentRule;
pub use registry::{Segment, SegmentRegistry};
pub use scorer::{ScoredSegment, SegmentScorer};
pub use thresholds::Thresholds;
pub use window::AnalysisWindow;
