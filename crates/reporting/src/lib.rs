//! Segmentation reporting: ranked segment summary, per-record mapping,
//! MECE compliance report and persistence of all three.

pub mod compliance;
pub mod mapping;
pub mod persist;
pub mod summary;

pub use compliance::{ComplianceCheck, MeceReport};
pub use mapping::{MappingRow, RecordMapping, UNASSIGNED};
pub use persist::{write_outputs, OutputPaths};
pub use summary::{SegmentSummary, SummaryRow};
