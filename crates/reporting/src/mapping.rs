//! Record to segment mapping, one row per universe record.

use campaign_segmentation::SegmentationOutcome;
use serde::Serialize;
use std::collections::HashSet;

use crate::summary::SegmentSummary;

/// Placeholder for a record no final segment holds.
pub const UNASSIGNED: &str = "UNASSIGNED";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MappingRow {
    pub user_id: String,
    pub segment_id: String,
    pub segment_name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(transparent)]
pub struct RecordMapping {
    rows: Vec<MappingRow>,
}

impl RecordMapping {
    /// Rows follow universe order.
    pub fn build(outcome: &SegmentationOutcome, summary: &SegmentSummary) -> Self {
        let membership = outcome.registry.membership();
        let rows = outcome
            .universe
            .iter()
            .enumerate()
            .map(|(idx, classified)| {
                let (segment_id, segment_name) = match membership.get(&idx) {
                    Some(key) => (
                        summary.segment_id(key).unwrap_or(UNASSIGNED).to_string(),
                        key.label(),
                    ),
                    None => (UNASSIGNED.to_string(), UNASSIGNED.to_string()),
                };
                MappingRow {
                    user_id: classified.record.id.clone(),
                    segment_id,
                    segment_name,
                }
            })
            .collect();
        Self { rows }
    }

    pub fn rows(&self) -> &[MappingRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn unassigned(&self) -> usize {
        self.rows.iter().filter(|r| r.segment_id == UNASSIGNED).count()
    }

    pub fn assigned(&self) -> usize {
        self.len() - self.unassigned()
    }

    /// Rows whose user id already appeared earlier in the mapping.
    pub fn duplicate_ids(&self) -> usize {
        let mut seen = HashSet::with_capacity(self.rows.len());
        self.rows
            .iter()
            .filter(|r| !seen.insert(r.user_id.as_str()))
            .count()
    }
}
