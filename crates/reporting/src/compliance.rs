//! MECE compliance report: run metadata, thresholds, per-segment counts,
//! the normalization log and the exclusivity/exhaustiveness check.

use campaign_core::SegmentationConfig;
use campaign_segmentation::{
    AnalysisWindow, NormalizationEvent, SegmentationOutcome, Thresholds,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{info, warn};
use uuid::Uuid;

use crate::mapping::RecordMapping;

// ─── Log section ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogNote {
    pub note: String,
}

/// The normalization events, or a single note when nothing moved.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum LogSection {
    Events(Vec<NormalizationEvent>),
    Note([LogNote; 1]),
}

// ─── Compliance ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ComplianceCheck {
    /// Records held by more than one segment plus repeated mapping ids.
    pub duplicate_users: usize,
    pub total_users_assigned: usize,
    pub unassigned_users: usize,
    pub exhaustiveness_check: bool,
}

impl ComplianceCheck {
    pub fn mutually_exclusive(&self) -> bool {
        self.duplicate_users == 0
    }

    pub fn is_compliant(&self) -> bool {
        self.mutually_exclusive() && self.exhaustiveness_check
    }
}

// ─── Report ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct MeceReport {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub window_start: NaiveDate,
    pub window_end: NaiveDate,
    pub universe_size: usize,
    pub min_segment_size: usize,
    pub max_segment_size: usize,
    pub split_oversize: bool,
    pub percentiles: Thresholds,
    pub segment_counts: BTreeMap<String, usize>,
    pub converged: bool,
    pub merge_and_split_log: LogSection,
    pub mece_validation: ComplianceCheck,
}

impl MeceReport {
    pub fn build(
        window: &AnalysisWindow,
        config: &SegmentationConfig,
        outcome: &SegmentationOutcome,
        mapping: &RecordMapping,
    ) -> Self {
        let universe_size = outcome.universe.len();
        let total_users_assigned = mapping.assigned();
        let check = ComplianceCheck {
            duplicate_users: outcome.registry.duplicate_assignments() + mapping.duplicate_ids(),
            total_users_assigned,
            unassigned_users: mapping.unassigned(),
            exhaustiveness_check: mapping.unassigned() == 0
                && total_users_assigned == universe_size
                && outcome.registry.total_members() == universe_size,
        };

        if check.is_compliant() {
            info!(universe_size, "MECE validation passed");
        } else {
            warn!(
                duplicates = check.duplicate_users,
                unassigned = check.unassigned_users,
                "MECE validation failed"
            );
        }

        let merge_and_split_log = if outcome.log.is_empty() {
            LogSection::Note([LogNote {
                note: "No merges or splits performed".to_string(),
            }])
        } else {
            LogSection::Events(outcome.log.events().to_vec())
        };

        Self {
            run_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            window_start: window.start,
            window_end: window.end,
            universe_size,
            min_segment_size: config.min_size,
            max_segment_size: config.max_size,
            split_oversize: config.split_oversize,
            percentiles: outcome.thresholds,
            segment_counts: outcome
                .registry
                .iter()
                .map(|s| (s.key.label(), s.size))
                .collect(),
            converged: outcome.converged,
            merge_and_split_log,
            mece_validation: check,
        }
    }
}
