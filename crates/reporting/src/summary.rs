//! Ranked segment summary with rule text, scores and provenance notes.

use campaign_segmentation::scorer::round3;
use campaign_segmentation::{SegmentKey, SegmentRule, SegmentationOutcome};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// One line of the summary. Final segments carry an identifier; segments
/// that were merged away carry `merged_into` instead.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    pub segment_id: Option<String>,
    pub segment_name: String,
    pub rules_applied: String,
    pub size: usize,
    pub conversion_potential: f64,
    pub profitability: f64,
    pub lift_vs_control: f64,
    pub size_score: f64,
    pub strategic_fit: f64,
    pub overall_score: f64,
    pub valid: bool,
    pub merged_into: Option<String>,
    pub notes: String,
}

#[derive(Debug, Clone)]
pub struct SegmentSummary {
    rows: Vec<SummaryRow>,
    ids: BTreeMap<SegmentKey, String>,
}

impl SegmentSummary {
    pub fn build(outcome: &SegmentationOutcome, min_size: usize) -> Self {
        let ids: BTreeMap<SegmentKey, String> = outcome
            .scored
            .iter()
            .enumerate()
            .map(|(i, s)| (s.key, format!("S{:03}", i + 1)))
            .collect();

        let mut rows: Vec<SummaryRow> = outcome
            .scored
            .iter()
            .map(|s| SummaryRow {
                segment_id: ids.get(&s.key).cloned(),
                segment_name: s.key.label(),
                rules_applied: SegmentRule::for_key(&s.key, &outcome.thresholds).to_string(),
                size: s.size,
                conversion_potential: round3(s.conversion_potential),
                profitability: round3(s.profitability),
                lift_vs_control: round3(s.lift_vs_control),
                size_score: round3(s.size_score),
                strategic_fit: round3(s.strategic_fit),
                overall_score: round3(s.overall_score),
                valid: s.size >= min_size,
                merged_into: None,
                notes: provenance(outcome, &s.key),
            })
            .collect();

        let merged_away: BTreeSet<SegmentKey> = outcome
            .log
            .merges()
            .flat_map(|m| m.from.iter().copied())
            .filter(|k| !outcome.registry.contains(k))
            .collect();

        for key in merged_away {
            let destination = outcome.log.merged_into(&key).map(|k| k.label());
            rows.push(SummaryRow {
                segment_id: None,
                segment_name: key.label(),
                rules_applied: SegmentRule::for_key(&key, &outcome.thresholds).to_string(),
                size: outcome.log.size_before_merge(&key).unwrap_or(0),
                conversion_potential: 0.0,
                profitability: 0.0,
                lift_vs_control: 0.0,
                size_score: 0.0,
                strategic_fit: 0.0,
                overall_score: 0.0,
                valid: false,
                notes: match &destination {
                    Some(to) => format!("Merged into {}", to),
                    None => "Merged".to_string(),
                },
                merged_into: destination,
            });
        }

        Self { rows, ids }
    }

    pub fn rows(&self) -> &[SummaryRow] {
        &self.rows
    }

    /// Identifier assigned to a final segment, by rank.
    pub fn segment_id(&self, key: &SegmentKey) -> Option<&str> {
        self.ids.get(key).map(String::as_str)
    }

    pub fn final_segments(&self) -> usize {
        self.ids.len()
    }
}

fn provenance(outcome: &SegmentationOutcome, key: &SegmentKey) -> String {
    let mut notes = Vec::new();

    let sources: Vec<String> = outcome
        .log
        .merge_sources(key)
        .into_iter()
        .filter(|k| k != key)
        .map(|k| k.label())
        .collect();
    if !sources.is_empty() {
        notes.push(format!("Created by merging: {}", sources.join(", ")));
    }
    if let Some(original) = outcome.log.split_origin(key) {
        notes.push(format!("Created by splitting {}", original));
    }
    notes.join(" ; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    #[test]
    fn test_ids_follow_rank_order() {
        let outcome = fixtures::outcome(5);
        let summary = SegmentSummary::build(&outcome, 5);

        assert_eq!(summary.final_segments(), outcome.scored.len());
        assert_eq!(summary.rows()[0].segment_id.as_deref(), Some("S001"));
        for (i, scored) in outcome.scored.iter().enumerate() {
            let row = &summary.rows()[i];
            assert_eq!(row.segment_name, scored.key.label());
            assert_eq!(summary.segment_id(&scored.key), Some(format!("S{:03}", i + 1).as_str()));
        }
    }

    #[test]
    fn test_merged_rows_point_at_destination() {
        let outcome = fixtures::outcome(15);
        assert!(outcome.merges_performed() > 0);
        let summary = SegmentSummary::build(&outcome, 15);

        let merged: Vec<&SummaryRow> = summary
            .rows()
            .iter()
            .filter(|r| r.segment_id.is_none())
            .collect();
        assert!(!merged.is_empty());
        for row in merged {
            assert!(!row.valid);
            assert_eq!(row.overall_score, 0.0);
            let to = row.merged_into.as_ref().expect("merged rows name a destination");
            assert_eq!(row.notes, format!("Merged into {}", to));
        }
    }

    #[test]
    fn test_merge_destinations_carry_provenance() {
        let outcome = fixtures::outcome(15);
        let summary = SegmentSummary::build(&outcome, 15);

        let merged_final = summary
            .rows()
            .iter()
            .filter(|r| r.segment_id.is_some())
            .any(|r| r.notes.starts_with("Created by merging: "));
        assert!(merged_final);
    }

    #[test]
    fn test_scores_rounded_and_validity() {
        let outcome = fixtures::outcome(5);
        let summary = SegmentSummary::build(&outcome, 5);
        for row in summary.rows().iter().filter(|r| r.segment_id.is_some()) {
            assert_eq!(row.overall_score, round3(row.overall_score));
            assert_eq!(row.valid, row.size >= 5);
            assert!(!row.rules_applied.is_empty());
        }
    }
}
