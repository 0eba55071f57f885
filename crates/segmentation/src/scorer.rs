//! Segment scoring: five bounded component scores and a weighted overall
//! score per final segment.

use campaign_core::{CampaignError, CampaignResult};
use serde::Serialize;

use crate::assignment::ClassifiedRecord;
use crate::keys::SegmentKey;
use crate::registry::{Segment, SegmentRegistry};

pub const CONVERSION_WEIGHT: f64 = 0.30;
pub const LIFT_WEIGHT: f64 = 0.25;
pub const PROFITABILITY_WEIGHT: f64 = 0.20;
pub const SIZE_WEIGHT: f64 = 0.10;
pub const STRATEGIC_WEIGHT: f64 = 0.15;

/// Fallback for normalizations over a degenerate range.
const NEUTRAL_SCORE: f64 = 0.5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredSegment {
    pub key: SegmentKey,
    pub size: usize,
    pub conversion_potential: f64,
    pub profitability: f64,
    pub lift_vs_control: f64,
    pub size_score: f64,
    pub strategic_fit: f64,
    pub overall_score: f64,
}

/// Scores segments against the AOV range of the whole universe.
#[derive(Debug, Clone, Copy)]
pub struct SegmentScorer {
    aov_min: f64,
    aov_max: f64,
}

impl SegmentScorer {
    pub fn new(universe: &[ClassifiedRecord]) -> CampaignResult<Self> {
        let mut values = universe.iter().map(|c| c.record.avg_order_value);
        let first = values.next().ok_or(CampaignError::EmptyUniverse)?;
        let (aov_min, aov_max) = values.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v)));
        Ok(Self { aov_min, aov_max })
    }

    pub fn with_aov_range(aov_min: f64, aov_max: f64) -> Self {
        Self { aov_min, aov_max }
    }

    /// Score every segment in the registry and return them ranked.
    pub fn score(&self, registry: &SegmentRegistry) -> Vec<ScoredSegment> {
        let size_min = registry.iter().map(|s| s.size).min().unwrap_or(0);
        let size_max = registry.iter().map(|s| s.size).max().unwrap_or(0);

        let mut scored: Vec<ScoredSegment> = registry
            .iter()
            .map(|segment| self.score_segment(segment, size_min, size_max))
            .collect();
        rank(&mut scored);
        scored
    }

    pub fn score_segment(&self, segment: &Segment, size_min: usize, size_max: usize) -> ScoredSegment {
        let populated = segment.size > 0;
        let conversion_potential = if populated {
            clamp01(segment.conversion_potential)
        } else {
            0.0
        };
        let profitability = if populated {
            clamp01(segment.profitability)
        } else {
            0.0
        };

        let aov_norm = if populated && self.aov_max > self.aov_min {
            (segment.avg_order_value - self.aov_min) / (self.aov_max - self.aov_min)
        } else {
            NEUTRAL_SCORE
        };

        let size_score = if size_max != size_min {
            clamp01((segment.size - size_min) as f64 / (size_max - size_min) as f64)
        } else {
            NEUTRAL_SCORE
        };

        let lift_vs_control = clamp01(0.6 * conversion_potential + 0.4 * profitability);
        let strategic_fit = clamp01(0.4 * profitability + 0.6 * aov_norm);
        let overall_score = clamp01(
            CONVERSION_WEIGHT * conversion_potential
                + LIFT_WEIGHT * lift_vs_control
                + PROFITABILITY_WEIGHT * profitability
                + SIZE_WEIGHT * size_score
                + STRATEGIC_WEIGHT * strategic_fit,
        );

        ScoredSegment {
            key: segment.key,
            size: segment.size,
            conversion_potential,
            profitability,
            lift_vs_control,
            size_score,
            strategic_fit,
            overall_score,
        }
    }
}

/// Descending overall score, then descending size, then ascending key.
pub fn rank(scored: &mut [ScoredSegment]) {
    scored.sort_by(|a, b| {
        b.overall_score
            .total_cmp(&a.overall_score)
            .then_with(|| b.size.cmp(&a.size))
            .then_with(|| a.key.cmp(&b.key))
    });
}

pub fn clamp01(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}

/// Round to three decimals for reporting.
pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}
