//! Bucket assignment: maps each record onto one of the twelve leaf keys.

use campaign_core::CustomerRecord;
use serde::Serialize;

use crate::computed;
use crate::keys::{AovTier, SegmentKey, Tier};
use crate::thresholds::Thresholds;

/// A record together with its leaf key and derived scores.
#[derive(Debug, Clone, Serialize)]
pub struct ClassifiedRecord {
    pub record: CustomerRecord,
    pub leaf: SegmentKey,
    pub recency_factor: f64,
    pub conversion_potential: f64,
}

/// Stateless per-record classifier. Records are classified independently,
/// so input order never affects the result.
#[derive(Debug, Clone, Copy)]
pub struct BucketAssigner {
    thresholds: Thresholds,
}

impl BucketAssigner {
    pub fn new(thresholds: Thresholds) -> Self {
        Self { thresholds }
    }

    /// `Low` is inclusive of p20, `High` is strictly above p80, so `Mid`
    /// covers `(p20, p80]`.
    pub fn aov_tier(&self, value: f64) -> AovTier {
        if value <= self.thresholds.aov_p20 {
            AovTier::Low
        } else if value > self.thresholds.aov_p80 {
            AovTier::High
        } else {
            AovTier::Mid
        }
    }

    /// Ties at the median go to `Low`.
    pub fn engagement_tier(&self, value: f64) -> Tier {
        above(value, self.thresholds.eng_p50)
    }

    /// Ties at the median go to `Low`.
    pub fn profitability_tier(&self, value: f64) -> Tier {
        above(value, self.thresholds.prof_p50)
    }

    pub fn leaf_key(&self, record: &CustomerRecord) -> SegmentKey {
        SegmentKey::leaf(
            self.aov_tier(record.avg_order_value),
            self.engagement_tier(record.engagement_score),
            self.profitability_tier(record.profitability_score),
        )
    }

    pub fn classify(&self, record: CustomerRecord) -> ClassifiedRecord {
        let leaf = self.leaf_key(&record);
        let recency_factor = computed::recency_factor(record.days_since_abandon);
        let conversion_potential = computed::conversion_potential(&record);
        ClassifiedRecord {
            record,
            leaf,
            recency_factor,
            conversion_potential,
        }
    }

    pub fn assign(&self, records: Vec<CustomerRecord>) -> Vec<ClassifiedRecord> {
        records.into_iter().map(|r| self.classify(r)).collect()
    }
}

fn above(value: f64, cut: f64) -> Tier {
    if value > cut {
        Tier::High
    } else {
        Tier::Low
    }
}
