//! Percentile cut points over the current universe.

use campaign_core::{CampaignError, CampaignResult, CustomerRecord};
use serde::Serialize;
use tracing::debug;

/// The five cut points the bucket rules compare against. Recomputed for
/// every run from that run's universe only.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Thresholds {
    pub aov_p20: f64,
    pub aov_p50: f64,
    pub aov_p80: f64,
    pub eng_p50: f64,
    pub prof_p50: f64,
}

impl Thresholds {
    pub fn compute(records: &[CustomerRecord]) -> CampaignResult<Self> {
        if records.is_empty() {
            return Err(CampaignError::EmptyUniverse);
        }

        let aov = sorted(records.iter().map(|r| r.avg_order_value));
        let engagement = sorted(records.iter().map(|r| r.engagement_score));
        let profitability = sorted(records.iter().map(|r| r.profitability_score));

        let thresholds = Self {
            aov_p20: quantile_sorted(&aov, 0.20),
            aov_p50: quantile_sorted(&aov, 0.50),
            aov_p80: quantile_sorted(&aov, 0.80),
            eng_p50: quantile_sorted(&engagement, 0.50),
            prof_p50: quantile_sorted(&profitability, 0.50),
        };

        debug!(
            universe = records.len(),
            aov_p20 = thresholds.aov_p20,
            aov_p80 = thresholds.aov_p80,
            eng_p50 = thresholds.eng_p50,
            prof_p50 = thresholds.prof_p50,
            "Percentile thresholds computed"
        );
        Ok(thresholds)
    }
}

/// Percentile (0..=100) with linear interpolation between closest ranks.
pub fn percentile(values: &[f64], pct: f64) -> CampaignResult<f64> {
    if values.is_empty() {
        return Err(CampaignError::EmptyUniverse);
    }
    let sorted = sorted(values.iter().copied());
    Ok(quantile_sorted(&sorted, pct / 100.0))
}

pub(crate) fn sorted(values: impl Iterator<Item = f64>) -> Vec<f64> {
    let mut values: Vec<f64> = values.collect();
    values.sort_by(f64::total_cmp);
    values
}

/// Quantile `q` in [0, 1] of an ascending, non-empty slice.
pub(crate) fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    let q = q.clamp(0.0, 1.0);
    let idx = q * (sorted.len() - 1) as f64;
    let lo = idx.floor() as usize;
    let hi = idx.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        let t = idx - lo as f64;
        sorted[lo] + (sorted[hi] - sorted[lo]) * t
    }
}
