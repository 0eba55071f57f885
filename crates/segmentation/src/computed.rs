//! Computed properties: per-record scores derived from raw attributes.

use campaign_core::CustomerRecord;

/// Length of the analysis window in days.
pub const WINDOW_DAYS: u32 = 7;

/// Linear decay from 1.0 on the window's last day to 0.0 a week later.
pub fn recency_factor(days_since_abandon: u32) -> f64 {
    let window = WINDOW_DAYS as f64;
    ((window - days_since_abandon as f64) / window).max(0.0)
}

pub fn conversion_potential(record: &CustomerRecord) -> f64 {
    record.engagement_score * recency_factor(record.days_since_abandon)
}
