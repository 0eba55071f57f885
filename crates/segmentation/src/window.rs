//! Analysis window: resolves the 7-day window and selects the universe of
//! records that fall inside it.

use campaign_core::{CampaignError, CampaignResult, CartAbandonment, CustomerRecord};
use chrono::{Duration, NaiveDate};
use serde::Serialize;
use std::collections::HashSet;
use tracing::info;

use crate::computed::WINDOW_DAYS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AnalysisWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl AnalysisWindow {
    /// Fill in whichever bound is missing and check the result against the
    /// data's date range. With no bounds the window ends on the latest date.
    pub fn resolve(
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        data_min: NaiveDate,
        data_max: NaiveDate,
    ) -> CampaignResult<Self> {
        let span = Duration::days(WINDOW_DAYS as i64 - 1);
        let (start, end) = match (start, end) {
            (Some(start), Some(end)) => (start, end),
            (None, Some(end)) => (end - span, end),
            (Some(start), None) => (start, start + span),
            (None, None) => (data_max - span, data_max),
        };

        if start > end {
            return Err(CampaignError::Validation(
                "Start date cannot be after end date".to_string(),
            ));
        }
        if end - start != span {
            return Err(CampaignError::Validation(format!(
                "Window must be exactly {} days (inclusive), got {} to {}",
                WINDOW_DAYS, start, end
            )));
        }
        if start < data_min || end > data_max {
            return Err(CampaignError::Validation(format!(
                "Window [{} to {}] outside data range [{} to {}]",
                start, end, data_min, data_max
            )));
        }

        Ok(Self { start, end })
    }

    /// Days from `date` to the window end, or `None` outside the window.
    pub fn days_since(&self, date: NaiveDate) -> Option<u32> {
        let days = (self.end - date).num_days();
        if (0..WINDOW_DAYS as i64).contains(&days) {
            Some(days as u32)
        } else {
            None
        }
    }

    /// Default output directory name for this window.
    pub fn directory_name(&self) -> String {
        format!(
            "output_{}_{}",
            self.start.format("%Y-%m-%d"),
            self.end.format("%Y-%m-%d")
        )
    }
}

/// Earliest and latest abandonment dates in the feed.
pub fn data_range(events: &[CartAbandonment]) -> Option<(NaiveDate, NaiveDate)> {
    let first = events.first()?.cart_abandoned_date;
    Some(events.iter().fold((first, first), |(lo, hi), e| {
        (lo.min(e.cart_abandoned_date), hi.max(e.cart_abandoned_date))
    }))
}

/// Records inside the window, validated and converted to the classifier's
/// input shape. Identifiers must be unique within the window.
pub fn select_universe(
    events: &[CartAbandonment],
    window: &AnalysisWindow,
) -> CampaignResult<Vec<CustomerRecord>> {
    let mut seen = HashSet::new();
    let mut universe = Vec::new();

    for event in events {
        let Some(days) = window.days_since(event.cart_abandoned_date) else {
            continue;
        };
        event.validate()?;
        if !seen.insert(event.user_id.as_str()) {
            return Err(CampaignError::Validation(format!(
                "duplicate user_id {} inside the analysis window",
                event.user_id
            )));
        }
        universe.push(CustomerRecord {
            id: event.user_id.clone(),
            avg_order_value: event.avg_order_value,
            engagement_score: event.engagement_score,
            profitability_score: event.profitability_score,
            days_since_abandon: days,
            sessions_last_30d: event.sessions_last_30d,
        });
    }

    if universe.is_empty() {
        return Err(CampaignError::EmptyUniverse);
    }

    info!(
        window_start = %window.start,
        window_end = %window.end,
        universe = universe.len(),
        skipped = events.len() - universe.len(),
        "Universe selected"
    );
    Ok(universe)
}
