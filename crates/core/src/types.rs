use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{CampaignError, CampaignResult};

/// A raw cart-abandonment row as supplied by the upstream data feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartAbandonment {
    pub user_id: String,
    pub cart_abandoned_date: NaiveDate,
    pub avg_order_value: f64,
    pub engagement_score: f64,
    pub profitability_score: f64,
    #[serde(default)]
    pub sessions_last_30d: Option<f64>,
    #[serde(default)]
    pub num_cart_items: Option<u32>,
}

impl CartAbandonment {
    /// Check the numeric ranges the classifier relies on.
    pub fn validate(&self) -> CampaignResult<()> {
        if self.user_id.trim().is_empty() {
            return Err(CampaignError::Validation(
                "user_id must not be empty".to_string(),
            ));
        }
        if !self.avg_order_value.is_finite() || self.avg_order_value <= 0.0 {
            return Err(CampaignError::Validation(format!(
                "user {}: avg_order_value must be a positive number, got {}",
                self.user_id, self.avg_order_value
            )));
        }
        check_unit_interval(&self.user_id, "engagement_score", self.engagement_score)?;
        check_unit_interval(&self.user_id, "profitability_score", self.profitability_score)?;
        if let Some(sessions) = self.sessions_last_30d {
            if !sessions.is_finite() {
                return Err(CampaignError::Validation(format!(
                    "user {}: sessions_last_30d must be finite",
                    self.user_id
                )));
            }
        }
        Ok(())
    }
}

fn check_unit_interval(user_id: &str, field: &str, value: f64) -> CampaignResult<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(CampaignError::Validation(format!(
            "user {}: {} must lie in [0, 1], got {}",
            user_id, field, value
        )));
    }
    Ok(())
}

/// One customer inside the analysis window. This is the unit the
/// segmentation pipeline classifies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerRecord {
    pub id: String,
    pub avg_order_value: f64,
    pub engagement_score: f64,
    pub profitability_score: f64,
    /// Days between the abandonment and the window end, 0..=6.
    pub days_since_abandon: u32,
    /// Secondary attribute used only when splitting oversized segments.
    #[serde(default)]
    pub sessions_last_30d: Option<f64>,
}

impl CustomerRecord {
    pub fn new(
        id: impl Into<String>,
        avg_order_value: f64,
        engagement_score: f64,
        profitability_score: f64,
        days_since_abandon: u32,
    ) -> Self {
        Self {
            id: id.into(),
            avg_order_value,
            engagement_score,
            profitability_score,
            days_since_abandon,
            sessions_last_30d: None,
        }
    }

    pub fn with_sessions(mut self, sessions: f64) -> Self {
        self.sessions_last_30d = Some(sessions);
        self
    }
}
