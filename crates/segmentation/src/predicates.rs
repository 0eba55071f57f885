//! Rule predicates: the threshold conditions a segment key stands for,
//! rendered as human-readable rules and evaluable against records.

use campaign_core::CustomerRecord;
use serde::Serialize;
use std::fmt;

use crate::keys::{AovTier, BaseKey, SegmentKey, SplitPart, Tier};
use crate::thresholds::Thresholds;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Attribute {
    AvgOrderValue,
    EngagementScore,
    ProfitabilityScore,
}

impl Attribute {
    pub fn field_name(self) -> &'static str {
        match self {
            Attribute::AvgOrderValue => "avg_order_value",
            Attribute::EngagementScore => "engagement_score",
            Attribute::ProfitabilityScore => "profitability_score",
        }
    }

    fn wildcard_label(self) -> &'static str {
        match self {
            Attribute::AvgOrderValue => "AOV: ELSE",
            Attribute::EngagementScore => "Engagement: ELSE",
            Attribute::ProfitabilityScore => "Profitability: ELSE",
        }
    }

    fn precision(self) -> usize {
        match self {
            Attribute::AvgOrderValue => 2,
            _ => 3,
        }
    }

    fn value_of(self, record: &CustomerRecord) -> f64 {
        match self {
            Attribute::AvgOrderValue => record.avg_order_value,
            Attribute::EngagementScore => record.engagement_score,
            Attribute::ProfitabilityScore => record.profitability_score,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    /// `attribute <= value`
    AtMost(f64),
    /// `attribute > value`
    Above(f64),
    /// `lower < attribute <= upper`
    Between { lower: f64, upper: f64 },
    /// ELSE wildcard, matches anything.
    Any,
}

impl Condition {
    pub fn matches(&self, value: f64) -> bool {
        match *self {
            Condition::AtMost(cut) => value <= cut,
            Condition::Above(cut) => value > cut,
            Condition::Between { lower, upper } => value > lower && value <= upper,
            Condition::Any => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Predicate {
    pub attribute: Attribute,
    pub condition: Condition,
}

impl Predicate {
    pub fn matches(&self, record: &CustomerRecord) -> bool {
        self.condition.matches(self.attribute.value_of(record))
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.attribute.field_name();
        let p = self.attribute.precision();
        match self.condition {
            Condition::AtMost(v) => write!(f, "{} <= {:.*}", name, p, v),
            Condition::Above(v) => write!(f, "{} > {:.*}", name, p, v),
            Condition::Between { lower, upper } => {
                write!(f, "{:.*} < {} <= {:.*}", p, lower, name, p, upper)
            }
            Condition::Any => f.write_str(self.attribute.wildcard_label()),
        }
    }
}

/// Conjunction of one predicate per dimension, plus the split part if the
/// segment was carved out of a larger one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentRule {
    pub predicates: Vec<Predicate>,
    #[serde(skip)]
    pub split: Option<SplitPart>,
}

impl SegmentRule {
    pub fn for_key(key: &SegmentKey, thresholds: &Thresholds) -> Self {
        let (aov, engagement, profitability) = match key.base {
            BaseKey::Leaf {
                aov,
                engagement,
                profitability,
            } => (Some(aov), Some(engagement), Some(profitability)),
            BaseKey::EngagementParent { aov, engagement } => (Some(aov), Some(engagement), None),
            BaseKey::AovParent { aov } => (Some(aov), None, None),
            BaseKey::Sink => (None, None, None),
        };

        let aov_condition = match aov {
            Some(AovTier::Low) => Condition::AtMost(thresholds.aov_p20),
            Some(AovTier::High) => Condition::Above(thresholds.aov_p80),
            Some(AovTier::Mid) => Condition::Between {
                lower: thresholds.aov_p20,
                upper: thresholds.aov_p80,
            },
            None => Condition::Any,
        };

        Self {
            predicates: vec![
                Predicate {
                    attribute: Attribute::AvgOrderValue,
                    condition: aov_condition,
                },
                Predicate {
                    attribute: Attribute::EngagementScore,
                    condition: median_condition(engagement, thresholds.eng_p50),
                },
                Predicate {
                    attribute: Attribute::ProfitabilityScore,
                    condition: median_condition(profitability, thresholds.prof_p50),
                },
            ],
            split: key.split,
        }
    }

    /// Whether the record satisfies every threshold condition. Split parts
    /// are not encoded as thresholds and are ignored here.
    pub fn matches(&self, record: &CustomerRecord) -> bool {
        self.predicates.iter().all(|p| p.matches(record))
    }
}

fn median_condition(tier: Option<Tier>, median: f64) -> Condition {
    match tier {
        Some(Tier::High) => Condition::Above(median),
        Some(Tier::Low) => Condition::AtMost(median),
        None => Condition::Any,
    }
}

impl fmt::Display for SegmentRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, predicate) in self.predicates.iter().enumerate() {
            if i > 0 {
                f.write_str(" & ")?;
            }
            write!(f, "{}", predicate)?;
        }
        if let Some(part) = self.split {
            write!(f, " & split={}", part)?;
        }
        Ok(())
    }
}
