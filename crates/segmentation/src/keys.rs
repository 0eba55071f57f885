//! Segment keys: the AOV × Engagement × Profitability hierarchy and its
//! merge parents, plus the suffixes attached when a segment is split.

use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AovTier {
    High,
    Mid,
    Low,
}

impl AovTier {
    pub const ALL: [AovTier; 3] = [AovTier::High, AovTier::Mid, AovTier::Low];

    pub fn label(self) -> &'static str {
        match self {
            AovTier::High => "HighAOV",
            AovTier::Mid => "MidAOV",
            AovTier::Low => "LowAOV",
        }
    }
}

/// Two-way tier used by both the engagement and profitability dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    High,
    Low,
}

impl Tier {
    pub const ALL: [Tier; 2] = [Tier::High, Tier::Low];

    pub fn opposite(self) -> Tier {
        match self {
            Tier::High => Tier::Low,
            Tier::Low => Tier::High,
        }
    }

    fn engagement_label(self) -> &'static str {
        match self {
            Tier::High => "HighEng",
            Tier::Low => "LowEng",
        }
    }

    fn profitability_label(self) -> &'static str {
        match self {
            Tier::High => "HighProf",
            Tier::Low => "LowProf",
        }
    }
}

/// Position of a segment in the merge hierarchy.
///
/// `Leaf` → `EngagementParent` → `AovParent` → `Sink`; each step replaces one
/// more dimension with the `ELSE` wildcard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BaseKey {
    Leaf {
        aov: AovTier,
        engagement: Tier,
        profitability: Tier,
    },
    EngagementParent {
        aov: AovTier,
        engagement: Tier,
    },
    AovParent {
        aov: AovTier,
    },
    Sink,
}

/// Sub-segment marker attached by the split stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SplitPart {
    /// Bucket `n` (1-based) of a quantile split on the secondary attribute.
    Quantile(usize),
    /// Contiguous block `n` (1-based) of a positional split.
    Chunk(usize),
}

impl fmt::Display for SplitPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SplitPart::Quantile(n) => write!(f, "SPLIT_Q{}", n),
            SplitPart::Chunk(n) => write!(f, "SPLIT_{}", n),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SegmentKey {
    pub base: BaseKey,
    pub split: Option<SplitPart>,
}

impl SegmentKey {
    pub fn leaf(aov: AovTier, engagement: Tier, profitability: Tier) -> Self {
        Self::from_base(BaseKey::Leaf {
            aov,
            engagement,
            profitability,
        })
    }

    pub fn engagement_parent(aov: AovTier, engagement: Tier) -> Self {
        Self::from_base(BaseKey::EngagementParent { aov, engagement })
    }

    pub fn aov_parent(aov: AovTier) -> Self {
        Self::from_base(BaseKey::AovParent { aov })
    }

    pub fn sink() -> Self {
        Self::from_base(BaseKey::Sink)
    }

    fn from_base(base: BaseKey) -> Self {
        Self { base, split: None }
    }

    /// The twelve leaf keys, one per tier combination.
    pub fn all_leaves() -> Vec<SegmentKey> {
        let mut keys = Vec::with_capacity(12);
        for aov in AovTier::ALL {
            for engagement in Tier::ALL {
                for profitability in Tier::ALL {
                    keys.push(SegmentKey::leaf(aov, engagement, profitability));
                }
            }
        }
        keys
    }

    /// AOV tier shared by every key under the same `{AOV}_ELSE_ELSE` parent.
    /// `None` for the sink.
    pub fn aov(&self) -> Option<AovTier> {
        match self.base {
            BaseKey::Leaf { aov, .. }
            | BaseKey::EngagementParent { aov, .. }
            | BaseKey::AovParent { aov } => Some(aov),
            BaseKey::Sink => None,
        }
    }

    pub fn is_sink(&self) -> bool {
        self.base == BaseKey::Sink && self.split.is_none()
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self.base, BaseKey::Leaf { .. }) && self.split.is_none()
    }

    /// Next key up the hierarchy. Split parts climb from their base key.
    pub fn parent(&self) -> Option<SegmentKey> {
        match self.base {
            BaseKey::Leaf {
                aov, engagement, ..
            } => Some(SegmentKey::engagement_parent(aov, engagement)),
            BaseKey::EngagementParent { aov, .. } => Some(SegmentKey::aov_parent(aov)),
            BaseKey::AovParent { .. } => Some(SegmentKey::sink()),
            BaseKey::Sink => None,
        }
    }

    /// Leaf with the opposite profitability tier under the same parent.
    pub fn profitability_sibling(&self) -> Option<SegmentKey> {
        match (self.base, self.split) {
            (
                BaseKey::Leaf {
                    aov,
                    engagement,
                    profitability,
                },
                None,
            ) => Some(SegmentKey::leaf(aov, engagement, profitability.opposite())),
            _ => None,
        }
    }

    pub fn with_split(&self, part: SplitPart) -> SegmentKey {
        SegmentKey {
            base: self.base,
            split: Some(part),
        }
    }

    /// Canonical label, e.g. `MidAOV_LowEng_ELSE` or `Other_ELSE_ELSE_SPLIT_2`.
    pub fn label(&self) -> String {
        self.to_string()
    }

    /// The three `_`-separated label components of the base key.
    fn components(&self) -> [&'static str; 3] {
        match self.base {
            BaseKey::Leaf {
                aov,
                engagement,
                profitability,
            } => [
                aov.label(),
                engagement.engagement_label(),
                profitability.profitability_label(),
            ],
            BaseKey::EngagementParent { aov, engagement } => {
                [aov.label(), engagement.engagement_label(), "ELSE"]
            }
            BaseKey::AovParent { aov } => [aov.label(), "ELSE", "ELSE"],
            BaseKey::Sink => ["Other", "ELSE", "ELSE"],
        }
    }
}

impl fmt::Display for SegmentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [aov, engagement, profitability] = self.components();
        write!(f, "{}_{}_{}", aov, engagement, profitability)?;
        if let Some(part) = self.split {
            write!(f, "_{}", part)?;
        }
        Ok(())
    }
}

// Keys order by label so every pass over the registry visits segments in
// lexicographic order. No component is a prefix of another in the same
// position, so comparing components matches comparing whole labels. Only
// two distinct split parts of one base fall back to formatting.
impl Ord for SegmentKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.components()
            .cmp(&other.components())
            .then_with(|| match (self.split, other.split) {
                (Some(a), Some(b)) if a != b => a.to_string().cmp(&b.to_string()),
                (a, b) => a.is_some().cmp(&b.is_some()),
            })
    }
}

impl PartialOrd for SegmentKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Serialize for SegmentKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
