//! Size normalization: merges undersized segments up the key hierarchy and
//! optionally splits oversized ones.

use campaign_core::SegmentationConfig;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::assignment::ClassifiedRecord;
use crate::keys::{AovTier, BaseKey, SegmentKey, SplitPart};
use crate::registry::{MemberIdx, SegmentRegistry};
use crate::thresholds::{quantile_sorted, sorted};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeAction {
    MergeProfitSibling,
    MergeToAovParent,
    MergeToGlobalOther,
    MergeFallbackToGlobal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitAction {
    SplitBySessionsQuantile,
    SplitByIndex,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergeRecord {
    pub action: MergeAction,
    pub from: Vec<SegmentKey>,
    /// Source sizes before the merge.
    pub from_counts: BTreeMap<SegmentKey, usize>,
    pub to: SegmentKey,
    /// Destination size after the merge.
    pub to_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SplitRecord {
    pub action: SplitAction,
    pub original: SegmentKey,
    pub created: Vec<SegmentKey>,
    pub counts: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConvergenceWarning {
    pub message: String,
    pub merges_performed: usize,
    pub undersized: Vec<SegmentKey>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum NormalizationEvent {
    Merge(MergeRecord),
    Split(SplitRecord),
    Warning(ConvergenceWarning),
}

/// Ordered record of every merge, split and convergence warning in a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct NormalizationLog {
    events: Vec<NormalizationEvent>,
}

impl NormalizationLog {
    pub fn push(&mut self, event: NormalizationEvent) {
        self.events.push(event);
    }

    pub fn events(&self) -> &[NormalizationEvent] {
        &self.events
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn merges(&self) -> impl Iterator<Item = &MergeRecord> {
        self.events.iter().filter_map(|e| match e {
            NormalizationEvent::Merge(m) => Some(m),
            _ => None,
        })
    }

    pub fn splits(&self) -> impl Iterator<Item = &SplitRecord> {
        self.events.iter().filter_map(|e| match e {
            NormalizationEvent::Split(s) => Some(s),
            _ => None,
        })
    }

    pub fn warnings(&self) -> impl Iterator<Item = &ConvergenceWarning> {
        self.events.iter().filter_map(|e| match e {
            NormalizationEvent::Warning(w) => Some(w),
            _ => None,
        })
    }

    /// Destination of the last merge that consumed `key`, if any.
    pub fn merged_into(&self, key: &SegmentKey) -> Option<SegmentKey> {
        self.merges()
            .filter(|m| m.to != *key && m.from.contains(key))
            .last()
            .map(|m| m.to)
    }

    /// Every key listed as a source of a merge into `key`.
    pub fn merge_sources(&self, key: &SegmentKey) -> Vec<SegmentKey> {
        self.merges()
            .filter(|m| m.to == *key)
            .flat_map(|m| m.from.iter().copied())
            .collect()
    }

    /// Key a split part was carved from.
    pub fn split_origin(&self, key: &SegmentKey) -> Option<SegmentKey> {
        self.splits()
            .find(|s| s.created.contains(key))
            .map(|s| s.original)
    }

    /// Size a key had when it was first consumed by a merge.
    pub fn size_before_merge(&self, key: &SegmentKey) -> Option<usize> {
        self.merges().find_map(|m| m.from_counts.get(key).copied())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeSummary {
    pub merges: usize,
    pub converged: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct SizeNormalizer {
    min_size: usize,
    max_size: usize,
    move_limit: Option<usize>,
}

impl SizeNormalizer {
    pub fn new(config: &SegmentationConfig) -> Self {
        Self {
            min_size: config.min_size,
            max_size: config.max_size,
            move_limit: None,
        }
    }

    /// Cap merge moves below the default bound of one move per initial key.
    pub fn with_move_limit(mut self, limit: usize) -> Self {
        self.move_limit = Some(limit);
        self
    }

    pub fn min_size(&self) -> usize {
        self.min_size
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    fn undersized(&self, registry: &SegmentRegistry) -> Vec<SegmentKey> {
        registry
            .iter()
            .filter(|s| s.size < self.min_size && !s.key.is_sink())
            .map(|s| s.key)
            .collect()
    }

    /// Merge undersized segments until none remain outside the sink.
    ///
    /// Exactly one move runs per iteration, followed by a full statistics
    /// refresh. Moves are bounded by the initial key count. Twelve leaves
    /// never need more: an AOV tier takes at most two sibling merges, one
    /// sweep into its `ELSE_ELSE` parent and one move into the sink. Hitting
    /// the bound is logged as a warning, never raised.
    pub fn merge_undersized(
        &self,
        registry: &mut SegmentRegistry,
        universe: &[ClassifiedRecord],
        log: &mut NormalizationLog,
    ) -> MergeSummary {
        let max_moves = self.move_limit.unwrap_or_else(|| registry.len().max(1));
        let mut merges = 0;

        loop {
            // registry iteration is already lexicographic
            let undersized = self.undersized(registry);
            let Some(&target) = undersized.first() else {
                info!(merges, segments = registry.len(), "Merge stage converged");
                return MergeSummary {
                    merges,
                    converged: true,
                };
            };

            if merges >= max_moves {
                warn!(
                    merges,
                    remaining = undersized.len(),
                    "Merge stage hit its iteration bound"
                );
                log.push(NormalizationEvent::Warning(ConvergenceWarning {
                    message: format!(
                        "merge stage stopped after {} moves with {} undersized segments",
                        merges,
                        undersized.len()
                    ),
                    merges_performed: merges,
                    undersized,
                }));
                return MergeSummary {
                    merges,
                    converged: false,
                };
            }

            let (action, sources, destination) = plan_merge(&target, registry);
            let from_counts: BTreeMap<SegmentKey, usize> = sources
                .iter()
                .filter_map(|k| registry.get(k).map(|s| (*k, s.size)))
                .collect();

            let to_count = registry.merge_into(destination, &sources);
            registry.recompute_stats(universe);
            merges += 1;

            debug!(
                trigger = %target,
                action = ?action,
                destination = %destination,
                to_count,
                "Merged undersized segment"
            );

            log.push(NormalizationEvent::Merge(MergeRecord {
                action,
                from: sources,
                from_counts,
                to: destination,
                to_count,
            }));
        }
    }

    /// Split every segment above `max_size` into `ceil(size / max_size)`
    /// parts. Statistics are refreshed once, after all splits.
    pub fn split_oversized(
        &self,
        registry: &mut SegmentRegistry,
        universe: &[ClassifiedRecord],
        log: &mut NormalizationLog,
    ) -> usize {
        let oversized: Vec<SegmentKey> = registry
            .iter()
            .filter(|s| s.size > self.max_size)
            .map(|s| s.key)
            .collect();

        for key in &oversized {
            let Some(segment) = registry.get(key) else {
                continue;
            };
            let parts = segment.size.div_ceil(self.max_size);
            let (action, buckets) = split_members(&segment.members, universe, parts, self.max_size);

            let created: Vec<(SegmentKey, Vec<MemberIdx>)> = buckets
                .into_iter()
                .enumerate()
                .map(|(i, members)| {
                    let part = match action {
                        SplitAction::SplitBySessionsQuantile => SplitPart::Quantile(i + 1),
                        SplitAction::SplitByIndex => SplitPart::Chunk(i + 1),
                    };
                    (key.with_split(part), members)
                })
                .collect();

            let record = SplitRecord {
                action,
                original: *key,
                created: created.iter().map(|(k, _)| *k).collect(),
                counts: created.iter().map(|(_, m)| m.len()).collect(),
            };
            info!(
                original = %key,
                parts = record.created.len(),
                action = ?action,
                "Split oversized segment"
            );

            registry.replace_with_parts(key, created);
            log.push(NormalizationEvent::Split(record));
        }

        registry.recompute_stats(universe);
        oversized.len()
    }
}

/// Pick the merge move for an undersized key from its tier composition.
fn plan_merge(
    key: &SegmentKey,
    registry: &SegmentRegistry,
) -> (MergeAction, Vec<SegmentKey>, SegmentKey) {
    if key.split.is_some() {
        return (MergeAction::MergeFallbackToGlobal, vec![*key], SegmentKey::sink());
    }

    match key.base {
        BaseKey::Leaf {
            aov, engagement, ..
        } => {
            let mut sources = vec![*key];
            if let Some(sibling) = key.profitability_sibling() {
                if registry.contains(&sibling) {
                    sources.push(sibling);
                }
            }
            sources.sort();
            (
                MergeAction::MergeProfitSibling,
                sources,
                SegmentKey::engagement_parent(aov, engagement),
            )
        }
        BaseKey::EngagementParent { aov, .. } => (
            MergeAction::MergeToAovParent,
            keys_with_aov(registry, aov),
            SegmentKey::aov_parent(aov),
        ),
        BaseKey::AovParent { aov } => (
            MergeAction::MergeToGlobalOther,
            keys_with_aov(registry, aov),
            SegmentKey::sink(),
        ),
        BaseKey::Sink => (MergeAction::MergeFallbackToGlobal, vec![*key], SegmentKey::sink()),
    }
}

fn keys_with_aov(registry: &SegmentRegistry, aov: AovTier) -> Vec<SegmentKey> {
    registry
        .keys()
        .filter(|k| k.aov() == Some(aov))
        .copied()
        .collect()
}

/// Partition members into `parts` buckets. Uses quantile cuts of the
/// session count when it varies across members, else contiguous blocks of
/// `max_size` in member order. Tied session counts share a bucket, so a
/// quantile part may exceed `max_size` or stay empty.
fn split_members(
    members: &[MemberIdx],
    universe: &[ClassifiedRecord],
    parts: usize,
    max_size: usize,
) -> (SplitAction, Vec<Vec<MemberIdx>>) {
    let sessions: Option<Vec<f64>> = members
        .iter()
        .map(|&idx| universe[idx].record.sessions_last_30d)
        .collect();

    if let Some(values) = sessions {
        let varies = values.iter().any(|v| *v != values[0]);
        if varies {
            let ascending = sorted(values.iter().copied());
            let cuts: Vec<f64> = (1..parts)
                .map(|i| quantile_sorted(&ascending, i as f64 / parts as f64))
                .collect();

            let mut buckets = vec![Vec::new(); parts];
            for (&idx, &value) in members.iter().zip(&values) {
                let bucket = cuts
                    .iter()
                    .position(|cut| value <= *cut)
                    .unwrap_or(cuts.len());
                buckets[bucket].push(idx);
            }
            return (SplitAction::SplitBySessionsQuantile, buckets);
        }
    }

    let chunks = members.chunks(max_size).map(|c| c.to_vec()).collect();
    (SplitAction::SplitByIndex, chunks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assignment::BucketAssigner;
    use crate::keys::Tier;
    use crate::thresholds::Thresholds;
    use campaign_core::CustomerRecord;

    fn config(min_size: usize, max_size: usize) -> SegmentationConfig {
        SegmentationConfig {
            min_size,
            max_size,
            split_oversize: true,
        }
    }

    /// Classify against fixed thresholds so tests control the leaf sizes.
    fn universe_with(leaves: &[(AovTier, Tier, Tier, usize)]) -> Vec<ClassifiedRecord> {
        let assigner = BucketAssigner::new(Thresholds {
            aov_p20: 20.0,
            aov_p50: 35.0,
            aov_p80: 50.0,
            eng_p50: 0.5,
            prof_p50: 0.5,
        });
        let mut records = Vec::new();
        for &(aov, eng, prof, count) in leaves {
            for _ in 0..count {
                let value = match aov {
                    AovTier::Low => 10.0,
                    AovTier::Mid => 30.0,
                    AovTier::High => 80.0,
                };
                let tier_value = |t: Tier| if t == Tier::High { 0.9 } else { 0.1 };
                records.push(CustomerRecord::new(
                    format!("u{}", records.len()),
                    value,
                    tier_value(eng),
                    tier_value(prof),
                    (records.len() % 7) as u32,
                ));
            }
        }
        assigner.assign(records)
    }

    fn all_leaves(count: usize) -> Vec<(AovTier, Tier, Tier, usize)> {
        SegmentKey::all_leaves()
            .into_iter()
            .map(|k| match k.base {
                BaseKey::Leaf {
                    aov,
                    engagement,
                    profitability,
                } => (aov, engagement, profitability, count),
                _ => unreachable!(),
            })
            .collect()
    }

    #[test]
    fn test_no_merge_when_all_large_enough() {
        let universe = universe_with(&all_leaves(10));
        let mut registry = SegmentRegistry::aggregate(&universe);
        let mut log = NormalizationLog::default();
        let summary = SizeNormalizer::new(&config(10, 1000)).merge_undersized(
            &mut registry,
            &universe,
            &mut log,
        );
        assert_eq!(summary, MergeSummary { merges: 0, converged: true });
        assert!(log.is_empty());
        assert_eq!(registry.len(), 12);
    }

    #[test]
    fn test_small_leaf_merges_with_profit_sibling() {
        let mut leaves = all_leaves(10);
        // HighAOV_HighEng_HighProf is first in key order
        leaves[0].3 = 3;
        let universe = universe_with(&leaves);
        let mut registry = SegmentRegistry::aggregate(&universe);
        let mut log = NormalizationLog::default();

        let summary = SizeNormalizer::new(&config(5, 1000)).merge_undersized(
            &mut registry,
            &universe,
            &mut log,
        );
        assert!(summary.converged);
        assert_eq!(summary.merges, 1);

        let merge = log.merges().next().unwrap();
        assert_eq!(merge.action, MergeAction::MergeProfitSibling);
        assert_eq!(merge.to.label(), "HighAOV_HighEng_ELSE");
        assert_eq!(merge.to_count, 13);
        assert_eq!(merge.from_counts.values().sum::<usize>(), 13);
        assert_eq!(registry.total_members(), universe.len());
        assert_eq!(registry.len(), 11);
    }

    #[test]
    fn test_cascade_to_aov_parent_and_sink() {
        // a whole AOV tier too small to stand alone climbs to the sink
        let mut leaves = all_leaves(20);
        for leaf in leaves.iter_mut().filter(|l| l.0 == AovTier::Mid) {
            leaf.3 = 1;
        }
        let universe = universe_with(&leaves);
        let mut registry = SegmentRegistry::aggregate(&universe);
        let mut log = NormalizationLog::default();

        let summary = SizeNormalizer::new(&config(10, 1000)).merge_undersized(
            &mut registry,
            &universe,
            &mut log,
        );
        assert!(summary.converged);

        let actions: Vec<MergeAction> = log.merges().map(|m| m.action).collect();
        assert_eq!(
            actions,
            vec![
                MergeAction::MergeProfitSibling,
                MergeAction::MergeToAovParent,
                MergeAction::MergeToGlobalOther,
            ]
        );
        let sink = registry.get(&SegmentKey::sink()).unwrap();
        assert_eq!(sink.size, 4);
        assert!(registry.keys().all(|k| k.aov() != Some(AovTier::Mid)));
        assert_eq!(registry.total_members(), universe.len());
        assert_eq!(registry.duplicate_assignments(), 0);
    }

    #[test]
    fn test_everything_collapses_into_sink() {
        let universe = universe_with(&all_leaves(1));
        let mut registry = SegmentRegistry::aggregate(&universe);
        let mut log = NormalizationLog::default();

        let summary = SizeNormalizer::new(&config(500, 20_000)).merge_undersized(
            &mut registry,
            &universe,
            &mut log,
        );
        assert!(summary.converged);
        assert!(summary.merges <= 12);
        assert_eq!(registry.len(), 1);
        let sink = registry.get(&SegmentKey::sink()).unwrap();
        assert_eq!(sink.size, 12);
        // the sink stays below min_size and is left alone
        assert!(sink.size < 500);
        assert!(log.warnings().next().is_none());
    }

    #[test]
    fn test_every_merge_preserves_totals() {
        let mut leaves = all_leaves(7);
        leaves[3].3 = 0;
        leaves[8].3 = 2;
        let universe = universe_with(&leaves);
        let mut registry = SegmentRegistry::aggregate(&universe);
        let mut log = NormalizationLog::default();

        SizeNormalizer::new(&config(8, 1000)).merge_undersized(&mut registry, &universe, &mut log);
        for merge in log.merges() {
            let moved: usize = merge.from_counts.values().sum();
            assert!(merge.to_count >= moved);
        }
        assert_eq!(registry.total_members(), universe.len());
        assert!(registry
            .iter()
            .all(|s| s.key.is_sink() || s.size >= 8));
    }

    #[test]
    fn test_log_lookups() {
        let mut leaves = all_leaves(10);
        leaves[0].3 = 1;
        let universe = universe_with(&leaves);
        let mut registry = SegmentRegistry::aggregate(&universe);
        let mut log = NormalizationLog::default();
        SizeNormalizer::new(&config(5, 1000)).merge_undersized(&mut registry, &universe, &mut log);

        let small = SegmentKey::leaf(AovTier::High, Tier::High, Tier::High);
        let parent = SegmentKey::engagement_parent(AovTier::High, Tier::High);
        assert_eq!(log.merged_into(&small), Some(parent));
        assert_eq!(log.size_before_merge(&small), Some(1));
        assert_eq!(log.merge_sources(&parent).len(), 2);
        assert_eq!(log.merged_into(&parent), None);
    }

    #[test]
    fn test_positional_split_when_sessions_constant() {
        let universe = universe_with(&[(AovTier::High, Tier::High, Tier::High, 45)]);
        let mut registry = SegmentRegistry::aggregate(&universe);
        let mut log = NormalizationLog::default();
        let key = SegmentKey::leaf(AovTier::High, Tier::High, Tier::High);
        let original: Vec<MemberIdx> = registry.get(&key).unwrap().members.clone();

        let splits = SizeNormalizer::new(&config(1, 20)).split_oversized(
            &mut registry,
            &universe,
            &mut log,
        );
        assert_eq!(splits, 1);
        assert!(!registry.contains(&key));

        let record = log.splits().next().unwrap();
        assert_eq!(record.action, SplitAction::SplitByIndex);
        assert_eq!(record.counts, vec![20, 20, 5]);
        assert_eq!(record.created[0].label(), "HighAOV_HighEng_HighProf_SPLIT_1");

        let mut rejoined: Vec<MemberIdx> = record
            .created
            .iter()
            .flat_map(|k| registry.get(k).unwrap().members.clone())
            .collect();
        rejoined.sort();
        let mut expected = original;
        expected.sort();
        assert_eq!(rejoined, expected);
    }

    #[test]
    fn test_quantile_split_by_sessions() {
        let records: Vec<CustomerRecord> = (0..30)
            .map(|i| {
                CustomerRecord::new(format!("u{}", i), 80.0, 0.9, 0.9, 0).with_sessions(i as f64)
            })
            .collect();
        let universe = BucketAssigner::new(Thresholds {
            aov_p20: 20.0,
            aov_p50: 35.0,
            aov_p80: 50.0,
            eng_p50: 0.5,
            prof_p50: 0.5,
        })
        .assign(records);
        let mut registry = SegmentRegistry::aggregate(&universe);
        let mut log = NormalizationLog::default();

        SizeNormalizer::new(&config(1, 10)).split_oversized(&mut registry, &universe, &mut log);
        let record = log.splits().next().unwrap();
        assert_eq!(record.action, SplitAction::SplitBySessionsQuantile);
        assert_eq!(record.created.len(), 3);
        assert_eq!(record.created[2].label(), "HighAOV_HighEng_HighProf_SPLIT_Q3");
        assert_eq!(record.counts.iter().sum::<usize>(), 30);
        assert_eq!(record.counts, vec![10, 10, 10]);

        // lowest-session members land in the first bucket
        let first = registry.get(&record.created[0]).unwrap();
        assert!(first
            .members
            .iter()
            .all(|&i| universe[i].record.sessions_last_30d.unwrap() < 10.0));
        assert_eq!(log.split_origin(&record.created[1]), Some(record.original));
    }

    #[test]
    fn test_split_leaves_small_segments_alone() {
        let universe = universe_with(&all_leaves(5));
        let mut registry = SegmentRegistry::aggregate(&universe);
        let mut log = NormalizationLog::default();
        let splits = SizeNormalizer::new(&config(1, 5)).split_oversized(
            &mut registry,
            &universe,
            &mut log,
        );
        assert_eq!(splits, 0);
        assert_eq!(registry.len(), 12);
        assert!(log.is_empty());
    }

    #[test]
    fn test_move_limit_records_warning() {
        let universe = universe_with(&all_leaves(1));
        let mut registry = SegmentRegistry::aggregate(&universe);
        let mut log = NormalizationLog::default();

        let summary = SizeNormalizer::new(&config(5, 1000))
            .with_move_limit(2)
            .merge_undersized(&mut registry, &universe, &mut log);

        assert_eq!(summary, MergeSummary { merges: 2, converged: false });
        assert_eq!(log.merges().count(), 2);
        let warning = log.warnings().next().unwrap();
        assert_eq!(warning.merges_performed, 2);
        assert!(!warning.undersized.is_empty());
        assert!(matches!(log.events().last(), Some(NormalizationEvent::Warning(_))));
        // the partial state is still exhaustive
        assert_eq!(registry.total_members(), 12);
        assert_eq!(registry.duplicate_assignments(), 0);
    }

    #[test]
    fn test_default_bound_covers_full_collapse() {
        // every leaf undersized: all twelve cascade to the sink
        let universe = universe_with(&all_leaves(1));
        let mut registry = SegmentRegistry::aggregate(&universe);
        let mut log = NormalizationLog::default();

        let summary = SizeNormalizer::new(&config(100, 1000)).merge_undersized(
            &mut registry,
            &universe,
            &mut log,
        );
        assert!(summary.converged);
        assert!(summary.merges <= 12);
        assert_eq!(log.warnings().count(), 0);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(&SegmentKey::sink()).unwrap().size, 12);
    }

    #[test]
    fn test_quantile_split_keeps_skewed_buckets() {
        // 40 members tied at the lowest session count share one bucket
        let records: Vec<CustomerRecord> = (0..45)
            .map(|i| {
                let sessions = if i < 40 { 0.0 } else { 1.0 };
                CustomerRecord::new(format!("u{}", i), 80.0, 0.9, 0.9, 0).with_sessions(sessions)
            })
            .collect();
        let universe = BucketAssigner::new(Thresholds {
            aov_p20: 20.0,
            aov_p50: 35.0,
            aov_p80: 50.0,
            eng_p50: 0.5,
            prof_p50: 0.5,
        })
        .assign(records);
        let mut registry = SegmentRegistry::aggregate(&universe);
        let mut log = NormalizationLog::default();

        SizeNormalizer::new(&config(1, 20)).split_oversized(&mut registry, &universe, &mut log);
        let record = log.splits().next().unwrap();
        assert_eq!(record.action, SplitAction::SplitBySessionsQuantile);
        assert_eq!(record.counts, vec![40, 0, 5]);

        let first = registry.get(&record.created[0]).unwrap();
        assert_eq!(first.key.label(), "HighAOV_HighEng_HighProf_SPLIT_Q1");
        assert!(first.size > 20);
        let empty = registry.get(&record.created[1]).unwrap();
        assert_eq!(empty.key.label(), "HighAOV_HighEng_HighProf_SPLIT_Q2");
        assert_eq!(empty.size, 0);
    }
}
