//! Core segmentation engine: thresholds, assignment, aggregation, size
//! normalization and scoring over one in-memory universe.

use campaign_core::{CampaignError, CampaignResult, CustomerRecord, SegmentationConfig};
use std::collections::{BTreeMap, HashMap};
use tracing::info;

use crate::assignment::{BucketAssigner, ClassifiedRecord};
use crate::builder::EngineBuilder;
use crate::keys::SegmentKey;
use crate::normalizer::{NormalizationLog, SizeNormalizer};
use crate::registry::SegmentRegistry;
use crate::scorer::{ScoredSegment, SegmentScorer};
use crate::thresholds::Thresholds;

/// Everything a run produces, handed to the reporting layer.
#[derive(Debug, Clone)]
pub struct SegmentationOutcome {
    pub thresholds: Thresholds,
    pub universe: Vec<ClassifiedRecord>,
    /// Leaf sizes straight after aggregation, before any merge.
    pub leaf_counts: BTreeMap<SegmentKey, usize>,
    pub registry: SegmentRegistry,
    pub log: NormalizationLog,
    /// Final segments, ranked.
    pub scored: Vec<ScoredSegment>,
    pub converged: bool,
}

impl SegmentationOutcome {
    /// Final segment for each record id.
    pub fn assignments(&self) -> HashMap<&str, SegmentKey> {
        self.registry
            .membership()
            .into_iter()
            .map(|(idx, key)| (self.universe[idx].record.id.as_str(), key))
            .collect()
    }

    pub fn merges_performed(&self) -> usize {
        self.log.merges().count()
    }

    pub fn splits_performed(&self) -> usize {
        self.log.splits().count()
    }
}

#[derive(Debug, Clone, Default)]
pub struct SegmentationEngine {
    config: SegmentationConfig,
}

impl SegmentationEngine {
    /// Configuration errors are raised here, before any record is touched.
    pub fn new(config: SegmentationConfig) -> CampaignResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    pub fn config(&self) -> &SegmentationConfig {
        &self.config
    }

    pub fn run(&self, records: Vec<CustomerRecord>) -> CampaignResult<SegmentationOutcome> {
        if records.is_empty() {
            return Err(CampaignError::EmptyUniverse);
        }

        let thresholds = Thresholds::compute(&records)?;
        let universe = BucketAssigner::new(thresholds).assign(records);

        let mut registry = SegmentRegistry::aggregate(&universe);
        let leaf_counts = registry.sizes();
        info!(
            universe = universe.len(),
            populated_leaves = leaf_counts.values().filter(|&&n| n > 0).count(),
            "Leaf segments aggregated"
        );

        let normalizer = SizeNormalizer::new(&self.config);
        let mut log = NormalizationLog::default();
        let merge = normalizer.merge_undersized(&mut registry, &universe, &mut log);
        if self.config.split_oversize {
            normalizer.split_oversized(&mut registry, &universe, &mut log);
        }

        let scored = SegmentScorer::new(&universe)?.score(&registry);
        info!(
            segments = scored.len(),
            merges = merge.merges,
            converged = merge.converged,
            "Segmentation complete"
        );

        Ok(SegmentationOutcome {
            thresholds,
            universe,
            leaf_counts,
            registry,
            log,
            scored,
            converged: merge.converged,
        })
    }
}
