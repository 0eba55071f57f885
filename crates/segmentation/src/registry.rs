//! Segment registry: per-key aggregates over the classified universe.
//!
//! Members are stored as indices into the universe slice the registry was
//! built from. Every mutation (merge or split) is applied as one batch:
//! sources removed, destination inserted, nothing partially applied.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use crate::assignment::ClassifiedRecord;
use crate::keys::SegmentKey;

pub type MemberIdx = usize;

#[derive(Debug, Clone, Serialize)]
pub struct Segment {
    pub key: SegmentKey,
    #[serde(skip)]
    pub members: Vec<MemberIdx>,
    pub size: usize,
    pub conversion_potential: f64,
    pub profitability: f64,
    pub avg_order_value: f64,
}

impl Segment {
    pub fn empty(key: SegmentKey) -> Self {
        Self {
            key,
            members: Vec::new(),
            size: 0,
            conversion_potential: 0.0,
            profitability: 0.0,
            avg_order_value: 0.0,
        }
    }

    fn with_members(key: SegmentKey, members: Vec<MemberIdx>) -> Self {
        let mut segment = Self::empty(key);
        segment.members = members;
        segment
    }

    /// Refresh size and means from current membership. Empty segments get 0.0.
    pub fn recompute(&mut self, universe: &[ClassifiedRecord]) {
        self.size = self.members.len();
        if self.members.is_empty() {
            self.conversion_potential = 0.0;
            self.profitability = 0.0;
            self.avg_order_value = 0.0;
            return;
        }

        let (mut conversion, mut profitability, mut aov) = (0.0, 0.0, 0.0);
        for &idx in &self.members {
            let member = &universe[idx];
            conversion += member.conversion_potential;
            profitability += member.record.profitability_score;
            aov += member.record.avg_order_value;
        }
        let n = self.size as f64;
        self.conversion_potential = conversion / n;
        self.profitability = profitability / n;
        self.avg_order_value = aov / n;
    }

    pub fn member_ids<'a>(&self, universe: &'a [ClassifiedRecord]) -> Vec<&'a str> {
        self.members
            .iter()
            .map(|&idx| universe[idx].record.id.as_str())
            .collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct SegmentRegistry {
    segments: BTreeMap<SegmentKey, Segment>,
}

impl SegmentRegistry {
    /// Group the universe by leaf key. All twelve leaves are present
    /// afterwards, including those nobody mapped to.
    pub fn aggregate(universe: &[ClassifiedRecord]) -> Self {
        let mut segments: BTreeMap<SegmentKey, Segment> = SegmentKey::all_leaves()
            .into_iter()
            .map(|key| (key, Segment::empty(key)))
            .collect();

        for (idx, classified) in universe.iter().enumerate() {
            segments
                .entry(classified.leaf)
                .or_insert_with(|| Segment::empty(classified.leaf))
                .members
                .push(idx);
        }

        let mut registry = Self { segments };
        registry.recompute_stats(universe);
        registry
    }

    pub fn recompute_stats(&mut self, universe: &[ClassifiedRecord]) {
        for segment in self.segments.values_mut() {
            segment.recompute(universe);
        }
    }

    pub fn get(&self, key: &SegmentKey) -> Option<&Segment> {
        self.segments.get(key)
    }

    pub fn contains(&self, key: &SegmentKey) -> bool {
        self.segments.contains_key(key)
    }

    /// Segments in key order.
    pub fn iter(&self) -> impl Iterator<Item = &Segment> {
        self.segments.values()
    }

    pub fn keys(&self) -> impl Iterator<Item = &SegmentKey> {
        self.segments.keys()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn total_members(&self) -> usize {
        self.segments.values().map(|s| s.members.len()).sum()
    }

    pub fn sizes(&self) -> BTreeMap<SegmentKey, usize> {
        self.segments.iter().map(|(k, s)| (*k, s.size)).collect()
    }

    /// Map each universe index to the segment holding it. An index held by
    /// more than one segment keeps the first key in registry order.
    pub fn membership(&self) -> HashMap<MemberIdx, SegmentKey> {
        let mut index = HashMap::with_capacity(self.total_members());
        for segment in self.segments.values() {
            for &idx in &segment.members {
                index.entry(idx).or_insert(segment.key);
            }
        }
        index
    }

    /// Number of universe indices held by more than one segment.
    pub fn duplicate_assignments(&self) -> usize {
        let mut seen: HashMap<MemberIdx, usize> = HashMap::new();
        for segment in self.segments.values() {
            for &idx in &segment.members {
                *seen.entry(idx).or_insert(0) += 1;
            }
        }
        seen.values().filter(|&&count| count > 1).count()
    }

    /// Move every member of `sources` into `destination`. Members already in
    /// `destination` stay put and come first. Returns the destination size.
    /// Statistics are left stale; callers recompute once the batch is done.
    pub fn merge_into(&mut self, destination: SegmentKey, sources: &[SegmentKey]) -> usize {
        let mut members = self
            .segments
            .remove(&destination)
            .map(|s| s.members)
            .unwrap_or_default();

        for key in sources {
            if *key == destination {
                continue;
            }
            if let Some(source) = self.segments.remove(key) {
                members.extend(source.members);
            }
        }

        let size = members.len();
        self.segments
            .insert(destination, Segment::with_members(destination, members));
        size
    }

    /// Retire `original` and insert the given parts in its place.
    pub fn replace_with_parts(
        &mut self,
        original: &SegmentKey,
        parts: Vec<(SegmentKey, Vec<MemberIdx>)>,
    ) {
        self.segments.remove(original);
        for (key, members) in parts {
            self.segments.insert(key, Segment::with_members(key, members));
        }
    }
}
