//! Engine builder: fluent API for configuring a segmentation run.

use campaign_core::{CampaignResult, SegmentationConfig};

use crate::engine::SegmentationEngine;

pub struct EngineBuilder {
    config: SegmentationConfig,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self {
            config: SegmentationConfig::default(),
        }
    }

    pub fn from_config(config: SegmentationConfig) -> Self {
        Self { config }
    }

    pub fn min_size(mut self, min_size: usize) -> Self {
        self.config.min_size = min_size;
        self
    }

    pub fn max_size(mut self, max_size: usize) -> Self {
        self.config.max_size = max_size;
        self
    }

    pub fn split_oversize(mut self, enabled: bool) -> Self {
        self.config.split_oversize = enabled;
        self
    }

    pub fn build(self) -> CampaignResult<SegmentationEngine> {
        SegmentationEngine::new(self.config)
    }
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_overrides_defaults() {
        let engine = EngineBuilder::new()
            .min_size(50)
            .max_size(5000)
            .split_oversize(true)
            .build()
            .unwrap();
        assert_eq!(engine.config().min_size, 50);
        assert_eq!(engine.config().max_size, 5000);
        assert!(engine.config().split_oversize);
    }

    #[test]
    fn test_builder_validates() {
        assert!(EngineBuilder::new().min_size(0).build().is_err());
        assert!(EngineBuilder::new().max_size(100).build().is_err());
    }
}
