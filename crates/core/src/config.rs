use serde::Deserialize;

use crate::error::{CampaignError, CampaignResult};

/// Root application configuration. Loaded from an optional TOML file and
/// environment variables with the prefix `CAMPAIGN_SEGMENT__`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub segmentation: SegmentationConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Size bounds and switches recognised by the segmentation pipeline.
#[derive(Debug, Clone, Deserialize)]
pub struct SegmentationConfig {
    /// Segments below this size are merged upward through the hierarchy.
    #[serde(default = "default_min_size")]
    pub min_size: usize,
    /// Segments above this size are split when `split_oversize` is set.
    #[serde(default = "default_max_size")]
    pub max_size: usize,
    #[serde(default)]
    pub split_oversize: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputConfig {
    /// Output directory. Derived from the analysis window when unset.
    #[serde(default)]
    pub directory: Option<String>,
}

fn default_min_size() -> usize {
    500
}
fn default_max_size() -> usize {
    20_000
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            min_size: default_min_size(),
            max_size: default_max_size(),
            split_oversize: false,
        }
    }
}

impl SegmentationConfig {
    /// Reject size bounds the pipeline cannot honour. Runs before any
    /// record is touched.
    pub fn validate(&self) -> CampaignResult<()> {
        if self.min_size == 0 {
            return Err(CampaignError::Config(
                "min_size must be a positive integer".to_string(),
            ));
        }
        if self.max_size == 0 {
            return Err(CampaignError::Config(
                "max_size must be a positive integer".to_string(),
            ));
        }
        if self.max_size < self.min_size {
            return Err(CampaignError::Config(format!(
                "max_size ({}) must be >= min_size ({})",
                self.max_size, self.min_size
            )));
        }
        Ok(())
    }
}

impl AppConfig {
    /// Load configuration from environment variables and an optional config file.
    pub fn load(path: Option<&str>) -> CampaignResult<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }
        let builder = builder.add_source(
            config::Environment::with_prefix("CAMPAIGN_SEGMENT")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = builder.build()?.try_deserialize()?;
        config.segmentation.validate()?;
        Ok(config)
    }
}
