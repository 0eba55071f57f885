pub mod config;
pub mod error;
pub mod types;

pub use config::{AppConfig, SegmentationConfig};
pub use error::{CampaignError, CampaignResult};
pub use types::{CartAbandonment, CustomerRecord};
