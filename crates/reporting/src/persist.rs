//! Writes the three run outputs into one directory.

use campaign_core::CampaignResult;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::compliance::MeceReport;
use crate::mapping::RecordMapping;
use crate::summary::SegmentSummary;

pub const SUMMARY_FILE: &str = "segments_summary.json";
pub const MAPPING_FILE: &str = "user_segment_map.json";
pub const REPORT_FILE: &str = "mece_report.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputPaths {
    pub segments_summary: PathBuf,
    pub user_segment_map: PathBuf,
    pub mece_report: PathBuf,
}

/// Create `dir` if needed and write the summary, mapping and report.
pub fn write_outputs(
    dir: &Path,
    summary: &SegmentSummary,
    mapping: &RecordMapping,
    report: &MeceReport,
) -> CampaignResult<OutputPaths> {
    fs::create_dir_all(dir)?;

    let paths = OutputPaths {
        segments_summary: dir.join(SUMMARY_FILE),
        user_segment_map: dir.join(MAPPING_FILE),
        mece_report: dir.join(REPORT_FILE),
    };
    write_json(&paths.segments_summary, summary.rows())?;
    write_json(&paths.user_segment_map, mapping)?;
    write_json(&paths.mece_report, report)?;

    info!(dir = %dir.display(), run_id = %report.run_id, "Outputs written");
    Ok(paths)
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> CampaignResult<()> {
    let body = serde_json::to_string_pretty(value)?;
    fs::write(path, body)?;
    Ok(())
}
