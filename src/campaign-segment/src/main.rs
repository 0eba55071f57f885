//! Campaign Segment: MECE audience segmentation of cart-abandonment data.
//!
//! Loads a JSON feed, resolves the 7-day analysis window, segments the
//! universe and writes the summary, mapping and compliance report.

use anyhow::Context;
use campaign_core::config::AppConfig;
use campaign_core::CartAbandonment;
use campaign_reporting::{write_outputs, MeceReport, RecordMapping, SegmentSummary};
use campaign_segmentation::window::{data_range, select_universe};
use campaign_segmentation::{AnalysisWindow, SegmentationEngine};
use chrono::NaiveDate;
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "campaign-segment")]
#[command(about = "MECE audience segmentation for cart-abandonment campaigns")]
#[command(version)]
struct Cli {
    /// JSON array of cart-abandonment records
    #[arg(long, env = "CAMPAIGN_SEGMENT__INPUT")]
    input: PathBuf,

    /// Optional TOML configuration file
    #[arg(long, env = "CAMPAIGN_SEGMENT__CONFIG")]
    config: Option<String>,

    /// Window start (YYYY-MM-DD)
    #[arg(long)]
    start_date: Option<NaiveDate>,

    /// Window end (YYYY-MM-DD); defaults to the latest date in the feed
    #[arg(long)]
    end_date: Option<NaiveDate>,

    /// Split segments above the maximum size (overrides config)
    #[arg(long, default_value_t = false)]
    split_oversize: bool,

    /// Minimum segment size (overrides config)
    #[arg(long)]
    min_size: Option<usize>,

    /// Maximum segment size (overrides config)
    #[arg(long)]
    max_size: Option<usize>,

    /// Output directory; derived from the window when unset
    #[arg(long)]
    output_dir: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "campaign_segment=info,campaign_segmentation=info,campaign_reporting=info".into()
            }),
        )
        .json()
        .init();

    let cli = Cli::parse();

    // Invalid size bounds abort here; a missing config file does not.
    let mut config = AppConfig::load(cli.config.as_deref())?;

    // Apply CLI overrides
    if let Some(min_size) = cli.min_size {
        config.segmentation.min_size = min_size;
    }
    if let Some(max_size) = cli.max_size {
        config.segmentation.max_size = max_size;
    }
    if cli.split_oversize {
        config.segmentation.split_oversize = true;
    }

    let engine = SegmentationEngine::new(config.segmentation.clone())?;

    let raw = std::fs::read_to_string(&cli.input)
        .with_context(|| format!("reading {}", cli.input.display()))?;
    let events: Vec<CartAbandonment> =
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", cli.input.display()))?;
    info!(records = events.len(), input = %cli.input.display(), "Feed loaded");

    let (data_min, data_max) = data_range(&events).context("input feed has no records")?;
    let window = AnalysisWindow::resolve(cli.start_date, cli.end_date, data_min, data_max)?;
    let universe = select_universe(&events, &window)?;

    let outcome = engine.run(universe)?;
    if !outcome.converged {
        warn!("Merge stage did not converge; see the merge log");
    }

    let min_size = config.segmentation.min_size;
    let summary = SegmentSummary::build(&outcome, min_size);
    let mapping = RecordMapping::build(&outcome, &summary);
    let report = MeceReport::build(&window, &config.segmentation, &outcome, &mapping);

    let output_dir = cli
        .output_dir
        .or_else(|| config.output.directory.as_ref().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(window.directory_name()));
    let paths = write_outputs(&output_dir, &summary, &mapping, &report)?;

    println!("=== Segmentation Complete ===");
    println!("Window:       {} to {}", window.start, window.end);
    println!("Universe:     {}", outcome.universe.len());
    println!("Segments:     {}", summary.final_segments());
    println!("Merges:       {}", outcome.merges_performed());
    println!("Splits:       {}", outcome.splits_performed());
    println!(
        "MECE:         {}",
        if report.mece_validation.is_compliant() { "PASS" } else { "FAIL" }
    );
    println!("Summary:      {}", paths.segments_summary.display());
    println!("Mapping:      {}", paths.user_segment_map.display());
    println!("Report:       {}", paths.mece_report.display());

    Ok(())
}
