use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Instant;

use recall_merge::config::{CollisionPolicy, MergeConfig};
use recall_merge::ingest::{load_primary, load_secondary, write_json_array};
use recall_merge::progress::{format_duration, Progress, ProgressMode};
use recall_merge::safety::validate_output_path;
use recall_merge::reconcile_with_progress;

#[derive(Parser)]
#[command(name = "recall-merge")]
#[command(about = "Merge announcement-site recall details into enforcement API recall records")]
struct Args {
    /// Enforcement API dump (JSON array of recall records)
    primary: PathBuf,

    /// Announcement-site dump (JSON array with product_details, url, images)
    secondary: PathBuf,

    /// Merged output file (name must contain "merged")
    output: PathBuf,

    /// TOML file with matcher settings
    #[arg(long)]
    config: Option<PathBuf>,

    /// Only use the first N records of each source
    #[arg(long)]
    limit: Option<usize>,

    /// Minimum combined score to accept a match
    #[arg(long)]
    threshold: Option<f64>,

    /// Let a later record replace an earlier one with the same normalized key
    #[arg(long)]
    last_wins: bool,

    /// Worker threads (0 = rayon default)
    #[arg(long, default_value = "0")]
    workers: usize,

    /// Hide progress bars and print periodic progress lines instead
    #[arg(long)]
    log_only: bool,

    /// Write run statistics as JSON
    #[arg(long)]
    stats: Option<PathBuf>,
}

fn build_config(args: &Args) -> Result<MergeConfig> {
    let mut config = match &args.config {
        Some(path) => MergeConfig::from_toml_file(path)
            .with_context(|| format!("Failed to load config {:?}", path))?,
        None => MergeConfig::default(),
    };

    if args.limit.is_some() {
        config.record_limit = args.limit;
    }
    if let Some(threshold) = args.threshold {
        config.match_threshold = threshold;
    }
    if args.last_wins {
        config.collisions = CollisionPolicy::LastWins;
    }
    if args.workers > 0 {
        config.workers = args.workers;
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = build_config(&args)?;
    let progress = Progress::new(if args.log_only {
        ProgressMode::LogOnly
    } else {
        ProgressMode::Bars
    });

    validate_output_path(&args.output, "merged", &[&args.primary, &args.secondary])?;

    let start = Instant::now();

    log::info!("Loading primary source: {:?}", args.primary);
    let primary = load_primary(&args.primary, config.record_limit)
        .context("Failed to load primary source")?;
    log::info!("Loading secondary source: {:?}", args.secondary);
    let secondary = load_secondary(&args.secondary, config.record_limit)
        .context("Failed to load secondary source")?;
    log::info!(
        "Loaded {} primary and {} secondary records",
        primary.records.len(),
        secondary.records.len()
    );

    let mut outcome =
        reconcile_with_progress(&primary.records, &secondary.records, &config, &progress)
            .context("Reconciliation failed")?;
    outcome.stats.missing_fields = primary.missing_fields + secondary.missing_fields;

    write_json_array(&args.output, &outcome.records)
        .with_context(|| format!("Failed to write output {:?}", args.output))?;

    let stats = &outcome.stats;
    println!("\n{:=<60}", "");
    println!("Merge complete!");
    println!("  Recalls: {}", stats.primary_records);
    println!("  Merged: {} ({:.1}%)", stats.merged, stats.match_rate());
    println!("  Unmatched: {}", stats.unmatched);
    println!("  Low-confidence matches: {}", stats.low_confidence_matches);
    println!("  Near misses: {}", stats.near_misses);
    println!("  Unused announcements: {}", stats.unused_secondary);
    println!("  Key collisions: {}", stats.key_collisions);
    println!("  Defaulted fields: {}", stats.missing_fields);
    println!("  Output: {:?}", args.output);
    println!("  Elapsed: {}", format_duration(start.elapsed()));
    println!("{:=<60}", "");

    if progress.is_log_only() {
        stats.log_phase("final");
    }
    if let Some(path) = &args.stats {
        stats
            .write_to_file(path)
            .with_context(|| format!("Failed to write stats {:?}", path))?;
    }

    Ok(())
}
