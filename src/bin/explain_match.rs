//! Show how one recall record scores against the announcement candidates
//!
//! Usage: explain-match <food_recalls.json> <announcements.json> --record N [--top K]

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;

use recall_merge::config::MergeConfig;
use recall_merge::index::CandidateIndex;
use recall_merge::ingest::{load_primary, load_secondary};
use recall_merge::models::MatchDecision;
use recall_merge::normalize::Normalizer;
use recall_merge::Matcher;

#[derive(Parser)]
#[command(name = "explain-match")]
#[command(about = "Print the ranked score breakdown for one primary record")]
struct Args {
    primary: PathBuf,

    secondary: PathBuf,

    /// Index of the primary record to explain
    #[arg(long, default_value = "0")]
    record: usize,

    /// Number of candidates to show
    #[arg(long, default_value = "10")]
    top: usize,

    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => MergeConfig::from_toml_file(path)
            .with_context(|| format!("Failed to load config {:?}", path))?,
        None => MergeConfig::default(),
    };
    config.validate().context("Invalid configuration")?;

    let primary = load_primary(&args.primary, config.record_limit)
        .context("Failed to load primary source")?;
    let secondary = load_secondary(&args.secondary, config.record_limit)
        .context("Failed to load secondary source")?;
    let primary_records = &primary.records;
    let secondary_records = &secondary.records;

    let Some(record) = primary_records.get(args.record) else {
        bail!(
            "Record {} out of range ({} primary records)",
            args.record,
            primary_records.len()
        );
    };

    let normalizer = Normalizer::new(&config)?;
    let index = CandidateIndex::build(secondary_records, &normalizer, config.collisions);
    let matcher = Matcher::new(&config, &normalizer, &index);

    let query = matcher.query(record);
    let decision = matcher.decide(&query);
    let chosen = decision.matched().map(|m| m.candidate.position);

    let mut keywords: Vec<&str> = query.keywords.iter().map(String::as_str).collect();
    keywords.sort_unstable();

    println!("=== RECORD {} ===", args.record);
    println!("  Company:  {:?}", query.company);
    println!("  Product:  {:?}", query.product);
    println!("  Keywords: {}", keywords.join(", "));
    println!(
        "  Candidates: {} (threshold {:.1})",
        index.len(),
        config.match_threshold
    );
    println!();

    println!("   #  Pos    Company  Product  Keywords   Total  Candidate");
    println!("─────────────────────────────────────────────────────────────────────");
    for (rank, (candidate, breakdown)) in matcher.rank(&query).into_iter().take(args.top).enumerate()
    {
        let marker = if chosen == Some(candidate.position) { "*" } else { " " };
        println!(
            "{}{:>3}  {:<5} {:>8.1} {:>8.1} {:>9.1} {:>7.1}  {} | {}",
            marker,
            rank + 1,
            candidate.position,
            breakdown.company,
            breakdown.product,
            breakdown.keywords,
            breakdown.total,
            candidate.company(),
            candidate.product()
        );
    }
    println!("─────────────────────────────────────────────────────────────────────");

    match decision {
        MatchDecision::Matched(found) => println!(
            "Selected candidate {} with score {:.1}",
            found.candidate.position, found.score
        ),
        MatchDecision::Unmatched {
            best_rejected: Some(best),
        } => println!("No match: best score {:.1} is below the threshold", best),
        MatchDecision::Unmatched {
            best_rejected: None,
        } => println!("No match: secondary source is empty"),
    }

    Ok(())
}
