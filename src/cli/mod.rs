//! Command-line interface for podflow.
//!
//! Provides commands for running a processing batch, ingesting a single
//! video URL, reporting costs, and inspecting the seen-set.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use crate::adapters::{
    ClaudeService, Downloader, MediaSource, NotionSink, RssFeedSource, VideoWatchList,
    WhisperTranscriber,
};
use crate::config::{self, ResolvedConfig};
use crate::core::{ArtifactStore, CostLedger, Orchestrator, Period, SeenSet, Services};
use crate::domain::CandidateItem;

/// podflow - idempotent podcast and video processing pipeline
#[derive(Parser, Debug)]
#[command(name = "podflow")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Process the latest episode of each feed plus the video watch list
    Run {
        /// Only process RSS feeds
        #[arg(long)]
        feeds_only: bool,

        /// Only process the video watch list
        #[arg(long)]
        videos_only: bool,
    },

    /// Process a single video URL immediately
    Ingest {
        /// Video URL
        url: String,
    },

    /// Report accumulated service costs
    Costs {
        /// Period: a day (2025-08-21), a month (2025-08), or "all"
        #[arg(default_value = "all")]
        period: String,
    },

    /// List fully processed items
    Seen {
        /// Maximum number of records to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Show resolved configuration (debug)
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Run { feeds_only, videos_only } => run_batch(feeds_only, videos_only).await,
            Commands::Ingest { url } => ingest_url(&url).await,
            Commands::Costs { period } => show_costs(&period),
            Commands::Seen { limit } => show_seen(limit),
            Commands::Config => show_config(),
        }
    }
}

/// Wire the orchestrator from resolved configuration and environment
fn build_orchestrator(cfg: &ResolvedConfig) -> Result<Orchestrator> {
    let services = Services {
        fetcher: Box::new(Downloader::new()),
        transcriber: Box::new(WhisperTranscriber::new(cfg.pipeline.whisper_model.clone())),
        fast_llm: Box::new(ClaudeService::from_env(cfg.pipeline.fast_model.clone())?),
        summary_llm: Box::new(ClaudeService::from_env(cfg.pipeline.summary_model.clone())?),
        sink: Box::new(NotionSink::from_env()?),
    };

    Ok(Orchestrator::new(
        ArtifactStore::new(cfg.artifacts_dir()),
        SeenSet::new(cfg.seen_path()),
        CostLedger::new(cfg.costs_path(), cfg.prices.clone()),
        services,
        cfg.pipeline.clone(),
        cfg.audio_dir(),
    ))
}

/// Gather candidates from the configured sources
async fn gather_candidates(
    cfg: &ResolvedConfig,
    feeds_only: bool,
    videos_only: bool,
) -> Result<Vec<CandidateItem>> {
    let mut candidates = Vec::new();

    if !videos_only {
        let feeds = RssFeedSource::new(cfg.feeds.clone());
        candidates.extend(feeds.candidates().await?);
    }

    if !feeds_only {
        let watchlist = VideoWatchList::new(cfg.watchlist.clone());
        candidates.extend(watchlist.candidates().await?);
    }

    Ok(candidates)
}

/// Run one processing batch
async fn run_batch(feeds_only: bool, videos_only: bool) -> Result<()> {
    if feeds_only && videos_only {
        anyhow::bail!("--feeds-only and --videos-only are mutually exclusive");
    }

    let cfg = config::config()?;
    let orchestrator = build_orchestrator(cfg)?;

    let candidates = gather_candidates(cfg, feeds_only, videos_only).await?;
    if candidates.is_empty() {
        println!("No candidates found. Check feeds and watchlist in config.");
        return Ok(());
    }

    let summary = orchestrator.process_batch(&candidates).await?;

    println!(
        "Batch complete: {} succeeded, {} failed, {} already processed",
        summary.succeeded, summary.failed, summary.skipped
    );

    if summary.failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}

/// Process one video URL immediately
async fn ingest_url(url: &str) -> Result<()> {
    let cfg = config::config()?;
    let orchestrator = build_orchestrator(cfg)?;

    let watchlist = VideoWatchList::new(cfg.watchlist.clone());
    let item = watchlist
        .resolve(url)
        .await
        .with_context(|| format!("Failed to resolve video metadata: {}", url))?;

    eprintln!("Ingesting: {}", item.metadata.display_title());

    let summary = orchestrator.process_batch(std::slice::from_ref(&item)).await?;

    if summary.skipped > 0 {
        println!("Already processed, nothing to do");
    } else if summary.failed > 0 {
        std::process::exit(1);
    } else {
        println!("Done");
    }
    Ok(())
}

/// Parse a CLI period argument
fn parse_period(input: &str) -> Result<Period> {
    if input.eq_ignore_ascii_case("all") {
        return Ok(Period::All);
    }

    if let Ok(day) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        return Ok(Period::Day(day));
    }

    if let Some((year, month)) = input.split_once('-') {
        let year: i32 = year.parse().context("Invalid year in period")?;
        let month: u32 = month.parse().context("Invalid month in period")?;
        if (1..=12).contains(&month) {
            return Ok(Period::Month { year, month });
        }
    }

    anyhow::bail!("Invalid period '{}'. Use YYYY-MM-DD, YYYY-MM, or 'all'", input)
}

/// Report costs for a period
fn show_costs(period_arg: &str) -> Result<()> {
    let cfg = config::config()?;
    let ledger = CostLedger::new(cfg.costs_path(), cfg.prices.clone());

    let period = parse_period(period_arg)?;
    let totals = ledger.aggregate(period)?;

    println!("Costs ({})", period_arg);
    println!("  Total:   ${:.4}", totals.total_usd);
    println!("  Entries: {}", totals.entry_count);
    println!("  Items:   {}", totals.item_count);

    if !totals.by_stage.is_empty() {
        println!("\nBy stage:");
        for (stage, cost) in &totals.by_stage {
            println!("  {:<18} ${:.4}", stage, cost);
        }
    }

    if !totals.by_service.is_empty() {
        println!("\nBy service:");
        for (service, cost) in &totals.by_service {
            println!("  {:<30} ${:.4}", service, cost);
        }
    }

    Ok(())
}

/// List fully processed items, most recent first
fn show_seen(limit: usize) -> Result<()> {
    let cfg = config::config()?;
    let seen = SeenSet::new(cfg.seen_path());

    let records = seen.list(Some(limit))?;
    if records.is_empty() {
        println!("No processed items yet");
        return Ok(());
    }

    println!("{:<28} {:<8} {:<22}", "IDENTITY", "SOURCE", "PROCESSED AT");
    println!("{}", "-".repeat(60));

    for record in records {
        println!(
            "{:<28} {:<8} {:<22}",
            record.identity.as_str(),
            record.source_type.to_string(),
            record.first_seen.format("%Y-%m-%d %H:%M:%S")
        );
    }

    Ok(())
}

/// Show the resolved configuration (for debugging)
fn show_config() -> Result<()> {
    let cfg = config::config()?;

    println!(
        "Config file: {}",
        cfg.config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!();
    println!("Paths:");
    println!("  Home:      {}", cfg.home.display());
    println!("  Audio:     {}", cfg.audio_dir().display());
    println!("  Artifacts: {}", cfg.artifacts_dir().display());
    println!("  Seen-set:  {}", cfg.seen_path().display());
    println!("  Cost log:  {}", cfg.costs_path().display());
    println!("  Watchlist: {}", cfg.watchlist.display());
    println!();
    println!("Feeds:");
    if cfg.feeds.is_empty() {
        println!("  (none configured)");
    } else {
        for feed in &cfg.feeds {
            println!("  {} - {}", feed.name, feed.rss);
        }
    }
    println!();
    println!("Pipeline:");
    println!("  Chapter threshold: {} min", cfg.pipeline.min_chapter_minutes);
    println!("  Max tags:          {}", cfg.pipeline.max_tags);
    println!("  Throttle:          {}s", cfg.pipeline.throttle_seconds);
    println!("  Timeout:           {}s", cfg.pipeline.timeout_seconds);
    println!("  Whisper model:     {}", cfg.pipeline.whisper_model);
    println!("  Fast model:        {}", cfg.pipeline.fast_model);
    println!("  Summary model:     {}", cfg.pipeline.summary_model);

    Ok(())
}
