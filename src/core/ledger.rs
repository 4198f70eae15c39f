//! Append-only cost ledger with file-based persistence.
//!
//! Entries are stored as newline-delimited JSON (JSONL). The log is the
//! source of truth: aggregates are always recomputed by replaying it,
//! never read from a separately mutated counter. Appends take an exclusive
//! file lock so concurrent invocations never interleave or lose entries.

use std::collections::{BTreeMap, HashMap};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::{ItemIdentity, Stage};

/// Billable usage reported by one service call
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "unit", rename_all = "snake_case")]
pub enum Usage {
    /// LLM-style token counts
    Tokens { input: u64, output: u64 },

    /// Audio minutes (transcription)
    Minutes { minutes: f64 },
}

/// Per-service unit price
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Price {
    /// Dollars per million input/output tokens
    PerMillionTokens {
        input_per_mtok: f64,
        output_per_mtok: f64,
    },

    /// Dollars per audio minute
    PerMinute { per_minute: f64 },
}

/// Price table keyed by service name
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceTable(pub HashMap<String, Price>);

impl Default for PriceTable {
    fn default() -> Self {
        // Pricing as of Jan 2025 (per 1M tokens); local whisper is free
        let mut table = HashMap::new();
        table.insert(
            "claude-3-5-haiku-20241022".to_string(),
            Price::PerMillionTokens {
                input_per_mtok: 1.00,
                output_per_mtok: 5.00,
            },
        );
        table.insert(
            "claude-sonnet-4-20250514".to_string(),
            Price::PerMillionTokens {
                input_per_mtok: 3.00,
                output_per_mtok: 15.00,
            },
        );
        table.insert(
            "whisper-local".to_string(),
            Price::PerMinute { per_minute: 0.00 },
        );
        Self(table)
    }
}

impl PriceTable {
    /// Look up the price for a service
    pub fn price(&self, service: &str) -> Option<Price> {
        self.0.get(service).copied()
    }
}

/// One billable service call. Never mutated or deleted after write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostEntry {
    /// Item the cost is attributed to
    pub identity: ItemIdentity,

    /// Stage that made the call
    pub stage: Stage,

    /// Service name (model identifier or transcriber)
    pub service: String,

    /// Usage actually billed by the call
    pub usage: Usage,

    /// Computed cost in USD
    pub cost_usd: f64,

    /// When the entry was recorded
    pub timestamp: DateTime<Utc>,
}

/// Aggregation period for cost queries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    /// A single calendar day (UTC)
    Day(NaiveDate),

    /// A calendar month (UTC)
    Month { year: i32, month: u32 },

    /// The entire log
    All,
}

impl Period {
    /// Whether a timestamp falls inside this period
    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        let date = timestamp.date_naive();
        match self {
            Period::Day(day) => date == *day,
            Period::Month { year, month } => date.year() == *year && date.month() == *month,
            Period::All => true,
        }
    }
}

/// Totals derived by replaying the log
#[derive(Debug, Clone, Default)]
pub struct CostTotals {
    /// Sum of all matching entries
    pub total_usd: f64,

    /// Number of matching entries
    pub entry_count: usize,

    /// Distinct items that incurred cost
    pub item_count: usize,

    /// Cost per stage name
    pub by_stage: BTreeMap<String, f64>,

    /// Cost per service name
    pub by_service: BTreeMap<String, f64>,
}

/// File-backed append-only cost ledger
pub struct CostLedger {
    /// Path to the costs.jsonl file
    path: PathBuf,

    /// Unit prices per service
    prices: PriceTable,
}

impl CostLedger {
    /// Create a ledger over the given log path
    pub fn new(path: PathBuf, prices: PriceTable) -> Self {
        Self { path, prices }
    }

    /// Path to the underlying log file
    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Record one successful service call.
    ///
    /// Called only after the service call returns successfully, so a failed
    /// attempt followed by a retry never double-counts.
    pub fn record(
        &self,
        identity: &ItemIdentity,
        stage: Stage,
        service: &str,
        usage: Usage,
    ) -> Result<CostEntry> {
        let price = self.prices.price(service);
        if price.is_none() {
            warn!(service, "no price configured, recording usage at $0.00");
        }

        let entry = CostEntry {
            identity: identity.clone(),
            stage,
            service: service.to_string(),
            usage,
            cost_usd: compute_cost(price, &usage),
            timestamp: Utc::now(),
        };

        self.append(&entry)?;
        Ok(entry)
    }

    /// Append an entry under an exclusive file lock
    fn append(&self, entry: &CostEntry) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create ledger directory: {}", parent.display()))?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open cost log: {}", self.path.display()))?;

        file.lock_exclusive()
            .context("Failed to acquire file lock on cost log")?;

        let json = serde_json::to_string(entry).context("Failed to serialize cost entry")?;
        writeln!(file, "{}", json).context("Failed to write cost entry")?;
        file.flush().context("Failed to flush cost entry")?;

        Ok(())
    }

    /// Replay all entries in order
    pub fn entries(&self) -> Result<Vec<CostEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.path)
            .with_context(|| format!("Failed to open cost log: {}", self.path.display()))?;

        let mut entries = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let entry: CostEntry = serde_json::from_str(&line)
                .with_context(|| format!("Failed to parse cost entry: {}", line))?;
            entries.push(entry);
        }

        Ok(entries)
    }

    /// Recompute totals for a period by replaying the log
    pub fn aggregate(&self, period: Period) -> Result<CostTotals> {
        let mut totals = CostTotals::default();
        let mut items = std::collections::HashSet::new();

        for entry in self.entries()? {
            if !period.contains(entry.timestamp) {
                continue;
            }
            totals.total_usd += entry.cost_usd;
            totals.entry_count += 1;
            items.insert(entry.identity.clone());
            *totals.by_stage.entry(entry.stage.name().to_string()).or_default() += entry.cost_usd;
            *totals.by_service.entry(entry.service.clone()).or_default() += entry.cost_usd;
        }

        totals.item_count = items.len();
        Ok(totals)
    }

    /// All entries attributed to one item
    pub fn entries_for(&self, identity: &ItemIdentity) -> Result<Vec<CostEntry>> {
        Ok(self
            .entries()?
            .into_iter()
            .filter(|e| &e.identity == identity)
            .collect())
    }
}

/// Compute cost from a unit price and billed usage.
///
/// A missing price or a price/usage unit mismatch yields $0.00 rather than
/// failing the stage; the raw usage is still recorded for auditing.
pub fn compute_cost(price: Option<Price>, usage: &Usage) -> f64 {
    match (price, usage) {
        (
            Some(Price::PerMillionTokens {
                input_per_mtok,
                output_per_mtok,
            }),
            Usage::Tokens { input, output },
        ) => {
            (*input as f64 / 1_000_000.0) * input_per_mtok
                + (*output as f64 / 1_000_000.0) * output_per_mtok
        }
        (Some(Price::PerMinute { per_minute }), Usage::Minutes { minutes }) => minutes * per_minute,
        _ => 0.0,
    }
}
