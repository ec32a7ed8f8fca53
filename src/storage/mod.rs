//! Settlement journal.
//!
//! Appends one record per settlement that got past the deposit step to a
//! JSON-lines file, one record per line. Records for settlements that did not finish cleanly stay
//! flagged as pending until an operator reconciles them out of band: they
//! mark funds parked at the settlement address in the source, intermediate
//! or destination asset.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::types::{Fill, SwapStatus};

/// Default journal file path.
pub const DEFAULT_JOURNAL_FILE: &str = "swapdesk_journal.jsonl";

/// One settlement outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementRecord {
    pub id: Uuid,
    pub recorded_at: DateTime<Utc>,
    pub user: String,
    pub amount: Decimal,
    pub status: SwapStatus,
    pub deposit_tx: String,
    #[serde(default)]
    pub order_ids: Vec<u64>,
    pub net_output: Option<Decimal>,
    pub payout_tx: Option<String>,
    /// First-leg fill left in the intermediate asset.
    pub stranded: Option<Fill>,
    pub error: Option<String>,
}

impl SettlementRecord {
    pub fn needs_attention(&self) -> bool {
        self.status != SwapStatus::Success
    }
}

pub struct SettlementJournal {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl SettlementJournal {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a record as one line. Earlier lines are never rewritten.
    ///
    /// Blocking; async callers go through `spawn_blocking`.
    pub fn append(&self, record: &SettlementRecord) -> Result<()> {
        let line = serde_json::to_string(record).context("Failed to serialise settlement record")?;

        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open journal {}", self.path.display()))?;
        writeln!(file, "{line}")
            .with_context(|| format!("Failed to write journal {}", self.path.display()))?;

        debug!(
            path = %self.path.display(),
            id = %record.id,
            status = %record.status,
            "Settlement journalled"
        );
        Ok(())
    }

    /// Every record, oldest first. A missing file is an empty journal.
    pub fn load_all(&self) -> Result<Vec<SettlementRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let text = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read journal from {}", self.path.display()))?;
        text.lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(n, line)| {
                serde_json::from_str(line).with_context(|| {
                    format!("Failed to parse journal {} line {}", self.path.display(), n + 1)
                })
            })
            .collect()
    }

    /// Records still awaiting reconciliation.
    pub fn pending(&self) -> Result<Vec<SettlementRecord>> {
        let pending: Vec<_> = self
            .load_all()?
            .into_iter()
            .filter(SettlementRecord::needs_attention)
            .collect();
        info!(path = %self.path.display(), pending = pending.len(), "Loaded pending settlements");
        Ok(pending)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
