//! Report and blocklist writers.
//!
//! Serializes aggregator snapshots to the JSON report and appends flagged
//! addresses to the plain-text blocklist. These are the only writes whose
//! failure is fatal: a run that cannot produce its outputs exits non-zero.

use crate::aggregator::Aggregator;
use crate::error::MonitorError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use tracing::info;

/// One ranking entry in the report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopEntry {
    pub address: String,
    pub count: u64,
}

/// JSON summary report written after a batch scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub timestamp: DateTime<Utc>,
    pub log_path: String,
    pub total_failed_events: u64,
    pub unique_offenders: usize,
    pub top: Vec<TopEntry>,
    pub flagged: Vec<String>,
    pub threshold: u64,
}

impl Report {
    /// Build a report from the aggregator's current state.
    pub fn build(aggregator: &Aggregator, log_path: &str, top_n: usize) -> Self {
        Self {
            timestamp: Utc::now(),
            log_path: log_path.to_string(),
            total_failed_events: aggregator.total_events(),
            unique_offenders: aggregator.unique_offenders(),
            top: aggregator
                .snapshot(top_n)
                .iter()
                .map(|o| TopEntry {
                    address: o.address.to_string(),
                    count: o.count,
                })
                .collect(),
            flagged: aggregator
                .flagged()
                .iter()
                .map(|o| o.address.to_string())
                .collect(),
            threshold: aggregator.threshold(),
        }
    }

    /// Write the report as pretty-printed JSON. Failure is fatal.
    pub fn write(&self, path: &Path) -> Result<(), MonitorError> {
        let json = serde_json::to_string_pretty(self).map_err(|e| MonitorError::OutputWrite {
            path: path.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
        })?;
        std::fs::write(path, json).map_err(|source| MonitorError::OutputWrite {
            path: path.to_path_buf(),
            source,
        })?;
        info!("report written to {}", path.display());
        Ok(())
    }

    /// Print the human-readable console summary.
    pub fn print_summary(&self) {
        println!("Analyzed: {}", self.log_path);
        println!("Total failed auth events: {}", self.total_failed_events);
        println!("Unique offending IPs: {}", self.unique_offenders);

        if self.top.is_empty() {
            println!("No failed auth events found in the examined log.");
        } else {
            println!("Top offenders:");
            for entry in &self.top {
                let note = if entry.count >= self.threshold { "ALERT" } else { "" };
                println!("  {}: {} {}", entry.address, entry.count, note);
            }
        }

        if self.flagged.is_empty() {
            println!("\nNo IPs exceeded the threshold.");
        } else {
            println!("\nALERT: the following IPs exceeded the threshold:");
            for address in &self.flagged {
                println!(" - {address}");
            }
        }
    }
}

/// Append-only plain-text blocklist: one address per line, written
/// whenever an address is flagged, regardless of dry-run.
pub struct BlocklistWriter {
    path: Option<PathBuf>,
}

impl BlocklistWriter {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    pub fn disabled() -> Self {
        Self { path: None }
    }

    /// Append one flagged address. A no-op when no blocklist path is
    /// configured; a write failure is fatal.
    pub fn append(&self, address: IpAddr) -> Result<(), MonitorError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let write = || -> std::io::Result<()> {
            let mut file = OpenOptions::new().create(true).append(true).open(path)?;
            writeln!(file, "{address}")?;
            file.flush()
        };
        write().map_err(|source| MonitorError::OutputWrite {
            path: path.clone(),
            source,
        })?;
        info!("wrote {} to blocklist {}", address, path.display());
        Ok(())
    }
}
