//! CLI argument parsing with clap.

use crate::blocker::BlockMethod;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "authwatch")]
#[command(author, version, about = "SSH auth-log monitor with threshold alerting and auto-blocking")]
pub struct Cli {
    /// Auth log path or glob pattern (auto-detect if omitted)
    #[arg(short = 'l', long)]
    pub log: Option<String>,

    /// Alert threshold per source IP
    #[arg(short = 't', long, default_value_t = 10)]
    pub threshold: u64,

    /// Number of top offending IPs in the report
    #[arg(long, default_value_t = 10)]
    pub top: usize,

    /// Output JSON report file
    #[arg(short = 'o', long, default_value = "log_report.json")]
    pub output: PathBuf,

    /// Append offending IPs (>= threshold) to this file, one per line
    #[arg(long)]
    pub blocklist_output: Option<PathBuf>,

    /// Follow the log file and stream events in real time
    #[arg(short = 'f', long)]
    pub follow: bool,

    /// Only include log files modified within N days (file mtime)
    #[arg(long)]
    pub since_days: Option<u64>,

    /// Automatically block offending IPs with the chosen method (requires sudo)
    #[arg(long)]
    pub auto_block: bool,

    /// Method used when auto-blocking
    #[arg(long, value_enum, default_value_t = BlockMethod::Ufw)]
    pub block_method: BlockMethod,

    /// Show block commands without executing them
    #[arg(long)]
    pub dry_run: bool,

    /// Quiet mode (errors only)
    #[arg(short, long)]
    pub quiet: bool,

    /// Verbose mode (debug output)
    #[arg(short, long)]
    pub verbose: bool,
}
