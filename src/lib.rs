//! # authwatch - SSH auth-log monitor
//!
//! A lightweight monitor for SSH authentication failures: scans or tails a
//! host's auth log, counts failed-login events per source address, and can
//! flag or auto-block brute-force sources when a per-address threshold is
//! crossed.
//!
//! ## Features
//!
//! - **Log discovery** - Auto-detects auth logs, supports globs, rotated
//!   and gzipped variants, and an age filter
//! - **Follow mode** - `tail -F` style streaming that survives log rotation
//! - **Edge-triggered alerting** - One threshold crossing per address per
//!   session, no matter how far the count grows
//! - **Auto-block** - Advisory `ufw`/`iptables` commands with dry-run and a
//!   bounded execution timeout
//! - **Reports** - JSON summary report plus an append-only blocklist file
//!
//! ## Architecture
//!
//! ```text
//! Log Locator ──► (batch read | Follower) ──► Line Parser ──► Aggregator
//!                                                                 │
//!                              ┌──────────────┬──────────────────┘
//!                              ▼              ▼               ▼
//!                        Report Writer   Blocklist      Block Dispatcher
//! ```
//!
//! ## Modules
//!
//! - [`aggregator`] - Per-address counters and threshold crossings
//! - [`blocker`] - Block-command rendering and dispatch
//! - [`cli`] - Command-line interface definitions
//! - [`error`] - Error taxonomy (only output-write failures are fatal)
//! - [`exec`] - Command execution abstraction (mockable)
//! - [`follower`] - Rotation-aware tail loop
//! - [`locate`] - Log path/glob resolution and transparent decompression
//! - [`parser`] - Failure-pattern recognition on raw lines
//! - [`report`] - JSON report and blocklist writers
//! - [`scan`] - Session wiring and the one-shot batch pass
//! - [`signal`] - Graceful shutdown flag

pub mod aggregator;
pub mod blocker;
pub mod cli;
pub mod error;
pub mod exec;
pub mod follower;
pub mod locate;
pub mod parser;
pub mod report;
pub mod scan;
pub mod signal;

pub use aggregator::{Aggregator, Offender, ThresholdCrossing};
pub use blocker::{BlockDispatcher, BlockMethod};
pub use cli::Cli;
pub use error::MonitorError;
pub use follower::Follower;
pub use report::{BlocklistWriter, Report};
pub use scan::Session;
