//! Monitoring session and batch scan pipeline.
//!
//! A [`Session`] ties the line parser, aggregator, blocklist writer and
//! block dispatcher together: every line, whether read in one batch pass
//! or streamed by the follower, goes through [`Session::ingest_line`].

use crate::aggregator::Aggregator;
use crate::blocker::{BlockDispatcher, DispatchOutcome};
use crate::error::MonitorError;
use crate::locate::open_source;
use crate::parser::parse_line;
use crate::report::BlocklistWriter;
use chrono::{DateTime, Utc};
use std::io::BufRead;
use std::path::Path;
use tracing::warn;

/// One monitoring session: the aggregator plus the consumers of its
/// crossings. Owned by a single thread of control, so no interior locking
/// is needed.
pub struct Session {
    pub aggregator: Aggregator,
    blocklist: BlocklistWriter,
    dispatcher: Option<BlockDispatcher>,
}

impl Session {
    pub fn new(
        threshold: u64,
        blocklist: BlocklistWriter,
        dispatcher: Option<BlockDispatcher>,
    ) -> Self {
        Self {
            aggregator: Aggregator::new(threshold),
            blocklist,
            dispatcher,
        }
    }

    /// Feed one raw line through parse → aggregate → crossing consumers.
    ///
    /// `fallback` is the timestamp used for lines without a parseable
    /// header. With `echo` set (follow mode), every matched event prints a
    /// console line with the running count.
    ///
    /// Only blocklist write failures propagate; a failed block dispatch is
    /// reported and monitoring continues.
    pub fn ingest_line(
        &mut self,
        line: &str,
        fallback: DateTime<Utc>,
        echo: bool,
    ) -> Result<(), MonitorError> {
        let Some(event) = parse_line(line, fallback) else {
            return Ok(());
        };

        let crossing = self.aggregator.ingest(&event);

        if echo {
            let count = self
                .aggregator
                .get(event.address)
                .map(|o| o.count)
                .unwrap_or(0);
            let note = if count >= self.aggregator.threshold() {
                "ALERT"
            } else {
                ""
            };
            println!(
                "{}  {}  count={} {}  line={}",
                Utc::now().format("%Y-%m-%d %H:%M:%S"),
                event.address,
                count,
                note,
                event.raw
            );
        }

        if let Some(crossing) = crossing {
            // The blocklist records "flagged", independent of dry-run.
            self.blocklist.append(crossing.address)?;

            if let Some(dispatcher) = &self.dispatcher {
                match dispatcher.dispatch(&crossing) {
                    Ok(DispatchOutcome::Blocked) => {
                        self.aggregator.mark_blocked(crossing.address);
                    }
                    Ok(DispatchOutcome::DryRun) => {}
                    Err(e) => warn!("auto-block failed: {e}"),
                }
            }
        }
        Ok(())
    }
}

/// One-shot batch pass over already-resolved log sources.
///
/// Sources are consumed in the order given (oldest first). Unreadable
/// files are skipped with a warning; only output-write failures abort.
pub fn scan_batch<P: AsRef<Path>>(session: &mut Session, paths: &[P]) -> Result<(), MonitorError> {
    for path in paths {
        let path = path.as_ref();
        let fallback = std::fs::metadata(path)
            .and_then(|m| m.modified())
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());

        let mut reader = match open_source(path) {
            Ok(reader) => reader,
            Err(e) => {
                warn!("{}", MonitorError::Permission(path.to_path_buf()));
                warn!("  cause: {e}");
                continue;
            }
        };

        // Raw-byte reads with lossy conversion: a line with invalid UTF-8
        // must not drop the rest of the file.
        let mut buf: Vec<u8> = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf);
                    session.ingest_line(line.trim_end(), fallback, false)?;
                }
                Err(e) => {
                    warn!("read error in {}: {e}", path.display());
                    break;
                }
            }
        }
    }
    Ok(())
}
