//! Per-source aggregation of authentication failures.
//!
//! The [`Aggregator`] owns the session's address→offender mapping. It is
//! constructed once per monitoring session (batch run or follow session)
//! and is the only component that mutates the counts. Threshold crossings
//! are edge-triggered: exactly one per address per session, at the moment
//! the count first reaches the threshold.

use crate::parser::LogEvent;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::net::IpAddr;

/// An address with at least one recognized authentication failure.
#[derive(Debug, Clone)]
pub struct Offender {
    pub address: IpAddr,
    pub count: u64,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    /// Set once when `count` first reaches the threshold, never reset.
    pub crossed: bool,
    /// Set only after a successful non-dry-run block dispatch.
    pub blocked: bool,
    /// First-seen insertion order, used as the deterministic ranking tiebreak.
    seq: u64,
}

/// Edge event emitted when an address first reaches the threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThresholdCrossing {
    pub address: IpAddr,
    pub count_at_crossing: u64,
}

/// Session-scoped failure counter with edge-triggered threshold detection.
#[derive(Debug)]
pub struct Aggregator {
    threshold: u64,
    offenders: HashMap<IpAddr, Offender>,
    next_seq: u64,
    total: u64,
}

impl Aggregator {
    pub fn new(threshold: u64) -> Self {
        Self {
            threshold,
            offenders: HashMap::new(),
            next_seq: 0,
            total: 0,
        }
    }

    pub fn threshold(&self) -> u64 {
        self.threshold
    }

    /// Total number of matched events ingested this session.
    pub fn total_events(&self) -> u64 {
        self.total
    }

    /// Number of distinct offending addresses seen this session.
    pub fn unique_offenders(&self) -> usize {
        self.offenders.len()
    }

    /// Count one event. Returns a [`ThresholdCrossing`] the first time the
    /// address's count reaches the threshold, and never again afterwards.
    pub fn ingest(&mut self, event: &LogEvent) -> Option<ThresholdCrossing> {
        self.total += 1;

        let next_seq = &mut self.next_seq;
        let offender = self.offenders.entry(event.address).or_insert_with(|| {
            let seq = *next_seq;
            *next_seq += 1;
            Offender {
                address: event.address,
                count: 0,
                first_seen: event.timestamp,
                last_seen: event.timestamp,
                crossed: false,
                blocked: false,
                seq,
            }
        });

        offender.count += 1;
        offender.last_seen = event.timestamp;

        if !offender.crossed && offender.count >= self.threshold {
            offender.crossed = true;
            return Some(ThresholdCrossing {
                address: offender.address,
                count_at_crossing: offender.count,
            });
        }
        None
    }

    /// Top-N offenders by count descending. Ties rank the earlier-seen
    /// address first, so identical input sequences always produce identical
    /// rankings.
    pub fn snapshot(&self, top_n: usize) -> Vec<&Offender> {
        let mut ranked: Vec<&Offender> = self.offenders.values().collect();
        ranked.sort_by(|a, b| b.count.cmp(&a.count).then(a.seq.cmp(&b.seq)));
        ranked.truncate(top_n);
        ranked
    }

    /// All offenders that have crossed the threshold, in first-seen order.
    pub fn flagged(&self) -> Vec<&Offender> {
        let mut flagged: Vec<&Offender> = self
            .offenders
            .values()
            .filter(|o| o.crossed)
            .collect();
        flagged.sort_by_key(|o| o.seq);
        flagged
    }

    pub fn get(&self, address: IpAddr) -> Option<&Offender> {
        self.offenders.get(&address)
    }

    /// Record a successful (non-dry-run) block for an address.
    pub fn mark_blocked(&mut self, address: IpAddr) {
        if let Some(offender) = self.offenders.get_mut(&address) {
            offender.blocked = true;
        }
    }
}
