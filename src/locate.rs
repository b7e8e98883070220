//! Log source discovery.
//!
//! Resolves a path or glob pattern (or the conventional system defaults)
//! into an ordered sequence of readable log sources, honoring an optional
//! age filter and transparently decompressing rotated `.gz` archives.

use crate::error::MonitorError;
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};

/// Conventional auth-log locations, in preference order.
const DEFAULT_CANDIDATES: &[&str] = &["/var/log/auth.log", "/var/log/secure"];

/// Rotated-variant globs tried when no current log file exists.
const ROTATED_PATTERNS: &[&str] = &["/var/log/auth.log*", "/var/log/secure*"];

/// Auto-detect the host's auth log.
///
/// Prefers the current file of each conventional location; falls back to
/// the most recently modified rotated variant.
pub fn detect_auth_log() -> Option<PathBuf> {
    for candidate in DEFAULT_CANDIDATES {
        let path = Path::new(candidate);
        if path.is_file() {
            return Some(path.to_path_buf());
        }
    }

    for pattern in ROTATED_PATTERNS {
        let mut matches: Vec<PathBuf> = glob::glob(pattern)
            .ok()?
            .filter_map(|entry| entry.ok())
            .filter(|p| p.is_file())
            .collect();
        matches.sort_by_key(|p| mtime_of(p));
        if let Some(newest) = matches.pop() {
            return Some(newest);
        }
    }
    None
}

/// Resolve a path or glob pattern into readable sources, oldest first.
///
/// Files whose mtime is older than `since_days` are discarded. Unreadable
/// matches are skipped with a warning; an empty result is reported through
/// [`MonitorError::Locate`] but the caller treats it as zero events, not
/// a failure.
pub fn resolve_sources(spec: &str, since_days: Option<u64>) -> Result<Vec<PathBuf>, MonitorError> {
    let mut paths: Vec<PathBuf> = if spec.contains('*') || spec.contains('?') {
        match glob::glob(spec) {
            Ok(entries) => entries.filter_map(|entry| entry.ok()).collect(),
            Err(e) => return Err(MonitorError::Locate(format!("bad glob pattern {spec}: {e}"))),
        }
    } else {
        vec![PathBuf::from(spec)]
    };

    let now = SystemTime::now();
    paths.retain(|path| {
        if !path.is_file() {
            return false;
        }
        match since_days {
            Some(days) => match std::fs::metadata(path).and_then(|m| m.modified()) {
                Ok(mtime) => {
                    let fresh = is_fresh(mtime, now, days);
                    if !fresh {
                        debug!("skipping {} (older than {} days)", path.display(), days);
                    }
                    fresh
                }
                Err(e) => {
                    warn!("cannot stat {}: {}", path.display(), e);
                    false
                }
            },
            None => true,
        }
    });

    // Oldest first, so batch consumption replays events in rough
    // chronological order across rotated files.
    paths.sort_by_key(|p| mtime_of(p));

    if paths.is_empty() {
        return Err(MonitorError::Locate(format!("no readable file matches {spec}")));
    }
    Ok(paths)
}

/// Open a log source for line-by-line reading, decompressing `.gz`
/// archives so downstream components always see plain text.
pub fn open_source(path: &Path) -> io::Result<Box<dyn BufRead>> {
    let file = File::open(path)?;
    if path.extension().is_some_and(|ext| ext == "gz") {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Pick the file to tail from a batch of resolved sources.
///
/// Sources arrive oldest first, so the last entry is the freshest. A
/// `.gz` archive cannot grow, so the newest plain-text source wins even
/// when a compressed rotation carries a later mtime.
pub fn follow_target(sources: &[PathBuf]) -> Option<PathBuf> {
    sources
        .iter()
        .rev()
        .find(|p| !p.extension().is_some_and(|ext| ext == "gz"))
        .cloned()
}

/// Age-filter predicate: a file is kept when its mtime is within
/// `since_days` days of `now`.
fn is_fresh(mtime: SystemTime, now: SystemTime, since_days: u64) -> bool {
    match now.duration_since(mtime) {
        Ok(age) => age <= Duration::from_secs(since_days * 86_400),
        // mtime in the future counts as fresh.
        Err(_) => true,
    }
}

fn mtime_of(path: &Path) -> SystemTime {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .unwrap_or(SystemTime::UNIX_EPOCH)
}
