//! Continuous tailing of a live log file across rotations.
//!
//! The follower opens the target, seeks to end-of-file (only new lines are
//! processed), then polls: read newly appended complete lines into the
//! parse→aggregate pipeline, sleep, repeat. Before each read the file's
//! identity and size are compared against the last observation; an identity
//! change or a size below the last-read offset means the path now points at
//! a fresh file, so the handle is reopened from the start. Aggregator state
//! is never reset by rotation.
//!
//! Single-threaded and cooperative: the sleep between polls is the only
//! suspension point, and shutdown is a flag checked between batches, so the
//! loop never stops mid-line.

use crate::error::MonitorError;
use crate::scan::Session;
use crate::signal::ShutdownFlag;
use chrono::Utc;
use std::fs::{File, Metadata};
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Backoff while the target is missing mid-tail (rotation race).
const VANISH_BACKOFF: Duration = Duration::from_millis(250);

/// Stable identity token for rotation detection.
///
/// Device+inode on Unix. Elsewhere the creation timestamp stands in: it
/// survives appends (unlike size or mtime) and changes when the path is
/// replaced by a fresh file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileIdentity {
    #[cfg(unix)]
    dev: u64,
    #[cfg(unix)]
    ino: u64,
    #[cfg(not(unix))]
    created: Option<std::time::SystemTime>,
}

impl FileIdentity {
    pub fn of(meta: &Metadata) -> Self {
        #[cfg(unix)]
        {
            use std::os::unix::fs::MetadataExt;
            Self {
                dev: meta.dev(),
                ino: meta.ino(),
            }
        }
        #[cfg(not(unix))]
        {
            Self {
                created: meta.created().ok(),
            }
        }
    }
}

struct TailState {
    file: File,
    identity: FileIdentity,
    offset: u64,
}

/// Tails one live log file, feeding every appended line into a [`Session`].
pub struct Follower {
    path: PathBuf,
    poll_interval: Duration,
    shutdown: ShutdownFlag,
}

impl Follower {
    pub fn new(path: PathBuf, shutdown: ShutdownFlag) -> Self {
        Self {
            path,
            poll_interval: DEFAULT_POLL_INTERVAL,
            shutdown,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Run the tail loop until the shutdown flag is set.
    ///
    /// Returns `Ok(())` on graceful shutdown; the only error that escapes
    /// is a fatal output-write failure from the session's writers.
    pub async fn run(&self, session: &mut Session) -> Result<(), MonitorError> {
        let mut state = match self.open_at_end().await {
            Some(state) => state,
            // Shutdown arrived before the file ever appeared.
            None => return Ok(()),
        };

        loop {
            if self.shutdown.is_set() {
                info!("follow stopped");
                return Ok(());
            }

            match std::fs::metadata(&self.path) {
                Err(_) => {
                    // Rotation race: the file vanished between delete and
                    // recreate. Back off and retry; never terminate.
                    debug!("{}", MonitorError::Rotation(self.path.clone()));
                    tokio::time::sleep(VANISH_BACKOFF).await;
                    if let Some(reopened) = self.reopen_from_start() {
                        info!("log rotated - reopened {}", self.path.display());
                        state = reopened;
                    }
                    continue;
                }
                Ok(meta) => {
                    let identity = FileIdentity::of(&meta);
                    if identity != state.identity || meta.len() < state.offset {
                        match self.reopen_from_start() {
                            Some(reopened) => {
                                info!("log rotated - reopened {}", self.path.display());
                                state = reopened;
                            }
                            None => {
                                tokio::time::sleep(VANISH_BACKOFF).await;
                                continue;
                            }
                        }
                    }
                }
            }

            state.offset = drain_new_lines(&mut state.file, state.offset, session)?;

            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Open the target and seek to its current end. Retries while the file
    /// is missing; returns `None` if shutdown is requested first.
    async fn open_at_end(&self) -> Option<TailState> {
        loop {
            if self.shutdown.is_set() {
                return None;
            }
            match File::open(&self.path) {
                Ok(mut file) => {
                    let meta = match file.metadata() {
                        Ok(meta) => meta,
                        Err(e) => {
                            warn!("cannot stat {}: {e}", self.path.display());
                            tokio::time::sleep(VANISH_BACKOFF).await;
                            continue;
                        }
                    };
                    let offset = match file.seek(SeekFrom::End(0)) {
                        Ok(offset) => offset,
                        Err(e) => {
                            warn!("cannot seek {}: {e}", self.path.display());
                            tokio::time::sleep(VANISH_BACKOFF).await;
                            continue;
                        }
                    };
                    return Some(TailState {
                        identity: FileIdentity::of(&meta),
                        file,
                        offset,
                    });
                }
                Err(e) => {
                    warn!("follow target {} not readable: {e}", self.path.display());
                    tokio::time::sleep(VANISH_BACKOFF).await;
                }
            }
        }
    }

    /// Reopen the path at offset zero (post-rotation). `None` while the
    /// replacement file is not there yet.
    fn reopen_from_start(&self) -> Option<TailState> {
        let file = File::open(&self.path).ok()?;
        let meta = file.metadata().ok()?;
        Some(TailState {
            identity: FileIdentity::of(&meta),
            file,
            offset: 0,
        })
    }
}

/// Read all complete lines appended past `offset`, feeding each to the
/// session. Returns the new offset.
///
/// Lines are read as raw bytes and converted lossily: auth logs can carry
/// arbitrary bytes (attacker-chosen usernames), and a bad byte must not
/// stall the tail. A trailing partial line (no newline yet) is left
/// unconsumed: the offset does not advance past it and it is re-read whole
/// on a later poll, so an event is never processed mid-line.
fn drain_new_lines(
    file: &mut File,
    offset: u64,
    session: &mut Session,
) -> Result<u64, MonitorError> {
    if let Err(e) = file.seek(SeekFrom::Start(offset)) {
        warn!("seek failed: {e}");
        return Ok(offset);
    }

    let mut reader = BufReader::new(&mut *file);
    let mut pos = offset;
    let mut buf: Vec<u8> = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(n) => {
                if buf.last() != Some(&b'\n') {
                    // Partial line still being written; pick it up next poll.
                    break;
                }
                let line = String::from_utf8_lossy(&buf);
                session.ingest_line(line.trim_end(), Utc::now(), true)?;
                pos += n as u64;
            }
            Err(e) => {
                warn!("read error while tailing: {e}");
                break;
            }
        }
    }
    Ok(pos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::BlocklistWriter;
    use std::io::Write;

    fn failed_line(address: &str) -> String {
        format!("Aug 12 06:17:01 gw sshd[1021]: Failed password for root from {address} port 52814 ssh2\n")
    }

    fn session(threshold: u64) -> Session {
        Session::new(threshold, BlocklistWriter::disabled(), None)
    }

    #[test]
    fn test_identity_distinguishes_files() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.log");
        let b = dir.path().join("b.log");
        std::fs::write(&a, "x").unwrap();
        std::fs::write(&b, "x").unwrap();

        let id_a = FileIdentity::of(&std::fs::metadata(&a).unwrap());
        let id_b = FileIdentity::of(&std::fs::metadata(&b).unwrap());
        assert_ne!(id_a, id_b);
        // Stable across repeated stats of the same file.
        assert_eq!(id_a, FileIdentity::of(&std::fs::metadata(&a).unwrap()));
    }

    #[test]
    fn test_drain_reads_only_complete_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("auth.log");
        std::fs::write(&path, failed_line("10.0.0.5")).unwrap();

        let mut file = File::open(&path).unwrap();
        let mut session = session(100);

        let offset = drain_new_lines(&mut file, 0, &mut session).unwrap();
        assert_eq!(session.aggregator.total_events(), 1);
        assert_eq!(offset, failed_line("10.0.0.5").len() as u64);

        // Append a partial line: the offset must not advance.
        let mut appender = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        write!(appender, "Aug 12 06:18:00 gw sshd[2]: Failed pass").unwrap();
        appender.flush().unwrap();

        let offset_after = drain_new_lines(&mut file, offset, &mut session).unwrap();
        assert_eq!(offset_after, offset);
        assert_eq!(session.aggregator.total_events(), 1);

        // Complete the line: now it counts, once.
        writeln!(appender, "word for root from 10.0.0.5 port 22 ssh2").unwrap();
        let offset_final = drain_new_lines(&mut file, offset_after, &mut session).unwrap();
        assert!(offset_final > offset_after);
        assert_eq!(session.aggregator.total_events(), 2);
    }

    #[test]
    fn test_drain_tolerates_invalid_utf8() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("auth.log");

        // An attacker-chosen username with a raw 0xFF byte, then a clean
        // event. Neither may be lost and the offset must keep advancing.
        let mut content =
            b"Aug 12 06:17:00 gw sshd[1]: Invalid user \xff\xfe from 203.0.113.9 port 41002\n"
                .to_vec();
        content.extend_from_slice(failed_line("10.0.0.5").as_bytes());
        std::fs::write(&path, &content).unwrap();

        let mut file = File::open(&path).unwrap();
        let mut session = session(100);

        let offset = drain_new_lines(&mut file, 0, &mut session).unwrap();
        assert_eq!(offset, content.len() as u64);
        assert_eq!(session.aggregator.total_events(), 2);
        assert_eq!(
            session.aggregator.get("203.0.113.9".parse().unwrap()).unwrap().count,
            1
        );

        // Repeated polls stay at EOF instead of re-reading the bad line.
        let offset2 = drain_new_lines(&mut file, offset, &mut session).unwrap();
        assert_eq!(offset2, offset);
        assert_eq!(session.aggregator.total_events(), 2);
    }

    #[test]
    fn test_drain_is_idempotent_at_eof() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("auth.log");
        std::fs::write(&path, failed_line("10.0.0.5")).unwrap();

        let mut file = File::open(&path).unwrap();
        let mut session = session(100);

        let offset = drain_new_lines(&mut file, 0, &mut session).unwrap();
        let offset2 = drain_new_lines(&mut file, offset, &mut session).unwrap();
        assert_eq!(offset, offset2);
        assert_eq!(session.aggregator.total_events(), 1);
    }

    #[tokio::test]
    async fn test_follow_counts_only_appended_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("auth.log");
        // Pre-existing content must be skipped by the seek-to-end.
        std::fs::write(&path, failed_line("192.0.2.99")).unwrap();

        let shutdown = ShutdownFlag::new();
        let follower =
            Follower::new(path.clone(), shutdown.clone()).with_poll_interval(Duration::from_millis(10));
        let mut session = session(100);

        let writer_path = path.clone();
        let writer_shutdown = shutdown.clone();
        let writer = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(100));
            let mut file = std::fs::OpenOptions::new()
                .append(true)
                .open(&writer_path)
                .unwrap();
            for _ in 0..3 {
                file.write_all(failed_line("10.0.0.5").as_bytes()).unwrap();
            }
            file.flush().unwrap();
            std::thread::sleep(Duration::from_millis(300));
            writer_shutdown.set();
        });

        follower.run(&mut session).await.unwrap();
        writer.join().unwrap();

        assert_eq!(session.aggregator.total_events(), 3);
        assert!(session.aggregator.get("192.0.2.99".parse().unwrap()).is_none());
    }

    #[tokio::test]
    async fn test_follow_survives_rotation_without_recounting() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("auth.log");
        std::fs::write(&path, "").unwrap();

        let shutdown = ShutdownFlag::new();
        let follower =
            Follower::new(path.clone(), shutdown.clone()).with_poll_interval(Duration::from_millis(10));
        let mut session = session(100);

        let writer_path = path.clone();
        let writer_shutdown = shutdown.clone();
        let writer = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(100));
            {
                let mut file = std::fs::OpenOptions::new()
                    .append(true)
                    .open(&writer_path)
                    .unwrap();
                file.write_all(failed_line("10.0.0.5").as_bytes()).unwrap();
                file.write_all(failed_line("10.0.0.5").as_bytes()).unwrap();
                file.flush().unwrap();
            }
            std::thread::sleep(Duration::from_millis(300));

            // Rotate: replace the path with a fresh file, then append more.
            std::fs::remove_file(&writer_path).unwrap();
            std::thread::sleep(Duration::from_millis(100));
            std::fs::write(&writer_path, failed_line("203.0.113.9")).unwrap();

            std::thread::sleep(Duration::from_millis(500));
            writer_shutdown.set();
        });

        follower.run(&mut session).await.unwrap();
        writer.join().unwrap();

        // Pre-rotation counts persist, post-rotation lines are picked up
        // from the start of the new file, nothing is counted twice.
        assert_eq!(session.aggregator.get("10.0.0.5".parse().unwrap()).unwrap().count, 2);
        assert_eq!(session.aggregator.get("203.0.113.9".parse().unwrap()).unwrap().count, 1);
        assert_eq!(session.aggregator.total_events(), 3);
    }
}
