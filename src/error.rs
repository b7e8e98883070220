//! Error types for authwatch.

use std::path::PathBuf;
use thiserror::Error;

/// Error taxonomy for the monitoring pipeline.
///
/// Only [`MonitorError::OutputWrite`] is fatal: a run that cannot write its
/// report or blocklist has no useful result and exits non-zero. Everything
/// else is logged where it happens and the run continues.
#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("no auth log found ({0})")]
    Locate(String),

    #[error("cannot read log file {0}")]
    Permission(PathBuf),

    #[error("log file vanished while tailing: {0}")]
    Rotation(PathBuf),

    #[error("block command failed: {0}")]
    BlockExecution(String),

    #[error("cannot write output file {path}: {source}")]
    OutputWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl MonitorError {
    /// Whether this error should terminate the process with a non-zero status.
    pub fn is_fatal(&self) -> bool {
        matches!(self, MonitorError::OutputWrite { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_output_write_is_fatal() {
        assert!(!MonitorError::Locate("x".into()).is_fatal());
        assert!(!MonitorError::Permission(PathBuf::from("/var/log/auth.log")).is_fatal());
        assert!(!MonitorError::Rotation(PathBuf::from("/var/log/auth.log")).is_fatal());
        assert!(!MonitorError::BlockExecution("ufw missing".into()).is_fatal());
        assert!(MonitorError::OutputWrite {
            path: PathBuf::from("report.json"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        }
        .is_fatal());
    }

    #[test]
    fn test_error_messages() {
        let err = MonitorError::Locate("tried /var/log/auth.log, /var/log/secure".into());
        assert!(err.to_string().contains("no auth log found"));

        let err = MonitorError::BlockExecution("iptables not available".into());
        assert!(err.to_string().contains("iptables not available"));
    }
}
