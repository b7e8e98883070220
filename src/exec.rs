//! Command execution abstraction for testability.
//!
//! The block dispatcher shells out to firewall tools; this trait lets unit
//! tests substitute a recording mock (via mockall) so no real command ever
//! runs. The real implementation bounds execution with a deadline so a hung
//! firewall tool cannot stall the tail loop indefinitely.

use anyhow::{Context, Result};
use std::io::Read;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

#[cfg(test)]
use mockall::automock;

/// Output from command execution.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    /// Whether the command exited with status 0.
    pub success: bool,
    pub code: Option<i32>,
}

/// Trait for command execution, allowing dependency injection for testing.
#[cfg_attr(test, automock)]
pub trait CommandExecutor: Send + Sync {
    /// Execute a command, killing it if it outlives `timeout`.
    fn execute(&self, cmd: &str, args: &[String], timeout: Duration) -> Result<CommandOutput>;
}

/// Executor that runs actual system commands.
#[derive(Debug, Clone, Default)]
pub struct RealCommandExecutor;

impl RealCommandExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl CommandExecutor for RealCommandExecutor {
    fn execute(&self, cmd: &str, args: &[String], timeout: Duration) -> Result<CommandOutput> {
        let mut child = Command::new(cmd)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("failed to execute {cmd}"))?;

        // Drain both pipes on background threads so a chatty command cannot
        // fill a pipe buffer, block on write, and be falsely killed at the
        // deadline.
        let stdout_reader = spawn_pipe_reader(child.stdout.take());
        let stderr_reader = spawn_pipe_reader(child.stderr.take());

        let deadline = Instant::now() + timeout;
        let status = loop {
            match child.try_wait()? {
                Some(status) => break status,
                None => {
                    if Instant::now() >= deadline {
                        let _ = child.kill();
                        let _ = child.wait();
                        let _ = stdout_reader.join();
                        let _ = stderr_reader.join();
                        anyhow::bail!("{cmd} timed out after {timeout:?}");
                    }
                    std::thread::sleep(Duration::from_millis(25));
                }
            }
        };

        let stdout = stdout_reader.join().unwrap_or_default();
        let stderr = stderr_reader.join().unwrap_or_default();
        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&stdout).to_string(),
            stderr: String::from_utf8_lossy(&stderr).to_string(),
            success: status.success(),
            code: status.code(),
        })
    }
}

/// Read a child pipe to EOF on its own thread.
fn spawn_pipe_reader<R: Read + Send + 'static>(
    pipe: Option<R>,
) -> std::thread::JoinHandle<Vec<u8>> {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    })
}

/// Convert a slice of `&str` to owned args.
///
/// mockall has trouble with lifetimes in `&[&str]`, so the trait takes
/// `&[String]`.
pub fn args_to_strings(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}
