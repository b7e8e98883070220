//! Firewall block dispatch.
//!
//! Renders and optionally executes an external block command when an
//! address crosses the alert threshold. One textual command form per
//! backend, executed through the [`CommandExecutor`] abstraction so tests
//! can substitute a recording mock. Dry-run stops after rendering.
//!
//! Block actions are advisory: a failed dispatch is reported and the
//! monitoring loop carries on with other addresses.

use crate::aggregator::ThresholdCrossing;
use crate::error::MonitorError;
use crate::exec::{args_to_strings, CommandExecutor};
use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// Default bound on block-command execution.
pub const DEFAULT_BLOCK_TIMEOUT: Duration = Duration::from_secs(10);

/// Firewall tool convention used to render block commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum BlockMethod {
    /// `sudo ufw deny from <ip>`
    Ufw,
    /// `sudo iptables -A INPUT -s <ip> -j DROP`
    Iptables,
}

impl BlockMethod {
    /// The firewall tool this method shells out to.
    pub fn tool(&self) -> &'static str {
        match self {
            BlockMethod::Ufw => "ufw",
            BlockMethod::Iptables => "iptables",
        }
    }

    /// Render the block command for an address: program plus arguments,
    /// with the privilege-elevation prefix. Deterministic per method.
    pub fn render(&self, address: IpAddr) -> (&'static str, Vec<String>) {
        let args = match self {
            BlockMethod::Ufw => args_to_strings(&["ufw", "deny", "from", &address.to_string()]),
            BlockMethod::Iptables => args_to_strings(&[
                "iptables",
                "-A",
                "INPUT",
                "-s",
                &address.to_string(),
                "-j",
                "DROP",
            ]),
        };
        ("sudo", args)
    }

    /// The rendered command as a single display string.
    pub fn command_line(&self, address: IpAddr) -> String {
        let (program, args) = self.render(address);
        let mut line = program.to_string();
        for arg in &args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

/// Outcome of a dispatch attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Command rendered and reported only; nothing executed.
    DryRun,
    /// Command executed and the tool reported success.
    Blocked,
}

/// Builds and dispatches block commands for threshold crossings.
pub struct BlockDispatcher {
    method: BlockMethod,
    dry_run: bool,
    timeout: Duration,
    executor: Box<dyn CommandExecutor>,
    tool_probe: fn(&str) -> bool,
}

impl BlockDispatcher {
    pub fn new(method: BlockMethod, dry_run: bool, executor: Box<dyn CommandExecutor>) -> Self {
        Self {
            method,
            dry_run,
            timeout: DEFAULT_BLOCK_TIMEOUT,
            executor,
            tool_probe: tool_in_path,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Override the tool-availability probe (tests run on hosts without a
    /// firewall tool installed).
    #[cfg(test)]
    pub(crate) fn with_tool_probe(mut self, tool_probe: fn(&str) -> bool) -> Self {
        self.tool_probe = tool_probe;
        self
    }

    /// Dispatch a block for one crossing.
    ///
    /// In dry-run mode the rendered command is logged and nothing runs.
    /// Otherwise the command executes with a bounded timeout; any failure
    /// (missing tool, insufficient privilege, timeout, non-zero exit) is
    /// returned as a non-fatal [`MonitorError::BlockExecution`].
    pub fn dispatch(&self, crossing: &ThresholdCrossing) -> Result<DispatchOutcome, MonitorError> {
        let address = crossing.address;
        let (program, args) = self.method.render(address);

        if self.dry_run {
            info!("DRY-RUN: would run: {}", self.method.command_line(address));
            return Ok(DispatchOutcome::DryRun);
        }

        // Missing tool: skip the attempt entirely rather than burn a sudo
        // invocation that cannot succeed.
        if !(self.tool_probe)(self.method.tool()) {
            return Err(MonitorError::BlockExecution(format!(
                "{} not available on this system; cannot block {address}",
                self.method.tool()
            )));
        }

        let output = self
            .executor
            .execute(program, &args, self.timeout)
            .map_err(|e| MonitorError::BlockExecution(format!("{address}: {e}")))?;

        if output.success {
            info!("blocked {} using {}", address, self.method.tool());
            Ok(DispatchOutcome::Blocked)
        } else {
            Err(MonitorError::BlockExecution(format!(
                "{address}: {} exited with {:?}: {}",
                self.method.tool(),
                output.code,
                output.stderr.trim()
            )))
        }
    }
}

/// Warn when auto-block is enabled without root. The dispatch itself still
/// runs; sudo may or may not succeed non-interactively.
pub fn warn_without_root() {
    // SAFETY: geteuid reads the effective UID, has no preconditions and
    // cannot fail.
    let euid = unsafe { libc::geteuid() };
    if euid != 0 {
        warn!("auto-block requested without root; block commands may fail under sudo");
    }
}

/// PATH probe for a tool, without executing it.
fn tool_in_path(tool: &str) -> bool {
    let Some(path_var) = std::env::var_os("PATH") else {
        return false;
    };
    std::env::split_paths(&path_var).any(|dir| Path::new(&dir).join(tool).is_file())
}
