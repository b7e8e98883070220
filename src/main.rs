//! authwatch - SSH auth-log monitor.
//!
//! Scans or tails a host's auth log, aggregates failed logins per source
//! address, and optionally auto-blocks brute-force sources.

use anyhow::Result;
use clap::Parser;
use tracing::{error, Level};
use tracing_subscriber::FmtSubscriber;

use authwatch::blocker::{warn_without_root, BlockDispatcher};
use authwatch::cli::Cli;
use authwatch::exec::RealCommandExecutor;
use authwatch::follower::Follower;
use authwatch::locate::{detect_auth_log, follow_target, resolve_sources};
use authwatch::report::{BlocklistWriter, Report};
use authwatch::scan::{scan_batch, Session};
use authwatch::signal::{spawn_listener, ShutdownFlag};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    let log_level = if cli.verbose {
        Level::DEBUG
    } else if cli.quiet {
        Level::ERROR
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // Resolve the log source. Failing to locate one is reported but not
    // fatal: the run still emits a report reflecting zero events.
    let log_spec = cli
        .log
        .clone()
        .or_else(|| detect_auth_log().map(|p| p.display().to_string()));

    let sources = match &log_spec {
        Some(spec) => match resolve_sources(spec, cli.since_days) {
            Ok(sources) => sources,
            Err(e) => {
                error!("{e}");
                Vec::new()
            }
        },
        None => {
            error!("no auth log found (tried /var/log/auth.log and /var/log/secure)");
            Vec::new()
        }
    };

    let dispatcher = cli.auto_block.then(|| {
        if !cli.dry_run {
            warn_without_root();
        }
        BlockDispatcher::new(cli.block_method, cli.dry_run, Box::new(RealCommandExecutor::new()))
    });

    let mut session = Session::new(
        cli.threshold,
        BlocklistWriter::new(cli.blocklist_output.clone()),
        dispatcher,
    );

    // One-shot batch pass; only output-write failures propagate, making
    // the process exit non-zero.
    scan_batch(&mut session, &sources)?;

    let log_display = log_spec.unwrap_or_else(|| "auto-detect".to_string());
    let report = Report::build(&session.aggregator, &log_display, cli.top);
    report.write(&cli.output)?;
    if !cli.quiet {
        report.print_summary();
    }

    if cli.follow {
        // Tail the newest plain-text source. A rotated .gz archive can
        // match the pattern but will never grow, so it is never tailed.
        let Some(target) = follow_target(&sources) else {
            error!("nothing to follow: no live log source resolved");
            return Ok(());
        };

        println!("\nEntering follow mode, streaming new events. Press Ctrl-C to exit.");
        let shutdown = ShutdownFlag::new();
        spawn_listener(shutdown.clone());
        Follower::new(target, shutdown).run(&mut session).await?;
    }

    Ok(())
}
