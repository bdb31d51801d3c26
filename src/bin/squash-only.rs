//! CLI for the squash-only tool.

use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use squash_only::prelude::*;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "squash-only")]
#[command(
    author,
    version,
    about = "Allow only squash merges on every GitHub repository you own",
    long_about = None
)]
struct Cli {
    /// Seconds to pause between repository updates
    #[arg(long, value_name = "SECONDS", default_value = "1", value_parser = parse_sleep)]
    sleep: Duration,

    /// Update every owned repository, including ones already squash-only
    #[arg(long)]
    force: bool,
}

fn parse_sleep(value: &str) -> std::result::Result<Duration, String> {
    parse_sleep_seconds(value).map_err(|e| e.to_string())
}

/// Exit status for a completed run.
const SUCCESS_EXIT_CODE: u8 = 0;
/// Exit status for argument, startup and fetch failures.
const FATAL_EXIT_CODE: u8 = 1;

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return ExitCode::from(parse_error_exit_code(&err));
        }
    };

    init_tracing();

    let result = run(cli);
    if let Err(err) = &result {
        eprintln!("Error: {:#}", err);
    }
    ExitCode::from(run_exit_code(&result))
}

/// `--help` and `--version` land in clap's error path too and are not failures.
fn parse_error_exit_code(err: &clap::Error) -> u8 {
    if err.use_stderr() {
        FATAL_EXIT_CODE
    } else {
        SUCCESS_EXIT_CODE
    }
}

fn run_exit_code(result: &Result<SyncSummary>) -> u8 {
    match result {
        Ok(summary) if summary.interrupted => INTERRUPTED_EXIT_CODE as u8,
        Ok(_) => SUCCESS_EXIT_CODE,
        Err(_) => FATAL_EXIT_CODE,
    }
}

fn init_tracing() {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::new("squash_only=warn"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> Result<SyncSummary> {
    let client = GitHubClient::from_env().context("Failed to set up GitHub client")?;

    let cancel = CancellationToken::new();
    install_interrupt_handler(cancel.clone())?;

    let mut config = SyncConfig::new().throttle(cli.sleep);
    if cli.force {
        config = config.force();
    }

    println!(
        "Enforcing squash-only merges (force: {}, sleep: {:.1}s)",
        config.force,
        config.throttle.as_secs_f64()
    );

    let summary = SyncRunner::new(&client, config, cancel)
        .on_progress(&print_event)
        .run()
        .context("Sync failed")?;

    println!("\n{}", summary);
    Ok(summary)
}

fn print_event(event: SyncEvent) {
    match event {
        SyncEvent::IdentityResolved { login } => println!("Authenticated as {}", login),
        SyncEvent::FetchedPage {
            page,
            count,
            total_so_far,
        } => println!(
            "Fetched page {} ({} repositories, {} so far)",
            page, count, total_so_far
        ),
        SyncEvent::Skipped {
            full_name,
            classification,
        } => println!("  skip  {} ({})", full_name, classification),
        SyncEvent::Mutated { full_name, outcome } => {
            if outcome.is_applied() {
                println!("  ok    {}", full_name);
            } else {
                println!("  FAIL  {}: {}", full_name, outcome);
            }
        }
        SyncEvent::Stopping { unreached } => println!(
            "Stopping early, {} fetched repositories left unprocessed",
            unreached
        ),
        _ => {}
    }
}
