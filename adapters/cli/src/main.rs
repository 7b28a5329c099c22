#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line entry point: reads observations on stdin, writes moves on stdout.

use std::{io, path::PathBuf};

use anyhow::Context;
use clap::Parser;
use gemrunner_cli::{load_tuning, Session};
use tracing_subscriber::EnvFilter;

/// Gemrunner agent speaking the line-oriented game protocol.
#[derive(Debug, Parser)]
#[command(name = "gemrunner", version, about)]
struct Args {
    /// TOML file overriding the default agent tuning.
    #[arg(long, value_name = "PATH")]
    tuning: Option<PathBuf>,
    /// Log filter used when `RUST_LOG` is unset.
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&args.log_level)
            .with_context(|| format!("invalid log level {:?}", args.log_level))?,
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let tuning = load_tuning(args.tuning.as_deref())?;
    let mut session = Session::new(tuning);
    let summary = session.run(io::stdin().lock(), io::stdout().lock())?;
    tracing::info!(
        moves = summary.moves,
        rejected = summary.rejected,
        "input closed"
    );
    Ok(())
}
