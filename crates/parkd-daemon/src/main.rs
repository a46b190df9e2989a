//! parkd daemon entry point.
//!
//! Runs the weekly parking allocation on a configured trigger slot
//! (default: Sunday 20:00 UTC, allocating the upcoming Monday through
//! Friday), or immediately via `--once` / `--date`. All allocation logic
//! lives in `parkd-core`; this binary wires the `SQLite` store, the
//! schedule, and logging around it.
//!
//! Runs for a given target date must not execute concurrently; deploy a
//! single daemon instance per database. The store's uniqueness constraints
//! are the backstop if that rule is ever broken.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc, Weekday};
use clap::Parser;
use parkd_core::run::{self, RunError, RunReport};
use parkd_core::schedule::next_business_week;
use parkd_core::store::StoreError;
use thiserror::Error;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use parkd_daemon::config::{ConfigError, DaemonConfig};
use parkd_daemon::store::SqliteStore;

#[derive(Parser, Debug)]
#[command(name = "parkd", about = "Workplace parking allocation daemon")]
struct Args {
    /// Path to the daemon configuration file.
    #[arg(long, default_value = "parkd.toml")]
    config: PathBuf,

    /// Log filter, e.g. `info` or `parkd_core=debug`.
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Run the upcoming business week immediately and exit.
    #[arg(long)]
    once: bool,

    /// Run a single date immediately and exit.
    #[arg(long, value_name = "YYYY-MM-DD")]
    date: Option<NaiveDate>,
}

#[derive(Debug, Error)]
enum DaemonError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Run(#[from] RunError),
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    match run_daemon(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "daemon terminated");
            ExitCode::FAILURE
        }
    }
}

async fn run_daemon(args: Args) -> Result<(), DaemonError> {
    let config = DaemonConfig::from_file(&args.config)?;
    let (weekday, time) = config.schedule.trigger()?;
    let mut store = SqliteStore::open(&config.store.db_path)?;
    info!(db = %config.store.db_path.display(), "store opened");

    if let Some(date) = args.date {
        let report = run::run_for_date(&mut store, date, Utc::now())?;
        log_report(&report);
        return Ok(());
    }
    if args.once {
        run_upcoming_week(&mut store, Utc::now())?;
        return Ok(());
    }

    info!(%weekday, %time, "scheduler started");
    loop {
        let now = Utc::now();
        let trigger_at = next_trigger(now, weekday, time);
        let wait = (trigger_at - now)
            .to_std()
            .unwrap_or(Duration::ZERO);
        info!(at = %trigger_at, "next allocation run scheduled");

        tokio::select! {
            () = tokio::time::sleep(wait) => {
                if let Err(err) = run_upcoming_week(&mut store, Utc::now()) {
                    // A failed run is retried at the next trigger; requests
                    // simply stay pending until then.
                    error!(error = %err, "scheduled allocation run failed");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown signal received");
                return Ok(());
            }
        }
    }
}

fn run_upcoming_week(store: &mut SqliteStore, now: DateTime<Utc>) -> Result<(), DaemonError> {
    let week = next_business_week(now.date_naive());
    let reports = run::run_week(store, &week, now)?;
    for report in &reports {
        log_report(report);
    }
    Ok(())
}

fn log_report(report: &RunReport) {
    info!(
        date = %report.date,
        pending = report.pending,
        satisfied = report.satisfied(),
        unsatisfied = report.unsatisfied(),
        "allocation report"
    );
}

/// The next occurrence of `weekday` at `time` strictly after `after`.
fn next_trigger(after: DateTime<Utc>, weekday: Weekday, time: NaiveTime) -> DateTime<Utc> {
    let mut day = after.date_naive();
    loop {
        if day.weekday() == weekday {
            let at = day.and_time(time).and_utc();
            if at > after {
                return at;
            }
        }
        match day.succ_opt() {
            Some(next) => day = next,
            None => return after, // unreachable this side of year 262143
        }
    }
}
