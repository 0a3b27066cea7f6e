//! Watchlist example guarding functions and a data file.
//!
//! This example shows how to:
//! - Load a watchlist from JSON and configure the process-wide watchdog
//! - Instrument functions with `#[intercept]` and callers with `#[call_scope]`
//! - Write files through the guarded operations
//! - Inspect the violations returned for blocked calls
//!
//! # Usage
//!
//! ```bash
//! RUST_LOG=rusty_watchdog=debug cargo run -p demos --example watchlist_guard
//! ```

use rusty_watchdog::prelude::*;
use std::path::Path;

#[intercept]
fn purge_cache() -> Result<(), WatchdogError> {
    println!("    cache purged");
    Ok(())
}

#[intercept]
fn rotate_keys(generation: u32) -> Result<u32, WatchdogError> {
    Ok(generation + 1)
}

struct KeyService;

impl KeyService {
    #[call_scope]
    fn scheduled_rotation(&self) -> Result<u32, WatchdogError> {
        rotate_keys(1)
    }

    #[call_scope]
    fn manual_rotation(&self) -> Result<u32, WatchdogError> {
        rotate_keys(1)
    }
}

struct Ledger;

impl Ledger {
    #[call_scope]
    fn append(&self, path: &Path, entry: &str) -> Result<(), WatchdogError> {
        guarded::fs::write(path, entry)
    }
}

fn report<T: std::fmt::Debug>(label: &str, result: Result<T, WatchdogError>) {
    match result {
        Ok(value) => println!("  {label}: allowed ({value:?})"),
        Err(err) => {
            println!("  {label}: BLOCKED");
            println!("    {err}");
            if let Some(incident) = err.incident() {
                println!("    incident {incident}");
            }
        }
    }
}

fn main() -> Result<(), WatchdogError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rusty_watchdog=warn".parse().unwrap()),
        )
        .with_target(false)
        .init();

    println!("=== Watchlist Guard ===\n");

    let config = PolicyConfig::from_json_str(include_str!("watchlist.json"))?;
    let watchdog = Watchdog::configure(config)?;
    println!(
        "Watching {} files and {} functions\n",
        watchdog.table().files.len(),
        watchdog.table().functions.len()
    );

    println!("Functions:");
    report("purge_cache()", purge_cache());
    report("scheduled rotation", KeyService.scheduled_rotation());
    report("manual rotation", KeyService.manual_rotation());

    println!("\nFiles:");
    let dir = tempfile::tempdir()?;
    let ledger = dir.path().join("ledger.db");
    report("Ledger::append", Ledger.append(&ledger, "credit 10\n"));
    report("direct write", guarded::fs::write(&ledger, "debit 1000\n"));
    report("shell access", guarded::process::exec(&format!("cat {}", ledger.display())).map(|_| ()));

    println!("\nSelf-protection:");
    report("disable interception", set_option("intercept.enable", false));
    report(
        "reconfigure",
        Watchdog::configure(PolicyConfig::default()).map(|_| ()),
    );

    Ok(())
}
