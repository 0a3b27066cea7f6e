//! Audit hooks registered before the watchlist is configured.
//!
//! This example shows how to:
//! - Implement `BeforeHandler` and `AfterHandler` for your own types
//! - Register them with `add_before` / `add_after`
//! - See hook registration rejected once a watchlist is active
//!
//! # Usage
//!
//! ```bash
//! cargo run -p demos --example audit_hooks
//! ```

use rusty_watchdog::prelude::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Counts writes and prints every trapped write before it runs
#[derive(Default)]
struct WriteAudit {
    seen: AtomicUsize,
}

impl BeforeHandler for WriteAudit {
    fn before(&self, op: &TrappedOperation) -> Result<(), WatchdogError> {
        let count = self.seen.fetch_add(1, Ordering::SeqCst) + 1;
        println!(
            "  [audit #{count}] {} from {} ({}) args={}",
            op.function,
            op.scope,
            op.file,
            serde_json::Value::Array(op.arguments.clone())
        );
        Ok(())
    }
}

struct Completed;

impl AfterHandler for Completed {
    fn after(&self, op: &TrappedOperation) {
        println!("  [done] {}", op.function);
    }
}

struct Exporter;

impl Exporter {
    #[call_scope]
    fn export(&self, dir: &std::path::Path) -> Result<(), WatchdogError> {
        guarded::fs::write(dir.join("export.csv"), "id,total\n1,10\n")?;
        guarded::fs::copy(dir.join("export.csv"), dir.join("export.bak"))?;
        Ok(())
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

    println!("=== Audit Hooks ===\n");

    let audit = Arc::new(WriteAudit::default());
    add_before("fs::write", audit.clone())?;
    add_before("fs::copy", audit.clone())?;
    add_after("fs::copy", Arc::new(Completed))?;

    let dir = tempfile::tempdir()?;
    Exporter.export(dir.path())?;
    println!("\n{} operations audited", audit.seen.load(Ordering::SeqCst));

    Watchdog::configure(PolicyConfig::builder().halt_on_incident(false).build())?;

    println!("\nAfter configuration:");
    match add_before("fs::remove_file", audit) {
        Ok(()) => println!("  hook registered"),
        Err(err) => println!("  hook rejected: {err}"),
    }

    Ok(())
}
