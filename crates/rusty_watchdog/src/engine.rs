//! The watchdog engine: one-time configuration and the decision pipeline.
//!
//! [`Watchdog::configure`] installs the process-wide engine exactly once and
//! subscribes it to every built-in operation and watched function. Each
//! trapped call then flows through [`Watchdog::process`]. Both rules that
//! apply are decided (see [`Watchdog::evaluate`]): the first watched file
//! similar to one of the operation's path arguments and the first watched
//! function similar to the operation. Violations are then reported in order:
//!
//! 1. a blocked file;
//! 2. a blocked function;
//! 3. an attempt to switch interception off, whatever the tables say.
//!
//! # Example
//!
//! ```
//! use rusty_watchdog::engine::Watchdog;
//! use rusty_watchdog::operation::TrappedOperation;
//! use rusty_watchdog::policy::{EntryConfig, ExceptionConfig, PolicyConfig};
//!
//! let config = PolicyConfig::builder()
//!     .function(
//!         "func2()",
//!         EntryConfig::block().except(ExceptionConfig::scope("ClassB::can_call_func2()")),
//!     )
//!     .build();
//! let watchdog = Watchdog::from_config(&config);
//!
//! let op = TrappedOperation::new("app::func2", "src/b.rs")
//!     .unwrap()
//!     .with_scope("app::ClassB::can_call_func2");
//! assert!(watchdog.process(&op).is_ok());
//!
//! let op = op.with_scope("app::ClassB::cannot_call_func2");
//! assert!(watchdog.process(&op).unwrap_err().is_violation());
//! ```

use crate::decision::{Action, decide};
use crate::enforcement::{ViolationKind, report};
use crate::error::WatchdogError;
use crate::identifier::CallIdentifier;
use crate::intercept::{self, BeforeHandler};
use crate::operation::TrappedOperation;
use crate::policy::{PolicyConfig, WatchTable};
use crate::resolver::OperationResolver;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{trace, warn};

static CONFIGURED: AtomicBool = AtomicBool::new(false);
static INSTANCE: OnceLock<Watchdog> = OnceLock::new();

/// Outcome of evaluating one trapped operation, without reporting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    /// Watched file the operation targets, and the decided action
    pub file: Option<(String, Action)>,
    /// Watched function the operation matches, and the decided action
    pub function: Option<(CallIdentifier, Action)>,
    /// Whether the operation switches interception off
    pub disables_interception: bool,
}

impl Verdict {
    /// Whether the operation may proceed
    pub fn is_allowed(&self) -> bool {
        !self.disables_interception
            && !matches!(self.file, Some((_, Action::Block)))
            && !matches!(self.function, Some((_, Action::Block)))
    }
}

/// The configured access-control engine
#[derive(Debug)]
pub struct Watchdog {
    table: WatchTable,
    resolver: OperationResolver,
    halt_on_incident: bool,
}

impl Watchdog {
    /// Build an engine that is not installed process-wide.
    pub fn from_config(config: &PolicyConfig) -> Self {
        Self::with_resolver(config, OperationResolver::default())
    }

    /// Build an unregistered engine with a custom operation resolver.
    pub fn with_resolver(config: &PolicyConfig, resolver: OperationResolver) -> Self {
        Self {
            table: WatchTable::build(config),
            resolver,
            halt_on_incident: config.halt_on_incident,
        }
    }

    /// Install the process-wide engine.
    ///
    /// Succeeds once per process. Every later call fails with
    /// [`WatchdogError::Configuration`] and the first table stays active.
    pub fn configure(config: PolicyConfig) -> Result<&'static Watchdog, WatchdogError> {
        if CONFIGURED
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!("rejected attempt to reconfigure the watchdog");
            return Err(WatchdogError::Configuration(
                "the watchlist is already configured".to_string(),
            ));
        }

        let watchdog = INSTANCE.get_or_init(|| Self::from_config(&config));
        intercept::install(watchdog);
        Ok(watchdog)
    }

    /// The process-wide engine, once configured
    pub fn global() -> Option<&'static Watchdog> {
        INSTANCE.get()
    }

    /// Whether [`Watchdog::configure`] has been called successfully
    pub fn is_configured() -> bool {
        CONFIGURED.load(Ordering::SeqCst)
    }

    /// The compiled watch tables
    pub fn table(&self) -> &WatchTable {
        &self.table
    }

    /// The operation resolver in use
    pub fn resolver(&self) -> &OperationResolver {
        &self.resolver
    }

    /// Whether the process halts after a violation
    pub fn halts_on_incident(&self) -> bool {
        self.halt_on_incident
    }

    /// Operations this engine must be subscribed to: every built-in
    /// operation followed by every watched function.
    pub fn subscriptions(&self) -> Vec<CallIdentifier> {
        self.resolver
            .operations()
            .iter()
            .filter_map(|builtin| CallIdentifier::normalize(builtin.name))
            .chain(self.table.functions.keys().cloned())
            .collect()
    }

    /// Decide every rule that applies to `op` without reporting anything.
    pub fn evaluate(&self, op: &TrappedOperation) -> Verdict {
        let file = self
            .resolver
            .file_target(op, &self.table.files)
            .and_then(|file| {
                let rule = self.table.files.get(file)?;
                let action = decide(rule, op);
                trace!(%file, function = %op.function, scope = %op.scope, %action, "file decision");
                Some((file.to_string(), action))
            });

        let function = self
            .resolver
            .function_target(op, &self.table.functions)
            .and_then(|watched| {
                let rule = self.table.functions.get(watched.as_str())?;
                let action = decide(rule, op);
                trace!(%watched, function = %op.function, scope = %op.scope, %action, "function decision");
                Some((watched.clone(), action))
            });

        Verdict {
            file,
            function,
            disables_interception: self.resolver.disables_interception(op),
        }
    }

    /// Run the pipeline for one trapped operation.
    ///
    /// Returns the reported violation when the operation must not proceed.
    /// A blocked file takes precedence over a blocked function.
    pub fn process(&self, op: &TrappedOperation) -> Result<(), WatchdogError> {
        let verdict = self.evaluate(op);

        if let Some((file, Action::Block)) = verdict.file {
            return Err(report(ViolationKind::File { file }, op));
        }
        if let Some((_, Action::Block)) = verdict.function {
            return Err(report(ViolationKind::Function, op));
        }
        if verdict.disables_interception {
            return Err(report(ViolationKind::Function, op));
        }
        Ok(())
    }
}

impl BeforeHandler for Watchdog {
    fn before(&self, op: &TrappedOperation) -> Result<(), WatchdogError> {
        self.process(op)
    }
}
