//! Interception wiring between instrumented code and the engine.
//!
//! Instrumented functions (`#[intercept]`) and the guarded operations call
//! [`trap`] before they run. `trap` describes the call as a
//! [`TrappedOperation`], hands it to every before-handler subscribed to a
//! similar operation, and returns an [`InterceptedCall`] guard that keeps the
//! call's scope frame pushed until the call returns.
//!
//! # Architecture
//!
//! - [`Interceptor`] - the capability to subscribe handlers to operations
//! - [`HookRegistry`] - in-process implementation; one global instance
//!   backs [`add_before`] and [`add_after`]
//! - [`stack`] - thread-local scope frames and the scope assignment rule
//! - [`options`] - runtime options, including `intercept.enable`
//!
//! Registering hooks through [`add_before`] and [`add_after`] is itself a
//! trapped operation, so once a watchlist is configured no further hooks can
//! be added.
//!
//! # Example
//!
//! ```
//! use rusty_watchdog::intercept::{BeforeHandler, HookRegistry, Interceptor};
//! use rusty_watchdog::identifier::CallIdentifier;
//! use rusty_watchdog::operation::TrappedOperation;
//! use rusty_watchdog::error::WatchdogError;
//! use std::sync::Arc;
//!
//! let registry = HookRegistry::new();
//! let handler: Arc<dyn BeforeHandler> =
//!     Arc::new(|_op: &TrappedOperation| -> Result<(), WatchdogError> { Ok(()) });
//! registry.subscribe_before(CallIdentifier::normalize("func1").unwrap(), handler);
//!
//! let op = TrappedOperation::new("app::func1", "src/main.rs").unwrap();
//! assert!(registry.dispatch_before(&op).is_ok());
//! ```

pub mod options;
pub mod stack;

pub use options::{interception_enabled, option, set_option};
pub use stack::{
    Frame, ScopeGuard, ScopedFrame, StackWalker, ThreadStack, assign_scopes, current_scope,
    enter_scope,
};

use crate::engine::Watchdog;
use crate::enforcement;
use crate::error::WatchdogError;
use crate::identifier::CallIdentifier;
use crate::matcher::similar;
use crate::operation::TrappedOperation;
use crate::policy::HOOK_REGISTRATION_OPERATIONS;
use serde::Serialize;
use serde_json::Value;
use std::panic::Location;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

const ADD_AFTER: &str = HOOK_REGISTRATION_OPERATIONS[0];
const ADD_BEFORE: &str = HOOK_REGISTRATION_OPERATIONS[1];

/// Handler run before a trapped operation; an error stops the operation
pub trait BeforeHandler: Send + Sync {
    /// Inspect the operation before it runs
    fn before(&self, op: &TrappedOperation) -> Result<(), WatchdogError>;
}

/// Handler notified after a trapped operation returned
pub trait AfterHandler: Send + Sync {
    /// Observe the completed operation
    fn after(&self, op: &TrappedOperation);
}

impl<F> BeforeHandler for F
where
    F: Fn(&TrappedOperation) -> Result<(), WatchdogError> + Send + Sync,
{
    fn before(&self, op: &TrappedOperation) -> Result<(), WatchdogError> {
        self(op)
    }
}

impl<F> AfterHandler for F
where
    F: Fn(&TrappedOperation) + Send + Sync,
{
    fn after(&self, op: &TrappedOperation) {
        self(op)
    }
}

/// Capability to hook operations by identifier
pub trait Interceptor: Send + Sync {
    /// Run `handler` before every operation similar to `operation`
    fn subscribe_before(&self, operation: CallIdentifier, handler: Arc<dyn BeforeHandler>);

    /// Notify `handler` after every operation similar to `operation`
    fn subscribe_after(&self, operation: CallIdentifier, handler: Arc<dyn AfterHandler>);
}

type Subscriptions<H> = RwLock<Vec<(CallIdentifier, Arc<H>)>>;

/// In-process hook registry.
///
/// A handler subscribed to several operations that all match one call runs
/// once for that call.
pub struct HookRegistry {
    before: Subscriptions<dyn BeforeHandler>,
    after: Subscriptions<dyn AfterHandler>,
}

impl std::fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookRegistry")
            .field("before", &operations(&self.before))
            .field("after", &operations(&self.after))
            .finish()
    }
}

impl Default for HookRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HookRegistry {
    /// An empty registry
    pub const fn new() -> Self {
        Self {
            before: RwLock::new(Vec::new()),
            after: RwLock::new(Vec::new()),
        }
    }

    /// Run the distinct before-handlers matching `op`, in subscription order.
    ///
    /// Stops at the first handler that rejects the operation.
    pub fn dispatch_before(&self, op: &TrappedOperation) -> Result<(), WatchdogError> {
        // Handlers run without the lock held so they may subscribe in turn.
        let handlers = matching(&self.before, op);
        for handler in handlers {
            handler.before(op)?;
        }
        Ok(())
    }

    /// Notify the distinct after-handlers matching `op`
    pub fn dispatch_after(&self, op: &TrappedOperation) {
        for handler in matching(&self.after, op) {
            handler.after(op);
        }
    }

    /// Number of before and after subscriptions
    pub fn len(&self) -> usize {
        operations(&self.before).len() + operations(&self.after).len()
    }

    /// Whether nothing is subscribed
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Interceptor for HookRegistry {
    fn subscribe_before(&self, operation: CallIdentifier, handler: Arc<dyn BeforeHandler>) {
        debug!(%operation, "subscribing before hook");
        self.before
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((operation, handler));
    }

    fn subscribe_after(&self, operation: CallIdentifier, handler: Arc<dyn AfterHandler>) {
        debug!(%operation, "subscribing after hook");
        self.after
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((operation, handler));
    }
}

fn operations<H: ?Sized>(subscriptions: &Subscriptions<H>) -> Vec<CallIdentifier> {
    subscriptions
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .iter()
        .map(|(operation, _)| operation.clone())
        .collect()
}

fn matching<H: ?Sized>(subscriptions: &Subscriptions<H>, op: &TrappedOperation) -> Vec<Arc<H>> {
    let subscriptions = subscriptions.read().unwrap_or_else(PoisonError::into_inner);
    let mut handlers: Vec<Arc<H>> = Vec::new();
    for (operation, handler) in subscriptions.iter() {
        if !similar(operation.as_str(), op.function.as_str()) {
            continue;
        }
        if handlers
            .iter()
            .any(|seen| std::ptr::addr_eq(Arc::as_ptr(seen), Arc::as_ptr(handler)))
        {
            continue;
        }
        handlers.push(Arc::clone(handler));
    }
    handlers
}

static REGISTRY: HookRegistry = HookRegistry::new();

pub(crate) fn registry() -> &'static HookRegistry {
    &REGISTRY
}

/// Subscribe the configured engine to every operation it watches.
pub(crate) fn install(watchdog: &'static Watchdog) {
    options::reset_interception();

    let handler: Arc<dyn BeforeHandler> =
        Arc::new(move |op: &TrappedOperation| watchdog.process(op));
    for operation in watchdog.subscriptions() {
        registry().subscribe_before(operation, Arc::clone(&handler));
    }
}

/// Serialize one argument of a trapped call.
///
/// Values that cannot be represented as JSON become `null`.
pub fn argument<T: Serialize + ?Sized>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

/// An admitted trapped call.
///
/// Holds the call's scope frame; dropping it notifies the after-handlers and
/// pops the frame.
#[derive(Debug)]
#[must_use = "the call's scope ends when the guard is dropped"]
pub struct InterceptedCall {
    op: TrappedOperation,
    _frame: ScopeGuard,
}

impl InterceptedCall {
    /// The operation as it was presented to the handlers
    pub fn operation(&self) -> &TrappedOperation {
        &self.op
    }
}

impl Drop for InterceptedCall {
    fn drop(&mut self) {
        if interception_enabled() {
            registry().dispatch_after(&self.op);
        }
    }
}

/// Trap a call before it runs.
///
/// The calling scope is the innermost active frame of this thread, or the
/// global scope. When a handler reports a violation and the configured
/// engine halts on incidents, the process is terminated here; otherwise the
/// violation is returned and the call must not proceed.
pub fn trap(
    function: &str,
    call_site: &str,
    arguments: Vec<Value>,
) -> Result<InterceptedCall, WatchdogError> {
    let function = CallIdentifier::normalize(function).ok_or_else(|| {
        WatchdogError::InvalidTarget("cannot trap a call without a function name".to_string())
    })?;
    let frame = Frame {
        function,
        file: call_site.to_string(),
    };

    let mut frames = vec![frame.clone()];
    frames.extend(ThreadStack.frames());
    let scope = assign_scopes(frames)
        .into_iter()
        .next()
        .map(|scoped| scoped.scope)
        .unwrap_or_else(CallIdentifier::global_scope);

    let op = TrappedOperation::new(frame.function.as_str(), call_site)
        .ok_or_else(|| WatchdogError::InvalidTarget(frame.function.to_string()))?
        .with_scope_id(scope)
        .with_arguments(arguments);

    if interception_enabled()
        && let Err(err) = registry().dispatch_before(&op)
    {
        if err.is_violation() && Watchdog::global().is_some_and(Watchdog::halts_on_incident) {
            enforcement::halt(&err);
        }
        return Err(err);
    }

    Ok(InterceptedCall {
        op,
        _frame: stack::push_frame(frame),
    })
}

/// Register a before-hook on the global registry.
///
/// This is a trapped operation: once a watchlist is configured it is
/// rejected.
#[track_caller]
pub fn add_before(operation: &str, handler: Arc<dyn BeforeHandler>) -> Result<(), WatchdogError> {
    let _call = trap(ADD_BEFORE, Location::caller().file(), vec![argument(operation)])?;
    registry().subscribe_before(hook_target(operation)?, handler);
    Ok(())
}

/// Register an after-hook on the global registry.
///
/// This is a trapped operation: once a watchlist is configured it is
/// rejected.
#[track_caller]
pub fn add_after(operation: &str, handler: Arc<dyn AfterHandler>) -> Result<(), WatchdogError> {
    let _call = trap(ADD_AFTER, Location::caller().file(), vec![argument(operation)])?;
    registry().subscribe_after(hook_target(operation)?, handler);
    Ok(())
}

fn hook_target(operation: &str) -> Result<CallIdentifier, WatchdogError> {
    CallIdentifier::normalize(operation)
        .ok_or_else(|| WatchdogError::InvalidTarget("cannot hook an unnamed operation".to_string()))
}
