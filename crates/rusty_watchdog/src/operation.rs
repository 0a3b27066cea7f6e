//! Trapped operation records.

use crate::identifier::CallIdentifier;
use serde::Serialize;
use serde_json::Value;

/// One intercepted call, described for the policy engine.
///
/// Created per interception event and discarded once the decision is made.
///
/// # Examples
///
/// ```
/// use rusty_watchdog::operation::TrappedOperation;
/// use serde_json::json;
///
/// let op = TrappedOperation::new("app::func1", "src/main.rs")
///     .unwrap()
///     .with_scope("app::ClassA::cannot_call_func1")
///     .with_arguments(vec![json!("first"), json!(2)]);
///
/// assert_eq!(op.function.as_str(), "app::func1()");
/// assert_eq!(op.scope.as_str(), "app::ClassA::cannot_call_func1()");
/// assert_eq!(op.string_argument(0), Some("first"));
/// assert_eq!(op.string_argument(1), None);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrappedOperation {
    /// The operation being called
    pub function: CallIdentifier,
    /// The caller context (or the global-scope sentinel)
    pub scope: CallIdentifier,
    /// The file the call was issued from
    pub file: String,
    /// Arguments supplied to the operation, in order
    pub arguments: Vec<Value>,
}

impl TrappedOperation {
    /// Create an operation called from the global scope with no arguments.
    ///
    /// Returns `None` when `function` normalizes to an absent identifier.
    pub fn new(function: &str, file: impl Into<String>) -> Option<Self> {
        Some(Self {
            function: CallIdentifier::normalize(function)?,
            scope: CallIdentifier::global_scope(),
            file: file.into(),
            arguments: Vec::new(),
        })
    }

    /// Set the calling scope; an empty scope falls back to the global scope.
    pub fn with_scope(mut self, scope: &str) -> Self {
        self.scope = CallIdentifier::normalize(scope).unwrap_or_else(CallIdentifier::global_scope);
        self
    }

    /// Set the calling scope from an already normalized identifier.
    pub fn with_scope_id(mut self, scope: CallIdentifier) -> Self {
        self.scope = scope;
        self
    }

    /// Set the argument list.
    pub fn with_arguments(mut self, arguments: Vec<Value>) -> Self {
        self.arguments = arguments;
        self
    }

    /// The argument at `position` if it is a string.
    pub fn string_argument(&self, position: usize) -> Option<&str> {
        self.arguments.get(position).and_then(Value::as_str)
    }
}
