//! Operation resolver: which watched file or function a trapped call touches.
//!
//! File resolution applies only to the built-in file-mutating operations.
//! Each has a fixed list of argument positions that may carry a path; every
//! such path is compared with the watched file keys using [`similar`].

use crate::identifier::CallIdentifier;
use crate::matcher::similar;
use crate::operation::TrappedOperation;
use crate::policy::RuleTable;
use serde_json::Value;

/// Identifier of the runtime option setter.
pub const SET_OPTION: &str = "rusty_watchdog::intercept::set_option()";

/// Option that switches interception on or off.
pub const INTERCEPT_ENABLE_OPTION: &str = "intercept.enable";

/// A built-in operation that can mutate files
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuiltinOperation {
    /// Identifier suffix matched against the trapped function
    pub name: &'static str,
    /// Argument positions that may carry a file path
    pub path_arguments: &'static [usize],
}

impl BuiltinOperation {
    const fn new(name: &'static str, path_arguments: &'static [usize]) -> Self {
        Self {
            name,
            path_arguments,
        }
    }
}

/// Built-in file-mutating operations and where their paths are.
///
/// Two-path operations carry the source first and the destination second.
pub const BUILTIN_OPERATIONS: [BuiltinOperation; 14] = [
    BuiltinOperation::new("intercept::set_option()", &[]),
    BuiltinOperation::new("fs::set_permissions()", &[0]),
    BuiltinOperation::new("fs::chown()", &[0]),
    BuiltinOperation::new("fs::copy()", &[0, 1]),
    BuiltinOperation::new("process::exec()", &[0]),
    BuiltinOperation::new("fs::write()", &[0]),
    BuiltinOperation::new("fs::open()", &[0]),
    BuiltinOperation::new("fs::hard_link()", &[0, 1]),
    BuiltinOperation::new("fs::move_file()", &[0, 1]),
    BuiltinOperation::new("process::popen()", &[0]),
    BuiltinOperation::new("fs::rename()", &[0, 1]),
    BuiltinOperation::new("fs::symlink()", &[0, 1]),
    BuiltinOperation::new("fs::touch()", &[0]),
    BuiltinOperation::new("fs::remove_file()", &[0]),
];

/// Resolves trapped operations against the watch tables
#[derive(Debug, Clone, Copy)]
pub struct OperationResolver {
    operations: &'static [BuiltinOperation],
}

impl Default for OperationResolver {
    fn default() -> Self {
        Self::new(&BUILTIN_OPERATIONS)
    }
}

impl OperationResolver {
    /// Resolver over a custom operation table
    pub fn new(operations: &'static [BuiltinOperation]) -> Self {
        Self { operations }
    }

    /// The operation table
    pub fn operations(&self) -> &'static [BuiltinOperation] {
        self.operations
    }

    /// The first built-in operation similar to the trapped function
    pub fn builtin_for(&self, op: &TrappedOperation) -> Option<&'static BuiltinOperation> {
        self.operations
            .iter()
            .find(|builtin| similar(builtin.name, op.function.as_str()))
    }

    /// Paths the trapped operation touches, in argument order.
    ///
    /// Arguments that are missing or not strings are ignored.
    pub fn target_paths<'a>(&self, op: &'a TrappedOperation) -> Vec<&'a str> {
        let Some(builtin) = self.builtin_for(op) else {
            return Vec::new();
        };
        builtin
            .path_arguments
            .iter()
            .filter_map(|&position| op.string_argument(position))
            .collect()
    }

    /// The first watched file (table order) similar to one of the target paths
    pub fn file_target<'t>(
        &self,
        op: &TrappedOperation,
        files: &'t RuleTable<String>,
    ) -> Option<&'t str> {
        let paths = self.target_paths(op);
        if paths.is_empty() {
            return None;
        }

        files
            .keys()
            .find(|watched| paths.iter().any(|path| similar(watched, path)))
            .map(String::as_str)
    }

    /// The first watched function (table order) similar to the trapped function
    pub fn function_target<'t>(
        &self,
        op: &TrappedOperation,
        functions: &'t RuleTable<CallIdentifier>,
    ) -> Option<&'t CallIdentifier> {
        functions
            .keys()
            .find(|watched| similar(watched.as_str(), op.function.as_str()))
    }

    /// Whether the call tries to switch interception off.
    ///
    /// Always a violation, whatever the watch tables say.
    pub fn disables_interception(&self, op: &TrappedOperation) -> bool {
        op.function.as_str() == SET_OPTION
            && op
                .string_argument(0)
                .is_some_and(|name| name.trim().eq_ignore_ascii_case(INTERCEPT_ENABLE_OPTION))
            && op.arguments.get(1).is_some_and(is_disabling)
    }
}

/// Whether an option value means "disabled"
pub fn is_disabling(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(enabled) => !enabled,
        Value::Number(number) => number.as_f64() == Some(0.0),
        Value::String(text) => matches!(
            text.trim().to_ascii_lowercase().as_str(),
            "" | "0" | "off" | "false"
        ),
        Value::Array(_) | Value::Object(_) => false,
    }
}
