//! Watchlist configuration input and builder
//!
//! A watchlist has two optional sections, `files` and `functions`. Each maps
//! an identifier to an entry:
//!
//! ```json
//! {
//!   "functions": {
//!     "func2()": { "default": "block", "except": [ { "scope": "ClassB::can_call_func2()" } ] }
//!   },
//!   "files": {
//!     "logs.log": { "default": "allow", "except": [ { "file": "upload.rs" } ] }
//!   },
//!   "haltOnIncident": false
//! }
//! ```
//!
//! Entries are kept as raw JSON so that the policy store can skip malformed
//! ones individually instead of rejecting the whole watchlist.
//!
//! # Example
//!
//! ```
//! use rusty_watchdog::policy::{EntryConfig, ExceptionConfig, PolicyConfig};
//!
//! let config = PolicyConfig::builder()
//!     .function("func1()", EntryConfig::block())
//!     .function(
//!         "func2()",
//!         EntryConfig::block().except(ExceptionConfig::scope("ClassB::can_call_func2()")),
//!     )
//!     .halt_on_incident(false)
//!     .build();
//!
//! assert_eq!(config.functions.len(), 2);
//! assert!(!config.halt_on_incident);
//! ```

use crate::decision::Action;
use crate::error::WatchdogError;
use serde::Serialize;
use serde_json::Value;

/// Raw watchlist configuration
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyConfig {
    /// Watched files, in configuration order
    pub files: Vec<(String, Value)>,
    /// Watched functions, in configuration order
    pub functions: Vec<(String, Value)>,
    /// Whether the process halts after a violation is reported
    pub halt_on_incident: bool,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            files: Vec::new(),
            functions: Vec::new(),
            halt_on_incident: true,
        }
    }
}

impl PolicyConfig {
    /// Create a new configuration builder
    pub fn builder() -> PolicyConfigBuilder {
        PolicyConfigBuilder::default()
    }

    /// Read the nested watchlist structure.
    ///
    /// Only a non-object input is an error. Sections that are not objects
    /// are ignored; entries inside them are validated later by the store.
    /// `haltOnIncident` (or `halt_on_incident`) defaults to `true`.
    pub fn from_value(value: Value) -> Result<Self, WatchdogError> {
        let Value::Object(mut root) = value else {
            return Err(WatchdogError::InvalidConfig(
                "watchlist must be an object".to_string(),
            ));
        };

        let halt_on_incident = root
            .get("haltOnIncident")
            .or_else(|| root.get("halt_on_incident"))
            .and_then(Value::as_bool)
            .unwrap_or(true);

        Ok(Self {
            files: section(root.remove("files")),
            functions: section(root.remove("functions")),
            halt_on_incident,
        })
    }

    /// Parse watchlist JSON text; see [`PolicyConfig::from_value`].
    pub fn from_json_str(text: &str) -> Result<Self, WatchdogError> {
        Self::from_value(serde_json::from_str(text)?)
    }
}

fn section(value: Option<Value>) -> Vec<(String, Value)> {
    match value {
        Some(Value::Object(entries)) => entries.into_iter().collect(),
        _ => Vec::new(),
    }
}

/// Typed form of one watchlist entry, used by the builder
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntryConfig {
    /// Action applied when no exception matches
    pub default: Action,
    /// Exceptions that invert the default, first match wins
    #[serde(rename = "except", skip_serializing_if = "Vec::is_empty")]
    pub exceptions: Vec<ExceptionConfig>,
}

impl EntryConfig {
    /// An entry blocked by default
    pub fn block() -> Self {
        Self {
            default: Action::Block,
            exceptions: Vec::new(),
        }
    }

    /// An entry allowed by default
    pub fn allow() -> Self {
        Self {
            default: Action::Allow,
            exceptions: Vec::new(),
        }
    }

    /// Append an exception
    pub fn except(mut self, exception: ExceptionConfig) -> Self {
        self.exceptions.push(exception);
        self
    }

    fn into_value(self) -> Value {
        // Plain struct of strings; serialization cannot fail.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Typed form of one exception specifier
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExceptionConfig {
    /// Caller scope the exception applies to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// Call-site file the exception applies to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

impl ExceptionConfig {
    /// Exception for calls made from `scope`
    pub fn scope(scope: impl Into<String>) -> Self {
        Self {
            scope: Some(scope.into()),
            file: None,
        }
    }

    /// Exception for calls made from `file`
    pub fn file(file: impl Into<String>) -> Self {
        Self {
            scope: None,
            file: Some(file.into()),
        }
    }

    /// Also require the call-site file
    pub fn in_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }
}

/// Builder for [`PolicyConfig`]
#[derive(Debug, Default)]
pub struct PolicyConfigBuilder {
    inner: PolicyConfig,
}

impl PolicyConfigBuilder {
    /// Watch a file
    pub fn file(mut self, path: impl Into<String>, entry: EntryConfig) -> Self {
        self.inner.files.push((path.into(), entry.into_value()));
        self
    }

    /// Watch a function
    pub fn function(mut self, name: impl Into<String>, entry: EntryConfig) -> Self {
        self.inner.functions.push((name.into(), entry.into_value()));
        self
    }

    /// Add a raw file entry (validated leniently by the store)
    pub fn raw_file(mut self, path: impl Into<String>, entry: Value) -> Self {
        self.inner.files.push((path.into(), entry));
        self
    }

    /// Add a raw function entry (validated leniently by the store)
    pub fn raw_function(mut self, name: impl Into<String>, entry: Value) -> Self {
        self.inner.functions.push((name.into(), entry));
        self
    }

    /// Set whether the process halts on a violation
    pub fn halt_on_incident(mut self, halt: bool) -> Self {
        self.inner.halt_on_incident = halt;
        self
    }

    /// Build the configuration
    pub fn build(self) -> PolicyConfig {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builder_serializes_entries() {
        let config = PolicyConfig::builder()
            .file(
                "secret.file",
                EntryConfig::block().except(ExceptionConfig::scope("ClassE::can_write_to_file")),
            )
            .build();

        assert_eq!(config.files[0].0, "secret.file");
        assert_eq!(
            config.files[0].1,
            json!({"default": "block", "except": [{"scope": "ClassE::can_write_to_file"}]})
        );
        assert!(config.halt_on_incident);
    }

    #[test]
    fn test_entry_without_exceptions_omits_except() {
        let config = PolicyConfig::builder()
            .function("func1()", EntryConfig::allow())
            .build();
        assert_eq!(config.functions[0].1, json!({"default": "allow"}));
    }

    #[test]
    fn test_from_value_preserves_order() {
        let config = PolicyConfig::from_value(json!({
            "functions": {
                "zeta()": {"default": "block"},
                "alpha()": {"default": "allow"},
                "mid()": {"default": "block"}
            },
            "haltOnIncident": false
        }))
        .unwrap();

        let keys: Vec<&str> = config.functions.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["zeta()", "alpha()", "mid()"]);
        assert!(config.files.is_empty());
        assert!(!config.halt_on_incident);
    }

    #[test]
    fn test_from_value_ignores_non_object_sections() {
        let config = PolicyConfig::from_value(json!({
            "files": ["secret.file"],
            "functions": "func1()"
        }))
        .unwrap();

        assert!(config.files.is_empty());
        assert!(config.functions.is_empty());
        assert!(config.halt_on_incident);
    }

    #[test]
    fn test_from_value_rejects_non_object() {
        let err = PolicyConfig::from_value(json!([1, 2])).unwrap_err();
        assert!(matches!(err, WatchdogError::InvalidConfig(_)));
    }

    #[test]
    fn test_from_json_str() {
        let config = PolicyConfig::from_json_str(
            r#"{"files": {"logs.log": {"default": "allow"}}, "halt_on_incident": false}"#,
        )
        .unwrap();
        assert_eq!(config.files.len(), 1);
        assert!(!config.halt_on_incident);

        let err = PolicyConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, WatchdogError::JsonDecode(_)));
    }

    #[test]
    fn test_exception_config_helpers() {
        let exception = ExceptionConfig::scope("ClassC::can_call_func3").in_file("class_c.rs");
        assert_eq!(
            serde_json::to_value(&exception).unwrap(),
            json!({"scope": "ClassC::can_call_func3", "file": "class_c.rs"})
        );
        assert_eq!(
            serde_json::to_value(ExceptionConfig::file("upload.rs")).unwrap(),
            json!({"file": "upload.rs"})
        );
    }
}
