//! Canonical call identifiers.
//!
//! Every function name, method scope and exception `scope` field is
//! normalized into a [`CallIdentifier`] before it is stored or compared.
//! The canonical form is `"path::Type::method()"` or `"function()"`:
//! leading path separators and surrounding whitespace are stripped and a
//! trailing `()` is appended when missing. Case is preserved.

use serde::Serialize;
use std::fmt;

/// Identifier used for the outermost frame, which has no caller.
pub const GLOBAL_SCOPE: &str = "global scope()";

/// A normalized function or scope identifier.
///
/// # Examples
///
/// ```
/// use rusty_watchdog::identifier::CallIdentifier;
///
/// let id = CallIdentifier::normalize("\\Foo->bar").unwrap();
/// assert_eq!(id.as_str(), "Foo->bar()");
///
/// let id = CallIdentifier::normalize("::app::ClassB::can_call_func2").unwrap();
/// assert_eq!(id.as_str(), "app::ClassB::can_call_func2()");
///
/// assert!(CallIdentifier::normalize("   ").is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct CallIdentifier(String);

impl CallIdentifier {
    /// Normalize a raw name into its canonical form.
    ///
    /// Returns `None` when nothing is left after stripping; an absent
    /// identifier is never a wildcard.
    pub fn normalize(raw: &str) -> Option<Self> {
        let key = raw
            .trim()
            .trim_start_matches(['\\', ':'])
            .trim();
        if key.is_empty() {
            return None;
        }

        let mut key = key.to_string();
        if !key.ends_with("()") {
            key.push_str("()");
        }
        Some(Self(key))
    }

    /// The sentinel identifier of the global scope.
    pub fn global_scope() -> Self {
        Self(GLOBAL_SCOPE.to_string())
    }

    /// Whether this is the global-scope sentinel.
    pub fn is_global_scope(&self) -> bool {
        self.0 == GLOBAL_SCOPE
    }

    /// The canonical string form.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CallIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CallIdentifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_appends_parentheses() {
        let id = CallIdentifier::normalize("func1").unwrap();
        assert_eq!(id.as_str(), "func1()");
    }

    #[test]
    fn test_keeps_existing_parentheses() {
        let id = CallIdentifier::normalize("func1()").unwrap();
        assert_eq!(id.as_str(), "func1()");
    }

    #[test]
    fn test_strips_leading_separators_and_whitespace() {
        assert_eq!(
            CallIdentifier::normalize("  \\Foo->bar  ").unwrap().as_str(),
            "Foo->bar()"
        );
        assert_eq!(
            CallIdentifier::normalize("::std::fs::write").unwrap().as_str(),
            "std::fs::write()"
        );
    }

    #[test]
    fn test_empty_is_absent() {
        assert!(CallIdentifier::normalize("").is_none());
        assert!(CallIdentifier::normalize(" \t ").is_none());
        assert!(CallIdentifier::normalize("\\\\").is_none());
        assert!(CallIdentifier::normalize("::").is_none());
    }

    #[test]
    fn test_case_preserved() {
        let id = CallIdentifier::normalize("ClassB::canCallFunc2").unwrap();
        assert_eq!(id.as_str(), "ClassB::canCallFunc2()");
    }

    #[test]
    fn test_global_scope_sentinel() {
        let scope = CallIdentifier::global_scope();
        assert!(scope.is_global_scope());
        assert_eq!(CallIdentifier::normalize("global scope"), Some(scope));
    }

    #[test]
    fn test_serializes_as_string() {
        let id = CallIdentifier::normalize("func1").unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), r#""func1()""#);
    }
}
