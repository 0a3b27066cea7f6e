//! Decision engine: default action plus first-match exceptions.

use crate::matcher::similar;
use crate::operation::TrappedOperation;
use crate::policy::AccessRule;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Verdict for a watched file or function
///
/// # Examples
///
/// ```
/// use rusty_watchdog::decision::Action;
///
/// assert_eq!(Action::parse("block"), Some(Action::Block));
/// assert_eq!(Action::Block.invert(), Action::Allow);
/// assert_eq!(serde_json::to_string(&Action::Allow).unwrap(), r#""allow""#);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// The operation may proceed
    Allow,
    /// The operation must not proceed
    Block,
}

impl Action {
    /// Parse the configuration spelling (`"allow"` or `"block"`).
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "allow" => Some(Action::Allow),
            "block" => Some(Action::Block),
            _ => None,
        }
    }

    /// The opposite action. Exceptions flip the default; they never set their own.
    pub fn invert(self) -> Self {
        match self {
            Action::Allow => Action::Block,
            Action::Block => Action::Allow,
        }
    }

    /// Configuration spelling
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Allow => "allow",
            Action::Block => "block",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decide the action for `op` against a matched rule.
///
/// Exceptions are scanned in configuration order. The first specifier whose
/// scope and file both match (an absent field matches anything) returns the
/// inverse of the default; if none matches the default stands.
pub fn decide(rule: &AccessRule, op: &TrappedOperation) -> Action {
    for specifier in &rule.exceptions {
        let scope_match = specifier
            .scope
            .as_ref()
            .is_none_or(|scope| similar(scope.as_str(), op.scope.as_str()));
        let file_match = specifier
            .file
            .as_deref()
            .is_none_or(|file| similar(file, &op.file));

        if scope_match && file_match {
            return rule.default.invert();
        }
    }

    rule.default
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifier::CallIdentifier;
    use crate::policy::ExceptionSpecifier;

    fn op(scope: &str, file: &str) -> TrappedOperation {
        TrappedOperation::new("app::func2", file)
            .unwrap()
            .with_scope(scope)
    }

    fn scope_only(scope: &str) -> ExceptionSpecifier {
        ExceptionSpecifier {
            scope: CallIdentifier::normalize(scope),
            file: None,
        }
    }

    #[test]
    fn test_no_exceptions_returns_default() {
        let rule = AccessRule::new(Action::Block);
        assert_eq!(decide(&rule, &op("anything", "a.rs")), Action::Block);

        let rule = AccessRule::new(Action::Allow);
        assert_eq!(decide(&rule, &op("anything", "a.rs")), Action::Allow);
    }

    #[test]
    fn test_matching_scope_inverts_default() {
        let rule = AccessRule::new(Action::Block).with_exception(scope_only("ClassB::can_call_func2"));

        assert_eq!(
            decide(&rule, &op("app::ClassB::can_call_func2", "src/b.rs")),
            Action::Allow
        );
        assert_eq!(
            decide(&rule, &op("app::ClassA::cannot_call_func2", "src/a.rs")),
            Action::Block
        );
        assert_eq!(decide(&rule, &op("", "src/main.rs")), Action::Block);
    }

    #[test]
    fn test_scope_and_file_must_both_match() {
        let rule = AccessRule::new(Action::Block).with_exception(ExceptionSpecifier {
            scope: CallIdentifier::normalize("ClassC::can_call_func3"),
            file: Some("class_c.rs".to_string()),
        });

        assert_eq!(
            decide(&rule, &op("app::ClassC::can_call_func3", "src/class_c.rs")),
            Action::Allow
        );
        assert_eq!(
            decide(&rule, &op("app::ClassC::can_call_func3", "src/other.rs")),
            Action::Block
        );
        assert_eq!(
            decide(&rule, &op("app::ClassC::cannot_call_func3", "src/class_c.rs")),
            Action::Block
        );
    }

    #[test]
    fn test_file_only_exception_on_allow_rule() {
        let rule = AccessRule::new(Action::Allow).with_exception(ExceptionSpecifier {
            scope: None,
            file: Some("upload.rs".to_string()),
        });

        assert_eq!(decide(&rule, &op("x", "src/upload.rs")), Action::Block);
        assert_eq!(decide(&rule, &op("x", "src/download.rs")), Action::Allow);
    }

    #[test]
    fn test_first_match_wins() {
        // Both specifiers match; only the first is consulted.
        let rule = AccessRule::new(Action::Allow)
            .with_exception(scope_only("ClassB::run"))
            .with_exception(ExceptionSpecifier {
                scope: None,
                file: Some("b.rs".to_string()),
            });

        assert_eq!(decide(&rule, &op("app::ClassB::run", "src/b.rs")), Action::Block);
    }

    #[test]
    fn test_decision_is_idempotent() {
        let rule = AccessRule::new(Action::Block).with_exception(scope_only("ClassB::can_call_func2"));
        let trapped = op("app::ClassB::can_call_func2", "src/b.rs");

        let first = decide(&rule, &trapped);
        let second = decide(&rule, &trapped);
        assert_eq!(first, second);
        assert_eq!(rule.exceptions.len(), 1);
    }

    #[test]
    fn test_action_parse_is_exact() {
        assert_eq!(Action::parse("allow"), Some(Action::Allow));
        assert_eq!(Action::parse("Block"), None);
        assert_eq!(Action::parse("deny"), None);
    }
}
