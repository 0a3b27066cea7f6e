//! Watch tables built from a [`PolicyConfig`].

use super::config::PolicyConfig;
use crate::decision::Action;
use crate::identifier::CallIdentifier;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// Operations that register interception hooks; always blocked once configured.
pub const HOOK_REGISTRATION_OPERATIONS: [&str; 2] = [
    "rusty_watchdog::intercept::add_after()",
    "rusty_watchdog::intercept::add_before()",
];

/// Source tree of the engine itself; always blocked for file-mutating operations.
pub const ENGINE_SOURCE: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/src");

/// One exception to a rule's default action
///
/// An absent `scope` matches any scope and an absent `file` matches any
/// call site. At least one of the two is always present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExceptionSpecifier {
    /// Normalized caller scope
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<CallIdentifier>,
    /// Call-site file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

/// Default action plus ordered exceptions for one watched file or function
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessRule {
    /// Action when no exception matches
    pub default: Action,
    /// Exceptions in configuration order
    pub exceptions: Vec<ExceptionSpecifier>,
}

impl AccessRule {
    /// A rule with no exceptions
    pub fn new(default: Action) -> Self {
        Self {
            default,
            exceptions: Vec::new(),
        }
    }

    /// Append an exception
    pub fn with_exception(mut self, exception: ExceptionSpecifier) -> Self {
        self.exceptions.push(exception);
        self
    }
}

/// Insertion-ordered rule map.
///
/// Re-inserting an existing key replaces its rule in place, so iteration order
/// is the order in which keys were first configured. Pinned rules stay ahead
/// of every other key and are never replaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleTable<K> {
    entries: Vec<(K, AccessRule)>,
    pinned: usize,
}

impl<K> Default for RuleTable<K> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            pinned: 0,
        }
    }
}

impl<K: AsRef<str>> RuleTable<K> {
    /// Insert or replace the rule for `key`.
    ///
    /// Returns `false`, leaving the table untouched, when `key` is pinned.
    pub fn insert(&mut self, key: K, rule: AccessRule) -> bool {
        match self.position(key.as_ref()) {
            Some(index) if index < self.pinned => false,
            Some(index) => {
                self.entries[index].1 = rule;
                true
            }
            None => {
                self.entries.push((key, rule));
                true
            }
        }
    }

    /// Pin `rule` for `key` after the rules pinned so far.
    ///
    /// A pinned rule is matched before any unpinned key and cannot be
    /// replaced by [`RuleTable::insert`].
    pub fn pin(&mut self, key: K, rule: AccessRule) {
        match self.position(key.as_ref()) {
            Some(index) if index < self.pinned => return,
            Some(index) => {
                self.entries.remove(index);
            }
            None => {}
        }
        self.entries.insert(self.pinned, (key, rule));
        self.pinned += 1;
    }

    /// Whether `key` holds a pinned rule
    pub fn is_pinned(&self, key: &str) -> bool {
        self.position(key).is_some_and(|index| index < self.pinned)
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|(existing, _)| existing.as_ref() == key)
    }

    /// Rule for `key`
    pub fn get(&self, key: &str) -> Option<&AccessRule> {
        self.entries
            .iter()
            .find(|(existing, _)| existing.as_ref() == key)
            .map(|(_, rule)| rule)
    }

    /// Keys and rules in table order
    pub fn iter(&self) -> impl Iterator<Item = (&K, &AccessRule)> {
        self.entries.iter().map(|(key, rule)| (key, rule))
    }

    /// Keys in table order
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.entries.iter().map(|(key, _)| key)
    }

    /// Number of watched keys
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The watched files and functions
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchTable {
    /// Watched file paths (not normalized)
    pub files: RuleTable<String>,
    /// Watched function identifiers
    pub functions: RuleTable<CallIdentifier>,
}

impl WatchTable {
    /// Build the tables from a configuration.
    ///
    /// Malformed entries and exceptions are skipped with a warning. A blocked
    /// entry whose exception names a `file` also blocks that file outright, so
    /// the file an allowance originates from cannot be rewritten. The engine's
    /// own sources and the hook registration operations are pinned as blocked
    /// ahead of every configured key: no entry can replace them, and no
    /// abbreviated key can be matched before them.
    pub fn build(config: &PolicyConfig) -> Self {
        let mut table = Self::default();

        table
            .files
            .pin(ENGINE_SOURCE.to_string(), AccessRule::new(Action::Block));
        for operation in HOOK_REGISTRATION_OPERATIONS {
            if let Some(function) = CallIdentifier::normalize(operation) {
                table.functions.pin(function, AccessRule::new(Action::Block));
            }
        }

        for (path, value) in &config.files {
            let Some((default, raw_exceptions)) = parse_entry("files", path, value) else {
                continue;
            };
            if table.files.is_pinned(path) {
                warn!(file = %path, "ignoring entry for a protected file");
                continue;
            }
            table.files.insert(path.clone(), AccessRule::new(default));
            let rule = table.collect_rule(default, raw_exceptions);
            table.files.insert(path.clone(), rule);
            debug!(file = %path, %default, "watching file");
        }

        for (name, value) in &config.functions {
            let Some((default, raw_exceptions)) = parse_entry("functions", name, value) else {
                continue;
            };
            let Some(function) = CallIdentifier::normalize(name) else {
                warn!(key = %name, "skipping function entry with empty name");
                continue;
            };
            if table.functions.is_pinned(function.as_str()) {
                warn!(%function, "ignoring entry for a protected function");
                continue;
            }
            table.functions.insert(function.clone(), AccessRule::new(default));
            let rule = table.collect_rule(default, raw_exceptions);
            table.functions.insert(function.clone(), rule);
            debug!(%function, %default, "watching function");
        }

        table
    }

    fn collect_rule(&mut self, default: Action, raw_exceptions: &[Value]) -> AccessRule {
        let mut rule = AccessRule::new(default);
        for raw in raw_exceptions {
            let Some(exception) = parse_exception(raw) else {
                continue;
            };
            if default == Action::Block
                && let Some(file) = &exception.file
            {
                debug!(%file, "protecting file that an allowance originates from");
                self.files.insert(file.clone(), AccessRule::new(Action::Block));
            }
            rule.exceptions.push(exception);
        }
        rule
    }
}

fn parse_entry<'a>(section: &str, key: &str, value: &'a Value) -> Option<(Action, &'a [Value])> {
    let Some(entry) = value.as_object() else {
        warn!(section, key, "skipping entry that is not an object");
        return None;
    };
    let Some(raw_default) = entry.get("default") else {
        warn!(section, key, "skipping entry without a default action");
        return None;
    };
    let Some(default) = raw_default.as_str().and_then(Action::parse) else {
        warn!(section, key, default = %raw_default, "skipping entry with unknown default action");
        return None;
    };

    let exceptions = entry
        .get("except")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    Some((default, exceptions))
}

fn parse_exception(raw: &Value) -> Option<ExceptionSpecifier> {
    let filter = match raw.as_object() {
        Some(filter) if !filter.is_empty() => filter,
        _ => {
            warn!(exception = %raw, "skipping exception that is not a non-empty object");
            return None;
        }
    };

    let scope = match optional_string(filter, "scope") {
        Ok(None) => None,
        Ok(Some(scope)) => match CallIdentifier::normalize(scope) {
            Some(scope) => Some(scope),
            None => {
                warn!(exception = %raw, "skipping exception with an empty scope");
                return None;
            }
        },
        Err(()) => {
            warn!(exception = %raw, "skipping exception with a non-string scope");
            return None;
        }
    };

    let file = match optional_string(filter, "file") {
        Ok(None) => None,
        Ok(Some(file)) if !file.trim().is_empty() => Some(file.to_string()),
        Ok(Some(_)) => {
            warn!(exception = %raw, "skipping exception with an empty file");
            return None;
        }
        Err(()) => {
            warn!(exception = %raw, "skipping exception with a non-string file");
            return None;
        }
    };

    if scope.is_none() && file.is_none() {
        warn!(exception = %raw, "skipping exception without scope or file");
        return None;
    }
    Some(ExceptionSpecifier { scope, file })
}

fn optional_string<'a>(filter: &'a Map<String, Value>, key: &str) -> Result<Option<&'a str>, ()> {
    match filter.get(key) {
        None => Ok(None),
        Some(Value::String(value)) => Ok(Some(value)),
        Some(_) => Err(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{EntryConfig, ExceptionConfig};
    use serde_json::json;

    fn function_keys(table: &WatchTable) -> Vec<&str> {
        table.functions.keys().map(CallIdentifier::as_str).collect()
    }

    fn file_keys(table: &WatchTable) -> Vec<&str> {
        table.files.keys().map(String::as_str).collect()
    }

    #[test]
    fn test_function_keys_are_normalized() {
        let config = PolicyConfig::builder()
            .function("\\func1", EntryConfig::block())
            .build();
        let table = WatchTable::build(&config);

        let rule = table.functions.get("func1()").unwrap();
        assert_eq!(rule.default, Action::Block);
        assert!(rule.exceptions.is_empty());
    }

    #[test]
    fn test_file_keys_are_not_normalized() {
        let config = PolicyConfig::builder()
            .file(" logs.log", EntryConfig::allow())
            .build();
        let table = WatchTable::build(&config);
        assert!(table.files.get(" logs.log").is_some());
        assert!(table.files.get("logs.log()").is_none());
    }

    #[test]
    fn test_forced_entries_always_present() {
        let table = WatchTable::build(&PolicyConfig::default());

        assert_eq!(file_keys(&table), vec![ENGINE_SOURCE]);
        assert_eq!(function_keys(&table), HOOK_REGISTRATION_OPERATIONS.to_vec());
        for (_, rule) in table.functions.iter() {
            assert_eq!(rule, &AccessRule::new(Action::Block));
        }
    }

    #[test]
    fn test_forced_entries_cannot_be_weakened() {
        let config = PolicyConfig::builder()
            .function(
                "rusty_watchdog::intercept::add_before()",
                EntryConfig::allow(),
            )
            .file(ENGINE_SOURCE, EntryConfig::allow())
            .build();
        let table = WatchTable::build(&config);

        assert_eq!(
            table.functions.get("rusty_watchdog::intercept::add_before()"),
            Some(&AccessRule::new(Action::Block))
        );
        assert_eq!(
            table.files.get(ENGINE_SOURCE),
            Some(&AccessRule::new(Action::Block))
        );
    }

    #[test]
    fn test_forced_entries_lead_both_tables() {
        let config = PolicyConfig::builder()
            .function("intercept::add_before()", EntryConfig::allow())
            .function("add_after", EntryConfig::allow())
            .file("rusty_watchdog", EntryConfig::allow())
            .build();
        let table = WatchTable::build(&config);

        assert_eq!(
            function_keys(&table),
            vec![
                "rusty_watchdog::intercept::add_after()",
                "rusty_watchdog::intercept::add_before()",
                "intercept::add_before()",
                "add_after()",
            ]
        );
        assert_eq!(file_keys(&table), vec![ENGINE_SOURCE, "rusty_watchdog"]);
    }

    #[test]
    fn test_pinned_rules_are_never_replaced() {
        let mut rules = RuleTable::default();
        rules.insert("a".to_string(), AccessRule::new(Action::Allow));
        rules.pin("b".to_string(), AccessRule::new(Action::Block));
        rules.pin("a".to_string(), AccessRule::new(Action::Block));

        let keys: Vec<&str> = rules.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["b", "a"]);
        assert!(rules.is_pinned("a"));

        assert!(!rules.insert("a".to_string(), AccessRule::new(Action::Allow)));
        assert_eq!(rules.get("a").unwrap().default, Action::Block);
        assert!(rules.insert("c".to_string(), AccessRule::new(Action::Allow)));
        assert!(!rules.is_pinned("c"));
    }

    #[test]
    fn test_last_entry_for_key_wins_in_first_position() {
        let config = PolicyConfig::builder()
            .function("func1()", EntryConfig::block())
            .function("func2()", EntryConfig::block())
            .function("func1", EntryConfig::allow())
            .build();
        let table = WatchTable::build(&config);

        assert_eq!(&function_keys(&table)[2..], &["func1()", "func2()"]);
        assert_eq!(table.functions.get("func1()").unwrap().default, Action::Allow);
    }

    #[test]
    fn test_malformed_entries_are_skipped() {
        let config = PolicyConfig::builder()
            .raw_function("no_default()", json!({"except": []}))
            .raw_function("not_object()", json!("block"))
            .raw_function("unknown()", json!({"default": "deny"}))
            .raw_function("   ", json!({"default": "block"}))
            .raw_function("kept()", json!({"default": "block"}))
            .raw_file("list.txt", json!(["block"]))
            .build();
        let table = WatchTable::build(&config);

        assert_eq!(function_keys(&table)[2], "kept()");
        assert_eq!(table.functions.len(), 3);
        assert!(table.files.get("list.txt").is_none());
    }

    #[test]
    fn test_invalid_exceptions_are_skipped_in_order() {
        let config = PolicyConfig::builder()
            .raw_function(
                "func2()",
                json!({
                    "default": "block",
                    "except": [
                        {},
                        "ClassB::x",
                        {"scope": "ClassB::first"},
                        {"scope": "  "},
                        {"file": ""},
                        {"scope": 42},
                        {"other": "key"},
                        {"scope": "\\ClassB::second"}
                    ]
                }),
            )
            .build();
        let table = WatchTable::build(&config);

        let rule = table.functions.get("func2()").unwrap();
        let scopes: Vec<&str> = rule
            .exceptions
            .iter()
            .map(|e| e.scope.as_ref().unwrap().as_str())
            .collect();
        assert_eq!(scopes, vec!["ClassB::first()", "ClassB::second()"]);
    }

    #[test]
    fn test_non_array_except_means_no_exceptions() {
        let config = PolicyConfig::builder()
            .raw_function("func1()", json!({"default": "block", "except": {"scope": "x"}}))
            .build();
        let table = WatchTable::build(&config);
        assert!(table.functions.get("func1()").unwrap().exceptions.is_empty());
    }

    #[test]
    fn test_blocked_allowance_protects_origin_file() {
        let config = PolicyConfig::builder()
            .function(
                "func3()",
                EntryConfig::block()
                    .except(ExceptionConfig::scope("ClassC::can_call_func3").in_file("class_c.rs")),
            )
            .file(
                "fileForE.file",
                EntryConfig::block().except(ExceptionConfig::file("writer.rs")),
            )
            .build();
        let table = WatchTable::build(&config);

        assert_eq!(
            file_keys(&table),
            vec![ENGINE_SOURCE, "fileForE.file", "writer.rs", "class_c.rs"]
        );
        assert_eq!(
            table.files.get("class_c.rs"),
            Some(&AccessRule::new(Action::Block))
        );
        assert_eq!(
            table.files.get("fileForE.file").unwrap().exceptions.len(),
            1
        );
    }

    #[test]
    fn test_allowed_entry_does_not_protect_file() {
        let config = PolicyConfig::builder()
            .file(
                "logs.log",
                EntryConfig::allow().except(ExceptionConfig::file("upload.rs")),
            )
            .build();
        let table = WatchTable::build(&config);

        assert!(table.files.get("upload.rs").is_none());
        assert_eq!(table.files.get("logs.log").unwrap().default, Action::Allow);
    }

    #[test]
    fn test_self_referencing_protection_keeps_full_rule() {
        let config = PolicyConfig::builder()
            .file(
                "shared.rs",
                EntryConfig::block()
                    .except(ExceptionConfig::file("shared.rs"))
                    .except(ExceptionConfig::scope("Admin::edit")),
            )
            .build();
        let table = WatchTable::build(&config);

        assert_eq!(table.files.get("shared.rs").unwrap().exceptions.len(), 2);
    }
}
