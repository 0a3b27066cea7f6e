//! Identifier similarity.
//!
//! One relation is used for file paths, scopes and function identifiers:
//! after trimming, the shorter string must occur inside the longer one.
//! This lets a watchlist name `"logs/app.log"` or `"ClassB::can_call_func2()"`
//! and still match the fully-qualified path or identifier seen at runtime.
//!
//! The relation is permissive: `"Log.rs"` is similar to `"AccessLog.rs"`.
//! Callers rely on abbreviated identifiers matching, so it must not be
//! tightened into exact or path-normalized equality.

/// Whether `a` and `b` are similar: the shorter (trimmed) string is a
/// contiguous substring of the longer one.
///
/// # Examples
///
/// ```
/// use rusty_watchdog::matcher::similar;
///
/// assert!(similar("secret.file", "/var/app/data/secret.file"));
/// assert!(similar("app::ClassB::can_call_func2()", "ClassB::can_call_func2()"));
/// assert!(!similar("func1()", "func2()"));
/// ```
pub fn similar(a: &str, b: &str) -> bool {
    let a = a.trim();
    let b = b.trim();
    if a.len() > b.len() {
        a.contains(b)
    } else {
        b.contains(a)
    }
}
