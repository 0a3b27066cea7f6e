//! Runtime options.
//!
//! Options are process-wide name/value pairs. Names are compared trimmed and
//! case-insensitively. The only option the engine itself reads is
//! `intercept.enable`: when it holds a disabling value, [`trap`](super::trap)
//! stops dispatching to handlers.

use super::{argument, trap};
use crate::error::WatchdogError;
use crate::resolver::{INTERCEPT_ENABLE_OPTION, SET_OPTION, is_disabling};
use serde_json::Value;
use std::collections::BTreeMap;
use std::panic::Location;
use std::sync::{PoisonError, RwLock};

static OPTIONS: RwLock<BTreeMap<String, Value>> = RwLock::new(BTreeMap::new());

fn key(name: &str) -> String {
    name.trim().to_ascii_lowercase()
}

/// Set a runtime option, returning the previous value.
///
/// Setting an option is a trapped operation. Once a watchlist is
/// configured, setting `intercept.enable` to a disabling value is always
/// reported as a violation and the option keeps its value.
#[track_caller]
pub fn set_option(name: &str, value: impl Into<Value>) -> Result<Option<Value>, WatchdogError> {
    let value = value.into();
    let _call = trap(
        SET_OPTION,
        Location::caller().file(),
        vec![argument(name), value.clone()],
    )?;

    Ok(OPTIONS
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(key(name), value))
}

/// Current value of a runtime option
pub fn option(name: &str) -> Option<Value> {
    OPTIONS
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(&key(name))
        .cloned()
}

/// Whether trapped calls are dispatched to handlers
pub fn interception_enabled() -> bool {
    option(INTERCEPT_ENABLE_OPTION).is_none_or(|value| !is_disabling(&value))
}

/// Drop any `intercept.enable` value set before the engine was configured.
pub(crate) fn reset_interception() {
    OPTIONS
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .remove(INTERCEPT_ENABLE_OPTION);
}
