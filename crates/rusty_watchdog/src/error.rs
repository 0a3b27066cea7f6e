//! Error types for the watchdog
//!
//! This module defines the error hierarchy for the rusty_watchdog crate using `thiserror`.
//! Every fallible operation returns `Result<T, WatchdogError>`.
//!
//! # Error Variants
//!
//! - [`WatchdogError::Configuration`]: the policy was configured a second time
//! - [`WatchdogError::InvalidConfig`]: the configuration input is not a nested object
//! - [`WatchdogError::FileViolation`]: a watched file was targeted by a blocked operation
//! - [`WatchdogError::FunctionViolation`]: a watched function was called from a blocked scope
//! - [`WatchdogError::InvalidTarget`]: an intercepted call could not be described
//! - [`WatchdogError::JsonDecode`]: configuration text is not valid JSON
//! - [`WatchdogError::Io`]: a guarded operation failed after being allowed
//!
//! # Example
//!
//! ```rust
//! use rusty_watchdog::error::WatchdogError;
//!
//! fn example() -> Result<(), WatchdogError> {
//!     // Auto-conversion from std::io::Error
//!     let _file = std::fs::read_to_string("/nonexistent")?;
//!     Ok(())
//! }
//!
//! assert!(matches!(example(), Err(WatchdogError::Io(_))));
//! ```

use thiserror::Error;
use uuid::Uuid;

/// The main error type for all rusty_watchdog operations
///
/// Violations are ordinary values: the interception boundary receives them,
/// decides whether the process halts, and hands them back to the caller of the
/// intercepted operation, which must not proceed.
#[derive(Error, Debug)]
pub enum WatchdogError {
    /// The watchlist was already configured for this process
    ///
    /// Configuration happens exactly once; the first watchlist stays active.
    #[error("Attempt to redefine watchlist: {0}")]
    Configuration(String),

    /// The configuration input could not be used at all
    ///
    /// Individual malformed entries are skipped instead; this is raised only
    /// when the top-level input is not an object.
    #[error("Invalid watchlist configuration: {0}")]
    InvalidConfig(String),

    /// A watched file was the target of a blocked file-mutating operation
    #[error("{file} was being written to by {function}, called in {scope} in {call_site}")]
    FileViolation {
        /// The watched file key that matched
        file: String,
        /// The intercepted operation
        function: String,
        /// The scope the operation was called from
        scope: String,
        /// The file the call was issued from
        call_site: String,
        /// Correlation id for the incident
        incident: Uuid,
    },

    /// A watched function was called from a scope that is not allowed to call it
    #[error("{function} was being called by {scope} in {call_site}")]
    FunctionViolation {
        /// The intercepted function
        function: String,
        /// The scope the function was called from
        scope: String,
        /// The file the call was issued from
        call_site: String,
        /// Correlation id for the incident
        incident: Uuid,
    },

    /// An intercepted call could not be turned into a trapped operation
    #[error("Invalid interception target: {0}")]
    InvalidTarget(String),

    /// Failed to parse configuration text as JSON
    #[error("Failed to parse watchlist JSON: {0}")]
    JsonDecode(#[from] serde_json::Error),

    /// I/O operation failed
    ///
    /// Raised by guarded operations after the policy allowed them.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WatchdogError {
    /// Whether this error is a policy violation (and thus subject to the halt policy)
    pub fn is_violation(&self) -> bool {
        matches!(
            self,
            WatchdogError::FileViolation { .. } | WatchdogError::FunctionViolation { .. }
        )
    }

    /// Incident id of a violation
    pub fn incident(&self) -> Option<Uuid> {
        match self {
            WatchdogError::FileViolation { incident, .. }
            | WatchdogError::FunctionViolation { incident, .. } => Some(*incident),
            _ => None,
        }
    }
}

/// Lets `#[intercept]` functions return `std::io::Result`.
///
/// Violations become `PermissionDenied`; the violation stays available as
/// the inner error.
impl From<WatchdogError> for std::io::Error {
    fn from(err: WatchdogError) -> Self {
        match err {
            WatchdogError::Io(io) => io,
            err if err.is_violation() => {
                std::io::Error::new(std::io::ErrorKind::PermissionDenied, err)
            }
            err => std::io::Error::other(err),
        }
    }
}
