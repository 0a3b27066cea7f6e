//! Rusty Watchdog - runtime access policies for watched files and functions
//!
//! # Overview
//!
//! A watchlist names the files and functions a process must protect. Each
//! entry carries a default action (`allow` or `block`) and an ordered list of
//! exceptions, keyed by the calling scope and/or the call-site file, that
//! invert the default. Once the watchlist is configured, every instrumented
//! call and every guarded file operation is checked against it before it
//! runs; a blocked call is reported as a violation and never proceeds.
//!
//! # Architecture
//!
//! - `identifier`: canonical call identifiers (`"path::Type::method()"`)
//! - `matcher`: the substring similarity used for every comparison
//! - `policy`: watchlist configuration and the watch tables built from it
//! - `resolver`: which watched file or function a trapped call touches
//! - `decision`: default action plus first-match exceptions
//! - `enforcement`: violation reporting and the halt policy
//! - `engine`: the one-time configured [`Watchdog`](engine::Watchdog)
//! - `intercept`: hook registry, scope frames and runtime options
//! - `guarded`: trapped versions of the built-in file-mutating operations
//! - `error`: error types
//!
//! Functions are instrumented with `#[intercept]`; functions that only need
//! to appear as a calling scope use `#[call_scope]`.
//!
//! # Example
//!
//! ```rust
//! use rusty_watchdog::prelude::*;
//!
//! #[intercept]
//! fn func1() -> Result<(), WatchdogError> {
//!     Ok(())
//! }
//!
//! struct ClassA;
//!
//! impl ClassA {
//!     #[call_scope]
//!     fn cannot_call_func1(&self) -> Result<(), WatchdogError> {
//!         func1()
//!     }
//! }
//!
//! fn main() -> Result<(), WatchdogError> {
//!     Watchdog::configure(
//!         PolicyConfig::builder()
//!             .function("func1()", EntryConfig::block())
//!             .halt_on_incident(false)
//!             .build(),
//!     )?;
//!
//!     let err = ClassA.cannot_call_func1().unwrap_err();
//!     assert!(err.is_violation());
//!     Ok(())
//! }
//! ```
//!
//! # Limitations
//!
//! Scopes are tracked per thread. `#[intercept]` and `#[call_scope]` reject
//! `async fn`, whose body may resume on another thread.

#![warn(missing_docs)]
#![warn(clippy::all)]

// Lets the attribute macros expand to `::rusty_watchdog::...` inside this crate too.
extern crate self as rusty_watchdog;

pub use rusty_watchdog_macros::{call_scope, intercept};

pub mod decision;
pub mod enforcement;
pub mod engine;
pub mod error;
pub mod guarded;
pub mod identifier;
pub mod intercept;
pub mod matcher;
pub mod operation;
pub mod policy;
pub mod resolver;

pub use matcher::similar;

// Prelude module for common imports
pub mod prelude {
    //! Common imports for rusty_watchdog users
    //!
    //! Use `use rusty_watchdog::prelude::*;` to import commonly used types.

    pub use crate::decision::Action;
    pub use crate::engine::{Verdict, Watchdog};
    pub use crate::error::WatchdogError;
    pub use crate::guarded;
    pub use crate::identifier::CallIdentifier;
    pub use crate::intercept::{
        AfterHandler, BeforeHandler, Interceptor, add_after, add_before, option, set_option,
    };
    pub use crate::operation::TrappedOperation;
    pub use crate::policy::{EntryConfig, ExceptionConfig, PolicyConfig};
    pub use rusty_watchdog_macros::{call_scope, intercept};
}
