//! Policy store: the watchlist configuration and the tables built from it.
//!
//! # Architecture
//!
//! The store holds two independent rule tables:
//!
//! 1. **Files** - watched paths, matched against the path arguments of
//!    file-mutating operations
//! 2. **Functions** - watched call identifiers, matched against the
//!    intercepted function
//!
//! Each entry carries a default [`Action`](crate::decision::Action) and an
//! ordered list of exceptions that invert it. Building the tables is lenient:
//! malformed entries are dropped, never fatal.
//!
//! # Example
//!
//! ```rust
//! use rusty_watchdog::decision::Action;
//! use rusty_watchdog::policy::{EntryConfig, ExceptionConfig, PolicyConfig, WatchTable};
//!
//! let config = PolicyConfig::builder()
//!     .file(
//!         "secret.file",
//!         EntryConfig::block().except(ExceptionConfig::scope("ClassE::can_write_to_file")),
//!     )
//!     .build();
//!
//! let table = WatchTable::build(&config);
//! assert_eq!(table.files.get("secret.file").unwrap().default, Action::Block);
//! ```

mod config;
mod table;

pub use config::{EntryConfig, ExceptionConfig, PolicyConfig, PolicyConfigBuilder};
pub use table::{
    AccessRule, ENGINE_SOURCE, ExceptionSpecifier, HOOK_REGISTRATION_OPERATIONS, RuleTable,
    WatchTable,
};
