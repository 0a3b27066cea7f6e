//! Guarded versions of the built-in file-mutating operations.
//!
//! Each wrapper traps before delegating to the standard library, so a
//! configured watchlist sees the paths it is about to touch. The caller's
//! source file is taken from `#[track_caller]`.
//!
//! | Wrapper | Path arguments |
//! |---|---|
//! | [`fs::set_permissions`] | path |
//! | [`fs::chown`] | path |
//! | [`fs::copy`] | from, to |
//! | [`fs::write`] | path |
//! | [`fs::open`] | path |
//! | [`fs::hard_link`] | original, link |
//! | [`fs::move_file`] | from, to |
//! | [`fs::rename`] | from, to |
//! | [`fs::symlink`] | original, link |
//! | [`fs::touch`] | path |
//! | [`fs::remove_file`] | path |
//! | [`process::exec`] | command line |
//! | [`process::popen`] | command line |

pub mod fs;
pub mod process;

use serde_json::Value;
use std::path::Path;

fn path_argument(path: &Path) -> Value {
    Value::String(path.to_string_lossy().into_owned())
}
