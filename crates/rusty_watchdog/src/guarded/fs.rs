//! Guarded filesystem operations.

use super::path_argument;
use crate::error::WatchdogError;
use crate::intercept::{InterceptedCall, argument, trap};
use serde_json::Value;
use std::fs::{File, OpenOptions, Permissions};
use std::panic::Location;
use std::path::Path;
use std::time::SystemTime;
use tracing::debug;

const SET_PERMISSIONS: &str = concat!(module_path!(), "::set_permissions");
#[cfg(unix)]
const CHOWN: &str = concat!(module_path!(), "::chown");
const COPY: &str = concat!(module_path!(), "::copy");
const WRITE: &str = concat!(module_path!(), "::write");
const OPEN: &str = concat!(module_path!(), "::open");
const HARD_LINK: &str = concat!(module_path!(), "::hard_link");
const MOVE_FILE: &str = concat!(module_path!(), "::move_file");
const RENAME: &str = concat!(module_path!(), "::rename");
#[cfg(unix)]
const SYMLINK: &str = concat!(module_path!(), "::symlink");
const TOUCH: &str = concat!(module_path!(), "::touch");
const REMOVE_FILE: &str = concat!(module_path!(), "::remove_file");

#[track_caller]
fn guard(function: &str, arguments: Vec<Value>) -> Result<InterceptedCall, WatchdogError> {
    trap(function, Location::caller().file(), arguments)
}

/// Guarded [`std::fs::set_permissions`]
#[track_caller]
pub fn set_permissions(path: impl AsRef<Path>, permissions: Permissions) -> Result<(), WatchdogError> {
    let path = path.as_ref();
    let _call = guard(
        SET_PERMISSIONS,
        vec![path_argument(path), argument(&permissions.readonly())],
    )?;
    std::fs::set_permissions(path, permissions)?;
    Ok(())
}

/// Guarded [`std::os::unix::fs::chown`]
#[cfg(unix)]
#[track_caller]
pub fn chown(path: impl AsRef<Path>, uid: Option<u32>, gid: Option<u32>) -> Result<(), WatchdogError> {
    let path = path.as_ref();
    let _call = guard(CHOWN, vec![path_argument(path), argument(&uid), argument(&gid)])?;
    std::os::unix::fs::chown(path, uid, gid)?;
    Ok(())
}

/// Guarded [`std::fs::copy`]; both paths are checked
#[track_caller]
pub fn copy(from: impl AsRef<Path>, to: impl AsRef<Path>) -> Result<u64, WatchdogError> {
    let (from, to) = (from.as_ref(), to.as_ref());
    let _call = guard(COPY, vec![path_argument(from), path_argument(to)])?;
    Ok(std::fs::copy(from, to)?)
}

/// Guarded [`std::fs::write`]
#[track_caller]
pub fn write(path: impl AsRef<Path>, contents: impl AsRef<[u8]>) -> Result<(), WatchdogError> {
    let path = path.as_ref();
    let contents = contents.as_ref();
    let _call = guard(WRITE, vec![path_argument(path), argument(&contents.len())])?;
    std::fs::write(path, contents)?;
    Ok(())
}

/// Guarded [`OpenOptions::open`].
///
/// Trapped whatever the access mode, like any other built-in operation.
#[track_caller]
pub fn open(path: impl AsRef<Path>, options: &OpenOptions) -> Result<File, WatchdogError> {
    let path = path.as_ref();
    let _call = guard(OPEN, vec![path_argument(path)])?;
    Ok(options.open(path)?)
}

/// Guarded [`std::fs::hard_link`]; both paths are checked
#[track_caller]
pub fn hard_link(original: impl AsRef<Path>, link: impl AsRef<Path>) -> Result<(), WatchdogError> {
    let (original, link) = (original.as_ref(), link.as_ref());
    let _call = guard(HARD_LINK, vec![path_argument(original), path_argument(link)])?;
    std::fs::hard_link(original, link)?;
    Ok(())
}

/// Move a file, copying across filesystems when a rename is not possible.
#[track_caller]
pub fn move_file(from: impl AsRef<Path>, to: impl AsRef<Path>) -> Result<(), WatchdogError> {
    let (from, to) = (from.as_ref(), to.as_ref());
    let _call = guard(MOVE_FILE, vec![path_argument(from), path_argument(to)])?;

    if let Err(rename_error) = std::fs::rename(from, to) {
        debug!(from = %from.display(), to = %to.display(), %rename_error, "rename failed, copying");
        if std::fs::copy(from, to).is_err() {
            return Err(rename_error.into());
        }
        std::fs::remove_file(from)?;
    }
    Ok(())
}

/// Guarded [`std::fs::rename`]; both paths are checked
#[track_caller]
pub fn rename(from: impl AsRef<Path>, to: impl AsRef<Path>) -> Result<(), WatchdogError> {
    let (from, to) = (from.as_ref(), to.as_ref());
    let _call = guard(RENAME, vec![path_argument(from), path_argument(to)])?;
    std::fs::rename(from, to)?;
    Ok(())
}

/// Guarded [`std::os::unix::fs::symlink`]; both paths are checked
#[cfg(unix)]
#[track_caller]
pub fn symlink(original: impl AsRef<Path>, link: impl AsRef<Path>) -> Result<(), WatchdogError> {
    let (original, link) = (original.as_ref(), link.as_ref());
    let _call = guard(SYMLINK, vec![path_argument(original), path_argument(link)])?;
    std::os::unix::fs::symlink(original, link)?;
    Ok(())
}

/// Create the file if missing and set its modification time to now
#[track_caller]
pub fn touch(path: impl AsRef<Path>) -> Result<(), WatchdogError> {
    let path = path.as_ref();
    let _call = guard(TOUCH, vec![path_argument(path)])?;
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    file.set_modified(SystemTime::now())?;
    Ok(())
}

/// Guarded [`std::fs::remove_file`]
#[track_caller]
pub fn remove_file(path: impl AsRef<Path>) -> Result<(), WatchdogError> {
    let path = path.as_ref();
    let _call = guard(REMOVE_FILE, vec![path_argument(path)])?;
    std::fs::remove_file(path)?;
    Ok(())
}
