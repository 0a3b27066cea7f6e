//! Guarded shell execution.
//!
//! The whole command line is the checked argument, so a watched path that
//! appears anywhere in it is caught.

use crate::error::WatchdogError;
use crate::intercept::{argument, trap};
use std::panic::Location;
use std::process::{Child, Command, Output, Stdio};

const EXEC: &str = concat!(module_path!(), "::exec");
const POPEN: &str = concat!(module_path!(), "::popen");

fn shell(command: &str) -> Command {
    let mut shell = Command::new("sh");
    shell.arg("-c").arg(command);
    shell
}

/// Run a shell command to completion and capture its output
#[track_caller]
pub fn exec(command: &str) -> Result<Output, WatchdogError> {
    let _call = trap(EXEC, Location::caller().file(), vec![argument(command)])?;
    Ok(shell(command).output()?)
}

/// Spawn a shell command with piped stdin and stdout
#[track_caller]
pub fn popen(command: &str) -> Result<Child, WatchdogError> {
    let _call = trap(POPEN, Location::caller().file(), vec![argument(command)])?;
    Ok(shell(command)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()?)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn test_exec_captures_output() {
        let output = exec("echo watched").unwrap();
        assert!(output.status.success());
        assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "watched");
    }

    #[test]
    fn test_popen_pipes_stdout() {
        let mut child = popen("echo piped").unwrap();
        let mut stdout = String::new();
        child.stdout.take().unwrap().read_to_string(&mut stdout).unwrap();
        child.wait().unwrap();
        assert_eq!(stdout.trim(), "piped");
    }
}
