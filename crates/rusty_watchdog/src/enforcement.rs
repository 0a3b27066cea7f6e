//! Enforcement hook: turns a blocked decision into a reported violation.
//!
//! Reporting never lets the operation through. Whether the process also halts
//! is decided at the interception boundary from the configured
//! `halt_on_incident` flag; see [`halt`].

use crate::error::WatchdogError;
use crate::operation::TrappedOperation;
use tracing::error;
use uuid::Uuid;

/// What was violated
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViolationKind {
    /// A watched file was targeted by a file-mutating operation
    File {
        /// The watched file key
        file: String,
    },
    /// A watched function was called, or interception was being disabled
    Function,
}

/// Report a violation.
///
/// Always produces an error; the caller returns it instead of running the
/// operation.
pub fn report(kind: ViolationKind, op: &TrappedOperation) -> WatchdogError {
    let incident = Uuid::new_v4();
    let function = op.function.to_string();
    let scope = op.scope.to_string();
    let call_site = op.file.clone();

    match kind {
        ViolationKind::File { file } => {
            error!(
                %incident,
                kind = "file",
                %file,
                %function,
                %scope,
                %call_site,
                "watched file access blocked"
            );
            WatchdogError::FileViolation {
                file,
                function,
                scope,
                call_site,
                incident,
            }
        }
        ViolationKind::Function => {
            error!(
                %incident,
                kind = "function",
                %function,
                %scope,
                %call_site,
                "watched function call blocked"
            );
            WatchdogError::FunctionViolation {
                function,
                scope,
                call_site,
                incident,
            }
        }
    }
}

/// Exit code used when the process halts after an incident.
pub const HALT_EXIT_CODE: i32 = 134;

/// Terminate the process after a violation.
///
/// On Unix a `SIGTERM` is raised first so that host signal handlers can run;
/// the process then exits regardless.
pub fn halt(violation: &WatchdogError) -> ! {
    error!(
        incident = ?violation.incident(),
        "halting process after policy violation: {}",
        violation
    );

    #[cfg(unix)]
    {
        use nix::sys::signal::{Signal, kill};
        use nix::unistd::Pid;

        let _ = kill(Pid::this(), Signal::SIGTERM);
    }

    std::process::exit(HALT_EXIT_CODE)
}
