//! Callers living in a second source file.

use rusty_watchdog::prelude::*;

pub struct ClassC;

impl ClassC {
    #[call_scope]
    pub fn can_call_func3(&self) -> Result<(), WatchdogError> {
        crate::func3()
    }
}
