//! Cross-process run exclusion via a PID file.

mod pid_file;

pub use pid_file::{is_alive, LockError, ProcessLock};
