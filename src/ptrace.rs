//! Guarded ptrace chokepoint. Every `ptrace(2)` request the supervisor
//! issues goes through [`guarded`].
//!
//! Grounded on `src/liberrmark/guard-ptrace.c`'s `guard_ptrace`: an ESRCH
//! failure means the tracee is already gone, which is unremarkable (the
//! caller is left to notice via `child_exited` and unwind); any other
//! failure is unrecoverable, so the wrapper closes whatever marker run is
//! open (so the terminal is not left mid-escape-sequence), logs the
//! decoded error, and aborts the tracer. This is the only place the tracer
//! is permitted to terminate abnormally (spec.md §4.4).

use nix::errno::Errno;

/// Runs one ptrace request through the chokepoint.
///
/// - `Ok(_)` → returns `Some(value)`.
/// - `Err(ESRCH)` → sets `*child_exited = true` and returns `None`; the
///   caller decides whether to unwind the loop.
/// - any other `Err` → calls `close_markers`, logs the decoded error, and
///   aborts the process.
pub fn guarded<T>(
    child_exited: &mut bool,
    request_name: &str,
    close_markers: impl FnOnce(),
    f: impl FnOnce() -> nix::Result<T>,
) -> Option<T> {
    match f() {
        Ok(value) => Some(value),
        Err(nix::Error::Sys(Errno::ESRCH)) => {
            *child_exited = true;
            None
        }
        Err(err) => {
            close_markers();
            log::error!("ptrace({}) failed: {}", request_name, err);
            eprintln!("errmark: ptrace({}) failed - {}", request_name, err);
            std::process::abort();
        }
    }
}
