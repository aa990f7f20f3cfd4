//! Human-readable wait-status and signal-name diagnostics, printed to
//! stderr when `--verbose` is set.
//!
//! Grounded on `libcscript/fshow-wait-status.c` and
//! `libcscript/decode-signal.c`. Where the original looks up
//! `_sys_siglist`/`NSIG` by hand, this uses `nix::sys::signal::Signal`,
//! which is the ecosystem's equivalent of that table.

use nix::sys::signal::Signal;
use nix::sys::wait::WaitStatus;
use std::convert::TryFrom;

/// Symbolic name of a signal number, or `"Unknown signal N"` if the number
/// isn't a signal `nix` recognises (real-time signals included, since
/// `nix::sys::signal::Signal` only covers the standard set).
pub fn decode_signal_name(sig: i32) -> String {
    match Signal::try_from(sig) {
        Ok(signal) => signal.as_str().to_string(),
        Err(_) => format!("Unknown signal {}", sig),
    }
}

/// Renders a `waitpid` status the way `fshow_wait_status` does: one line
/// naming the process, then one line describing exit/signal/stop/continue.
pub fn describe_wait_status(name: &str, status: &WaitStatus) -> String {
    let mut out = format!("{} ...\n", name);
    match status {
        WaitStatus::Exited(_, code) => {
            out.push_str(&format!("  exited, status={}\n", code));
        }
        WaitStatus::Signaled(_, signal, core_dumped) => {
            out.push_str(&format!(
                "  killed by signal {} ({})",
                *signal as i32,
                decode_signal_name(*signal as i32)
            ));
            if *core_dumped {
                out.push_str(" (core dumped)");
            }
            out.push('\n');
        }
        WaitStatus::Stopped(_, signal) => {
            out.push_str(&format!(
                "  stopped by signal {} ({})\n",
                *signal as i32,
                decode_signal_name(*signal as i32)
            ));
        }
        WaitStatus::Continued(_) => {
            out.push_str("  continued\n");
        }
        other => {
            out.push_str(&format!("  *** INTERNAL ERROR *** status={:?}\n", other));
        }
    }
    out
}
