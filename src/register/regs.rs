//! A small typed view over the tracee's general-purpose registers.
//!
//! Unlike a full ptrace-based emulator (which needs `Current`/`Original`/
//! `Modified` snapshots to support syscall translation), `errmark` only
//! ever needs one cached copy of the registers per stop: fetch it, read
//! the syscall number and the three arguments it cares about, optionally
//! overwrite the length argument or the result, and push it back.
//!
//! `fetch`/`push` are the only two ptrace requests this module issues, and
//! both go through [`crate::ptrace::guarded`] (spec.md §4.4: guarded ptrace
//! is the sole chokepoint for every `ptrace(2)` request the tracer makes).

use crate::ptrace::guarded;
use libc::user_regs_struct;
use nix::sys::ptrace;
use nix::unistd::Pid;

#[derive(Debug, Copy, Clone)]
pub enum Register {
    SysNum,
    SysArg1,
    SysArg2,
    SysArg3,
    SysResult,
}
use self::Register::*;

pub type Word = u64;

#[derive(Debug)]
pub struct Registers {
    pid: Pid,
    raw: user_regs_struct,
    changed: bool,
}

impl Registers {
    /// Fetches the tracee's current registers with `PTRACE_GETREGS`, through
    /// the guarded chokepoint. `None` means the tracee is already gone
    /// (`*child_exited` has been set) or the tracer has aborted.
    pub fn fetch(
        pid: Pid,
        child_exited: &mut bool,
        close_markers: impl FnOnce(),
    ) -> Option<Registers> {
        let raw = guarded(child_exited, "PTRACE_GETREGS", close_markers, || {
            ptrace::getregs(pid)
        })?;
        Some(Registers {
            pid,
            raw,
            changed: false,
        })
    }

    #[inline]
    pub fn get(&self, register: Register) -> Word {
        match register {
            SysNum => get_reg!(self.raw, SysNum),
            SysArg1 => get_reg!(self.raw, SysArg1),
            SysArg2 => get_reg!(self.raw, SysArg2),
            SysArg3 => get_reg!(self.raw, SysArg3),
            SysResult => get_reg!(self.raw, SysResult),
        }
    }

    #[inline]
    pub fn set(&mut self, register: Register, value: Word) {
        match register {
            SysNum => get_reg!(self.raw, SysNum) = value,
            SysArg1 => get_reg!(self.raw, SysArg1) = value,
            SysArg2 => get_reg!(self.raw, SysArg2) = value,
            SysArg3 => get_reg!(self.raw, SysArg3) = value,
            SysResult => get_reg!(self.raw, SysResult) = value,
        };
        self.changed = true;
    }

    /// Pushes the (possibly modified) registers back to the tracee with
    /// `PTRACE_SETREGS`, through the guarded chokepoint, if anything was
    /// actually changed. Returns `false` only when the tracee is gone or
    /// the tracer has aborted; a no-op push (nothing changed) is `true`.
    pub fn push(&mut self, child_exited: &mut bool, close_markers: impl FnOnce()) -> bool {
        if !self.changed {
            return true;
        }
        let pid = self.pid;
        let raw = self.raw;
        let pushed = guarded(child_exited, "PTRACE_SETREGS", close_markers, || {
            ptrace::setregs(pid, raw)
        })
        .is_some();
        if pushed {
            self.changed = false;
        }
        pushed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_marks_changed_only_once() {
        let mut regs = Registers {
            pid: Pid::from_raw(-1),
            raw: unsafe { std::mem::zeroed() },
            changed: false,
        };
        assert!(!regs.changed);
        regs.set(SysArg3, 42);
        assert!(regs.changed);
        assert_eq!(regs.get(SysArg3), 42);
    }

    #[test]
    fn push_without_changes_is_a_cheap_noop() {
        let mut regs = Registers {
            pid: Pid::from_raw(-1),
            raw: unsafe { std::mem::zeroed() },
            changed: false,
        };
        let mut child_exited = false;
        assert!(regs.push(&mut child_exited, || {}));
        assert!(!child_exited);
    }
}
