//! Stream-switch state machine: decides when to emit a marker pair as the
//! active output fd changes.
//!
//! Grounded on `src/liberrmark/mark-write.c`'s `switch_from_fd`/
//! `switch_to_fd`/`before_write`/`mark_open`/`mark_close`. `after_write` is
//! named in spec.md §4.5 as a future extension point; it stays a documented
//! no-op rather than being deleted.

use crate::marks::MarkerTable;
use std::io::{self, Write};

const NO_LEN: u64 = u64::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CurFd {
    None,
    Fd(i32),
}

/// Tracks which fd is currently "active" on the merged output and emits
/// `end`/`start` marker pairs at transitions, never per write.
pub struct Switcher {
    cur: CurFd,
}

impl Switcher {
    pub fn new() -> Self {
        Switcher { cur: CurFd::None }
    }

    /// Resets to no active fd. Called on the first observed write.
    pub fn open(&mut self) {
        self.cur = CurFd::None;
    }

    /// Runs before the bytes of a write to `fd` are re-emitted. A no-op for
    /// anything other than fd 1/2, a null buffer, or a sentinel length of
    /// `SIZE_MAX`. Otherwise, on a transition, flushes `out`, emits the
    /// outgoing fd's `end` marker (if one was active), then the incoming
    /// fd's `start` marker, and updates the active fd.
    pub fn before_write<W: Write>(
        &mut self,
        out: &mut W,
        marks: &MarkerTable,
        fd: i32,
        buf_is_null: bool,
        len: u64,
    ) -> io::Result<()> {
        if (fd != 1 && fd != 2) || buf_is_null || len == NO_LEN {
            return Ok(());
        }

        if CurFd::Fd(fd) != self.cur {
            out.flush()?;

            if let CurFd::Fd(prev) = self.cur {
                if let Some(marker) = marks.get(prev) {
                    if let Some(end) = &marker.end {
                        out.write_all(end.as_bytes())?;
                    }
                }
            }

            if let Some(marker) = marks.get(fd) {
                if let Some(start) = &marker.start {
                    out.write_all(start.as_bytes())?;
                }
            }

            self.cur = CurFd::Fd(fd);
        }

        Ok(())
    }

    /// A no-op extension point: nothing in this design needs to act after
    /// a write completes, only at a stream transition (see module docs).
    pub fn after_write(&mut self) {}

    /// Emits the active fd's `end` marker, if any, and resets to no active
    /// fd. Called when the tracee exits or the tracer aborts.
    pub fn close<W: Write>(&mut self, out: &mut W, marks: &MarkerTable) -> io::Result<()> {
        if let CurFd::Fd(fd) = self.cur {
            if let Some(marker) = marks.get(fd) {
                if let Some(end) = &marker.end {
                    out.write_all(end.as_bytes())?;
                }
            }
        }
        self.cur = CurFd::None;
        Ok(())
    }
}

impl Default for Switcher {
    fn default() -> Self {
        Switcher::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn marks_with(fd1: (&str, &str), fd2: (&str, &str)) -> MarkerTable {
        let mut table = MarkerTable::new();
        table.set(1, fd1.0, fd1.1).unwrap();
        table.set(2, fd2.0, fd2.1).unwrap();
        table
    }

    #[test]
    fn no_markers_on_first_write_of_a_stream() {
        let marks = marks_with(("", ""), ("<E>", "</E>"));
        let mut switcher = Switcher::new();
        switcher.open();
        let mut out = Vec::new();
        switcher.before_write(&mut out, &marks, 1, false, 3).unwrap();
        assert_eq!(out, b"");
    }

    #[test]
    fn transition_emits_end_then_start() {
        let marks = marks_with(("", ""), ("<E>", "</E>"));
        let mut switcher = Switcher::new();
        switcher.open();
        let mut out = Vec::new();
        switcher.before_write(&mut out, &marks, 2, false, 3).unwrap();
        switcher.before_write(&mut out, &marks, 1, false, 3).unwrap();
        assert_eq!(out, b"<E></E>");
    }

    #[test]
    fn contiguous_run_emits_markers_once() {
        let marks = marks_with(("", ""), ("<E>", "</E>"));
        let mut switcher = Switcher::new();
        switcher.open();
        let mut out = Vec::new();
        switcher.before_write(&mut out, &marks, 2, false, 3).unwrap();
        switcher.before_write(&mut out, &marks, 2, false, 3).unwrap();
        switcher.before_write(&mut out, &marks, 2, false, 3).unwrap();
        assert_eq!(out, b"<E>");
    }

    #[test]
    fn close_emits_pending_end() {
        let marks = marks_with(("", ""), ("<E>", "</E>"));
        let mut switcher = Switcher::new();
        switcher.open();
        let mut out = Vec::new();
        switcher.before_write(&mut out, &marks, 2, false, 3).unwrap();
        switcher.close(&mut out, &marks).unwrap();
        assert_eq!(out, b"<E></E>");
    }

    #[test]
    fn close_with_no_active_fd_is_silent() {
        let marks = marks_with(("", ""), ("<E>", "</E>"));
        let mut switcher = Switcher::new();
        switcher.open();
        let mut out = Vec::new();
        switcher.close(&mut out, &marks).unwrap();
        assert_eq!(out, b"");
    }

    #[test]
    fn bad_fd_is_ignored() {
        let marks = marks_with(("", ""), ("<E>", "</E>"));
        let mut switcher = Switcher::new();
        switcher.open();
        let mut out = Vec::new();
        switcher.before_write(&mut out, &marks, 3, false, 3).unwrap();
        assert_eq!(out, b"");
    }

    #[test]
    fn sentinel_length_is_ignored() {
        let marks = marks_with(("", ""), ("<E>", "</E>"));
        let mut switcher = Switcher::new();
        switcher.open();
        let mut out = Vec::new();
        switcher
            .before_write(&mut out, &marks, 2, false, NO_LEN)
            .unwrap();
        assert_eq!(out, b"");
    }

    #[test]
    fn null_buffer_is_ignored() {
        let marks = marks_with(("", ""), ("<E>", "</E>"));
        let mut switcher = Switcher::new();
        switcher.open();
        let mut out = Vec::new();
        switcher.before_write(&mut out, &marks, 2, true, 3).unwrap();
        assert_eq!(out, b"");
    }
}
