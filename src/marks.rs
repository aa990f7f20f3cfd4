//! Mark specification parsing and the per-fd marker table.
//!
//! Grounded on `src/liberrmark/mark-write.c`'s `parse_mark_specs` and
//! `setmark`. Grammar (spec.md §4.2):
//!
//! ```text
//! spec   := fd sep start sep end?
//! fd     := '1' | '2'
//! sep    := any single byte; the same byte separates both segments
//! start  := bytes up to (not including) the next sep (may be empty)
//! end    := remaining bytes; a single trailing sep is stripped, not
//!           counted as part of end (may be empty)
//! ```

use crate::errors::{Error, Result};

#[derive(Debug, Default, Clone)]
pub struct Marker {
    pub start: Option<String>,
    pub end: Option<String>,
}

#[derive(Debug, Default)]
pub struct MarkerTable {
    /// Indexed by `fd - 1`, for fd in {1, 2}.
    slots: [Marker; 2],
}

impl MarkerTable {
    pub fn new() -> Self {
        MarkerTable::default()
    }

    pub fn get(&self, fd: i32) -> Option<&Marker> {
        match fd {
            1 | 2 => Some(&self.slots[(fd - 1) as usize]),
            _ => None,
        }
    }

    /// Programmatic equivalent of a mark-spec, used by `--color`: installs
    /// `start`/`end` (either may be empty, meaning "no marker for that
    /// edge") for `fd`, replacing any prior markers for that fd.
    pub fn set(&mut self, fd: i32, start: &str, end: &str) -> Result<()> {
        if fd != 1 && fd != 2 {
            return Err(Error::msg(format!(
                "fd={} -- only fd 1 or 2 are supported",
                fd
            )));
        }
        let non_empty = |s: &str| if s.is_empty() { None } else { Some(s.to_string()) };
        self.slots[(fd - 1) as usize] = Marker {
            start: non_empty(start),
            end: non_empty(end),
        };
        Ok(())
    }

    /// Parses one `--mark` argument and installs the resulting marker,
    /// replacing any prior marker for the same fd. A spec that names only
    /// an fd (no separator at all) succeeds without touching that fd's
    /// markers.
    pub fn parse_and_set(&mut self, spec: &str) -> Result<()> {
        let mut chars = spec.chars();
        let fd = match chars.next() {
            Some('1') => 1,
            Some('2') => 2,
            _ => return Err(Error::msg(format!("bad mark spec '{}': fd must be 1 or 2", spec))),
        };

        let rest = chars.as_str();
        if rest.is_empty() {
            // `fd` alone: leave existing markers for this fd untouched.
            return Ok(());
        }

        let sep = rest.chars().next().unwrap();
        let body = &rest[sep.len_utf8()..];

        let (start, after_start) = match body.find(sep) {
            Some(idx) => (&body[..idx], &body[idx + sep.len_utf8()..]),
            None => (body, ""),
        };

        // A single trailing separator is stripped, not counted as part of
        // `end`; anything else in `after_start` is `end` verbatim.
        let end = match after_start.strip_suffix(sep) {
            Some(stripped) => stripped,
            None => after_start,
        };

        self.set(fd, start, end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fd_alone_leaves_markers_untouched() {
        let mut table = MarkerTable::new();
        table.set(2, "<E>", "</E>").unwrap();
        table.parse_and_set("2").unwrap();
        let marker = table.get(2).unwrap();
        assert_eq!(marker.start.as_deref(), Some("<E>"));
        assert_eq!(marker.end.as_deref(), Some("</E>"));
    }

    #[test]
    fn bad_fd_fails() {
        assert!(MarkerTable::new().parse_and_set("3:a:b").is_err());
        assert!(MarkerTable::new().parse_and_set("x:a:b").is_err());
    }

    #[test]
    fn basic_spec_with_trailing_separator() {
        let mut table = MarkerTable::new();
        table.parse_and_set("2:<E>:</E>:").unwrap();
        let marker = table.get(2).unwrap();
        assert_eq!(marker.start.as_deref(), Some("<E>"));
        assert_eq!(marker.end.as_deref(), Some("</E>"));
    }

    #[test]
    fn spec_without_trailing_separator_is_identical() {
        let mut a = MarkerTable::new();
        a.parse_and_set("2:<E>:</E>:").unwrap();
        let mut b = MarkerTable::new();
        b.parse_and_set("2:<E>:</E>").unwrap();
        assert_eq!(a.get(2).unwrap().start, b.get(2).unwrap().start);
        assert_eq!(a.get(2).unwrap().end, b.get(2).unwrap().end);
    }

    #[test]
    fn empty_end_with_trailing_separator_is_absent() {
        let mut table = MarkerTable::new();
        table.parse_and_set("1:a:").unwrap();
        let marker = table.get(1).unwrap();
        assert_eq!(marker.start.as_deref(), Some("a"));
        assert_eq!(marker.end, None);
    }

    #[test]
    fn embedded_separator_survives_beyond_one_strip() {
        let mut table = MarkerTable::new();
        // only the single *trailing* ':' is stripped; an embedded ':'
        // earlier in `end` is left alone.
        table.parse_and_set("1:a:b:c:").unwrap();
        let marker = table.get(1).unwrap();
        assert_eq!(marker.start.as_deref(), Some("a"));
        assert_eq!(marker.end.as_deref(), Some("b:c"));
    }

    #[test]
    fn empty_start_is_absent() {
        let mut table = MarkerTable::new();
        table.parse_and_set("1::end").unwrap();
        let marker = table.get(1).unwrap();
        assert_eq!(marker.start, None);
        assert_eq!(marker.end.as_deref(), Some("end"));
    }

    #[test]
    fn second_parse_replaces_first() {
        let mut table = MarkerTable::new();
        table.parse_and_set("1:a:b").unwrap();
        table.parse_and_set("1:c:d").unwrap();
        let marker = table.get(1).unwrap();
        assert_eq!(marker.start.as_deref(), Some("c"));
        assert_eq!(marker.end.as_deref(), Some("d"));
    }

    #[test]
    fn set_rejects_fd_outside_1_2() {
        let mut table = MarkerTable::new();
        assert!(table.set(0, "a", "b").is_err());
        assert!(table.set(3, "a", "b").is_err());
    }
}
