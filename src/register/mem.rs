//! Copying bytes out of the tracee's address space, one machine word at a
//! time, via `PTRACE_PEEKDATA`.
//!
//! Grounded on `pmem_fwrite`/`pmem_copy` from the original `errmark`: head
//! fixup for a misaligned start address, a fast path while a full word
//! remains, and a tail fixup for the final partial word. A peek that
//! fails with EIO after at least one byte has already been delivered is
//! treated as the mapping ending mid-region: the bytes gathered so far are
//! returned rather than propagating an error (matching the original's
//! short-read policy, corrected so the caller never sees more bytes than
//! were actually read: see `SPEC_FULL.md` on the pmem_copy uninitialized
//! tail).

use nix::errno::Errno;
use nix::sys::ptrace;
use nix::unistd::Pid;
use std::io::Write;
use std::mem::size_of;

type Word = libc::c_long;

const WORD_SIZE: usize = size_of::<Word>();

fn word_to_bytes(word: Word) -> [u8; WORD_SIZE] {
    word.to_ne_bytes()
}

enum PeekOutcome {
    Word([u8; WORD_SIZE]),
    /// EIO after at least one byte already delivered: stop here, short read.
    End,
    /// Any other failure: propagate nothing, the whole read is void.
    Fail,
}

fn peek(pid: Pid, addr: u64, have_read_any: bool) -> PeekOutcome {
    match ptrace::read(pid, addr as *mut libc::c_void) {
        Ok(word) => PeekOutcome::Word(word_to_bytes(word)),
        Err(nix::Error::Sys(Errno::EIO)) if have_read_any => PeekOutcome::End,
        Err(_) => PeekOutcome::Fail,
    }
}

/// Reads `len` bytes starting at `addr` in `pid`'s address space, writing
/// them to `sink` as they are gathered. Returns the number of bytes
/// actually delivered to `sink`.
///
/// A complete failure (no bytes read at all) returns `Ok(0)`: per the
/// error-handling design, a wholly-failed memory read is silently
/// swallowed by the caller, not propagated as a hard error.
pub fn read_into<W: Write>(pid: Pid, addr: u64, len: u64, sink: &mut W) -> usize {
    let mut remaining = len;
    let mut cur = addr;
    let mut delivered = 0usize;

    let phase = (cur as usize) & (WORD_SIZE - 1);
    if phase != 0 {
        let aligned = cur - phase as u64;
        let remsz = (WORD_SIZE - phase) as u64;
        let take = remaining.min(remsz) as usize;

        match peek(pid, aligned, delivered != 0) {
            PeekOutcome::Word(bytes) => {
                if sink.write_all(&bytes[phase..phase + take]).is_err() {
                    return delivered;
                }
                delivered += take;
                cur += take as u64;
                remaining -= take as u64;
            }
            PeekOutcome::End | PeekOutcome::Fail => return delivered,
        }
    }

    while remaining >= WORD_SIZE as u64 {
        match peek(pid, cur, delivered != 0) {
            PeekOutcome::Word(bytes) => {
                if sink.write_all(&bytes).is_err() {
                    return delivered;
                }
                delivered += WORD_SIZE;
                cur += WORD_SIZE as u64;
                remaining -= WORD_SIZE as u64;
            }
            PeekOutcome::End | PeekOutcome::Fail => return delivered,
        }
    }

    if remaining > 0 {
        let take = remaining as usize;
        match peek(pid, cur, delivered != 0) {
            PeekOutcome::Word(bytes) => {
                if sink.write_all(&bytes[..take]).is_ok() {
                    delivered += take;
                }
            }
            PeekOutcome::End | PeekOutcome::Fail => {}
        }
    }

    delivered
}

/// Same algorithm, gathering into an owned buffer instead of a `Write`
/// sink. Used for the `--copy` path, where the same bytes must also be
/// mirrored into a copy file.
pub fn read_to_vec(pid: Pid, addr: u64, len: u64) -> Vec<u8> {
    let mut buf = Vec::with_capacity(len as usize);
    read_into(pid, addr, len, &mut buf);
    buf
}
