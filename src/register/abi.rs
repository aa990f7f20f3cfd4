//! ABI register mapping: which field of `libc::user_regs_struct` holds
//! the syscall number, its first three arguments, and the return value,
//! on each supported architecture.
//!
//! See sysdeps/unix/sysv/linux/${ARCH}/syscall.S from the GNU C Library.

#[cfg(all(target_os = "linux", target_arch = "x86_64"))]
#[macro_use]
pub mod regs_offset {
    macro_rules! get_reg {
        ($regs:expr, SysNum) => {
            $regs.orig_rax
        };
        ($regs:expr, SysArg1) => {
            $regs.rdi
        };
        ($regs:expr, SysArg2) => {
            $regs.rsi
        };
        ($regs:expr, SysArg3) => {
            $regs.rdx
        };
        ($regs:expr, SysResult) => {
            $regs.rax
        };
    }
}

#[cfg(all(target_os = "linux", target_arch = "x86"))]
#[macro_use]
pub mod regs_offset {
    macro_rules! get_reg {
        ($regs:expr, SysNum) => {
            $regs.orig_eax
        };
        ($regs:expr, SysArg1) => {
            $regs.ebx
        };
        ($regs:expr, SysArg2) => {
            $regs.ecx
        };
        ($regs:expr, SysArg3) => {
            $regs.edx
        };
        ($regs:expr, SysResult) => {
            $regs.eax
        };
    }
}

#[cfg(not(all(
    target_os = "linux",
    any(target_arch = "x86_64", target_arch = "x86")
)))]
compile_error!("errmark only supports ptrace-based tracing on Linux x86_64 or x86");
