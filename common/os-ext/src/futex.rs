//! Waiting on and waking addresses.
//!
//! Linux provides futex(2); macOS provides the equivalent
//! `__ulock_wait` and `__ulock_wake` calls from libSystem.
//! All functions in this module are async-signal-safe.

use std::sync::atomic::AtomicU32;

/// Block while `*futex == expected`.
///
/// Returns when woken, when the value did not match,
/// or when interrupted by a signal handler.
/// Spurious returns are possible; the caller must check again.
#[cfg(target_os = "linux")]
pub fn futex_wait(futex: &AtomicU32, expected: u32)
{
    // SAFETY: futex is a valid, aligned 32-bit word.
    unsafe {
        libc::syscall(
            libc::SYS_futex,
            futex as *const AtomicU32,
            libc::FUTEX_WAIT | libc::FUTEX_PRIVATE_FLAG,
            expected,
            std::ptr::null::<libc::timespec>(),
        );
    }
}

/// Wake at most one thread blocked in [`futex_wait`] on `futex`.
#[cfg(target_os = "linux")]
pub fn futex_wake_one(futex: &AtomicU32)
{
    futex_wake(futex, 1);
}

/// Wake all threads blocked in [`futex_wait`] on `futex`.
#[cfg(target_os = "linux")]
pub fn futex_wake_all(futex: &AtomicU32)
{
    futex_wake(futex, libc::c_int::MAX);
}

#[cfg(target_os = "linux")]
fn futex_wake(futex: &AtomicU32, count: libc::c_int)
{
    // SAFETY: futex is a valid, aligned 32-bit word.
    unsafe {
        libc::syscall(
            libc::SYS_futex,
            futex as *const AtomicU32,
            libc::FUTEX_WAKE | libc::FUTEX_PRIVATE_FLAG,
            count,
        );
    }
}

#[cfg(target_os = "macos")]
mod ulock
{
    pub const UL_COMPARE_AND_WAIT: u32 = 1;
    pub const ULF_WAKE_ALL: u32 = 0x0000_0100;
    pub const ULF_NO_ERRNO: u32 = 0x0100_0000;

    extern "C"
    {
        pub fn __ulock_wait(
            operation: u32,
            addr: *mut libc::c_void,
            value: u64,
            timeout: u32,
        ) -> libc::c_int;

        pub fn __ulock_wake(
            operation: u32,
            addr: *mut libc::c_void,
            wake_value: u64,
        ) -> libc::c_int;
    }
}

/// Block while `*futex == expected`.
///
/// Returns when woken, when the value did not match,
/// or when interrupted by a signal handler.
/// Spurious returns are possible; the caller must check again.
#[cfg(target_os = "macos")]
pub fn futex_wait(futex: &AtomicU32, expected: u32)
{
    use ulock::*;
    // SAFETY: futex is a valid, aligned 32-bit word. A timeout of 0 is infinite.
    unsafe {
        __ulock_wait(
            UL_COMPARE_AND_WAIT | ULF_NO_ERRNO,
            futex as *const AtomicU32 as *mut libc::c_void,
            expected as u64,
            0,
        );
    }
}

/// Wake at most one thread blocked in [`futex_wait`] on `futex`.
#[cfg(target_os = "macos")]
pub fn futex_wake_one(futex: &AtomicU32)
{
    use ulock::*;
    // SAFETY: futex is a valid, aligned 32-bit word.
    unsafe {
        __ulock_wake(
            UL_COMPARE_AND_WAIT | ULF_NO_ERRNO,
            futex as *const AtomicU32 as *mut libc::c_void,
            0,
        );
    }
}

/// Wake all threads blocked in [`futex_wait`] on `futex`.
#[cfg(target_os = "macos")]
pub fn futex_wake_all(futex: &AtomicU32)
{
    use ulock::*;
    // SAFETY: futex is a valid, aligned 32-bit word.
    unsafe {
        __ulock_wake(
            UL_COMPARE_AND_WAIT | ULF_NO_ERRNO | ULF_WAKE_ALL,
            futex as *const AtomicU32 as *mut libc::c_void,
            0,
        );
    }
}
