//! Extra items for talking to the operating system.
//!
//! This crate provides a safe, low-level interface to the threading and
//! signalling facilities of the operating system.
//! The functions in this crate are named after their underlying calls,
//! and their behavior is identical except for the differences listed below.
//! The exact semantics of each function can be found in their man pages.
//! This is a trade-off against cross-platform compatibility:
//! only Linux and macOS are supported.
//!
//! # Differences with underlying calls
//!
//! Errors are reported using [`Result`] rather than
//! through `errno` or an error number return value.
//! The pthread functions return their error number directly;
//! the wrappers turn it into an [`io::Error`] all the same.
//!
//! Objects that must be destroyed after use,
//! such as thread attributes, are wrapped in types that do so on drop.
//!
//! The futex functions do not report errors at all.
//! Every failure mode of a futex wait (value mismatch, interruption)
//! means the same thing to the caller: check the condition again.
//!
//! [`Result`]: `std::io::Result`

#![warn(missing_docs)]

pub use {
    self::{futex::*, pthread::*, signal::*, unistd::*},
    libc::{
        PTHREAD_CREATE_DETACHED, PTHREAD_CREATE_JOINABLE,
        SA_RESTART,
        c_int, pthread_t, sighandler_t,
    },
};

use std::io;

mod futex;
mod pthread;
mod signal;
mod unistd;

/// Turn an error number returned by a pthread function into a result.
fn check_error_number(result: libc::c_int) -> io::Result<()>
{
    if result != 0 {
        return Err(io::Error::from_raw_os_error(result));
    }
    Ok(())
}
