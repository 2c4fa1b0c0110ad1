//! Interrupting a single thread for garbage collection.
//!
//! A handler for the pause signal is installed once for the whole process.
//! [`signal_pause`] sends the signal to exactly one thread;
//! the handler on that thread calls [`Runtime::gc_pause`],
//! which keeps the thread in a scannable state until the collection is over.
//! Delivery is all this module provides:
//! confirming that the thread actually paused is up to the runtime.
//!
//! # Platforms
//!
//! On Linux the pause signal is `SIGRTMIN + 6`, the same number BDWGC uses
//! for its own thread suspension. The two must therefore not both be
//! managing threads in one process; installation fails if the signal
//! already has a handler.
//! On macOS there are no real-time signals and `SIGIO` is used instead.
//!
//! [`Runtime::gc_pause`]: `crate::Runtime::gc_pause`

use {
    crate::{ThreadId, current},
    std::{io, sync::OnceLock},
    thiserror::Error,
};

/// The signal reserved for pausing threads.
#[cfg(target_os = "linux")]
pub fn pause_signal() -> libc::c_int
{
    os_ext::sigrtmin() + 6
}

/// The signal reserved for pausing threads.
#[cfg(target_os = "macos")]
pub fn pause_signal() -> libc::c_int
{
    libc::SIGIO
}

/// Returned when the pause signal handler cannot be installed.
#[allow(missing_docs)]
#[derive(Clone, Debug, Error)]
pub enum InstallError
{
    #[error("Signal {0} is already handled by another component")]
    SignalInUse(libc::c_int),

    #[error("Cannot install handler for signal {signal}: {message}")]
    Sigaction{signal: libc::c_int, message: String},
}

static INSTALLED: OnceLock<Result<(), InstallError>> = OnceLock::new();

/// Install the pause signal handler for the entire process.
///
/// This happens at most once; later calls return the outcome of the first.
/// The handler is installed with `SA_RESTART`,
/// so interrupted system calls on paused threads are resumed.
/// It is never uninstalled.
pub fn install() -> Result<(), InstallError>
{
    INSTALLED.get_or_init(install_once).clone()
}

fn install_once() -> Result<(), InstallError>
{
    let signal = pause_signal();
    let sigaction_error = |err: io::Error|
        InstallError::Sigaction{signal, message: err.to_string()};

    let previous = os_ext::sigaction_get(signal).map_err(sigaction_error)?;
    if previous != libc::SIG_DFL {
        return Err(InstallError::SignalInUse(signal));
    }

    os_ext::sigaction_set(signal, handle_pause_signal, os_ext::SA_RESTART)
        .map_err(sigaction_error)?;

    Ok(())
}

/// Outcome of sending the pause signal.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Delivery
{
    /// The signal was sent to the thread.
    Delivered,

    /// The thread no longer exists.
    ///
    /// A thread that has exited has no stack left to scan,
    /// so this is not an error.
    /// Only reported where pthread_kill(3) detects exited threads.
    /// Current glibc does not: it returns success for a thread
    /// that has exited but was not joined, and the signal goes nowhere.
    Exited,
}

/// Send the pause signal to `thread`.
///
/// This does not wait for the thread to pause.
/// `thread` must not have been reclaimed: detached threads that have exited
/// and joined threads must not be signalled at all.
/// A result of [`Delivery::Delivered`] does not prove the thread is alive.
pub fn signal_pause(thread: ThreadId) -> io::Result<Delivery>
{
    match os_ext::pthread_kill(thread.as_raw(), pause_signal()) {
        Ok(()) =>
            Ok(Delivery::Delivered),
        Err(err) if err.raw_os_error() == Some(libc::ESRCH) =>
            Ok(Delivery::Exited),
        Err(err) =>
            Err(err),
    }
}

/// Handler for the pause signal.
///
/// Everything here must be async-signal-safe.
extern "C" fn handle_pause_signal(_sig: libc::c_int)
{
    let errno = Errno::save();

    // A thread without a task holds no roots.
    if let (Some(task), Some(runtime)) =
        (current::try_current(), crate::runtime())
    {
        runtime.gc_pause(task);
    }

    errno.restore();
}

/// Saved value of `errno`, which the interrupted code may be about to read.
struct Errno(libc::c_int);

impl Errno
{
    fn save() -> Self
    {
        // SAFETY: errno is thread-local.
        Self(unsafe { *errno_location() })
    }

    fn restore(self)
    {
        // SAFETY: errno is thread-local.
        unsafe { *errno_location() = self.0; }
    }
}

#[cfg(target_os = "linux")]
unsafe fn errno_location() -> *mut libc::c_int
{
    libc::__errno_location()
}

#[cfg(target_os = "macos")]
unsafe fn errno_location() -> *mut libc::c_int
{
    libc::__error()
}
