use std::{io, mem, ptr};

/// Signal handler taking only the signal number.
pub type SignalHandler = extern "C" fn(libc::c_int);

/// Call sigaction(2) to query the disposition of `signum`.
///
/// Returns the `sa_handler` of the current disposition,
/// which is `SIG_DFL` if nobody installed anything.
pub fn sigaction_get(signum: libc::c_int) -> io::Result<libc::sighandler_t>
{
    // SAFETY: sigaction is plain old data.
    let mut oldact: libc::sigaction = unsafe { mem::zeroed() };

    // SAFETY: A null act only queries the disposition.
    let result = unsafe { libc::sigaction(signum, ptr::null(), &mut oldact) };

    if result == -1 {
        return Err(io::Error::last_os_error());
    }

    Ok(oldact.sa_sigaction)
}

/// Call sigaction(2) to install `handler` for `signum`.
///
/// The signal mask during the handler is empty apart from `signum` itself,
/// and `flags` is passed as `sa_flags` (`SA_SIGINFO` must not be in it).
/// Returns the `sa_handler` of the previous disposition.
pub fn sigaction_set(
    signum:  libc::c_int,
    handler: SignalHandler,
    flags:   libc::c_int,
) -> io::Result<libc::sighandler_t>
{
    // SAFETY: sigaction is plain old data.
    let mut act: libc::sigaction = unsafe { mem::zeroed() };
    let mut oldact: libc::sigaction = unsafe { mem::zeroed() };

    act.sa_sigaction = handler as libc::sighandler_t;
    act.sa_flags = flags;

    // SAFETY: act and oldact are valid.
    let result = unsafe {
        libc::sigemptyset(&mut act.sa_mask);
        libc::sigaction(signum, &act, &mut oldact)
    };

    if result == -1 {
        return Err(io::Error::last_os_error());
    }

    Ok(oldact.sa_sigaction)
}

/// Return the lowest real-time signal number available to applications.
///
/// This is the value of the `SIGRTMIN` macro,
/// which the C library computes at run time.
#[cfg(target_os = "linux")]
pub fn sigrtmin() -> libc::c_int
{
    extern "C"
    {
        fn __libc_current_sigrtmin() -> libc::c_int;
    }

    // SAFETY: Exported by both glibc and musl; it only reads a constant.
    unsafe { __libc_current_sigrtmin() }
}

#[cfg(test)]
mod tests
{
    use {super::*, std::sync::atomic::{AtomicI32, Ordering::SeqCst}};

    static RECEIVED: AtomicI32 = AtomicI32::new(0);

    extern "C" fn record(sig: libc::c_int)
    {
        RECEIVED.store(sig, SeqCst);
    }

    #[test]
    fn installed_handler_is_reported_and_called()
    {
        // SIGUSR2 is not used by the test harness.
        let signum = libc::SIGUSR2;

        let previous = sigaction_set(signum, record, libc::SA_RESTART).unwrap();
        assert_eq!(previous, libc::SIG_DFL);
        assert_eq!(sigaction_get(signum).unwrap(), record as libc::sighandler_t);

        crate::pthread_kill(crate::pthread_self(), signum).unwrap();
        assert_eq!(RECEIVED.load(SeqCst), signum);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn sigrtmin_is_above_standard_signals()
    {
        assert!(sigrtmin() > libc::SIGSYS);
        // Linux has 64 signals.
        assert!(sigrtmin() + 6 <= 64);
    }
}
