use {
    crate::check_error_number,
    std::{ffi::c_void, io, mem::MaybeUninit},
};

/// Start routine as taken by pthread_create(3).
pub type StartRoutine = extern "C" fn(*mut c_void) -> *mut c_void;

/// Thread attributes object.
///
/// The object is initialized with pthread_attr_init(3)
/// and destroyed with pthread_attr_destroy(3) when dropped.
pub struct PthreadAttr
{
    // Boxed, because POSIX does not promise the object may be moved.
    inner: Box<libc::pthread_attr_t>,
}

impl PthreadAttr
{
    /// Call pthread_attr_init(3).
    pub fn new() -> io::Result<Self>
    {
        let mut inner = Box::new(MaybeUninit::<libc::pthread_attr_t>::uninit());

        // SAFETY: inner is valid for writes.
        let result = unsafe { libc::pthread_attr_init(inner.as_mut_ptr()) };
        check_error_number(result)?;

        // SAFETY: pthread_attr_init initialized the object.
        let inner = unsafe {
            Box::from_raw(Box::into_raw(inner).cast::<libc::pthread_attr_t>())
        };

        Ok(Self{inner})
    }

    /// Call pthread_attr_setdetachstate(3).
    pub fn setdetachstate(&mut self, detachstate: libc::c_int)
        -> io::Result<()>
    {
        // SAFETY: inner is initialized.
        let result = unsafe {
            libc::pthread_attr_setdetachstate(&mut *self.inner, detachstate)
        };
        check_error_number(result)
    }

    /// Call pthread_attr_setstacksize(3).
    ///
    /// Fails with `EINVAL` if `stacksize` is below `PTHREAD_STACK_MIN`.
    pub fn setstacksize(&mut self, stacksize: usize) -> io::Result<()>
    {
        // SAFETY: inner is initialized.
        let result = unsafe {
            libc::pthread_attr_setstacksize(&mut *self.inner, stacksize)
        };
        check_error_number(result)
    }

    /// Pointer to the underlying attributes object.
    pub fn as_ptr(&self) -> *const libc::pthread_attr_t
    {
        &*self.inner
    }
}

impl Drop for PthreadAttr
{
    fn drop(&mut self)
    {
        // SAFETY: inner is initialized and not used anymore after this.
        unsafe { libc::pthread_attr_destroy(&mut *self.inner); }
    }
}

/// Call pthread_create(3) with the given arguments.
///
/// # Safety
///
/// `start_routine` is called with `arg` on the new thread.
/// The caller must make sure that doing so is sound.
pub unsafe fn pthread_create(
    attr:          &PthreadAttr,
    start_routine: StartRoutine,
    arg:           *mut c_void,
) -> io::Result<libc::pthread_t>
{
    let mut thread = MaybeUninit::uninit();
    let result = libc::pthread_create(
        thread.as_mut_ptr(),
        attr.as_ptr(),
        start_routine,
        arg,
    );
    check_error_number(result)?;
    Ok(thread.assume_init())
}

/// Call pthread_self(3).
pub fn pthread_self() -> libc::pthread_t
{
    // SAFETY: This is always safe.
    unsafe { libc::pthread_self() }
}

/// Call pthread_kill(3) with the given arguments.
///
/// A thread that has already terminated results in `ESRCH`
/// on platforms that detect this. glibc does not,
/// and returns success for a terminated thread that was not joined.
pub fn pthread_kill(thread: libc::pthread_t, sig: libc::c_int)
    -> io::Result<()>
{
    // SAFETY: Thread identifiers are never dereferenced by the caller.
    let result = unsafe { libc::pthread_kill(thread, sig) };
    check_error_number(result)
}

/// Return the bounds of the calling thread's stack as `(low, high)`.
///
/// On Linux this calls pthread_getattr_np(3) and pthread_attr_getstack(3).
#[cfg(target_os = "linux")]
pub fn pthread_stack_bounds() -> io::Result<(usize, usize)>
{
    let mut attr = MaybeUninit::<libc::pthread_attr_t>::uninit();

    // SAFETY: attr is valid for writes.
    let result = unsafe {
        libc::pthread_getattr_np(libc::pthread_self(), attr.as_mut_ptr())
    };
    check_error_number(result)?;

    let mut stackaddr = std::ptr::null_mut();
    let mut stacksize = 0;

    // SAFETY: attr was initialized by pthread_getattr_np.
    let result = unsafe {
        let result = libc::pthread_attr_getstack(
            attr.as_ptr(),
            &mut stackaddr,
            &mut stacksize,
        );
        libc::pthread_attr_destroy(attr.as_mut_ptr());
        result
    };
    check_error_number(result)?;

    let low = stackaddr as usize;
    Ok((low, low + stacksize))
}

/// Return the bounds of the calling thread's stack as `(low, high)`.
///
/// On macOS this calls pthread_get_stackaddr_np(3)
/// and pthread_get_stacksize_np(3).
/// The stack address reported by the former is the high end.
#[cfg(target_os = "macos")]
pub fn pthread_stack_bounds() -> io::Result<(usize, usize)>
{
    // SAFETY: Always safe for the calling thread.
    let (high, size) = unsafe {
        let thread = libc::pthread_self();
        (
            libc::pthread_get_stackaddr_np(thread) as usize,
            libc::pthread_get_stacksize_np(thread),
        )
    };
    Ok((high - size, high))
}
