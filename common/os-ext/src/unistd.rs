/// Call sysconf(3) with the given name.
///
/// Returns [`None`] if the value is indeterminate or the name is invalid;
/// sysconf(3) does not distinguish these reliably.
pub fn sysconf(name: libc::c_int) -> Option<libc::c_long>
{
    // SAFETY: This is always safe.
    let result = unsafe { libc::sysconf(name) };
    (result != -1).then_some(result)
}
