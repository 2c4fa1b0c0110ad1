use std::{
    ffi::c_void,
    fmt,
    hint::black_box,
    mem::size_of,
    ptr::NonNull,
    sync::atomic::{AtomicUsize, Ordering::{Acquire, Release}},
};

// Thread identities are stored in pointer-sized slots.
const _: () = assert!(
    size_of::<libc::pthread_t>() <= size_of::<*const ()>(),
    "pthread_t must not be wider than a pointer",
);

/// Opaque pointer to a task owned by the embedding runtime.
///
/// This crate never dereferences or frees the pointee.
/// It only stores the handle per thread and hands it back.
#[derive(Clone, Copy, Eq, Hash, PartialEq)]
pub struct TaskHandle(NonNull<c_void>);

// SAFETY: The handle is never dereferenced by this crate.
unsafe impl Send for TaskHandle { }
unsafe impl Sync for TaskHandle { }

impl TaskHandle
{
    /// Create a handle from a pointer, or [`None`] if it is null.
    pub fn new(ptr: *mut c_void) -> Option<Self>
    {
        NonNull::new(ptr).map(Self)
    }

    /// Create a handle from a non-null pointer.
    pub const fn from_non_null(ptr: NonNull<c_void>) -> Self
    {
        Self(ptr)
    }

    /// The pointer this handle was created from.
    pub fn as_ptr(self) -> *mut c_void
    {
        self.0.as_ptr()
    }
}

impl fmt::Debug for TaskHandle
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result
    {
        write!(f, "TaskHandle({:p})", self.0)
    }
}

/// Identity of an OS thread.
///
/// This is what the pause signal is aimed at.
#[derive(Clone, Copy, Eq, PartialEq)]
pub struct ThreadId(libc::pthread_t);

// SAFETY: On macOS pthread_t is a pointer, but it is only
//         ever passed back to the pthread functions.
unsafe impl Send for ThreadId { }
unsafe impl Sync for ThreadId { }

impl ThreadId
{
    /// The identity of the calling thread.
    pub fn current() -> Self
    {
        Self(os_ext::pthread_self())
    }

    /// Wrap a raw thread identifier.
    pub fn from_raw(raw: libc::pthread_t) -> Self
    {
        Self(raw)
    }

    /// The raw thread identifier.
    pub fn as_raw(self) -> libc::pthread_t
    {
        self.0
    }
}

impl fmt::Debug for ThreadId
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result
    {
        write!(f, "ThreadId({:#x})", self.0 as usize)
    }
}

/// Highest address of a task's stack.
///
/// The record is owned by the embedding runtime and filled in exactly once,
/// by the task's own thread, before the launcher lets the spawner continue.
/// It is the upper bound for conservatively scanning that stack.
#[derive(Debug, Default)]
pub struct StackTop(AtomicUsize);

impl StackTop
{
    /// Create an empty record.
    pub const fn new() -> Self
    {
        Self(AtomicUsize::new(0))
    }

    /// Create a record that is already filled in.
    ///
    /// This is for threads that are not created by the launcher,
    /// such as the main thread.
    pub const fn with_address(address: usize) -> Self
    {
        Self(AtomicUsize::new(address))
    }

    /// The recorded address, or [`None`] if nothing was recorded yet.
    pub fn get(&self) -> Option<usize>
    {
        match self.0.load(Acquire) {
            0       => None,
            address => Some(address),
        }
    }

    pub (crate) fn record(&self, address: usize)
    {
        self.0.store(address, Release);
    }
}

/// Half-open range of addresses, `low .. high`.
#[allow(missing_docs)]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct StackRange
{
    pub low:  usize,
    pub high: usize,
}

impl StackRange
{
    /// Number of bytes in the range.
    pub fn len(&self) -> usize
    {
        self.high.saturating_sub(self.low)
    }

    /// Whether the range contains no bytes.
    pub fn is_empty(&self) -> bool
    {
        self.len() == 0
    }

    /// Whether `address` lies within the range.
    pub fn contains(&self, address: usize) -> bool
    {
        self.low <= address && address < self.high
    }

    /// Whether the two ranges share at least one byte.
    pub fn overlaps(&self, other: &Self) -> bool
    {
        !self.is_empty() && !other.is_empty()
            && self.low < other.high && other.low < self.high
    }
}

/// Return an address near the current stack pointer.
///
/// The address lies below the frame of the caller,
/// so everything the caller and its callers have on the stack,
/// including registers spilled there, is above it.
#[inline(never)]
pub fn approximate_stack_pointer() -> usize
{
    let marker = 0usize;
    black_box(&marker) as *const usize as usize
}

#[cfg(target_arch = "x86_64")]
const CALLEE_SAVED: usize = 6;

#[cfg(target_arch = "aarch64")]
const CALLEE_SAVED: usize = 11;

#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
const CALLEE_SAVED: usize = 0;

/// Callee-saved registers of the calling thread, stored on its stack.
pub type SavedRegisters = [usize; CALLEE_SAVED];

/// Store the callee-saved registers on the stack, then call `f` with them.
///
/// Outer frames may keep pointers in callee-saved registers only.
/// Everything from the start of the saved registers
/// up to the top of the stack is what a conservative scan
/// of the calling thread must cover.
#[inline(never)]
pub fn with_registers_saved<F, R>(f: F) -> R
    where F: FnOnce(&SavedRegisters) -> R
{
    let mut registers: SavedRegisters = [0; CALLEE_SAVED];
    save_registers(&mut registers);
    let result = f(black_box(&registers));
    black_box(&registers);
    result
}

#[cfg(target_arch = "x86_64")]
#[inline(always)]
fn save_registers(registers: &mut SavedRegisters)
{
    // SAFETY: Only writes to registers.
    unsafe {
        std::arch::asm!(
            "mov [{0}],      rbx",
            "mov [{0} + 8],  rbp",
            "mov [{0} + 16], r12",
            "mov [{0} + 24], r13",
            "mov [{0} + 32], r14",
            "mov [{0} + 40], r15",
            in(reg) registers.as_mut_ptr(),
            options(nostack, preserves_flags),
        );
    }
}

#[cfg(target_arch = "aarch64")]
#[inline(always)]
fn save_registers(registers: &mut SavedRegisters)
{
    // SAFETY: Only writes to registers.
    unsafe {
        std::arch::asm!(
            "stp x19, x20, [{0}]",
            "stp x21, x22, [{0}, #16]",
            "stp x23, x24, [{0}, #32]",
            "stp x25, x26, [{0}, #48]",
            "stp x27, x28, [{0}, #64]",
            "str x29,      [{0}, #80]",
            in(reg) registers.as_mut_ptr(),
            options(nostack, preserves_flags),
        );
    }
}

#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
fn save_registers(_registers: &mut SavedRegisters)
{
}
