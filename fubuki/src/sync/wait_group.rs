use {
    os_ext::{futex_wait, futex_wake_all},
    std::sync::atomic::{AtomicU32, Ordering::{AcqRel, Acquire, Release}},
};

/// Waits until a number of participants have checked in.
///
/// [`done`][`Self::done`] is async-signal-safe.
pub struct WaitGroup
{
    pending: AtomicU32,
}

impl WaitGroup
{
    /// Create a wait group with nobody pending.
    pub const fn new() -> Self
    {
        Self{pending: AtomicU32::new(0)}
    }

    /// Set the number of participants to wait for.
    ///
    /// Must not be called while somebody is in [`wait`][`Self::wait`].
    pub fn reset(&self, pending: u32)
    {
        self.pending.store(pending, Release);
    }

    /// Check in one participant.
    pub fn done(&self)
    {
        if self.pending.fetch_sub(1, AcqRel) == 1 {
            futex_wake_all(&self.pending);
        }
    }

    /// Block until every participant has checked in.
    pub fn wait(&self)
    {
        loop {
            let pending = self.pending.load(Acquire);
            if pending == 0 {
                return;
            }
            futex_wait(&self.pending, pending);
        }
    }
}

impl Default for WaitGroup
{
    fn default() -> Self
    {
        Self::new()
    }
}
