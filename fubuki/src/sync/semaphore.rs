use {
    os_ext::{futex_wait, futex_wake_one},
    std::sync::atomic::{AtomicU32, Ordering::{Acquire, Relaxed, Release}},
};

/// Counting semaphore.
///
/// [`post`][`Self::post`] is async-signal-safe.
pub struct Semaphore
{
    count: AtomicU32,
}

impl Semaphore
{
    /// Create a semaphore with the given initial count.
    pub const fn new(count: u32) -> Self
    {
        Self{count: AtomicU32::new(count)}
    }

    /// Increment the count, waking up a waiter if there is one.
    pub fn post(&self)
    {
        self.count.fetch_add(1, Release);
        futex_wake_one(&self.count);
    }

    /// Block until the count is positive, then decrement it.
    pub fn wait(&self)
    {
        loop {
            if self.try_wait() {
                return;
            }
            futex_wait(&self.count, 0);
        }
    }

    /// Decrement the count if it is positive.
    ///
    /// Returns whether the count was decremented.
    pub fn try_wait(&self) -> bool
    {
        let mut count = self.count.load(Relaxed);
        while count > 0 {
            match self.count.compare_exchange_weak(
                count, count - 1, Acquire, Relaxed,
            ) {
                Ok(..)      => return true,
                Err(actual) => count = actual,
            }
        }
        false
    }
}
