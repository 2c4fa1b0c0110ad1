use {
    os_ext::{futex_wait, futex_wake_one},
    std::sync::atomic::{AtomicU32, Ordering::{Acquire, Relaxed, Release}},
};

const UNLOCKED:  u32 = 0;
const LOCKED:    u32 = 1;
const CONTENDED: u32 = 2;

/// Mutual exclusion without a guard.
///
/// Locking and unlocking need not happen in the same scope,
/// which is what stopping and resuming the world needs:
/// the task table stays locked between the two.
/// For scoped use there is [`guard`][`Self::guard`].
pub struct RawLock
{
    state: AtomicU32,
}

impl RawLock
{
    /// Create an unlocked lock.
    pub const fn new() -> Self
    {
        Self{state: AtomicU32::new(UNLOCKED)}
    }

    /// Block until the lock is acquired.
    pub fn lock(&self)
    {
        if self.try_lock() {
            return;
        }
        while self.state.swap(CONTENDED, Acquire) != UNLOCKED {
            futex_wait(&self.state, CONTENDED);
        }
    }

    /// Acquire the lock if it is free.
    pub fn try_lock(&self) -> bool
    {
        self.state.compare_exchange(UNLOCKED, LOCKED, Acquire, Relaxed).is_ok()
    }

    /// Release the lock.
    ///
    /// # Safety
    ///
    /// The lock must be held, by whoever is calling this in spirit.
    pub unsafe fn unlock(&self)
    {
        if self.state.swap(UNLOCKED, Release) == CONTENDED {
            futex_wake_one(&self.state);
        }
    }

    /// Acquire the lock until the returned guard is dropped.
    pub fn guard(&self) -> RawLockGuard
    {
        self.lock();
        RawLockGuard{lock: self}
    }
}

impl Default for RawLock
{
    fn default() -> Self
    {
        Self::new()
    }
}

/// Releases a [`RawLock`] when dropped.
pub struct RawLockGuard<'a>
{
    lock: &'a RawLock,
}

impl<'a> Drop for RawLockGuard<'a>
{
    fn drop(&mut self)
    {
        // SAFETY: The guard was created by locking.
        unsafe { self.lock.unlock(); }
    }
}

#[cfg(test)]
mod tests
{
    use {
        super::*,
        std::{cell::UnsafeCell, sync::Arc, thread},
    };

    struct Counter
    {
        lock: RawLock,
        value: UnsafeCell<u64>,
    }

    // SAFETY: value is only accessed with lock held.
    unsafe impl Sync for Counter { }

    #[test]
    fn lock_excludes_other_threads()
    {
        let counter = Arc::new(Counter{
            lock: RawLock::new(),
            value: UnsafeCell::new(0),
        });

        let threads: Vec<_> =
            (0 .. 8)
            .map(|_| {
                let counter = counter.clone();
                thread::spawn(move || {
                    for _ in 0 .. 1000 {
                        let _guard = counter.lock.guard();
                        // SAFETY: The lock is held.
                        unsafe { *counter.value.get() += 1; }
                    }
                })
            })
            .collect();

        for thread in threads {
            thread.join().unwrap();
        }

        assert_eq!(unsafe { *counter.value.get() }, 8000);
    }

    #[test]
    fn try_lock_fails_while_held()
    {
        let lock = RawLock::new();
        lock.lock();
        assert!(!lock.try_lock());
        // SAFETY: Locked above.
        unsafe { lock.unlock(); }
        assert!(lock.try_lock());
    }
}
