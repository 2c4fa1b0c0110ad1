//! Stopping and resuming all tasks.
//!
//! The driver (the thread running the collection) takes the task lock,
//! marks the world stopped, and sends the pause signal to every other task.
//! Each paused task records its stack pointer, checks in with the wait group,
//! and sleeps on the world state until the driver resumes the world.
//! Paused tasks check in a second time on their way out of the handler,
//! so that the next stop cannot overtake a slow resume.

use {
    super::{Scheduler, Task},
    crate::{
        StackRange,
        approximate_stack_pointer,
        current,
        with_registers_saved,
        pause::{self, Delivery},
        roots::RootSource,
        sync::WaitGroup,
    },
    os_ext::{futex_wait, futex_wake_all},
    std::sync::atomic::{AtomicU32, Ordering::{Acquire, Relaxed, Release}},
};

const RESUMED: u32 = 0;
const STOPPED: u32 = 1;

pub (super) struct World
{
    state: AtomicU32,

    /// Paused tasks check in here when pausing and when resuming.
    transition: WaitGroup,

    /// Number of tasks paused by the current stop.
    paused: AtomicU32,

    /// Number of tasks the current stop could not signal.
    unreachable: AtomicU32,
}

impl World
{
    pub (super) const fn new() -> Self
    {
        Self{
            state: AtomicU32::new(RESUMED),
            transition: WaitGroup::new(),
            paused: AtomicU32::new(0),
            unreachable: AtomicU32::new(0),
        }
    }

    /// Called from the pause signal handler.
    pub (super) fn pause(&self, task: &Task)
    {
        task.stack_bottom.store(approximate_stack_pointer(), Release);

        self.transition.done();

        while self.state.load(Acquire) == STOPPED {
            futex_wait(&self.state, STOPPED);
        }

        self.transition.done();
    }
}

impl Scheduler
{
    /// Whether the world is currently stopped.
    pub fn is_world_stopped(&self) -> bool
    {
        self.world.state.load(Acquire) == STOPPED
    }

    /// Stop every task other than the calling one,
    /// then report the stack range of every live task.
    ///
    /// The task table stays locked until [`resume_world`][`Self::resume_world`],
    /// so no task can start or finish exiting in the meantime.
    /// If the world is already stopped, the tasks are only reported.
    /// The range of the calling task, if it is one,
    /// starts at its callee-saved registers, stored on its stack.
    ///
    /// Paused tasks may hold any lock, including the allocator's.
    /// So `push` must not allocate, and nothing is logged while stopped.
    pub fn stop_world_and_scan<F>(&self, mut push: F)
        where F: FnMut(StackRange)
    {
        if !self.is_world_stopped() {
            self.stop_world();
        }

        let this = current::try_current();

        // SAFETY: tasks_lock is held while the world is stopped.
        let tasks = unsafe { &*self.tasks.get() };

        // The calling task's outer frames may hold pointers in registers.
        with_registers_saved(|registers| {
            let own_low = registers.as_ptr() as usize;
            for task in tasks {
                let Some(high) = task.stack_top() else { continue };
                let low = if Some(task.handle()) == this {
                    own_low
                } else {
                    task.stack_bottom.load(Acquire)
                };
                if low == 0 || low > high {
                    continue;
                }
                push(StackRange{low, high});
            }
        });
    }

    fn stop_world(&self)
    {
        self.tasks_lock.lock();

        // SAFETY: tasks_lock is held.
        let tasks = unsafe { &*self.tasks.get() };
        let this = current::try_current();

        let world = &self.world;
        let others = tasks.iter().filter(|task| Some(task.handle()) != this);

        tracing::debug!(tasks = tasks.len(), "stopping world");

        world.transition.reset(others.clone().count() as u32);
        world.state.store(STOPPED, Release);

        // Tasks leave the table before their threads exit, and cannot leave
        // while the lock is held, so every thread signalled here is alive.
        // Exited is only reported for threads that never started.
        let mut paused = 0;
        let mut unreachable = 0;
        for task in others {
            let delivery = match task.thread() {
                Some(thread) => pause::signal_pause(thread),
                None         => Ok(Delivery::Exited),
            };
            match delivery {
                Ok(Delivery::Delivered) => paused += 1,
                Ok(Delivery::Exited)    => world.transition.done(),
                Err(_) => {
                    unreachable += 1;
                    world.transition.done();
                },
            }
        }

        world.paused.store(paused, Relaxed);
        world.unreachable.store(unreachable, Relaxed);
        world.transition.wait();
    }

    /// Let every paused task continue and unlock the task table.
    ///
    /// Returns once every paused task has left the signal handler.
    /// Does nothing if the world is not stopped.
    pub fn resume_world(&self)
    {
        if !self.is_world_stopped() {
            return;
        }

        let world = &self.world;
        let paused = world.paused.load(Relaxed);

        world.transition.reset(paused);
        world.state.store(RESUMED, Release);
        futex_wake_all(&world.state);
        world.transition.wait();

        // SAFETY: Locked by stop_world.
        unsafe { self.tasks_lock.unlock(); }

        let unreachable = world.unreachable.load(Relaxed);
        if unreachable != 0 {
            tracing::warn!(unreachable, "tasks could not be paused");
        }
        tracing::debug!(paused, "world resumed");
    }
}

impl RootSource for Scheduler
{
    fn push_roots(&self, push: &mut dyn FnMut(StackRange))
    {
        self.stop_world_and_scan(push);
    }
}
