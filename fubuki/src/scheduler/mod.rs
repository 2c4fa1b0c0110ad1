//! Scheduler with one OS thread per task.
//!
//! The scheduler is the embedding runtime for the pieces in this crate.
//! It owns all tasks, keeps a table of those that are live,
//! and implements stop-the-world on top of the pause signal.

use {
    crate::{
        Config,
        InitError,
        Runtime,
        StackTop,
        TaskHandle,
        ThreadId,
        approximate_stack_pointer,
        current::{self, NotBound},
        launch::{self, Entry, LaunchError},
        sync::{RawLock, Semaphore},
    },
    self::world::World,
    std::{
        cell::UnsafeCell,
        ffi::c_void,
        ptr::NonNull,
        sync::{
            Arc,
            OnceLock,
            atomic::{AtomicU64, AtomicUsize, Ordering::Relaxed},
        },
    },
};

mod world;

/// A task of a [`Scheduler`].
pub struct Task
{
    /// Numbered in order of creation, starting at 0 for the main task.
    /// Not significant other than for debugging.
    id: u64,

    /// Set once the thread has started.
    thread: OnceLock<ThreadId>,

    /// Highest address of the stack.
    stack_top: StackTop,

    /// Lowest address of the stack that is in use.
    /// Recorded when the thread is paused for garbage collection.
    stack_bottom: AtomicUsize,

    /// Posted by [`unpark`][`Self::unpark`].
    park: Semaphore,
}

impl Task
{
    fn new(id: u64, stack_top: StackTop) -> Self
    {
        Self{
            id,
            thread: OnceLock::new(),
            stack_top,
            stack_bottom: AtomicUsize::new(0),
            park: Semaphore::new(0),
        }
    }

    /// Find the task behind a handle given out by a scheduler.
    ///
    /// # Safety
    ///
    /// The handle must belong to a task that is still in the task table,
    /// or that is otherwise kept alive.
    unsafe fn from_handle<'a>(handle: TaskHandle) -> &'a Self
    {
        &*handle.as_ptr().cast::<Self>()
    }

    fn handle(&self) -> TaskHandle
    {
        let ptr = NonNull::from(self).cast::<c_void>();
        TaskHandle::from_non_null(ptr)
    }

    /// Number of the task, starting at 0 for the main task.
    pub fn id(&self) -> u64
    {
        self.id
    }

    /// Identity of the thread running the task.
    pub fn thread(&self) -> Option<ThreadId>
    {
        self.thread.get().copied()
    }

    /// Highest address of the task's stack.
    pub fn stack_top(&self) -> Option<usize>
    {
        self.stack_top.get()
    }

    /// Let the task continue if it is parked.
    ///
    /// If the task is not parked,
    /// its next call to [`Scheduler::park`] returns immediately.
    pub fn unpark(&self)
    {
        tracing::trace!(id = self.id, "unpark");
        self.park.post();
    }
}

/// Runtime running each task on its own thread.
///
/// As a [`RootSource`][`crate::roots::RootSource`], the scheduler stops
/// the world when the collector asks for roots, and leaves it stopped.
/// The collector's embedder calls [`resume_world`][`Self::resume_world`]
/// once the collection is over.
pub struct Scheduler
{
    config: Config,
    num_cpu: usize,
    next_id: AtomicU64,

    /// Live tasks, including the main task.
    ///
    /// Only tasks that have fully started are in here,
    /// so stopping the world never waits for a half-started thread.
    tasks: UnsafeCell<Vec<Arc<Task>>>,
    tasks_lock: RawLock,

    world: World,
}

// SAFETY: tasks is only accessed with tasks_lock held.
unsafe impl Sync for Scheduler { }

impl Scheduler
{
    /// Create the scheduler and initialize the task system.
    ///
    /// The calling thread becomes the main task.
    /// The top of its stack is taken from the thread's stack bounds.
    /// Like [`crate::init`], this can be done only once per process.
    pub fn init(config: Config) -> Result<&'static Self, InitError>
    {
        let stack_top = match os_ext::pthread_stack_bounds() {
            Ok((_, high)) => high,
            Err(err) => {
                tracing::warn!(%err, "cannot find stack bounds of main thread");
                approximate_stack_pointer()
            },
        };

        let num_cpu = os_ext::sysconf(libc::_SC_NPROCESSORS_ONLN)
            .filter(|&n| n > 0)
            .map_or(1, |n| n as usize);

        let main_task = Arc::new(Task::new(0, StackTop::with_address(stack_top)));

        let this: &'static Self = Box::leak(Box::new(Self{
            config,
            num_cpu,
            next_id: AtomicU64::new(1),
            tasks: UnsafeCell::new(vec![main_task.clone()]),
            tasks_lock: RawLock::new(),
            world: World::new(),
        }));

        let thread = match crate::init(main_task.handle(), this) {
            Ok(thread) => thread,
            Err(err) => {
                // SAFETY: Nothing kept a reference to the scheduler.
                drop(unsafe { Box::from_raw(this as *const Self as *mut Self) });
                return Err(err);
            },
        };

        let _ = main_task.thread.set(thread);

        tracing::debug!(num_cpu, stack_top, "scheduler initialized");

        Ok(this)
    }

    /// The configuration the scheduler was created with.
    pub fn config(&self) -> &Config
    {
        &self.config
    }

    /// Number of CPUs online when the scheduler was created.
    pub fn num_cpu(&self) -> usize
    {
        self.num_cpu
    }

    /// Start a task with the default stack size.
    ///
    /// # Safety
    ///
    /// See [`launch::start`].
    pub unsafe fn spawn(&self, entry: Entry, arg: *mut c_void)
        -> Result<Arc<Task>, LaunchError>
    {
        self.spawn_with_stack_size(entry, arg, self.config.default_stack_size)
    }

    /// Start a task with the given stack size.
    ///
    /// # Safety
    ///
    /// See [`launch::start`].
    pub unsafe fn spawn_with_stack_size(
        &self,
        entry:      Entry,
        arg:        *mut c_void,
        stack_size: usize,
    ) -> Result<Arc<Task>, LaunchError>
    {
        let id = self.next_id.fetch_add(1, Relaxed);
        let task = Arc::new(Task::new(id, StackTop::new()));

        // Hold the lock while starting, so that the world cannot be stopped
        // while the task is started but not yet in the table.
        let _guard = self.tasks_lock.guard();

        let started = launch::start(
            entry,
            arg,
            task.handle(),
            stack_size,
            &task.stack_top,
        )?;

        let _ = task.thread.set(started.thread);

        // SAFETY: tasks_lock is held.
        (*self.tasks.get()).push(task.clone());

        tracing::trace!(id, stack_size, stack_top = started.stack_top, "start");

        Ok(task)
    }

    /// The task running on the calling thread.
    pub fn current_task(&self) -> Result<Arc<Task>, NotBound>
    {
        let handle = current::current()?;
        let ptr = handle.as_ptr().cast::<Task>() as *const Task;
        // SAFETY: The handle of a running task came from an Arc in the table,
        //         which keeps it alive while the task runs.
        unsafe {
            Arc::increment_strong_count(ptr);
            Ok(Arc::from_raw(ptr))
        }
    }

    /// Block the calling task until it is unparked.
    ///
    /// If the task was unparked before, this returns immediately.
    pub fn park(&self) -> Result<(), NotBound>
    {
        let handle = current::current()?;
        // SAFETY: The calling task is running, so it is in the table.
        let task = unsafe { Task::from_handle(handle) };
        tracing::trace!(id = task.id, "park");
        task.park.wait();
        Ok(())
    }

    /// Number of live tasks, including the main task.
    ///
    /// Blocks while the world is stopped.
    pub fn live_tasks(&self) -> usize
    {
        let _guard = self.tasks_lock.guard();
        // SAFETY: tasks_lock is held.
        unsafe { (*self.tasks.get()).len() }
    }
}

impl Runtime for Scheduler
{
    fn task_exited(&self, handle: TaskHandle)
    {
        let guard = self.tasks_lock.guard();

        // SAFETY: tasks_lock is held.
        let tasks = unsafe { &mut *self.tasks.get() };

        // Handles from tasks started with launch::start directly
        // are not in the table; there is nothing to release for those.
        let Some(index) = tasks.iter().position(|task| task.handle() == handle)
        else {
            drop(guard);
            tracing::warn!(?handle, "exit of unknown task");
            return;
        };
        let task = tasks.swap_remove(index);

        tracing::trace!(id = task.id, "exit");
    }

    fn gc_pause(&self, handle: TaskHandle)
    {
        // SAFETY: The paused task is running, so it is in the table.
        let task = unsafe { Task::from_handle(handle) };
        self.world.pause(task);
    }
}
