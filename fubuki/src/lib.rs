//! Thread-backed tasks for runtimes with a conservative garbage collector.
//!
//! Every task runs on a dedicated OS thread for its whole lifetime.
//! There is no user-space scheduling and no stack switching.
//! What this crate adds on top of plain threads is what a conservative,
//! non-moving collector needs in order to scan those threads:
//!
//!  - Each task records the top of its stack before anybody can see it
//!    (see [`launch::start`]).
//!  - Each thread knows which task it runs (see [`current`]).
//!  - Any single thread can be interrupted by the pause signal,
//!    which hands control to the runtime's pause routine
//!    (see [`pause`] and [`Runtime::gc_pause`]).
//!  - The collector can ask for the stack ranges of all tasks
//!    (see [`roots`]).
//!
//! The embedding runtime owns the tasks and decides what a pause means.
//! [`Scheduler`] is a complete runtime built on these pieces:
//! it tracks live tasks and implements stop-the-world with acknowledgment.

#![warn(missing_docs)]

pub use self::{config::*, scheduler::*, task::*};

use {std::sync::OnceLock, thiserror::Error};

pub mod current;
pub mod launch;
pub mod pause;
pub mod roots;
pub mod sync;

mod config;
mod scheduler;
mod task;

/// The embedding runtime, as seen from this crate.
pub trait Runtime: Sync
{
    /// Notify the runtime that a task has exited.
    ///
    /// This is called on the task's own thread
    /// after its entry function has returned.
    /// The thread terminates shortly after this method returns,
    /// and nothing reaps it.
    fn task_exited(&self, task: TaskHandle);

    /// Pause the interrupted task for garbage collection.
    ///
    /// This is called from the pause signal handler,
    /// on the thread of the task that was interrupted.
    /// It must capture whatever the collector needs and
    /// block until the collection cycle is over.
    /// When it returns, the interrupted code resumes where it left off.
    ///
    /// This runs in signal context. Implementations must not allocate,
    /// must not take locks that ordinary code may hold,
    /// and must not log.
    fn gc_pause(&self, task: TaskHandle);
}

/// Returned when initialization fails.
#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum InitError
{
    #[error("The task system is already initialized")]
    AlreadyInitialized,

    #[error("{0}")]
    Pause(#[from] pause::InstallError),
}

static RUNTIME: OnceLock<&'static dyn Runtime> = OnceLock::new();

/// Initialize the task system on the main thread.
///
/// This must be called once, before any other item in this crate is used.
/// It installs the pause signal handler for the entire process,
/// binds `main_task` to the calling thread,
/// and remembers `runtime` for exit notifications and pauses.
/// The main thread already exists, so it is not created by the launcher.
///
/// Returns the identity of the calling thread.
pub fn init(main_task: TaskHandle, runtime: &'static dyn Runtime)
    -> Result<ThreadId, InitError>
{
    pause::install()?;
    RUNTIME.set(runtime).map_err(|_| InitError::AlreadyInitialized)?;
    current::bind(main_task);
    Ok(ThreadId::current())
}

/// The runtime passed to [`init`], if any.
///
/// This is async-signal-safe.
fn runtime() -> Option<&'static dyn Runtime>
{
    RUNTIME.get().copied()
}
