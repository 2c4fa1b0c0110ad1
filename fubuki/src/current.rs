//! Which task runs on the calling thread.
//!
//! Each thread has one slot, written only by that thread.
//! The launcher fills it before a task's entry function runs,
//! and [`init`][`crate::init`] fills it for the main thread.

use {crate::TaskHandle, std::cell::Cell, thiserror::Error};

thread_local!
{
    static CURRENT_TASK: Cell<Option<TaskHandle>> = const { Cell::new(None) };
}

/// Returned when no task was bound to the calling thread.
#[derive(Debug, Error)]
#[error("No task is bound to this thread")]
pub struct NotBound(());

/// Install `task` as the task of the calling thread.
pub fn bind(task: TaskHandle)
{
    CURRENT_TASK.with(|cell| cell.set(Some(task)));
}

/// Forget the task of the calling thread.
pub (crate) fn unbind()
{
    // The slot may already be gone if the thread is being torn down.
    let _ = CURRENT_TASK.try_with(|cell| cell.set(None));
}

/// The task bound to the calling thread.
pub fn current() -> Result<TaskHandle, NotBound>
{
    try_current().ok_or(NotBound(()))
}

/// The task bound to the calling thread, if any.
///
/// This neither allocates nor locks, so it may be called from
/// a signal handler.
pub fn try_current() -> Option<TaskHandle>
{
    CURRENT_TASK.try_with(Cell::get).ok().flatten()
}
