//! Starting tasks on new threads.
//!
//! [`start`] hands a start message to a new thread and waits for the thread
//! to acknowledge it. The new thread acknowledges only after it has
//! taken everything out of the message, bound its task,
//! and recorded the top of its stack.
//! After that, the spawner no longer shares anything with the new thread,
//! and the collector can scan the new thread like any other.

use {
    crate::{StackTop, TaskHandle, ThreadId, current, sync::Semaphore},
    os_ext::PthreadAttr,
    std::{
        ffi::c_void,
        hint::black_box,
        io,
        ptr::{NonNull, null_mut},
        sync::Arc,
    },
    thiserror::Error,
};

/// Entry function of a task.
pub type Entry = unsafe extern "C" fn(arg: *mut c_void);

/// Returned by [`start`] when the task was started.
#[derive(Clone, Copy, Debug)]
pub struct Started
{
    /// Identity of the new thread.
    pub thread: ThreadId,

    /// The address the new thread recorded as the top of its stack.
    pub stack_top: usize,
}

/// Returned when a task could not be started.
#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum LaunchError
{
    #[error("The task system is not initialized")]
    NotInitialized,

    #[error("Cannot set up thread attributes: {0}")]
    Attributes(#[source] io::Error),

    #[error("Cannot create thread: {0}")]
    Create(#[source] io::Error),
}

/// Everything a new thread needs from its spawner.
///
/// The message is owned by the new thread once it is created.
/// It is taken apart before the spawner is released,
/// and nothing in it is looked at afterwards.
struct StartMessage
{
    entry: Entry,
    arg: *mut c_void,
    task: TaskHandle,

    /// Borrowed from the spawner, which is blocked in [`start`]
    /// until `started` is posted.
    stack_top: NonNull<StackTop>,

    started: Arc<Semaphore>,
}

/// Start a task on a new, detached thread.
///
/// The thread gets a stack of `stack_size` bytes.
/// Before `entry` is called, `task` is bound to the new thread
/// and the top of its stack is written to `stack_top`.
/// This function returns only after both have happened.
/// When `entry` returns, the runtime is notified with
/// [`Runtime::task_exited`][`crate::Runtime::task_exited`]
/// and the thread terminates.
///
/// If the thread cannot be created, the error is returned immediately
/// and nothing remains allocated.
///
/// # Safety
///
/// Calling `entry` with `arg` on another thread must be sound.
pub unsafe fn start(
    entry:      Entry,
    arg:        *mut c_void,
    task:       TaskHandle,
    stack_size: usize,
    stack_top:  &StackTop,
) -> Result<Started, LaunchError>
{
    if crate::runtime().is_none() {
        return Err(LaunchError::NotInitialized);
    }

    let mut attr = PthreadAttr::new().map_err(LaunchError::Attributes)?;
    attr.setdetachstate(os_ext::PTHREAD_CREATE_DETACHED)
        .map_err(LaunchError::Attributes)?;
    attr.setstacksize(stack_size).map_err(LaunchError::Attributes)?;

    let started = Arc::new(Semaphore::new(0));

    let message = Box::into_raw(Box::new(StartMessage{
        entry,
        arg,
        task,
        stack_top: NonNull::from(stack_top),
        started: started.clone(),
    }));

    let thread = match os_ext::pthread_create(&attr, run_task, message.cast()) {
        Ok(thread) => thread,
        Err(err) => {
            // SAFETY: No thread exists that could own the message.
            drop(Box::from_raw(message));
            return Err(LaunchError::Create(err));
        },
    };

    drop(attr);

    // The new thread posts once it no longer needs anything from us.
    started.wait();

    Ok(Started{
        thread: ThreadId::from_raw(thread),
        stack_top: stack_top.get().unwrap_or_default(),
    })
}

/// Start routine of every task thread.
extern "C" fn run_task(message: *mut c_void) -> *mut c_void
{
    // Locals of this frame are near the top of the stack.
    let marker = 0usize;
    let stack_top = black_box(&marker) as *const usize as usize;

    // SAFETY: start transferred ownership of the message to this thread.
    let message = unsafe { Box::from_raw(message.cast::<StartMessage>()) };
    let StartMessage{entry, arg, task, stack_top: record, started} = *message;

    current::bind(task);

    // SAFETY: The spawner is blocked until started is posted.
    unsafe { record.as_ref().record(stack_top); }

    started.post();
    drop(started);

    // SAFETY: Guaranteed by the caller of start.
    unsafe { entry(arg); }

    if let Some(runtime) = crate::runtime() {
        runtime.task_exited(task);
    }

    current::unbind();

    null_mut()
}
