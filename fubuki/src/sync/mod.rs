//! Blocking primitives built on futexes.
//!
//! Unlike the primitives in [`std::sync`], these never allocate,
//! and the operations marked as such may be used from a signal handler.
//! That is what the pause protocol needs: the interrupted thread
//! acknowledges the pause and waits for the resume inside the handler.

pub use self::{lock::*, semaphore::*, wait_group::*};

mod lock;
mod semaphore;
mod wait_group;
