//! Telling the collector about task stacks.
//!
//! The collector finds some roots on its own, but not the stacks of tasks.
//! [`register`] gives the collector a callback which,
//! whenever the collector asks for more roots,
//! reports the stack range of every live task.

use {
    crate::StackRange,
    std::sync::OnceLock,
    thiserror::Error,
};

/// Procedure receiving warnings from the collector.
pub type WarnProc = fn(message: &str, arg: usize);

/// The garbage collector, as seen from this crate.
///
/// The methods mirror the collector's own registration API.
pub trait Collector: Sync
{
    /// Register the callback that reports additional roots.
    ///
    /// The collector calls it synchronously during each collection cycle,
    /// on whichever thread drives the cycle.
    fn set_push_other_roots(&self, callback: fn());

    /// Replace the procedure that receives warnings.
    fn set_warn_proc(&self, warn_proc: WarnProc);

    /// Treat every word in `range` as a potential pointer.
    fn push_all_stack(&self, range: StackRange);
}

/// Knows the stack ranges of live tasks.
pub trait RootSource: Sync
{
    /// Call `push` once for each live task's stack range.
    ///
    /// The source must make sure the ranges are stable while being reported,
    /// which usually means stopping the world first.
    fn push_roots(&self, push: &mut dyn FnMut(StackRange));
}

/// Returned when registering more than once.
#[derive(Debug, Error)]
#[error("A root source is already registered with the collector")]
pub struct AlreadyRegistered(());

struct Registration
{
    collector: &'static dyn Collector,
    source: &'static dyn RootSource,
}

static REGISTRATION: OnceLock<Registration> = OnceLock::new();

/// Register `source` with `collector`.
///
/// This must happen once, when the collector is initialized,
/// before any collection can take place.
/// If `filter_warnings` is set, warnings about repeated large allocations
/// are dropped and every other warning is logged.
/// Memory-constrained targets produce those warnings all the time,
/// for allocations that legitimately hold pointers past their first page.
pub fn register(
    collector:       &'static dyn Collector,
    source:          &'static dyn RootSource,
    filter_warnings: bool,
) -> Result<(), AlreadyRegistered>
{
    REGISTRATION.set(Registration{collector, source})
        .map_err(|_| AlreadyRegistered(()))?;

    collector.set_push_other_roots(push_other_roots);

    if filter_warnings {
        collector.set_warn_proc(filter_warning);
    }

    Ok(())
}

/// The callback given to the collector.
fn push_other_roots()
{
    let Some(registration) = REGISTRATION.get() else { return };
    let collector = registration.collector;
    registration.source.push_roots(&mut |range| collector.push_all_stack(range));
}

/// Prefix of the warning about repeated large allocations.
pub const LARGE_ALLOCATION_WARNING: &str =
    "Repeated allocation of very large block";

/// Whether `message` is the warning about repeated large allocations.
pub fn is_large_allocation_warning(message: &str) -> bool
{
    message.trim_start().starts_with(LARGE_ALLOCATION_WARNING)
}

fn filter_warning(message: &str, arg: usize)
{
    if is_large_allocation_warning(message) {
        return;
    }
    tracing::warn!(arg, "collector: {}", message.trim_end());
}
