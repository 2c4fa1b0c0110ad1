//! Entry and exit of tasks as seen by a runtime of its own.

use {
    fubuki::{Runtime, StackTop, TaskHandle, current, launch},
    std::{
        ffi::c_void,
        ptr::NonNull,
        sync::atomic::{AtomicBool, AtomicUsize, Ordering::SeqCst},
        thread,
        time::{Duration, Instant},
    },
};

const TASKS: usize = 50;

/// What the runtime knows about one task.
struct Slot
{
    entered: AtomicBool,
    exited: AtomicBool,
    bound_to_self: AtomicBool,
}

static SLOTS: [Slot; TASKS] = [const {
    Slot{
        entered: AtomicBool::new(false),
        exited: AtomicBool::new(false),
        bound_to_self: AtomicBool::new(false),
    }
}; TASKS];

static MAIN_SLOT: Slot = Slot{
    entered: AtomicBool::new(true),
    exited: AtomicBool::new(false),
    bound_to_self: AtomicBool::new(true),
};

/// Incremented on entry, decremented on exit notification.
static RUNNING: AtomicUsize = AtomicUsize::new(0);
static EXITS: AtomicUsize = AtomicUsize::new(0);
static EXIT_BEFORE_ENTRY: AtomicUsize = AtomicUsize::new(0);

struct CountingRuntime;

impl Runtime for CountingRuntime
{
    fn task_exited(&self, task: TaskHandle)
    {
        // SAFETY: Every handle points into SLOTS.
        let slot = unsafe { &*task.as_ptr().cast::<Slot>() };
        if !slot.entered.load(SeqCst) || slot.exited.swap(true, SeqCst) {
            EXIT_BEFORE_ENTRY.fetch_add(1, SeqCst);
        }
        RUNNING.fetch_sub(1, SeqCst);
        EXITS.fetch_add(1, SeqCst);
    }

    fn gc_pause(&self, _task: TaskHandle)
    {
    }
}

static RUNTIME: CountingRuntime = CountingRuntime;

fn handle(slot: &'static Slot) -> TaskHandle
{
    TaskHandle::from_non_null(NonNull::from(slot).cast())
}

unsafe extern "C" fn enter(arg: *mut c_void)
{
    let slot = &*arg.cast::<Slot>();
    RUNNING.fetch_add(1, SeqCst);
    let bound = current::current().map_or(false, |task| task.as_ptr() == arg);
    slot.bound_to_self.store(bound, SeqCst);
    slot.entered.store(true, SeqCst);
}

#[test]
fn exit_notification()
{
    fubuki::init(handle(&MAIN_SLOT), &RUNTIME).unwrap();

    for slot in &SLOTS {
        let stack_top = StackTop::new();
        let arg = slot as *const Slot as *mut c_void;
        let started = unsafe {
            launch::start(enter, arg, handle(slot), 128 * 1024, &stack_top)
        }.unwrap();
        assert_ne!(started.stack_top, 0);
        assert_eq!(stack_top.get(), Some(started.stack_top));
    }

    let deadline = Instant::now() + Duration::from_secs(10);
    while EXITS.load(SeqCst) != TASKS {
        assert!(Instant::now() < deadline, "tasks did not exit");
        thread::sleep(Duration::from_millis(1));
    }

    assert_eq!(RUNNING.load(SeqCst), 0);
    assert_eq!(EXIT_BEFORE_ENTRY.load(SeqCst), 0);
    for slot in &SLOTS {
        assert!(slot.entered.load(SeqCst));
        assert!(slot.exited.load(SeqCst));
        assert!(slot.bound_to_self.load(SeqCst));
    }
    assert!(!MAIN_SLOT.exited.load(SeqCst));
}
