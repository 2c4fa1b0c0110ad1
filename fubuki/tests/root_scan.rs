//! Registering the scheduler with a collector and scanning task stacks.

use {
    fubuki::{
        Config,
        Scheduler,
        StackRange,
        roots::{self, Collector, WarnProc},
    },
    std::{
        ffi::c_void,
        ptr::null_mut,
        sync::{
            Mutex,
            OnceLock,
            atomic::{AtomicUsize, Ordering::SeqCst},
        },
        thread,
        time::{Duration, Instant},
    },
};

const STACK_SIZE: usize = 128 * 1024;

/// Records what the crate registers and which ranges it pushes.
struct MockCollector
{
    push_other_roots: Mutex<Option<fn()>>,
    warn_proc: Mutex<Option<WarnProc>>,
    ranges: Mutex<Vec<StackRange>>,
}

impl Collector for MockCollector
{
    fn set_push_other_roots(&self, callback: fn())
    {
        *self.push_other_roots.lock().unwrap() = Some(callback);
    }

    fn set_warn_proc(&self, warn_proc: WarnProc)
    {
        *self.warn_proc.lock().unwrap() = Some(warn_proc);
    }

    fn push_all_stack(&self, range: StackRange)
    {
        self.ranges.lock().unwrap().push(range);
    }
}

static COLLECTOR: MockCollector = MockCollector{
    push_other_roots: Mutex::new(None),
    warn_proc: Mutex::new(None),
    ranges: Mutex::new(Vec::new()),
};

static SCHEDULER: OnceLock<&'static Scheduler> = OnceLock::new();
static PARKED: AtomicUsize = AtomicUsize::new(0);

unsafe extern "C" fn parked(_arg: *mut c_void)
{
    PARKED.fetch_add(1, SeqCst);
    SCHEDULER.get().unwrap().park().unwrap();
}

#[test]
fn root_scan()
{
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let scheduler = Scheduler::init(Config::default()).unwrap();
    SCHEDULER.set(scheduler).ok().unwrap();

    roots::register(&COLLECTOR, scheduler, true).unwrap();
    assert!(roots::register(&COLLECTOR, scheduler, true).is_err());

    let callback = COLLECTOR.push_other_roots.lock().unwrap().unwrap();
    let warn_proc = COLLECTOR.warn_proc.lock().unwrap().unwrap();

    // Filtered warnings are dropped, others are logged.
    warn_proc("GC Warning: unrelated\n", 0);
    warn_proc("Repeated allocation of very large block (appr. size 68 KiB):\n", 0);

    let tasks: Vec<_> =
        (0 .. 3)
        .map(|_| unsafe {
            scheduler.spawn_with_stack_size(parked, null_mut(), STACK_SIZE)
        }.unwrap())
        .collect();

    while PARKED.load(SeqCst) != tasks.len() {
        thread::yield_now();
    }

    // Reserve room so that nothing allocates while the world is stopped.
    COLLECTOR.ranges.lock().unwrap().reserve(8);

    // What the collector does during a cycle.
    callback();
    scheduler.resume_world();

    let ranges = COLLECTOR.ranges.lock().unwrap().clone();
    assert_eq!(ranges.len(), 4);

    for (i, a) in ranges.iter().enumerate() {
        assert!(!a.is_empty());
        for b in &ranges[i + 1 ..] {
            assert!(!a.overlaps(b), "{a:?} overlaps {b:?}");
        }
    }

    // Every task's range lies within the stack it was given.
    for task in &tasks {
        let top = task.stack_top().unwrap();
        let range = ranges.iter().find(|range| range.high == top).unwrap();
        assert!(range.len() <= STACK_SIZE);
    }

    for task in &tasks {
        task.unpark();
    }

    let deadline = Instant::now() + Duration::from_secs(10);
    while scheduler.live_tasks() != 1 {
        assert!(Instant::now() < deadline, "tasks did not exit");
        thread::sleep(Duration::from_millis(1));
    }
}
