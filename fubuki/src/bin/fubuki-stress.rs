//! Run tasks and stop the world over and over.
//!
//! Usage: `fubuki-stress [TASKS] [CYCLES]`.
//! Logging is configured with `FUBUKI_LOG`,
//! and the scheduler with the variables read by [`Config::from_env`].

use {
    anyhow::{Context, Result, bail},
    fubuki::{
        Config,
        Scheduler,
        StackRange,
        roots::{self, Collector, WarnProc},
    },
    std::{
        env,
        ffi::c_void,
        hint::black_box,
        ptr::null_mut,
        sync::{
            Mutex,
            OnceLock,
            atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering::{Relaxed, SeqCst}},
        },
        thread,
        time::{Duration, Instant},
    },
    tracing_subscriber::EnvFilter,
};

/// Collector that only counts what it is given.
struct CountingCollector
{
    push_other_roots: Mutex<Option<fn()>>,
    ranges: AtomicU64,
    bytes: AtomicU64,
}

impl Collector for CountingCollector
{
    fn set_push_other_roots(&self, callback: fn())
    {
        if let Ok(mut slot) = self.push_other_roots.lock() {
            *slot = Some(callback);
        }
    }

    fn set_warn_proc(&self, _warn_proc: WarnProc)
    {
    }

    fn push_all_stack(&self, range: StackRange)
    {
        self.ranges.fetch_add(1, Relaxed);
        self.bytes.fetch_add(range.len() as u64, Relaxed);
    }
}

static COLLECTOR: CountingCollector = CountingCollector{
    push_other_roots: Mutex::new(None),
    ranges: AtomicU64::new(0),
    bytes: AtomicU64::new(0),
};

static SCHEDULER: OnceLock<&'static Scheduler> = OnceLock::new();
static STOP: AtomicBool = AtomicBool::new(false);
static ROUNDS: AtomicU64 = AtomicU64::new(0);
static PARKED: AtomicUsize = AtomicUsize::new(0);

unsafe extern "C" fn busy(_arg: *mut c_void)
{
    let mut state = 1u64;
    while !STOP.load(Relaxed) {
        for _ in 0 .. 1024 {
            state = black_box(state.wrapping_mul(6364136223846793005).wrapping_add(1));
        }
        ROUNDS.fetch_add(1, Relaxed);
    }
}

unsafe extern "C" fn parked(_arg: *mut c_void)
{
    PARKED.fetch_add(1, SeqCst);
    if let Some(scheduler) = SCHEDULER.get() {
        let _ = scheduler.park();
    }
}

fn parse_arg(index: usize, default: usize) -> Result<usize>
{
    match env::args().nth(index) {
        None => Ok(default),
        Some(arg) => arg.parse().with_context(|| format!("Invalid number {arg:?}")),
    }
}

fn main() -> Result<()>
{
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_env("FUBUKI_LOG"))
        .init();

    let tasks = parse_arg(1, 8)?;
    let cycles = parse_arg(2, 1000)?;

    let config = Config::from_env()?;
    let filter_warnings = config.filter_large_allocation_warnings;

    let scheduler = Scheduler::init(config)?;
    if SCHEDULER.set(scheduler).is_err() {
        bail!("Scheduler initialized twice");
    }

    roots::register(&COLLECTOR, scheduler, filter_warnings)?;
    let callback = COLLECTOR.push_other_roots.lock()
        .ok()
        .and_then(|slot| *slot)
        .context("Collector callback was not registered")?;

    let mut sleepers = Vec::new();
    for i in 0 .. tasks {
        // Alternate between tasks that run and tasks that sleep.
        let task = unsafe {
            if i % 2 == 0 {
                scheduler.spawn(busy, null_mut())?
            } else {
                scheduler.spawn(parked, null_mut())?
            }
        };
        if i % 2 == 1 {
            sleepers.push(task);
        }
    }

    while PARKED.load(SeqCst) != sleepers.len() {
        thread::yield_now();
    }

    let start = Instant::now();
    for _ in 0 .. cycles {
        callback();
        scheduler.resume_world();
    }
    let elapsed = start.elapsed();

    STOP.store(true, Relaxed);
    for task in &sleepers {
        task.unpark();
    }

    let deadline = Instant::now() + Duration::from_secs(10);
    while scheduler.live_tasks() != 1 {
        if Instant::now() > deadline {
            bail!("Tasks did not exit");
        }
        thread::sleep(Duration::from_millis(1));
    }

    println!("tasks:       {tasks}");
    println!("cycles:      {cycles}");
    println!("elapsed:     {elapsed:?}");
    println!("per cycle:   {:?}", elapsed / cycles.max(1) as u32);
    println!("ranges:      {}", COLLECTOR.ranges.load(Relaxed));
    println!("stack bytes: {}", COLLECTOR.bytes.load(Relaxed));
    println!("busy rounds: {}", ROUNDS.load(Relaxed));

    Ok(())
}
