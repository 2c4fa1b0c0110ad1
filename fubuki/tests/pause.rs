//! Stopping and resuming the world while tasks are busy.

use {
    fubuki::{Config, Scheduler},
    std::{
        ffi::c_void,
        hint::black_box,
        ptr::null_mut,
        sync::{
            OnceLock,
            atomic::{AtomicBool, AtomicUsize, Ordering::SeqCst},
        },
        thread,
        time::{Duration, Instant},
    },
};

static SCHEDULER: OnceLock<&'static Scheduler> = OnceLock::new();
static STOP: AtomicBool = AtomicBool::new(false);
static CORRUPTIONS: AtomicUsize = AtomicUsize::new(0);
static PARKED: AtomicUsize = AtomicUsize::new(0);

#[test]
fn pause()
{
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let scheduler = Scheduler::init(Config::default()).unwrap();
    SCHEDULER.set(scheduler).ok().unwrap();

    alone_in_the_world(scheduler);
    interrupted_work_is_intact(scheduler);
}

fn alone_in_the_world(scheduler: &'static Scheduler)
{
    let local = 0usize;
    let local = black_box(&local) as *const usize as usize;

    let mut ranges = Vec::with_capacity(4);
    scheduler.stop_world_and_scan(|range| ranges.push(range));
    scheduler.resume_world();

    // The range covers the frames of the caller.
    assert_eq!(ranges.len(), 1);
    assert!(ranges[0].contains(local));

    // Resuming a running world does nothing.
    scheduler.resume_world();
    assert!(!scheduler.is_world_stopped());
}

/// Rewrite and check a buffer until told to stop.
unsafe extern "C" fn busy(_arg: *mut c_void)
{
    let mut buffer = [0u64; 256];
    let mut round = 0u64;
    while !STOP.load(SeqCst) {
        errno::set(4242);
        for (i, word) in buffer.iter_mut().enumerate() {
            *word = round ^ i as u64;
        }
        for (i, word) in black_box(&buffer).iter().enumerate() {
            if *word != round ^ i as u64 {
                CORRUPTIONS.fetch_add(1, SeqCst);
            }
        }
        if errno::get() != 4242 {
            CORRUPTIONS.fetch_add(1, SeqCst);
        }
        round = round.wrapping_add(1);
    }
}

unsafe extern "C" fn sleepy(_arg: *mut c_void)
{
    while !STOP.load(SeqCst) {
        thread::sleep(Duration::from_millis(1));
    }
}

unsafe extern "C" fn parked(_arg: *mut c_void)
{
    let scheduler = SCHEDULER.get().unwrap();
    PARKED.fetch_add(1, SeqCst);
    scheduler.park().unwrap();
}

fn interrupted_work_is_intact(scheduler: &'static Scheduler)
{
    unsafe {
        scheduler.spawn(busy, null_mut()).unwrap();
        scheduler.spawn(sleepy, null_mut()).unwrap();
    }
    let parked_task = unsafe { scheduler.spawn(parked, null_mut()) }.unwrap();

    while PARKED.load(SeqCst) == 0 {
        thread::yield_now();
    }

    let mut ranges = Vec::with_capacity(8);
    for _ in 0 .. 200 {
        ranges.clear();
        scheduler.stop_world_and_scan(|range| ranges.push(range));
        assert!(scheduler.is_world_stopped());

        // Scanning again while stopped reports the same tasks.
        let mut again = 0;
        scheduler.stop_world_and_scan(|_| again += 1);

        scheduler.resume_world();

        assert_eq!(ranges.len(), 4);
        assert_eq!(again, 4);
        assert!(ranges.iter().all(|range| !range.is_empty()));
    }

    STOP.store(true, SeqCst);
    parked_task.unpark();

    let deadline = Instant::now() + Duration::from_secs(10);
    while scheduler.live_tasks() != 1 {
        assert!(Instant::now() < deadline, "tasks did not exit");
        thread::sleep(Duration::from_millis(1));
    }

    assert_eq!(CORRUPTIONS.load(SeqCst), 0);
}

mod errno
{
    #[cfg(target_os = "linux")]
    fn location() -> *mut libc::c_int
    {
        unsafe { libc::__errno_location() }
    }

    #[cfg(target_os = "macos")]
    fn location() -> *mut libc::c_int
    {
        unsafe { libc::__error() }
    }

    pub fn set(value: libc::c_int)
    {
        unsafe { *location() = value; }
    }

    pub fn get() -> libc::c_int
    {
        unsafe { *location() }
    }
}
