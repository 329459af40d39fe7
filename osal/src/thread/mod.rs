// Copyright (c) 2025 vivo Mobile Communication Co., Ltd.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//       http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Thread management with deferred cancellation.
//!
//! A [`Thread`] owns at most one OS thread through the lifecycle
//! none -> starting -> running -> terminated -> joined -> none. Cancellation
//! is deferred: [`Thread::cancel`] latches a request which takes effect only
//! at cancellation points (blocking waits, sleeps,
//! [`test_for_cancellation`]). It is delivered as an unwinding sentinel that
//! releases everything on the stack; user code may intercept it with
//! `catch_unwind` only if it resumes the unwind afterwards. Any other
//! payload escaping the entry function aborts the process.

mod registry;

pub use registry::ThreadRegistry;

use crate::sync::wait::{park, plock, ParkHandle, ParkResult};
use crate::time::{TimePoint, TimeSpan};
use blue_infra::SharedString;
use log::{debug, warn};
use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex as StdMutex, Once};

/// Opaque value transported from the thread entry function to
/// [`Thread::join`].
pub type ThreadReturn = Option<Box<dyn Any + Send>>;

/// Sentinel payload unwinding a cancelled thread.
pub(crate) struct CancellationUnwind;

/// Sentinel payload unwinding a thread that called
/// [`Thread::terminate_now`].
pub(crate) struct TerminateUnwind(pub(crate) ThreadReturn);

/// Scheduling policies, mapped to the host scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedPolicy {
    /// Keep whatever the host gives new threads.
    Inherit,
    /// Standard round-robin time-sharing with dynamic priority.
    Other,
    /// Very low priority background execution.
    Idle,
    /// Time-sharing for CPU intensive batch work.
    Batch,
    /// Real-time FIFO with static priority.
    Fifo,
    /// Real-time round-robin with static priority.
    Rr,
}

/// Outcome of [`Thread::join`].
pub struct JoinResult {
    /// Value returned by the entry function or passed to
    /// [`Thread::terminate_now`]. `None` if the thread was cancelled.
    pub value: ThreadReturn,
    /// True if the thread ended through deferred cancellation.
    pub cancelled: bool,
}

#[derive(Debug)]
pub enum ThreadError {
    /// Operation not permitted in the current lifecycle state.
    WrongState,
    /// `join` called from the managed thread itself.
    JoinFromSelf,
    /// Priority outside the range permitted by the scheduling policy.
    InvalidPriority,
    /// The OS refused to create the thread.
    Spawn(std::io::Error),
}

impl fmt::Display for ThreadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThreadError::WrongState => f.write_str("operation not allowed in current thread state"),
            ThreadError::JoinFromSelf => f.write_str("a thread cannot join itself"),
            ThreadError::InvalidPriority => f.write_str("priority not valid for scheduling policy"),
            ThreadError::Spawn(e) => write!(f, "thread creation failed: {}", e),
        }
    }
}

impl std::error::Error for ThreadError {}

// thread run states published for introspection
const RS_STARTING: u8 = 0;
const RS_RUNNING: u8 = 1;
const RS_TERMINATED: u8 = 2;

/// State shared between a `Thread` object, its managed OS thread, and the
/// wait engine.
pub(crate) struct ThreadShared {
    pub(crate) name: SharedString,
    cancellation_pending: AtomicBool,
    cancelability_enabled: AtomicBool,
    run_state: AtomicU8,
    finished: AtomicBool,
    /// Where the thread is currently blocked; `cancel` wakes it through
    /// this.
    pub(crate) wait_site: StdMutex<Option<Arc<ParkHandle>>>,
    join_waiters: StdMutex<Vec<Arc<ParkHandle>>>,
    outcome: StdMutex<Option<(ThreadReturn, bool)>>,
}

impl ThreadShared {
    fn new(name: SharedString) -> Arc<Self> {
        Arc::new(Self {
            name,
            cancellation_pending: AtomicBool::new(false),
            cancelability_enabled: AtomicBool::new(true),
            run_state: AtomicU8::new(RS_STARTING),
            finished: AtomicBool::new(false),
            wait_site: StdMutex::new(None),
            join_waiters: StdMutex::new(Vec::new()),
            outcome: StdMutex::new(None),
        })
    }

    #[inline]
    pub(crate) fn is_cancel_armed(&self) -> bool {
        self.cancellation_pending.load(Ordering::SeqCst)
            && self.cancelability_enabled.load(Ordering::SeqCst)
    }
}

thread_local! {
    static CURRENT: RefCell<Option<Arc<ThreadShared>>> = const { RefCell::new(None) };
}

/// Shared state of the calling thread. Threads not created through
/// [`Thread`] get an anonymous record on first use.
pub(crate) fn current_shared() -> Arc<ThreadShared> {
    CURRENT.with(|c| {
        let mut slot = c.borrow_mut();
        if let Some(shared) = &*slot {
            return shared.clone();
        }
        let name = std::thread::current()
            .name()
            .map(SharedString::new)
            .unwrap_or_else(|| SharedString::new("<foreign>"));
        let shared = ThreadShared::new(name);
        shared.run_state.store(RS_RUNNING, Ordering::SeqCst);
        *slot = Some(shared.clone());
        shared
    })
}

/// Unwinds the calling thread due to a consumed cancellation request.
pub(crate) fn unwind_cancellation() -> ! {
    panic::panic_any(CancellationUnwind)
}

/// Terminates the calling thread if a cancellation request is pending and
/// cancelability is enabled. This is a cancellation point.
pub fn test_for_cancellation() {
    let shared = current_shared();
    if shared.is_cancel_armed() {
        unwind_cancellation();
    }
}

/// Suspends the calling thread for at least `ms` milliseconds. This is a
/// cancellation point.
pub fn sleep_ms(ms: u32) {
    sleep_span(TimeSpan::from_ms(ms as i64).unwrap_or(TimeSpan::MAX));
}

/// Suspends the calling thread for at least `ns` nanoseconds. This is a
/// cancellation point.
pub fn sleep_ns(ns: u32) {
    sleep_span(TimeSpan::from_ns(ns as i64));
}

fn sleep_span(span: TimeSpan) {
    let deadline = TimePoint::now_monotonic()
        .checked_add(span)
        .unwrap_or_else(|_| TimePoint::from_total_ns(i64::MAX as i128));
    let handle = ParkHandle::new();
    loop {
        match park(&handle, Some(deadline), true) {
            ParkResult::TimedOut => return,
            ParkResult::Cancelled => unwind_cancellation(),
            // a stray wake hint; keep sleeping until the deadline
            ParkResult::Woken => continue,
        }
    }
}

fn install_sentinel_panic_hook() {
    static HOOK: Once = Once::new();
    HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            // unwinding sentinels are part of normal thread termination
            if info.payload().downcast_ref::<CancellationUnwind>().is_some()
                || info.payload().downcast_ref::<TerminateUnwind>().is_some()
            {
                return;
            }
            previous(info);
        }));
    });
}

struct Inner {
    shared: Option<Arc<ThreadShared>>,
    os_handle: Option<std::thread::JoinHandle<()>>,
}

/// Creation and management of a single thread.
pub struct Thread {
    name: SharedString,
    /// Serializes `join` and protects the start/join race.
    /// Locking order: `join_mutex` -> `inner`.
    join_mutex: StdMutex<()>,
    inner: StdMutex<Inner>,
    registry_id: u64,
}

impl Thread {
    /// Lowest universal priority.
    pub const MIN_PRIORITY: u8 = 0;
    /// Highest universal priority.
    pub const MAX_PRIORITY: u8 = 31;

    /// Smallest stack size accepted by [`Thread::start`].
    pub fn min_stack_size() -> usize {
        16 * 1024
    }

    /// Stack size used when `stack_size` is zero.
    pub fn default_stack_size() -> usize {
        1024 * 1024
    }

    /// The process-wide thread registry.
    pub fn registry() -> &'static ThreadRegistry {
        registry::global()
    }

    /// The ID of the process.
    pub fn process_id() -> u32 {
        unsafe { libc::getpid() as u32 }
    }

    /// Suspends the calling thread for at least `ms` milliseconds. This is
    /// a cancellation point.
    pub fn sleep_ms(ms: u32) {
        sleep_ms(ms);
    }

    /// Suspends the calling thread for at least `ns` nanoseconds. This is
    /// a cancellation point.
    pub fn sleep_ns(ns: u32) {
        sleep_ns(ns);
    }

    pub fn new(name: &str) -> Self {
        let name = SharedString::new(name);
        let registry_id = registry::global().register(name.clone());
        Self {
            name,
            join_mutex: StdMutex::new(()),
            inner: StdMutex::new(Inner {
                shared: None,
                os_handle: None,
            }),
            registry_id,
        }
    }

    pub fn name(&self) -> &SharedString {
        &self.name
    }

    /// One-line description: name, state, pending cancellation. The name
    /// column is padded to `name_field_width`.
    pub fn info(&self, name_field_width: usize) -> String {
        let inner = plock(&self.inner);
        let (state, cancel) = match &inner.shared {
            None => ("no thread", false),
            Some(s) => {
                let st = match s.run_state.load(Ordering::SeqCst) {
                    RS_STARTING => "starting",
                    RS_RUNNING => "running",
                    _ => "terminated",
                };
                (st, s.cancellation_pending.load(Ordering::SeqCst))
            }
        };
        format!(
            "{:<width$} {:<10} {}",
            self.name.as_str(),
            state,
            if cancel { "cancel pending" } else { "-" },
            width = name_field_width
        )
    }

    /// True if the calling thread is the one managed by this object.
    pub fn is_it_me(&self) -> bool {
        let inner = plock(&self.inner);
        match &inner.shared {
            Some(shared) => CURRENT.with(|c| {
                c.borrow()
                    .as_ref()
                    .is_some_and(|cur| Arc::ptr_eq(cur, shared))
            }),
            None => false,
        }
    }

    /// Starts a new thread executing `entry`.
    ///
    /// Permitted only when no thread is managed (never started, or started
    /// and joined). `Fifo`/`Rr` accept priorities 0..=31, all other policies
    /// require priority 0. `stack_size` 0 selects
    /// [`Thread::default_stack_size`].
    pub fn start<F>(
        &self,
        entry: F,
        policy: SchedPolicy,
        priority: u8,
        stack_size: usize,
    ) -> Result<(), ThreadError>
    where
        F: FnOnce() -> ThreadReturn + Send + 'static,
    {
        match policy {
            SchedPolicy::Fifo | SchedPolicy::Rr => {
                if priority > Self::MAX_PRIORITY {
                    return Err(ThreadError::InvalidPriority);
                }
            }
            _ => {
                if priority != 0 {
                    return Err(ThreadError::InvalidPriority);
                }
            }
        }
        let stack_size = if stack_size == 0 {
            Self::default_stack_size()
        } else {
            stack_size.max(Self::min_stack_size())
        };

        install_sentinel_panic_hook();

        // the creator takes part in the virtual clock from here on, even if
        // it has not blocked yet
        #[cfg(feature = "tfc")]
        crate::tfc::ensure_registered(&current_shared());

        let mut inner = plock(&self.inner);
        if inner.shared.is_some() {
            return Err(ThreadError::WrongState);
        }

        let shared = ThreadShared::new(self.name.clone());

        // the new thread must be visible to the virtual clock before the
        // creator can block again
        #[cfg(feature = "tfc")]
        crate::tfc::register_thread(Arc::as_ptr(&shared) as usize);

        let trampoline_shared = shared.clone();
        let spawn_result = std::thread::Builder::new()
            .name(self.name.as_str().to_string())
            .stack_size(stack_size)
            .spawn(move || trampoline(trampoline_shared, policy, priority, Box::new(entry)));

        match spawn_result {
            Ok(handle) => {
                debug!("thread '{}' started", self.name);
                inner.shared = Some(shared);
                inner.os_handle = Some(handle);
                Ok(())
            }
            Err(e) => {
                #[cfg(feature = "tfc")]
                crate::tfc::deregister_thread(Arc::as_ptr(&shared) as usize);
                Err(ThreadError::Spawn(e))
            }
        }
    }

    /// Requests deferred cancellation of the managed thread. Idempotent;
    /// the request is never dropped.
    pub fn cancel(&self) -> Result<(), ThreadError> {
        let inner = plock(&self.inner);
        let shared = inner.shared.as_ref().ok_or(ThreadError::WrongState)?;
        shared.cancellation_pending.store(true, Ordering::SeqCst);
        if let Some(site) = plock(&shared.wait_site).as_ref() {
            site.wake();
        }
        Ok(())
    }

    /// Waits for the managed thread to terminate and retrieves its return
    /// value. This is a cancellation point.
    pub fn join(&self) -> Result<JoinResult, ThreadError> {
        let _join_guard = plock(&self.join_mutex);

        let shared = {
            let inner = plock(&self.inner);
            let shared = inner.shared.as_ref().ok_or(ThreadError::WrongState)?;
            let me = CURRENT.with(|c| {
                c.borrow()
                    .as_ref()
                    .is_some_and(|cur| Arc::ptr_eq(cur, shared))
            });
            if me {
                return Err(ThreadError::JoinFromSelf);
            }
            shared.clone()
        };

        while !shared.finished.load(Ordering::SeqCst) {
            let handle = ParkHandle::new();
            plock(&shared.join_waiters).push(handle.clone());
            if shared.finished.load(Ordering::SeqCst) {
                plock(&shared.join_waiters).retain(|h| !Arc::ptr_eq(h, &handle));
                break;
            }
            let result = park(&handle, None, true);
            plock(&shared.join_waiters).retain(|h| !Arc::ptr_eq(h, &handle));
            if result == ParkResult::Cancelled {
                unwind_cancellation();
            }
        }

        let mut inner = plock(&self.inner);
        if let Some(handle) = inner.os_handle.take() {
            // the thread has left its entry; this only reaps OS resources
            let _ = handle.join();
        }
        let (value, cancelled) = plock(&shared.outcome)
            .take()
            .expect("thread finished without outcome");
        inner.shared = None;
        debug!(
            "thread '{}' joined{}",
            self.name,
            if cancelled { " (cancelled)" } else { "" }
        );
        Ok(JoinResult { value, cancelled })
    }

    /// Enables or disables deferred cancellation for the calling thread.
    /// Returns the previous setting. Only the managed thread may call this.
    pub fn set_cancelability(&self, enable: bool) -> bool {
        assert!(
            self.is_it_me(),
            "Thread::set_cancelability: not called by the managed thread"
        );
        let shared = plock(&self.inner).shared.clone().unwrap();
        shared
            .cancelability_enabled
            .swap(enable, Ordering::SeqCst)
    }

    /// True if a cancellation request is pending, regardless of
    /// cancelability.
    pub fn is_cancellation_pending(&self) -> bool {
        let inner = plock(&self.inner);
        inner
            .shared
            .as_ref()
            .is_some_and(|s| s.cancellation_pending.load(Ordering::SeqCst))
    }

    /// Terminates the calling thread if cancellation is armed. Only the
    /// managed thread may call this. This is a cancellation point.
    pub fn test_for_cancellation(&self) {
        assert!(
            self.is_it_me(),
            "Thread::test_for_cancellation: not called by the managed thread"
        );
        test_for_cancellation();
    }

    /// Terminates the calling thread immediately, unwinding its stack.
    /// `value` is delivered through [`Thread::join`]. Only the managed
    /// thread may call this.
    pub fn terminate_now(&self, value: ThreadReturn) -> ! {
        assert!(
            self.is_it_me(),
            "Thread::terminate_now: not called by the managed thread"
        );
        panic::panic_any(TerminateUnwind(value))
    }
}

impl Drop for Thread {
    fn drop(&mut self) {
        let inner = plock(&self.inner);
        if inner.shared.is_some() {
            panic!("Thread::drop: thread '{}' not joined", self.name);
        }
        drop(inner);
        registry::global().deregister(self.registry_id);
    }
}

impl fmt::Debug for Thread {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Thread({})", self.name)
    }
}

fn trampoline(
    shared: Arc<ThreadShared>,
    policy: SchedPolicy,
    priority: u8,
    entry: Box<dyn FnOnce() -> ThreadReturn + Send>,
) {
    CURRENT.with(|c| *c.borrow_mut() = Some(shared.clone()));
    #[cfg(feature = "tfc")]
    crate::tfc::adopt_registration();

    apply_sched_policy(policy, priority, &shared.name);
    shared.run_state.store(RS_RUNNING, Ordering::SeqCst);

    let result = panic::catch_unwind(AssertUnwindSafe(entry));

    let (value, cancelled): (ThreadReturn, bool) = match result {
        Ok(v) => (v, false),
        Err(payload) => {
            if payload.downcast_ref::<CancellationUnwind>().is_some() {
                (None, true)
            } else {
                match payload.downcast::<TerminateUnwind>() {
                    Ok(t) => (t.0, false),
                    Err(_) => {
                        // invariant: nothing but the sentinels may leave the
                        // entry function
                        log::error!(
                            "thread '{}': uncaught panic left the entry function",
                            shared.name
                        );
                        std::process::abort();
                    }
                }
            }
        }
    };

    *plock(&shared.outcome) = Some((value, cancelled));
    shared.run_state.store(RS_TERMINATED, Ordering::SeqCst);
    shared.finished.store(true, Ordering::SeqCst);
    let waiters: Vec<_> = plock(&shared.join_waiters).drain(..).collect();
    for w in waiters {
        w.wake();
    }

    #[cfg(feature = "tfc")]
    crate::tfc::finish_thread(Arc::as_ptr(&shared) as usize);
}

fn apply_sched_policy(policy: SchedPolicy, priority: u8, name: &SharedString) {
    let native_policy = match policy {
        SchedPolicy::Inherit => return,
        SchedPolicy::Other => libc::SCHED_OTHER,
        SchedPolicy::Idle => libc::SCHED_IDLE,
        SchedPolicy::Batch => libc::SCHED_BATCH,
        SchedPolicy::Fifo => libc::SCHED_FIFO,
        SchedPolicy::Rr => libc::SCHED_RR,
    };

    let native_priority = unsafe {
        let min = libc::sched_get_priority_min(native_policy);
        let max = libc::sched_get_priority_max(native_policy);
        if min < 0 || max < min {
            0
        } else {
            min + ((max - min) * priority as i32) / Thread::MAX_PRIORITY as i32
        }
    };

    let param = libc::sched_param {
        sched_priority: native_priority,
    };
    let rc = unsafe { libc::pthread_setschedparam(libc::pthread_self(), native_policy, &param) };
    if rc != 0 {
        // typically EPERM for realtime policies without privilege
        warn!(
            "thread '{}': could not apply scheduling policy (errno {})",
            name, rc
        );
    }
}
