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

//! Time flow control: the virtual monotonic clock.
//!
//! The clock advances only when every participating thread is blocked in the
//! wait engine. The advance is exactly the minimum remaining deadline, so
//! the earliest waiter wakes and simultaneous deadlines fire at one logical
//! instant, all in zero wall-clock time. If every thread is blocked and no
//! finite deadline is left, the process cannot make progress anymore and the
//! core panics with `"Dead-Lock detected"`.
//!
//! Participants are all threads started through
//! [`Thread`](crate::thread::Thread) plus any foreign thread (e.g. the test
//! runner's) from its first blocking OSAL call on.

use crate::sync::wait::{plock, ParkHandle};
use crate::thread::ThreadShared;
use crate::time::TimePoint;
use std::cell::{Cell, RefCell};
use std::sync::{Arc, Mutex as StdMutex, OnceLock};

struct BlockedRec {
    key: usize,
    deadline_ns: Option<i128>,
    handle: Arc<ParkHandle>,
}

#[derive(Default)]
struct TfcState {
    vnow_ns: i128,
    nb_threads: usize,
    blocked: Vec<BlockedRec>,
}

fn state() -> &'static StdMutex<TfcState> {
    static CORE: OnceLock<StdMutex<TfcState>> = OnceLock::new();
    CORE.get_or_init(|| StdMutex::new(TfcState::default()))
}

/// Current virtual monotonic time.
pub(crate) fn now() -> TimePoint {
    TimePoint::from_total_ns(plock(state()).vnow_ns)
}

/// Adds a participant. Called by `Thread::start` *before* the OS thread is
/// spawned so the creator cannot outrun the bookkeeping.
pub(crate) fn register_thread(key: usize) {
    let mut st = plock(state());
    st.nb_threads += 1;
    log::debug!("tfc: participant added (key {:#x}), now {}", key, st.nb_threads);
}

pub(crate) fn deregister_thread(key: usize) {
    let mut st = plock(state());
    st.nb_threads -= 1;
    st.blocked.retain(|r| r.key != key);
    try_advance(&mut st);
}

/// Removes a participant from the thread-local teardown of a foreign
/// thread. The clock still advances if the remaining threads wait on a
/// deadline, but an all-blocked-without-deadline situation is not treated
/// as a dead-lock here: the simulation this thread took part in is over.
fn deregister_thread_quiet(key: usize) {
    let mut st = plock(state());
    st.nb_threads -= 1;
    st.blocked.retain(|r| r.key != key);
    if st.blocked.iter().any(|r| r.deadline_ns.is_some()) {
        try_advance(&mut st);
    }
}

thread_local! {
    static PARTICIPANT: Cell<bool> = const { Cell::new(false) };
    static FOREIGN_GUARD: RefCell<Option<ForeignGuard>> = const { RefCell::new(None) };
}

struct ForeignGuard {
    key: usize,
}

impl Drop for ForeignGuard {
    fn drop(&mut self) {
        deregister_thread_quiet(self.key);
    }
}

/// Marks the calling (managed) thread as already registered by its creator.
pub(crate) fn adopt_registration() {
    PARTICIPANT.with(|p| p.set(true));
}

/// Registers a foreign thread on its first blocking call. It stays a
/// participant until the thread exits.
pub(crate) fn ensure_registered(shared: &Arc<ThreadShared>) {
    PARTICIPANT.with(|p| {
        if !p.get() {
            let key = Arc::as_ptr(shared) as usize;
            register_thread(key);
            p.set(true);
            FOREIGN_GUARD.with(|g| *g.borrow_mut() = Some(ForeignGuard { key }));
        }
    });
}

/// Removes a participant at thread end. A dead-lock detected on this path
/// leaves no thread that could observe a panic, so the process is taken
/// down.
pub(crate) fn finish_thread(key: usize) {
    let result = std::panic::catch_unwind(|| deregister_thread(key));
    if result.is_err() {
        eprintln!("Dead-Lock detected");
        std::process::abort();
    }
}

/// Marks the calling thread blocked, with an optional virtual deadline.
/// May advance the clock; panics on a detected dead-lock.
pub(crate) fn block(key: usize, deadline: Option<TimePoint>, handle: &Arc<ParkHandle>) {
    let mut st = plock(state());
    debug_assert!(!st.blocked.iter().any(|r| r.key == key));
    st.blocked.push(BlockedRec {
        key,
        deadline_ns: deadline.map(|d| d.total_ns()),
        handle: handle.clone(),
    });
    try_advance(&mut st);
}

/// Marks the calling thread runnable again.
pub(crate) fn unblock(key: usize) {
    plock(state()).blocked.retain(|r| r.key != key);
}

/// A blocked thread is being woken by a peer; it counts as runnable from
/// this instant, not only when the OS schedules it.
pub(crate) fn on_wake(handle: *const ParkHandle) {
    plock(state())
        .blocked
        .retain(|r| Arc::as_ptr(&r.handle) != handle);
}

fn try_advance(st: &mut TfcState) {
    if st.nb_threads == 0 || st.blocked.len() < st.nb_threads {
        return;
    }

    let min = st.blocked.iter().filter_map(|r| r.deadline_ns).min();
    let Some(min) = min else {
        panic!("Dead-Lock detected");
    };

    if min > st.vnow_ns {
        log::debug!("tfc: clock advances by {} ns", min - st.vnow_ns);
        st.vnow_ns = min;
    }

    let vnow = st.vnow_ns;
    let mut i = 0;
    while i < st.blocked.len() {
        if st.blocked[i].deadline_ns.is_some_and(|d| d <= vnow) {
            let rec = st.blocked.swap_remove(i);
            rec.handle.wake_timed_out();
        } else {
            i += 1;
        }
    }
}
