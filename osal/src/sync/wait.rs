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

//! The wait engine.
//!
//! Every blocking primitive parks the calling thread on a fresh
//! [`ParkHandle`] and wakes peers by calling [`ParkHandle::wake`]. A waker
//! takes the handle's own lock before notifying, so a wakeup issued between
//! the waiter's last state check and its actual sleep cannot be lost.
//!
//! With the `tfc` feature the engine reports blocked/runnable transitions to
//! the virtual clock instead of using wall-clock timeouts.

use crate::thread::{self, ThreadShared};
use crate::time::TimePoint;
use std::sync::{Arc, Condvar, Mutex as StdMutex, MutexGuard as StdMutexGuard};

/// Lock that shrugs off poisoning: the panic that poisoned the mutex is
/// already unwinding somewhere else, suppressing work here would only hide
/// the original fault.
pub(crate) fn plock<T>(m: &StdMutex<T>) -> StdMutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ParkResult {
    /// Woken by a peer (or spuriously; callers re-check their predicate).
    Woken,
    /// The deadline was reached.
    TimedOut,
    /// A cancellation request is armed; the caller must clean up its wait
    /// queue and then unwind via `thread::unwind_cancellation`.
    Cancelled,
}

#[derive(Default)]
pub(crate) struct ParkFlags {
    woken: bool,
    timed_out: bool,
}

pub(crate) struct ParkHandle {
    flags: StdMutex<ParkFlags>,
    cv: Condvar,
}

impl ParkHandle {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            flags: StdMutex::new(ParkFlags::default()),
            cv: Condvar::new(),
        })
    }

    /// Wakes the parked thread (a hint; the woken thread re-checks its
    /// predicate).
    pub(crate) fn wake(&self) {
        #[cfg(feature = "tfc")]
        crate::tfc::on_wake(self as *const ParkHandle);

        let mut flags = plock(&self.flags);
        flags.woken = true;
        self.cv.notify_all();
    }

    /// Marks the virtual-clock deadline as reached.
    #[cfg(feature = "tfc")]
    pub(crate) fn wake_timed_out(&self) {
        let mut flags = plock(&self.flags);
        flags.timed_out = true;
        self.cv.notify_all();
    }

    /// True if a wakeup hint has been delivered. Used by primitives to pass
    /// a consumed signal on when the receiving thread unwinds due to
    /// cancellation.
    pub(crate) fn was_woken(&self) -> bool {
        plock(&self.flags).woken
    }
}

/// Parks the calling thread until woken, cancelled, or the deadline passes.
///
/// The handle must be freshly created for this wait and must already be
/// queued wherever the waker will look for it.
pub(crate) fn park(
    handle: &Arc<ParkHandle>,
    deadline: Option<TimePoint>,
    cancellation_point: bool,
) -> ParkResult {
    let shared = thread::current_shared();
    *plock(&shared.wait_site) = Some(handle.clone());
    let result = park_inner(&shared, handle, deadline, cancellation_point);
    *plock(&shared.wait_site) = None;
    result
}

#[cfg(not(feature = "tfc"))]
fn park_inner(
    shared: &Arc<ThreadShared>,
    handle: &Arc<ParkHandle>,
    deadline: Option<TimePoint>,
    cancellation_point: bool,
) -> ParkResult {
    let mut flags = plock(&handle.flags);
    loop {
        if cancellation_point && shared.is_cancel_armed() {
            return ParkResult::Cancelled;
        }
        if flags.woken {
            return ParkResult::Woken;
        }
        if flags.timed_out {
            return ParkResult::TimedOut;
        }
        match deadline {
            None => {
                flags = handle
                    .cv
                    .wait(flags)
                    .unwrap_or_else(|e| e.into_inner());
            }
            Some(d) => {
                let now = TimePoint::now_monotonic();
                if now >= d {
                    return ParkResult::TimedOut;
                }
                // never fails: now < d
                let remaining = d.checked_diff(now).unwrap_or(crate::time::TimeSpan::MAX);
                flags = handle
                    .cv
                    .wait_timeout(flags, remaining.to_duration())
                    .unwrap_or_else(|e| e.into_inner())
                    .0;
            }
        }
    }
}

#[cfg(feature = "tfc")]
fn park_inner(
    shared: &Arc<ThreadShared>,
    handle: &Arc<ParkHandle>,
    deadline: Option<TimePoint>,
    cancellation_point: bool,
) -> ParkResult {
    crate::tfc::ensure_registered(shared);

    // a deadline at or before the virtual now never blocks
    if let Some(d) = deadline {
        if TimePoint::now_monotonic() >= d {
            return ParkResult::TimedOut;
        }
    }

    let key = Arc::as_ptr(shared) as usize;
    crate::tfc::block(key, deadline, handle);

    let mut flags = plock(&handle.flags);
    let result = loop {
        if cancellation_point && shared.is_cancel_armed() {
            break ParkResult::Cancelled;
        }
        if flags.woken {
            break ParkResult::Woken;
        }
        if flags.timed_out {
            break ParkResult::TimedOut;
        }
        flags = handle.cv.wait(flags).unwrap_or_else(|e| e.into_inner());
    };
    drop(flags);

    crate::tfc::unblock(key);
    result
}
