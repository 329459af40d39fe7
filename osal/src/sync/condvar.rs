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

//! Condition variable bound to one specific mutex.
//!
//! Waits are cancellation points. Spurious wakeups are permitted; callers
//! re-check their predicate in a loop. A thread that unwinds due to
//! cancellation right after consuming a signal passes the signal on to the
//! next waiter.

use super::mutex::{Mutex, MutexGuard};
use super::wait::{park, plock, ParkHandle, ParkResult};
use crate::thread;
use crate::time::TimePoint;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

pub struct ConditionVariable {
    waiters: StdMutex<Vec<Arc<ParkHandle>>>,
    /// Address of the mutex this condition variable is bound to. Zero while
    /// no waiter is present; re-binding is allowed then.
    bound_mutex: AtomicUsize,
}

impl Default for ConditionVariable {
    fn default() -> Self {
        Self::new()
    }
}

impl ConditionVariable {
    pub fn new() -> Self {
        Self {
            waiters: StdMutex::new(Vec::new()),
            bound_mutex: AtomicUsize::new(0),
        }
    }

    /// Releases the mutex, waits for a signal, re-acquires the mutex.
    /// This is a cancellation point; on cancellation the mutex is *not*
    /// re-acquired (the guard has been consumed).
    pub fn wait<'a, T: ?Sized>(&self, guard: MutexGuard<'a, T>) -> MutexGuard<'a, T> {
        self.wait_internal(guard, None).0
    }

    /// Like [`wait`](Self::wait) with a deadline on the monotonic clock.
    /// The boolean is true iff the deadline fired.
    pub fn wait_with_timeout<'a, T: ?Sized>(
        &self,
        guard: MutexGuard<'a, T>,
        deadline: TimePoint,
    ) -> (MutexGuard<'a, T>, bool) {
        self.wait_internal(guard, Some(deadline))
    }

    fn wait_internal<'a, T: ?Sized>(
        &self,
        guard: MutexGuard<'a, T>,
        deadline: Option<TimePoint>,
    ) -> (MutexGuard<'a, T>, bool) {
        let mutex = guard.mutex;

        let handle = ParkHandle::new();
        {
            let mut waiters = plock(&self.waiters);
            let addr = mutex.state_addr();
            let bound = self.bound_mutex.load(Ordering::SeqCst);
            if waiters.is_empty() {
                self.bound_mutex.store(addr, Ordering::SeqCst);
            } else {
                assert_eq!(
                    bound, addr,
                    "ConditionVariable: waiting with a different mutex"
                );
            }
            waiters.push(handle.clone());
        }

        drop(guard);
        let result = park(&handle, deadline, true);
        plock(&self.waiters).retain(|h| !Arc::ptr_eq(h, &handle));

        // a concurrently consumed signal must not be lost
        if result != ParkResult::Woken && handle.was_woken() {
            self.signal();
        }

        if result == ParkResult::Cancelled {
            thread::unwind_cancellation();
        }

        let guard = mutex.lock();
        (guard, result == ParkResult::TimedOut)
    }

    /// Wakes at least one waiting thread.
    pub fn signal(&self) {
        let handle = {
            let mut waiters = plock(&self.waiters);
            waiters.pop()
        };
        if let Some(h) = handle {
            h.wake();
        }
    }

    /// Wakes all waiting threads.
    pub fn broadcast(&self) {
        let handles: Vec<_> = plock(&self.waiters).drain(..).collect();
        for h in handles {
            h.wake();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(not(feature = "tfc"))]
    #[test]
    fn test_signal_wakes_waiter() {
        let pair = Arc::new((Mutex::new(false), ConditionVariable::new()));
        let pair2 = pair.clone();

        let worker = std::thread::spawn(move || {
            let (m, cv) = &*pair2;
            let mut g = m.lock();
            while !*g {
                g = cv.wait(g);
            }
        });

        std::thread::sleep(std::time::Duration::from_millis(20));
        {
            let (m, cv) = &*pair;
            let mut g = m.lock();
            *g = true;
            cv.signal();
        }
        worker.join().unwrap();
    }

    #[cfg(not(feature = "tfc"))]
    #[test]
    fn test_broadcast_wakes_all() {
        let pair = Arc::new((Mutex::new(0u32), ConditionVariable::new()));
        let mut workers = Vec::new();
        for _ in 0..3 {
            let pair2 = pair.clone();
            workers.push(std::thread::spawn(move || {
                let (m, cv) = &*pair2;
                let mut g = m.lock();
                while *g == 0 {
                    g = cv.wait(g);
                }
            }));
        }

        std::thread::sleep(std::time::Duration::from_millis(20));
        {
            let (m, cv) = &*pair;
            *m.lock() = 1;
            cv.broadcast();
        }
        for w in workers {
            w.join().unwrap();
        }
    }

    #[cfg(not(feature = "tfc"))]
    #[test]
    fn test_timeout_fires() {
        use crate::time::TimeSpan;

        let m = Mutex::new(());
        let cv = ConditionVariable::new();
        let g = m.lock();
        let deadline = TimePoint::now_monotonic()
            .checked_add(TimeSpan::from_ms(30).unwrap())
            .unwrap();
        let (_g, timed_out) = cv.wait_with_timeout(g, deadline);
        assert!(timed_out);
    }
}
