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

//! Counting semaphore. `wait` and the timed variant are cancellation
//! points.

use super::wait::{park, plock, ParkHandle, ParkResult};
use crate::thread;
use crate::time::TimePoint;
use std::sync::{Arc, Mutex as StdMutex};

struct SemState {
    count: u32,
    waiters: Vec<Arc<ParkHandle>>,
}

pub struct Semaphore {
    state: StdMutex<SemState>,
}

impl Semaphore {
    /// Maximum counter value.
    pub const MAX: u32 = u32::MAX;

    pub fn new(initial: u32) -> Self {
        Self {
            state: StdMutex::new(SemState {
                count: initial,
                waiters: Vec::new(),
            }),
        }
    }

    /// Increments the counter and wakes one waiter.
    pub fn post(&self) {
        let handle = {
            let mut st = plock(&self.state);
            st.count = st
                .count
                .checked_add(1)
                .expect("Semaphore::post: counter overflow");
            st.waiters.pop()
        };
        if let Some(h) = handle {
            h.wake();
        }
    }

    /// Decrements the counter, blocking while it is zero. This is a
    /// cancellation point.
    pub fn wait(&self) {
        if !self.wait_internal(None) {
            unreachable!("untimed semaphore wait reported a timeout");
        }
    }

    /// Decrements the counter if it is non-zero right now.
    pub fn try_wait(&self) -> bool {
        let mut st = plock(&self.state);
        if st.count > 0 {
            st.count -= 1;
            true
        } else {
            false
        }
    }

    /// Like [`wait`](Self::wait), giving up at `deadline` (monotonic
    /// clock). Returns false iff the deadline fired. This is a cancellation
    /// point.
    pub fn wait_with_deadline(&self, deadline: TimePoint) -> bool {
        self.wait_internal(Some(deadline))
    }

    fn wait_internal(&self, deadline: Option<TimePoint>) -> bool {
        loop {
            let handle;
            {
                let mut st = plock(&self.state);
                if st.count > 0 {
                    st.count -= 1;
                    return true;
                }
                handle = ParkHandle::new();
                st.waiters.push(handle.clone());
            }

            let result = park(&handle, deadline, true);

            let mut st = plock(&self.state);
            st.waiters.retain(|h| !Arc::ptr_eq(h, &handle));
            match result {
                ParkResult::Woken => continue,
                ParkResult::TimedOut => {
                    // a post may have raced the timeout; the counter decides
                    if st.count > 0 {
                        st.count -= 1;
                        return true;
                    }
                    return false;
                }
                ParkResult::Cancelled => {
                    // pass a consumed post on to the next waiter
                    let next = if handle.was_woken() && st.count > 0 {
                        st.waiters.pop()
                    } else {
                        None
                    };
                    drop(st);
                    if let Some(h) = next {
                        h.wake();
                    }
                    thread::unwind_cancellation();
                }
            }
        }
    }
}
