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

//! Read/write lock with writer preference and a raw acquire/release
//! surface.
//!
//! Once a writer is waiting, further readers block. Blocking acquires are
//! cancellation points; a cancelled acquire does not take the lock. Releases
//! of a lock that is not held panic, as does dropping the lock while it is
//! held. The raw surface (no guards) allows a lock to be handed between
//! threads, which the object-dictionary pointer type relies on.

use super::wait::{park, plock, ParkHandle, ParkResult};
use crate::thread;
use crate::time::TimePoint;
use std::sync::{Arc, Mutex as StdMutex};

struct RwState {
    readers: u32,
    writer: Option<usize>,
    writers_waiting: u32,
    read_queue: Vec<Arc<ParkHandle>>,
    write_queue: Vec<Arc<ParkHandle>>,
}

pub struct RwLock {
    state: StdMutex<RwState>,
}

impl Default for RwLock {
    fn default() -> Self {
        Self::new()
    }
}

fn current_key() -> usize {
    Arc::as_ptr(&thread::current_shared()) as usize
}

impl RwLock {
    pub fn new() -> Self {
        Self {
            state: StdMutex::new(RwState {
                readers: 0,
                writer: None,
                writers_waiting: 0,
                read_queue: Vec::new(),
                write_queue: Vec::new(),
            }),
        }
    }

    /// Acquires a read lock, blocking while a writer holds or awaits the
    /// lock. This is a cancellation point.
    pub fn read_lock(&self) {
        let acquired = self.read_lock_internal(None);
        debug_assert!(acquired);
    }

    /// Acquires a read lock if possible right now.
    pub fn try_read_lock(&self) -> bool {
        let mut st = plock(&self.state);
        if st.writer.is_none() && st.writers_waiting == 0 {
            st.readers = st
                .readers
                .checked_add(1)
                .expect("RwLock: too many read locks");
            true
        } else {
            false
        }
    }

    /// Acquires a read lock, giving up at `deadline` (monotonic clock).
    /// Returns false iff the deadline fired. This is a cancellation point.
    pub fn read_lock_until(&self, deadline: TimePoint) -> bool {
        self.read_lock_internal(Some(deadline))
    }

    fn read_lock_internal(&self, deadline: Option<TimePoint>) -> bool {
        loop {
            let handle;
            {
                let mut st = plock(&self.state);
                if st.writer.is_none() && st.writers_waiting == 0 {
                    st.readers = st
                        .readers
                        .checked_add(1)
                        .expect("RwLock: too many read locks");
                    return true;
                }
                handle = ParkHandle::new();
                st.read_queue.push(handle.clone());
            }

            let result = park(&handle, deadline, true);

            let mut st = plock(&self.state);
            st.read_queue.retain(|h| !Arc::ptr_eq(h, &handle));
            match result {
                ParkResult::Woken => continue,
                ParkResult::TimedOut => {
                    if st.writer.is_none() && st.writers_waiting == 0 {
                        st.readers = st
                            .readers
                            .checked_add(1)
                            .expect("RwLock: too many read locks");
                        return true;
                    }
                    return false;
                }
                ParkResult::Cancelled => {
                    drop(st);
                    thread::unwind_cancellation();
                }
            }
        }
    }

    /// Takes one more read lock for a caller that already holds one,
    /// bypassing writer preference (a blocked acquire here would dead-lock
    /// against the waiting writer). Panics if no read lock is held at all.
    pub fn read_lock_nested(&self) {
        let mut st = plock(&self.state);
        if st.readers == 0 {
            panic!("RwLock::read_lock_nested: no read lock held");
        }
        st.readers = st
            .readers
            .checked_add(1)
            .expect("RwLock: too many read locks");
    }

    /// Releases one read lock.
    pub fn read_unlock(&self) {
        let wake;
        {
            let mut st = plock(&self.state);
            if st.readers == 0 {
                panic!("RwLock::read_unlock: not read-locked");
            }
            st.readers -= 1;
            wake = if st.readers == 0 {
                std::mem::take(&mut st.write_queue)
            } else {
                Vec::new()
            };
        }
        for h in wake {
            h.wake();
        }
    }

    /// Acquires the write lock, blocking while readers or another writer
    /// hold the lock. This is a cancellation point.
    pub fn write_lock(&self) {
        let acquired = self.write_lock_internal(None);
        debug_assert!(acquired);
    }

    /// Acquires the write lock if possible right now.
    pub fn try_write_lock(&self) -> bool {
        let me = current_key();
        let mut st = plock(&self.state);
        if st.writer.is_none() && st.readers == 0 {
            st.writer = Some(me);
            true
        } else {
            false
        }
    }

    /// Acquires the write lock, giving up at `deadline` (monotonic clock).
    /// Returns false iff the deadline fired. This is a cancellation point.
    pub fn write_lock_until(&self, deadline: TimePoint) -> bool {
        self.write_lock_internal(Some(deadline))
    }

    fn write_lock_internal(&self, deadline: Option<TimePoint>) -> bool {
        let me = current_key();
        loop {
            let handle;
            {
                let mut st = plock(&self.state);
                if st.writer.is_none() && st.readers == 0 {
                    st.writer = Some(me);
                    return true;
                }
                handle = ParkHandle::new();
                st.write_queue.push(handle.clone());
                st.writers_waiting += 1;
            }

            let result = park(&handle, deadline, true);

            let mut st = plock(&self.state);
            st.writers_waiting -= 1;
            st.write_queue.retain(|h| !Arc::ptr_eq(h, &handle));
            match result {
                ParkResult::Woken => continue,
                ParkResult::TimedOut => {
                    if st.writer.is_none() && st.readers == 0 {
                        st.writer = Some(me);
                        return true;
                    }
                    let wake = self.wake_after_writer_left(&mut st);
                    drop(st);
                    for h in wake {
                        h.wake();
                    }
                    return false;
                }
                ParkResult::Cancelled => {
                    let wake = self.wake_after_writer_left(&mut st);
                    drop(st);
                    for h in wake {
                        h.wake();
                    }
                    thread::unwind_cancellation();
                }
            }
        }
    }

    // A waiting writer that gives up may have been the only reason readers
    // were held back.
    fn wake_after_writer_left(&self, st: &mut RwState) -> Vec<Arc<ParkHandle>> {
        if st.writers_waiting == 0 && st.writer.is_none() {
            std::mem::take(&mut st.read_queue)
        } else {
            Vec::new()
        }
    }

    /// Releases the write lock.
    pub fn write_unlock(&self) {
        let me = current_key();
        let wake;
        {
            let mut st = plock(&self.state);
            match st.writer {
                None => panic!("RwLock::write_unlock: not write-locked"),
                Some(owner) if owner != me => {
                    panic!("RwLock::write_unlock: not the writing thread")
                }
                Some(_) => st.writer = None,
            }
            // writers first; parked readers re-check writers_waiting anyway
            wake = if st.write_queue.is_empty() {
                std::mem::take(&mut st.read_queue)
            } else {
                std::mem::take(&mut st.write_queue)
            };
        }
        for h in wake {
            h.wake();
        }
    }

    /// Number of current read locks (introspection only).
    pub fn nb_of_readers(&self) -> u32 {
        plock(&self.state).readers
    }

    /// True if a writer currently holds the lock (introspection only).
    pub fn is_write_locked(&self) -> bool {
        plock(&self.state).writer.is_some()
    }
}

impl Drop for RwLock {
    fn drop(&mut self) {
        let st = plock(&self.state);
        if st.readers != 0 || st.writer.is_some() {
            panic!("RwLock::drop: lock still held");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

    #[test]
    fn test_multiple_readers() {
        let l = RwLock::new();
        l.read_lock();
        l.read_lock();
        assert_eq!(l.nb_of_readers(), 2);
        assert!(!l.try_write_lock());
        l.read_unlock();
        l.read_unlock();
        assert!(l.try_write_lock());
        l.write_unlock();
    }

    #[test]
    fn test_writer_excludes_readers() {
        let l = RwLock::new();
        l.write_lock();
        assert!(!l.try_read_lock());
        assert!(!l.try_write_lock());
        l.write_unlock();
        assert!(l.try_read_lock());
        l.read_unlock();
    }

    #[test]
    #[should_panic]
    fn test_read_unlock_unheld_panics() {
        let l = RwLock::new();
        l.read_unlock();
    }

    #[test]
    #[should_panic]
    fn test_write_unlock_unheld_panics() {
        let l = RwLock::new();
        l.write_unlock();
    }

    #[cfg(not(feature = "tfc"))]
    #[test]
    fn test_waiting_writer_blocks_new_readers() {
        let l = Arc::new(RwLock::new());
        l.read_lock();

        let l2 = l.clone();
        let got_write = Arc::new(AtomicBool::new(false));
        let gw = got_write.clone();
        let writer = std::thread::spawn(move || {
            l2.write_lock();
            gw.store(true, Ordering::SeqCst);
            l2.write_unlock();
        });

        // wait until the writer is queued
        while plock(&l.state).writers_waiting == 0 {
            std::thread::yield_now();
        }
        // writer preference: a new reader must not slip in
        assert!(!l.try_read_lock());
        assert!(!got_write.load(Ordering::SeqCst));

        l.read_unlock();
        writer.join().unwrap();
        assert!(got_write.load(Ordering::SeqCst));

        l.read_lock();
        l.read_unlock();
    }

    #[cfg(not(feature = "tfc"))]
    #[test]
    fn test_writer_exclusion_under_contention() {
        let l = Arc::new(RwLock::new());
        let value = Arc::new(AtomicU32::new(0));
        let mut handles = Vec::new();

        for _ in 0..3 {
            let l = l.clone();
            let value = value.clone();
            handles.push(std::thread::spawn(move || {
                for _ in 0..200 {
                    l.write_lock();
                    // no reader or second writer may observe the odd state
                    value.store(1, Ordering::SeqCst);
                    value.store(0, Ordering::SeqCst);
                    l.write_unlock();
                }
            }));
        }
        for _ in 0..3 {
            let l = l.clone();
            let value = value.clone();
            handles.push(std::thread::spawn(move || {
                for _ in 0..200 {
                    l.read_lock();
                    assert_eq!(value.load(Ordering::SeqCst), 0);
                    l.read_unlock();
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
    }

    #[cfg(not(feature = "tfc"))]
    #[test]
    fn test_random_reader_writer_mix() {
        use rand::{Rng, SeedableRng};

        let l = Arc::new(RwLock::new());
        let mut handles = Vec::new();
        for seed in 0..6u64 {
            let l = l.clone();
            handles.push(std::thread::spawn(move || {
                let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
                for _ in 0..500 {
                    if rng.gen_ratio(1, 5) {
                        l.write_lock();
                        assert_eq!(l.nb_of_readers(), 0);
                        l.write_unlock();
                    } else {
                        l.read_lock();
                        assert!(!l.is_write_locked());
                        l.read_unlock();
                    }
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(l.nb_of_readers(), 0);
        assert!(!l.is_write_locked());
    }

    #[cfg(not(feature = "tfc"))]
    #[test]
    fn test_timed_read_lock_gives_up() {
        use crate::time::TimeSpan;

        let l = Arc::new(RwLock::new());
        l.write_lock();
        let l2 = l.clone();
        let worker = std::thread::spawn(move || {
            let deadline = TimePoint::now_monotonic()
                .checked_add(TimeSpan::from_ms(30).unwrap())
                .unwrap();
            l2.read_lock_until(deadline)
        });
        assert!(!worker.join().unwrap());
        l.write_unlock();
    }
}
