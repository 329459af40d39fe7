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

//! Error-checking, non-recursive mutex.
//!
//! Relocking by the owning thread panics instead of dead-locking silently.
//! Locking is not a cancellation point.

use super::wait::{park, plock, ParkHandle, ParkResult};
use crate::thread;
use std::cell::UnsafeCell;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex as StdMutex};

struct MutexState {
    owner: Option<usize>,
    waiters: Vec<Arc<ParkHandle>>,
}

pub struct Mutex<T: ?Sized> {
    state: StdMutex<MutexState>,
    data: UnsafeCell<T>,
}

unsafe impl<T: ?Sized + Send> Send for Mutex<T> {}
unsafe impl<T: ?Sized + Send> Sync for Mutex<T> {}

fn current_key() -> usize {
    Arc::as_ptr(&thread::current_shared()) as usize
}

impl<T> Mutex<T> {
    pub fn new(data: T) -> Self {
        Self {
            state: StdMutex::new(MutexState {
                owner: None,
                waiters: Vec::new(),
            }),
            data: UnsafeCell::new(data),
        }
    }

    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }
}

impl<T: ?Sized> Mutex<T> {
    /// Acquires the mutex, blocking until it is free. Not a cancellation
    /// point.
    pub fn lock(&self) -> MutexGuard<'_, T> {
        let me = current_key();
        loop {
            let handle;
            {
                let mut st = plock(&self.state);
                match st.owner {
                    None => {
                        st.owner = Some(me);
                        return MutexGuard { mutex: self };
                    }
                    Some(owner) if owner == me => {
                        panic!("Mutex::lock: relock by owning thread");
                    }
                    Some(_) => {
                        handle = ParkHandle::new();
                        st.waiters.push(handle.clone());
                    }
                }
            }
            let _ = park(&handle, None, false);
            let mut st = plock(&self.state);
            st.waiters.retain(|h| !Arc::ptr_eq(h, &handle));
        }
    }

    /// Acquires the mutex if it is free right now. Returns `None` also for
    /// a relock attempt by the owning thread.
    pub fn try_lock(&self) -> Option<MutexGuard<'_, T>> {
        let me = current_key();
        let mut st = plock(&self.state);
        match st.owner {
            None => {
                st.owner = Some(me);
                Some(MutexGuard { mutex: self })
            }
            Some(_) => None,
        }
    }

    pub fn get_mut(&mut self) -> &mut T {
        self.data.get_mut()
    }

    fn unlock(&self) {
        let mut st = plock(&self.state);
        debug_assert!(st.owner.is_some());
        st.owner = None;
        let waiters: Vec<_> = st.waiters.drain(..).collect();
        drop(st);
        for w in waiters {
            w.wake();
        }
    }

    pub(crate) fn state_addr(&self) -> usize {
        &self.state as *const _ as usize
    }
}

impl<T: Default> Default for Mutex<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: ?Sized + core::fmt::Debug> core::fmt::Debug for Mutex<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self.try_lock() {
            Some(g) => write!(f, "Mutex {{ data: {:?} }}", &*g),
            None => write!(f, "Mutex {{ <locked> }}"),
        }
    }
}

pub struct MutexGuard<'a, T: ?Sized> {
    pub(crate) mutex: &'a Mutex<T>,
}

impl<T: ?Sized> Deref for MutexGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // Safety: the guard holds the mutex
        unsafe { &*self.mutex.data.get() }
    }
}

impl<T: ?Sized> DerefMut for MutexGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // Safety: the guard holds the mutex
        unsafe { &mut *self.mutex.data.get() }
    }
}

impl<T: ?Sized> Drop for MutexGuard<'_, T> {
    fn drop(&mut self) {
        self.mutex.unlock();
    }
}
