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

//! Flat registry of named read/write locks.
//!
//! An entry exists only while its resource is locked: it is created on the
//! first lock and removed when the last lock is released. The lock state is
//! one signed integer per entry: `-1` one writer, `0` free (never stored),
//! `> 0` number of readers.

use super::LockError;
use blue_infra::SharedString;

struct Entry {
    name: SharedString,
    locks: i32,
}

#[derive(Default)]
pub struct SmallDynamicNamedRwLock {
    entries: Vec<Entry>,
}

impl SmallDynamicNamedRwLock {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    fn find(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.name.as_str() == name)
    }

    /// Checks if a write lock could be acquired. Pure query.
    pub fn test_write(&self, name: &str) -> bool {
        !self.is_locked(name)
    }

    /// Tries to acquire a write lock. False if the resource is locked in
    /// any way.
    pub fn lock_write(&mut self, name: &str) -> Result<bool, LockError> {
        if name.is_empty() {
            return Err(LockError::InvalidName);
        }
        if self.find(name).is_some() {
            return Ok(false);
        }
        self.entries.push(Entry {
            name: SharedString::new(name),
            locks: -1,
        });
        Ok(true)
    }

    /// Releases a write lock.
    pub fn release_write(&mut self, name: &str) -> Result<(), LockError> {
        if name.is_empty() {
            return Err(LockError::InvalidName);
        }
        let idx = self.find(name).ok_or(LockError::NotLocked)?;
        if self.entries[idx].locks != -1 {
            return Err(LockError::NotLocked);
        }
        self.entries.swap_remove(idx);
        Ok(())
    }

    /// Checks if a read lock could be acquired. Pure query.
    pub fn test_read(&self, name: &str) -> bool {
        match self.find(name) {
            None => true,
            Some(idx) => self.entries[idx].locks > 0,
        }
    }

    /// Tries to acquire a read lock. False if a writer holds the resource.
    pub fn lock_read(&mut self, name: &str) -> Result<bool, LockError> {
        if name.is_empty() {
            return Err(LockError::InvalidName);
        }
        match self.find(name) {
            None => {
                self.entries.push(Entry {
                    name: SharedString::new(name),
                    locks: 1,
                });
                Ok(true)
            }
            Some(idx) => {
                let e = &mut self.entries[idx];
                if e.locks == -1 {
                    return Ok(false);
                }
                e.locks = e.locks.checked_add(1).ok_or(LockError::TooManyReadLocks)?;
                Ok(true)
            }
        }
    }

    /// Releases one read lock.
    pub fn release_read(&mut self, name: &str) -> Result<(), LockError> {
        if name.is_empty() {
            return Err(LockError::InvalidName);
        }
        let idx = self.find(name).ok_or(LockError::NotLocked)?;
        let e = &mut self.entries[idx];
        if e.locks < 1 {
            return Err(LockError::NotLocked);
        }
        e.locks -= 1;
        if e.locks == 0 {
            self.entries.swap_remove(idx);
        }
        Ok(())
    }

    /// True if the resource is locked in any way.
    pub fn is_locked(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    /// True if any resource is locked.
    pub fn any_locks(&self) -> bool {
        !self.entries.is_empty()
    }
}

impl Drop for SmallDynamicNamedRwLock {
    fn drop(&mut self) {
        if !self.entries.is_empty() {
            panic!("SmallDynamicNamedRwLock::drop: locks still registered");
        }
    }
}
