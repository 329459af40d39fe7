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

//! The object dictionary: an ordered, index-addressed container of objects
//! guarded by one registry-wide read/write lock.
//!
//! Lookups hand out [`ObjectPtr`] tokens which keep the registry read-lock
//! for their lifetime. Structural changes take the write lock, so they
//! block until every `ObjectPtr` is gone; under the `tfc` feature a forgotten
//! pointer therefore surfaces as a detected dead-lock instead of silent
//! corruption.

use crate::object::Object;
use blue_infra::ScopeGuard;
use blue_osal::RwLock;
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Deref;
use std::sync::{Arc, Mutex as StdMutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OdError {
    /// The index is already occupied.
    IndexAlreadyUsed,
}

impl fmt::Display for OdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OdError::IndexAlreadyUsed => f.write_str("index already used by another object"),
        }
    }
}

impl std::error::Error for OdError {}

struct OdCore {
    lock: RwLock,
    objects: StdMutex<BTreeMap<u16, Arc<Object>>>,
}

pub struct ObjectDictionary {
    core: Arc<OdCore>,
}

impl Default for ObjectDictionary {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectDictionary {
    pub fn new() -> Self {
        Self {
            core: Arc::new(OdCore {
                lock: RwLock::new(),
                objects: StdMutex::new(BTreeMap::new()),
            }),
        }
    }

    fn objects(&self) -> std::sync::MutexGuard<'_, BTreeMap<u16, Arc<Object>>> {
        self.core
            .objects
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    /// Adds `object` under `index`. Takes the registry write lock; blocks
    /// while any [`ObjectPtr`] is alive.
    pub fn add(&self, object: Object, index: u16) -> Result<(), OdError> {
        self.core.lock.write_lock();
        let _unlock = ScopeGuard::new(|| self.core.lock.write_unlock());

        let mut objects = self.objects();
        if objects.contains_key(&index) {
            return Err(OdError::IndexAlreadyUsed);
        }
        let bound = object.bind_to_dictionary(index);
        debug_assert!(bound, "freshly owned object was already registered");
        objects.insert(index, Arc::new(object));
        log::debug!("od: object {:#06X} added", index);
        Ok(())
    }

    /// Removes the object at `index`. Takes the registry write lock; blocks
    /// while any [`ObjectPtr`] is alive.
    pub fn remove(&self, index: u16) {
        self.core.lock.write_lock();
        let _unlock = ScopeGuard::new(|| self.core.lock.write_unlock());
        if self.objects().remove(&index).is_some() {
            log::debug!("od: object {:#06X} removed", index);
        }
    }

    /// Removes all objects. Takes the registry write lock.
    pub fn clear(&self) {
        self.core.lock.write_lock();
        let _unlock = ScopeGuard::new(|| self.core.lock.write_unlock());
        self.objects().clear();
    }

    pub fn nb_of_objects(&self) -> usize {
        self.core.lock.read_lock();
        let _unlock = ScopeGuard::new(|| self.core.lock.read_unlock());
        self.objects().len()
    }

    /// All occupied indices in ascending order.
    pub fn indices(&self) -> Vec<u16> {
        self.core.lock.read_lock();
        let _unlock = ScopeGuard::new(|| self.core.lock.read_unlock());
        self.objects().keys().copied().collect()
    }

    /// Looks up the object at `index`. The returned pointer keeps the
    /// registry read-locked.
    pub fn get_object(&self, index: u16) -> Option<ObjectPtr> {
        self.core.lock.read_lock();
        let object = self.objects().get(&index).cloned();
        match object {
            Some(object) => Some(ObjectPtr {
                core: self.core.clone(),
                object,
            }),
            None => {
                self.core.lock.read_unlock();
                None
            }
        }
    }

    /// The object with the lowest index.
    pub fn get_first_object(&self) -> Option<ObjectPtr> {
        self.core.lock.read_lock();
        let object = self
            .objects()
            .first_key_value()
            .map(|(_, obj)| obj.clone());
        match object {
            Some(object) => Some(ObjectPtr {
                core: self.core.clone(),
                object,
            }),
            None => {
                self.core.lock.read_unlock();
                None
            }
        }
    }
}

impl Drop for ObjectDictionary {
    fn drop(&mut self) {
        if self.core.lock.nb_of_readers() != 0 || self.core.lock.is_write_locked() {
            panic!("ObjectDictionary::drop: an ObjectPtr is still alive");
        }
    }
}

/// Ownership token for an object inside a dictionary.
///
/// Holds the dictionary's read lock; structural changes wait until every
/// token is dropped.
pub struct ObjectPtr {
    core: Arc<OdCore>,
    object: Arc<Object>,
}

impl ObjectPtr {
    /// Steps to the next populated index, releasing the token at the end
    /// of the dictionary. The held read lock is carried over to the new
    /// token, so no structural change can intervene.
    pub fn advance(self) -> Option<ObjectPtr> {
        let this = std::mem::ManuallyDrop::new(self);
        // Safety: 'this' is never dropped; both fields move out exactly once
        let (core, object) = unsafe {
            (
                std::ptr::read(&this.core),
                std::ptr::read(&this.object),
            )
        };

        let next = {
            let objects = core.objects.lock().unwrap_or_else(|e| e.into_inner());
            objects
                .range(object.index().wrapping_add(1)..)
                .next()
                .map(|(_, obj)| obj.clone())
        };
        drop(object);

        match next {
            Some(object) => Some(ObjectPtr { core, object }),
            None => {
                core.lock.read_unlock();
                None
            }
        }
    }
}

impl Clone for ObjectPtr {
    fn clone(&self) -> Self {
        // this thread already holds the read lock; writer preference must
        // not apply to the nested acquire
        self.core.lock.read_lock_nested();
        Self {
            core: self.core.clone(),
            object: self.object.clone(),
        }
    }
}

impl Deref for ObjectPtr {
    type Target = Object;

    fn deref(&self) -> &Object {
        &self.object
    }
}

impl Drop for ObjectPtr {
    fn drop(&mut self) {
        self.core.lock.read_unlock();
    }
}

impl fmt::Debug for ObjectPtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectPtr({:?})", *self.object)
    }
}
