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

//! Process-wide registry of [`Thread`](super::Thread) objects.
//!
//! Threads register on construction and deregister on destruction. The
//! registry is introspection only; no behavior depends on it.

use crate::sync::wait::plock;
use blue_infra::SharedString;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex as StdMutex, OnceLock};

struct Entry {
    id: u64,
    name: SharedString,
}

pub struct ThreadRegistry {
    entries: StdMutex<Vec<Entry>>,
    next_id: AtomicU64,
}

impl ThreadRegistry {
    fn new() -> Self {
        Self {
            entries: StdMutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub(crate) fn register(&self, name: SharedString) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut entries = plock(&self.entries);
        // keep sorted by name for stable listings
        let at = entries
            .partition_point(|e| e.name.as_str() <= name.as_str());
        entries.insert(at, Entry { id, name });
        id
    }

    pub(crate) fn deregister(&self, id: u64) {
        plock(&self.entries).retain(|e| e.id != id);
    }

    /// Number of registered `Thread` objects.
    pub fn nb_of_threads(&self) -> usize {
        plock(&self.entries).len()
    }

    /// Snapshot of all registered thread names, sorted.
    pub fn thread_names(&self) -> Vec<SharedString> {
        plock(&self.entries).iter().map(|e| e.name.clone()).collect()
    }
}

pub(crate) fn global() -> &'static ThreadRegistry {
    static REGISTRY: OnceLock<ThreadRegistry> = OnceLock::new();
    REGISTRY.get_or_init(ThreadRegistry::new)
}
