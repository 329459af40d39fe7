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

//! Name-scoped read/write-lock bookkeeping.
//!
//! These registries only account locks, they never block. They are not
//! thread-safe; the owning subsystem serializes access.

mod hierarchic_rwlock;
mod named_rwlock;

pub use hierarchic_rwlock::HierarchicNamedRwLock;
pub use named_rwlock::SmallDynamicNamedRwLock;

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockError {
    /// Release of a lock that is not registered, or of the wrong kind.
    NotLocked,
    /// The reader count of an entry is saturated.
    TooManyReadLocks,
    /// The resource name is empty.
    InvalidName,
}

impl fmt::Display for LockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockError::NotLocked => f.write_str("resource is not locked that way"),
            LockError::TooManyReadLocks => f.write_str("no more read locks possible"),
            LockError::InvalidName => f.write_str("invalid resource name"),
        }
    }
}

impl std::error::Error for LockError {}
