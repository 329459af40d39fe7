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

//! Blocking synchronization primitives.
//!
//! All of them suspend through the wait engine in [`wait`], which makes them
//! cancellation-aware and lets the `tfc` virtual clock account for every
//! blocked thread.

pub mod condvar;
pub mod mutex;
pub mod rwlock;
pub mod semaphore;
pub(crate) mod wait;

pub use condvar::ConditionVariable;
pub use mutex::{Mutex, MutexGuard};
pub use rwlock::RwLock;
pub use semaphore::Semaphore;
