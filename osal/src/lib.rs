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

//! Operating system abstraction: threads with deferred cancellation, blocking
//! synchronization primitives, monotonic/realtime time points, and named
//! read/write-lock registries.
//!
//! All blocking primitives funnel through one wait engine. With the `tfc`
//! feature enabled the engine resolves timed waits against a virtual
//! monotonic clock that only advances when every participating thread is
//! blocked, which makes timing-dependent tests deterministic and turns an
//! all-blocked-without-deadline situation into a `"Dead-Lock detected"`
//! panic.

pub mod resource;
pub mod sync;
pub mod thread;
pub mod time;

#[cfg(feature = "tfc")]
pub(crate) mod tfc;

pub use sync::{ConditionVariable, Mutex, MutexGuard, RwLock, Semaphore};
pub use thread::{JoinResult, SchedPolicy, Thread, ThreadError, ThreadReturn};
pub use time::{TimeError, TimePoint, TimeSpan};
