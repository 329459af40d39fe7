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

//! Shared immutable strings.
//!
//! Cloning shares the container (atomic reference count); assigning a new
//! value allocates a fresh container instead of mutating the shared one.

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

#[derive(Clone)]
pub struct SharedString {
    container: Arc<str>,
}

impl SharedString {
    pub fn new(s: &str) -> Self {
        Self {
            container: Arc::from(s),
        }
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.container
    }

    /// Replaces the referenced string. Other instances sharing the old
    /// container are unaffected.
    pub fn assign(&mut self, s: &str) {
        self.container = Arc::from(s);
    }

    /// Number of instances currently sharing the container.
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.container)
    }
}

impl From<String> for SharedString {
    fn from(s: String) -> Self {
        Self {
            container: Arc::from(s),
        }
    }
}

impl From<&str> for SharedString {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl Deref for SharedString {
    type Target = str;

    fn deref(&self) -> &str {
        &self.container
    }
}

impl AsRef<str> for SharedString {
    fn as_ref(&self) -> &str {
        &self.container
    }
}

impl PartialEq for SharedString {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for SharedString {}

impl PartialEq<str> for SharedString {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl PartialEq<&str> for SharedString {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

impl fmt::Display for SharedString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for SharedString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.as_str())
    }
}
