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

//! Infrastructure leaves shared by the rest of the workspace: portable bit
//! manipulation, containers, shared strings, scope guards and the binary
//! stream codecs.

pub mod bitfield;
pub mod bits;
pub mod guard;
pub mod list;
pub mod ramblock;
pub mod stream;
pub mod string;

pub use bitfield::BitField;
pub use guard::ScopeGuard;
pub use ramblock::{RamBlock, RandomAccessStorage, StorageError};
pub use string::SharedString;
