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

//! One hop of the reply path attached to remote-access messages.

use blue_infra::stream::{Result, StreamReader, StreamWriter};
use static_assertions::const_assert_eq;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReturnStackItem {
    id: u32,
    info: u32,
}

const_assert_eq!(ReturnStackItem::BINARY_SIZE, 8);

impl ReturnStackItem {
    /// On-wire size in bytes.
    pub const BINARY_SIZE: usize = 4 + 4;

    pub fn new(id: u32, info: u32) -> Self {
        Self { id, info }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn info(&self) -> u32 {
        self.info
    }

    pub fn to_binary(&self, w: &mut dyn StreamWriter) -> Result<()> {
        w.write_u32(self.id)?;
        w.write_u32(self.info)
    }

    pub fn from_binary(r: &mut dyn StreamReader) -> Result<Self> {
        Ok(Self {
            id: r.read_u32()?,
            info: r.read_u32()?,
        })
    }
}
