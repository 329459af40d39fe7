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

//! RAM-backed random access storage.
//!
//! [`RamBlock`] tracks a dirty flag: it is set on every successful write and
//! cleared only through explicit acknowledgment, which lets callers build
//! snapshot/commit schemes on top.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Address and/or length outside the storage.
    OutOfRange,
    /// Read-back after write did not match the written data.
    VerifyFailed,
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::OutOfRange => f.write_str("address out of range"),
            StorageError::VerifyFailed => f.write_str("write verification failed"),
        }
    }
}

impl std::error::Error for StorageError {}

/// Random access to a block of storage addressed in bytes.
pub trait RandomAccessStorage {
    /// Total size in bytes.
    fn size(&self) -> usize;

    /// Size of a page. Zero if the storage is not organized in pages.
    fn page_size(&self) -> usize;

    fn read(&self, address: usize, buffer: &mut [u8]) -> Result<(), StorageError>;

    fn write(&mut self, address: usize, data: &[u8]) -> Result<(), StorageError>;

    /// Writes and verifies by reading back.
    fn write_and_check(&mut self, address: usize, data: &[u8]) -> Result<(), StorageError> {
        self.write(address, data)?;
        let mut readback = vec![0u8; data.len()];
        self.read(address, &mut readback)?;
        if readback != data {
            return Err(StorageError::VerifyFailed);
        }
        Ok(())
    }
}

pub struct RamBlock {
    data: Vec<u8>,
    dirty: bool,
}

impl RamBlock {
    /// Creates a block of `size` bytes, zero-filled, not dirty.
    pub fn new(size: usize) -> Self {
        Self {
            data: vec![0; size],
            dirty: false,
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Acknowledges the current content; clears the dirty flag.
    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    pub fn fill(&mut self, value: u8) {
        self.data.fill(value);
        self.dirty = true;
    }

    /// Snapshot of the whole image. Does not touch the dirty flag.
    pub fn export(&self) -> Vec<u8> {
        self.data.clone()
    }

    /// Replaces the whole image. The image must have the block's size.
    pub fn import(&mut self, image: &[u8]) -> Result<(), StorageError> {
        if image.len() != self.data.len() {
            return Err(StorageError::OutOfRange);
        }
        self.data.copy_from_slice(image);
        self.dirty = true;
        Ok(())
    }

    fn check_range(&self, address: usize, len: usize) -> Result<(), StorageError> {
        if address > self.data.len() || len > self.data.len() - address {
            return Err(StorageError::OutOfRange);
        }
        Ok(())
    }
}

impl RandomAccessStorage for RamBlock {
    fn size(&self) -> usize {
        self.data.len()
    }

    fn page_size(&self) -> usize {
        0
    }

    fn read(&self, address: usize, buffer: &mut [u8]) -> Result<(), StorageError> {
        self.check_range(address, buffer.len())?;
        buffer.copy_from_slice(&self.data[address..address + buffer.len()]);
        Ok(())
    }

    fn write(&mut self, address: usize, data: &[u8]) -> Result<(), StorageError> {
        self.check_range(address, data.len())?;
        self.data[address..address + data.len()].copy_from_slice(data);
        self.dirty = true;
        Ok(())
    }
}
