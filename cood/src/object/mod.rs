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

//! Dictionary objects.
//!
//! An [`Object`] carries immutable metadata (name, sub-index layout,
//! access attributes) plus the native data image behind its own mutex. The
//! three object kinds share one metadata surface; read/write and complete
//! access follow the pattern permission check -> before-callback -> copy
//! with endianness normalization -> after-callback. Before-callbacks may
//! reject with an abort code and see the would-be data; after-write
//! callbacks run after the data is committed and therefore must not fail.

mod array;
mod record;
mod variable;

use crate::attributes::Attributes;
use crate::data_types::DataType;
use crate::sdo_abort::SdoAbortCode;
use blue_infra::stream::{StreamReader, StreamWriter};
use blue_infra::SharedString;
use blue_osal::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::sync::Arc;

pub use blue_infra::stream::RemainingBits;

/// CANopen object codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ObjectCode {
    Variable = 7,
    Array = 8,
    Record = 9,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectError {
    InvalidArgument(&'static str),
    DataTypeNotSupported(DataType),
}

impl fmt::Display for ObjectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectError::InvalidArgument(what) => write!(f, "invalid argument: {}", what),
            ObjectError::DataTypeNotSupported(dt) => {
                write!(f, "data type not supported here: {}", dt)
            }
        }
    }
}

impl std::error::Error for ObjectError {}

/// Callbacks delivered to the owner of an object.
///
/// The data mutex is not held during callback delivery; callbacks may
/// inspect the object's metadata but must not recursively access the same
/// object's data.
pub trait ObjectNotifiable: Send + Sync {
    /// Before data is read. `query_only` is set when only the actual size
    /// is being determined. Rejection aborts the read.
    fn on_before_read(
        &self,
        _object: &Object,
        _subindex: u8,
        _complete_access: bool,
        _query_only: bool,
    ) -> Result<(), SdoAbortCode> {
        Ok(())
    }

    /// Before data is written. `preview` is the native image that would be
    /// committed; `si0_value` carries the incoming SI0 on complete writes
    /// including SI0. Rejection rolls the write back.
    fn on_before_write(
        &self,
        _object: &Object,
        _subindex: u8,
        _complete_access: bool,
        _si0_value: u8,
        _preview: &[u8],
    ) -> Result<(), SdoAbortCode> {
        Ok(())
    }

    /// After data has been committed. Must not fail; a panic here takes the
    /// process down.
    fn on_after_write(&self, _object: &Object, _subindex: u8, _complete_access: bool) {}
}

/// Description of one RECORD subindex.
#[derive(Clone)]
pub struct SubIdxDescr {
    pub name: Option<SharedString>,
    pub ty: DataType,
    pub attributes: Attributes,
    /// Scalar: 1. String-like: declared element count. Gap: number of bits.
    /// Empty subindex: 0.
    pub n_elements: u16,
    pub byte_offset: usize,
    pub bit_offset: u8,
}

impl SubIdxDescr {
    pub fn new(
        name: &str,
        ty: DataType,
        attributes: Attributes,
        n_elements: u16,
        byte_offset: usize,
        bit_offset: u8,
    ) -> Self {
        Self {
            name: Some(SharedString::new(name)),
            ty,
            attributes,
            n_elements,
            byte_offset,
            bit_offset,
        }
    }

    /// A subindex reported as nonexistent, consuming no stream bits.
    pub fn empty() -> Self {
        Self {
            name: None,
            ty: DataType::Null,
            attributes: Attributes::empty(),
            n_elements: 0,
            byte_offset: 0,
            bit_offset: 0,
        }
    }

    /// A gap of `bits` stream bits, reading as zeros and ignoring writes.
    pub fn gap(name: &str, bits: u16) -> Self {
        Self {
            name: Some(SharedString::new(name)),
            ty: DataType::Null,
            attributes: Attributes::ACCESS_RW,
            n_elements: bits,
            byte_offset: 0,
            bit_offset: 0,
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.ty == DataType::Null && self.n_elements == 0
    }

    pub(crate) fn is_gap(&self) -> bool {
        self.ty == DataType::Null && self.n_elements != 0
    }
}

pub(crate) enum ObjectMeta {
    Variable(variable::VariableMeta),
    Array(array::ArrayMeta),
    Record(record::RecordMeta),
}

/// A dictionary object. Created detached; bound to an object dictionary by
/// registration.
pub struct Object {
    pub(crate) name: SharedString,
    pub(crate) index: AtomicU16,
    pub(crate) in_dictionary: AtomicBool,
    pub(crate) notifiable: Option<Arc<dyn ObjectNotifiable>>,
    pub(crate) meta: ObjectMeta,
    /// The native data image. Held while reading or writing native data.
    pub(crate) data: Mutex<Vec<u8>>,
}

impl Object {
    pub fn name(&self) -> &SharedString {
        &self.name
    }

    /// Index within the owning dictionary. Zero while detached.
    pub fn index(&self) -> u16 {
        self.index.load(Ordering::SeqCst)
    }

    pub(crate) fn bind_to_dictionary(&self, index: u16) -> bool {
        if self.in_dictionary.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.index.store(index, Ordering::SeqCst);
        true
    }

    pub fn object_code(&self) -> ObjectCode {
        match &self.meta {
            ObjectMeta::Variable(_) => ObjectCode::Variable,
            ObjectMeta::Array(_) => ObjectCode::Array,
            ObjectMeta::Record(_) => ObjectCode::Record,
        }
    }

    /// The data type announced for the object as a whole.
    pub fn object_data_type(&self) -> DataType {
        match &self.meta {
            ObjectMeta::Variable(m) => m.ty,
            ObjectMeta::Array(m) => m.element_ty,
            ObjectMeta::Record(_) => DataType::Domain,
        }
    }

    /// Largest number of subindices this object can report (incl. SI0 for
    /// ARRAY and RECORD objects).
    pub fn max_nb_of_subindices(&self) -> u16 {
        match &self.meta {
            ObjectMeta::Variable(_) => 1,
            ObjectMeta::Array(m) => m.max_elements as u16 + 1,
            ObjectMeta::Record(m) => m.si0 as u16 + 1,
        }
    }

    /// Current number of subindices (ARRAY objects shrink and grow with
    /// SI0).
    pub fn nb_of_subindices(&self) -> u16 {
        match &self.meta {
            ObjectMeta::Variable(_) => 1,
            ObjectMeta::Array(_) => self.array_si0() as u16 + 1,
            ObjectMeta::Record(m) => m.si0 as u16 + 1,
        }
    }

    pub fn is_subindex_empty(&self, subindex: u8) -> Result<bool, SdoAbortCode> {
        match &self.meta {
            ObjectMeta::Variable(_) => {
                if subindex == 0 {
                    Ok(false)
                } else {
                    Err(SdoAbortCode::SubindexDoesNotExist)
                }
            }
            ObjectMeta::Array(_) => {
                self.array_check_subindex(subindex)?;
                Ok(false)
            }
            ObjectMeta::Record(m) => {
                if subindex == 0 {
                    Ok(false)
                } else {
                    let descr = m
                        .descrs
                        .get(subindex as usize - 1)
                        .ok_or(SdoAbortCode::SubindexDoesNotExist)?;
                    Ok(descr.is_empty())
                }
            }
        }
    }

    pub fn subidx_data_type(&self, subindex: u8) -> Result<DataType, SdoAbortCode> {
        match &self.meta {
            ObjectMeta::Variable(m) => {
                if subindex == 0 {
                    Ok(m.ty)
                } else {
                    Err(SdoAbortCode::SubindexDoesNotExist)
                }
            }
            ObjectMeta::Array(m) => {
                if subindex == 0 {
                    Ok(DataType::Unsigned8)
                } else {
                    self.array_check_subindex(subindex)?;
                    Ok(m.element_ty)
                }
            }
            ObjectMeta::Record(m) => {
                if subindex == 0 {
                    Ok(DataType::Unsigned8)
                } else {
                    Ok(m.existing_descr(subindex)?.ty)
                }
            }
        }
    }

    pub fn subidx_attributes(&self, subindex: u8) -> Result<Attributes, SdoAbortCode> {
        match &self.meta {
            ObjectMeta::Variable(m) => {
                if subindex == 0 {
                    Ok(m.attributes)
                } else {
                    Err(SdoAbortCode::SubindexDoesNotExist)
                }
            }
            ObjectMeta::Array(m) => {
                if subindex == 0 {
                    Ok(m.si0_attributes)
                } else {
                    self.array_check_subindex(subindex)?;
                    Ok(m.element_attributes)
                }
            }
            ObjectMeta::Record(m) => {
                if subindex == 0 {
                    Ok(Attributes::ACCESS_RD)
                } else {
                    Ok(m.existing_descr(subindex)?.attributes)
                }
            }
        }
    }

    /// Maximum size of the subindex data in bits.
    pub fn subidx_max_size(&self, subindex: u8) -> Result<usize, SdoAbortCode> {
        match &self.meta {
            ObjectMeta::Variable(m) => {
                if subindex == 0 {
                    Ok(m.ty.bit_length_in_stream() * m.n_elements as usize)
                } else {
                    Err(SdoAbortCode::SubindexDoesNotExist)
                }
            }
            ObjectMeta::Array(m) => {
                if subindex == 0 {
                    Ok(8)
                } else {
                    self.array_check_subindex(subindex)?;
                    Ok(m.element_ty.bit_length_in_stream())
                }
            }
            ObjectMeta::Record(m) => {
                if subindex == 0 {
                    Ok(8)
                } else {
                    let d = m.existing_descr(subindex)?;
                    Ok(d.ty.bit_length_in_stream() * d.n_elements as usize)
                }
            }
        }
    }

    pub fn subidx_name(&self, subindex: u8) -> Result<String, SdoAbortCode> {
        match &self.meta {
            ObjectMeta::Variable(_) => {
                if subindex == 0 {
                    Ok(self.name.as_str().to_string())
                } else {
                    Err(SdoAbortCode::SubindexDoesNotExist)
                }
            }
            ObjectMeta::Array(_) => {
                if subindex == 0 {
                    Ok(String::from("Number of subindices"))
                } else {
                    self.array_check_subindex(subindex)?;
                    Ok(self.name.as_str().to_string())
                }
            }
            ObjectMeta::Record(m) => {
                if subindex == 0 {
                    Ok(String::from("Number of subindices"))
                } else {
                    let d = m.existing_descr(subindex)?;
                    Ok(d.name.as_ref().unwrap().as_str().to_string())
                }
            }
        }
    }

    /// Actual size of the subindex data in bits. For flexible-length types
    /// the owner is consulted through the before-read callback first.
    pub fn subidx_actual_size(&self, subindex: u8) -> Result<usize, SdoAbortCode> {
        match &self.meta {
            ObjectMeta::Variable(_) => self.variable_actual_size(subindex),
            ObjectMeta::Array(_) => self.array_actual_size(subindex),
            ObjectMeta::Record(_) => self.record_actual_size(subindex),
        }
    }

    /// Size of the whole object in a complete-access transfer, in bits.
    pub fn object_stream_size(&self, si0_16bit: bool) -> usize {
        let si0_bits = if si0_16bit { 16 } else { 8 };
        match &self.meta {
            ObjectMeta::Variable(m) => {
                m.ty.bit_length_in_stream() * m.n_elements as usize
            }
            ObjectMeta::Array(m) => {
                si0_bits
                    + m.element_ty.bit_length_in_stream() * self.array_si0() as usize
            }
            ObjectMeta::Record(m) => si0_bits + m.stream_size_bits,
        }
    }

    /// Reads one subindex in CANopen encoding into `w`.
    pub fn read(
        &self,
        subindex: u8,
        permissions: Attributes,
        w: &mut dyn StreamWriter,
    ) -> Result<(), SdoAbortCode> {
        match &self.meta {
            ObjectMeta::Variable(_) => self.variable_read(subindex, permissions, w),
            ObjectMeta::Array(_) => self.array_read(subindex, permissions, w),
            ObjectMeta::Record(_) => self.record_read(subindex, permissions, w),
        }
    }

    /// Writes one subindex from CANopen encoded data in `r`.
    pub fn write(
        &self,
        subindex: u8,
        permissions: Attributes,
        r: &mut dyn StreamReader,
    ) -> Result<(), SdoAbortCode> {
        match &self.meta {
            ObjectMeta::Variable(_) => self.variable_write(subindex, permissions, r),
            ObjectMeta::Array(_) => self.array_write(subindex, permissions, r),
            ObjectMeta::Record(_) => self.record_write(subindex, permissions, r),
        }
    }

    /// Reads the whole object (complete access).
    pub fn complete_read(
        &self,
        incl_si0: bool,
        si0_16bit: bool,
        permissions: Attributes,
        w: &mut dyn StreamWriter,
    ) -> Result<(), SdoAbortCode> {
        match &self.meta {
            ObjectMeta::Variable(_) => self.variable_complete_read(incl_si0, permissions, w),
            ObjectMeta::Array(_) => {
                self.array_complete_read(incl_si0, si0_16bit, permissions, w)
            }
            ObjectMeta::Record(_) => {
                self.record_complete_read(incl_si0, si0_16bit, permissions, w)
            }
        }
    }

    /// Writes the whole object (complete access).
    pub fn complete_write(
        &self,
        incl_si0: bool,
        si0_16bit: bool,
        permissions: Attributes,
        r: &mut dyn StreamReader,
        ernob: RemainingBits,
    ) -> Result<(), SdoAbortCode> {
        match &self.meta {
            ObjectMeta::Variable(_) => {
                self.variable_complete_write(incl_si0, permissions, r, ernob)
            }
            ObjectMeta::Array(_) => {
                self.array_complete_write(incl_si0, si0_16bit, permissions, r, ernob)
            }
            ObjectMeta::Record(_) => {
                self.record_complete_write(incl_si0, si0_16bit, permissions, r, ernob)
            }
        }
    }

    /// Runs `f` on the native data image under the object's data mutex.
    pub fn with_native_data<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        let guard = self.data.lock();
        f(&guard)
    }

    /// Runs `f` on the mutable native data image under the object's data
    /// mutex. The caller is responsible for keeping the image consistent.
    pub fn modify_native_data<R>(&self, f: impl FnOnce(&mut [u8]) -> R) -> R {
        let mut guard = self.data.lock();
        f(&mut guard)
    }

    pub(crate) fn notify_before_read(
        &self,
        subindex: u8,
        complete_access: bool,
        query_only: bool,
    ) -> Result<(), SdoAbortCode> {
        match &self.notifiable {
            Some(n) => n.on_before_read(self, subindex, complete_access, query_only),
            None => Ok(()),
        }
    }

    pub(crate) fn notify_before_write(
        &self,
        subindex: u8,
        complete_access: bool,
        si0_value: u8,
        preview: &[u8],
    ) -> Result<(), SdoAbortCode> {
        match &self.notifiable {
            Some(n) => n.on_before_write(self, subindex, complete_access, si0_value, preview),
            None => Ok(()),
        }
    }

    pub(crate) fn notify_after_write(&self, subindex: u8, complete_access: bool) {
        if let Some(n) = &self.notifiable {
            n.on_after_write(self, subindex, complete_access);
        }
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Object({:#06X} '{}' {:?})",
            self.index(),
            self.name,
            self.object_code()
        )
    }
}
