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

//! ARRAY objects: SI0 carries the current number of homogeneous elements
//! on subindices 1..=SI0. SI0 itself may be writeable, growing or
//! shrinking the visible part of the array up to the construction-time
//! maximum.

use super::variable::{decode_checked, ensure_consumed, map_stream_error};
use super::{Object, ObjectError, ObjectMeta, ObjectNotifiable};
use crate::attributes::Attributes;
use crate::data_types::DataType;
use crate::encode;
use crate::sdo_abort::SdoAbortCode;
use blue_infra::stream::{RemainingBits, StreamReader, StreamWriter};
use blue_infra::SharedString;
use blue_osal::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU16};
use std::sync::Arc;

pub(crate) struct ArrayMeta {
    pub(crate) element_ty: DataType,
    pub(crate) element_attributes: Attributes,
    pub(crate) si0_attributes: Attributes,
    pub(crate) max_elements: u8,
}

impl Object {
    /// Creates an ARRAY object with `si0_initial` populated elements and
    /// room for `max_elements`. The native image of all `max_elements`
    /// elements is allocated up front; `initial` preloads it.
    pub fn new_array(
        name: &str,
        si0_initial: u8,
        max_elements: u8,
        element_ty: DataType,
        element_attributes: Attributes,
        si0_attributes: Attributes,
        initial: Option<&[u8]>,
        notifiable: Option<Arc<dyn ObjectNotifiable>>,
    ) -> Result<Object, ObjectError> {
        if element_ty == DataType::Null || element_ty.is_string_like() {
            return Err(ObjectError::DataTypeNotSupported(element_ty));
        }
        if !element_attributes.is_readable() && !element_attributes.is_writeable() {
            return Err(ObjectError::InvalidArgument(
                "elements need at least one access permission",
            ));
        }
        if !si0_attributes.is_readable() {
            return Err(ObjectError::InvalidArgument("SI0 must be readable"));
        }
        if si0_initial > max_elements {
            return Err(ObjectError::InvalidArgument(
                "'si0_initial' exceeds 'max_elements'",
            ));
        }

        let esz = encode::native_element_size(element_ty);
        let size = max_elements as usize * esz;
        let mut image = vec![0u8; 1 + size];
        image[0] = si0_initial;
        if let Some(data) = initial {
            if data.len() != size {
                return Err(ObjectError::InvalidArgument(
                    "'initial' does not match the native size",
                ));
            }
            image[1..].copy_from_slice(data);
        }

        Ok(Object {
            name: SharedString::new(name),
            index: AtomicU16::new(0),
            in_dictionary: AtomicBool::new(false),
            notifiable,
            meta: ObjectMeta::Array(ArrayMeta {
                element_ty,
                element_attributes,
                si0_attributes,
                max_elements,
            }),
            data: Mutex::new(image),
        })
    }

    fn array_meta(&self) -> &ArrayMeta {
        match &self.meta {
            ObjectMeta::Array(m) => m,
            _ => unreachable!(),
        }
    }

    /// Current SI0 value.
    pub(super) fn array_si0(&self) -> u8 {
        self.data.lock()[0]
    }

    pub(super) fn array_check_subindex(&self, subindex: u8) -> Result<(), SdoAbortCode> {
        if subindex == 0 || subindex <= self.array_si0() {
            Ok(())
        } else {
            Err(SdoAbortCode::SubindexDoesNotExist)
        }
    }

    pub(super) fn array_actual_size(&self, subindex: u8) -> Result<usize, SdoAbortCode> {
        self.array_check_subindex(subindex)?;
        if subindex == 0 {
            Ok(8)
        } else {
            Ok(self.array_meta().element_ty.bit_length_in_stream())
        }
    }

    pub(super) fn array_read(
        &self,
        subindex: u8,
        permissions: Attributes,
        w: &mut dyn StreamWriter,
    ) -> Result<(), SdoAbortCode> {
        let m = self.array_meta();
        self.array_check_subindex(subindex)?;

        if subindex == 0 {
            if !m.si0_attributes.permits_read(permissions) {
                return Err(SdoAbortCode::AttemptToReadWrOnlyObject);
            }
            self.notify_before_read(0, false, false)?;
            let si0 = self.array_si0();
            return w.write_u8(si0).map_err(|_| SdoAbortCode::GeneralError);
        }

        if !m.element_attributes.permits_read(permissions) {
            return Err(SdoAbortCode::AttemptToReadWrOnlyObject);
        }
        self.notify_before_read(subindex, false, false)?;

        let guard = self.data.lock();
        // SI0 may have shrunk while the callback ran
        if subindex > guard[0] {
            return Err(SdoAbortCode::SubindexDoesNotExist);
        }
        let esz = encode::native_element_size(m.element_ty);
        let at = 1 + (subindex as usize - 1) * esz;
        encode::native_data_to_canopen_encoded_data(
            &guard[at..at + esz],
            m.element_ty,
            1,
            false,
            w,
        )
        .map_err(|_| SdoAbortCode::GeneralError)
    }

    pub(super) fn array_write(
        &self,
        subindex: u8,
        permissions: Attributes,
        r: &mut dyn StreamReader,
    ) -> Result<(), SdoAbortCode> {
        let m = self.array_meta();
        self.array_check_subindex(subindex)?;

        if subindex == 0 {
            if !m.si0_attributes.permits_write(permissions) {
                return Err(SdoAbortCode::AttemptToWriteRdOnlyObject);
            }
            let new_si0 = r.read_u8().map_err(map_stream_error)?;
            ensure_consumed(r, RemainingBits::SevenOrLess)?;
            if new_si0 > m.max_elements {
                return Err(SdoAbortCode::ValueTooHigh);
            }
            let preview = [new_si0];
            self.notify_before_write(0, false, 0, &preview)?;
            self.data.lock()[0] = new_si0;
            self.notify_after_write(0, false);
            return Ok(());
        }

        if !m.element_attributes.permits_write(permissions) {
            return Err(SdoAbortCode::AttemptToWriteRdOnlyObject);
        }

        let esz = encode::native_element_size(m.element_ty);
        let mut preview = vec![0u8; esz];
        decode_checked(r, m.element_ty, 1, false, &mut preview)?;
        ensure_consumed(r, RemainingBits::SevenOrLess)?;

        self.notify_before_write(subindex, false, 0, &preview)?;

        {
            let mut guard = self.data.lock();
            if subindex > guard[0] {
                return Err(SdoAbortCode::SubindexDoesNotExist);
            }
            let at = 1 + (subindex as usize - 1) * esz;
            guard[at..at + esz].copy_from_slice(&preview);
        }
        self.notify_after_write(subindex, false);
        Ok(())
    }

    pub(super) fn array_complete_read(
        &self,
        incl_si0: bool,
        si0_16bit: bool,
        permissions: Attributes,
        w: &mut dyn StreamWriter,
    ) -> Result<(), SdoAbortCode> {
        let m = self.array_meta();

        if incl_si0 && !m.si0_attributes.permits_read(permissions) {
            return Err(SdoAbortCode::AttemptToReadWrOnlyObject);
        }
        let elements_readable = m.element_attributes.is_readable();
        if elements_readable && !m.element_attributes.permits_read(permissions) {
            return Err(SdoAbortCode::AttemptToReadWrOnlyObject);
        }

        self.notify_before_read(if incl_si0 { 0 } else { 1 }, true, false)?;

        let guard = self.data.lock();
        let si0 = guard[0];

        let result = (|| {
            if incl_si0 {
                if si0_16bit {
                    w.write_u16(si0 as u16)?;
                } else {
                    w.write_u8(si0)?;
                }
            }
            if !elements_readable {
                // pure write-only elements read as zeros
                let bits = m.element_ty.bit_length_in_stream() * si0 as usize;
                if m.element_ty.is_bit_based() {
                    w.fill_bits(bits, false)?;
                } else {
                    w.fill_bytes(bits / 8, 0)?;
                }
                return Ok(());
            }
            let esz = encode::native_element_size(m.element_ty);
            encode::native_data_to_canopen_encoded_data(
                &guard[1..1 + si0 as usize * esz],
                m.element_ty,
                si0 as u16,
                true,
                w,
            )
        })();
        result.map_err(|_| SdoAbortCode::GeneralError)
    }

    pub(super) fn array_complete_write(
        &self,
        incl_si0: bool,
        si0_16bit: bool,
        permissions: Attributes,
        r: &mut dyn StreamReader,
        ernob: RemainingBits,
    ) -> Result<(), SdoAbortCode> {
        let m = self.array_meta();
        let current_si0 = self.array_si0();

        // SI0 is taken from the stream first; a later rejection discards
        // the scratch image, so nothing is committed early
        let new_si0 = if incl_si0 {
            let v = if si0_16bit {
                r.read_u16().map_err(map_stream_error)?
            } else {
                r.read_u8().map_err(map_stream_error)? as u16
            };
            if m.si0_attributes.permits_write(permissions) {
                if v > m.max_elements as u16 {
                    return Err(SdoAbortCode::ValueTooHigh);
                }
                v as u8
            } else {
                // SI0 not writeable: the provided value must match
                if v != current_si0 as u16 {
                    return Err(SdoAbortCode::UnsupportedAccessToObject);
                }
                current_si0
            }
        } else {
            current_si0
        };

        let elements_writeable = m.element_attributes.is_writeable();
        if elements_writeable
            && new_si0 > 0
            && !m.element_attributes.permits_write(permissions)
        {
            return Err(SdoAbortCode::AttemptToWriteRdOnlyObject);
        }

        let esz = encode::native_element_size(m.element_ty);
        let mut scratch = vec![0u8; new_si0 as usize * esz];
        if elements_writeable {
            decode_checked(r, m.element_ty, new_si0 as u16, true, &mut scratch)?;
        } else {
            // pure read-only elements: their stream bits are skipped
            let bits = m.element_ty.bit_length_in_stream() * new_si0 as usize;
            r.skip(bits).map_err(map_stream_error)?;
        }
        ensure_consumed(r, ernob)?;

        self.notify_before_write(
            if incl_si0 { 0 } else { 1 },
            true,
            if incl_si0 { new_si0 } else { 0 },
            &scratch,
        )?;

        {
            let mut guard = self.data.lock();
            guard[0] = new_si0;
            if elements_writeable {
                guard[1..1 + scratch.len()].copy_from_slice(&scratch);
            }
        }
        self.notify_after_write(if incl_si0 { 0 } else { 1 }, true);
        Ok(())
    }
}
