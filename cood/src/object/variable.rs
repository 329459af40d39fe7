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

//! VARIABLE objects: one typed value on subindex 0 (a typed run of elements
//! for the string-like types and DOMAIN).

use super::{Object, ObjectError, ObjectMeta, ObjectNotifiable};
use crate::attributes::Attributes;
use crate::data_types::DataType;
use crate::encode;
use crate::sdo_abort::SdoAbortCode;
use blue_infra::stream::{
    RemainingBits, StreamError, StreamReader, StreamWriter,
};
use blue_infra::SharedString;
use blue_osal::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU16};
use std::sync::Arc;

pub(crate) struct VariableMeta {
    pub(crate) ty: DataType,
    pub(crate) n_elements: u16,
    pub(crate) attributes: Attributes,
}

impl Object {
    /// Creates a VARIABLE object.
    ///
    /// `n_elements` must be 1 for scalar types; the string-like types and
    /// DOMAIN take the declared element count. `initial` preloads the
    /// native image and must match its size exactly.
    pub fn new_variable(
        name: &str,
        ty: DataType,
        n_elements: u16,
        attributes: Attributes,
        initial: Option<&[u8]>,
        notifiable: Option<Arc<dyn ObjectNotifiable>>,
    ) -> Result<Object, ObjectError> {
        if ty == DataType::Null {
            return Err(ObjectError::DataTypeNotSupported(ty));
        }
        if !attributes.is_readable() && !attributes.is_writeable() {
            return Err(ObjectError::InvalidArgument(
                "subindex needs at least one access permission",
            ));
        }
        if ty.is_string_like() || ty == DataType::Domain {
            let max = 0xFFFE / ty.bit_length_in_stream() as u16;
            if n_elements == 0 || n_elements > max {
                return Err(ObjectError::InvalidArgument("'n_elements' out of range"));
            }
        } else if n_elements != 1 {
            return Err(ObjectError::InvalidArgument(
                "'n_elements' must be 1 for scalar types",
            ));
        }

        let size = encode::native_size(ty, n_elements);
        let image = match initial {
            None => vec![0; size],
            Some(data) => {
                if data.len() != size {
                    return Err(ObjectError::InvalidArgument(
                        "'initial' does not match the native size",
                    ));
                }
                data.to_vec()
            }
        };

        Ok(Object {
            name: SharedString::new(name),
            index: AtomicU16::new(0),
            in_dictionary: AtomicBool::new(false),
            notifiable,
            meta: ObjectMeta::Variable(VariableMeta {
                ty,
                n_elements,
                attributes,
            }),
            data: Mutex::new(image),
        })
    }

    fn variable_meta(&self) -> &VariableMeta {
        match &self.meta {
            ObjectMeta::Variable(m) => m,
            _ => unreachable!(),
        }
    }

    pub(super) fn variable_actual_size(&self, subindex: u8) -> Result<usize, SdoAbortCode> {
        if subindex != 0 {
            return Err(SdoAbortCode::SubindexDoesNotExist);
        }
        let m = self.variable_meta();
        if m.ty == DataType::VisibleString {
            self.notify_before_read(0, false, true)?;
        }
        let guard = self.data.lock();
        Ok(encode::determine_size_of_canopen_encoded_data(
            &guard,
            m.ty,
            m.n_elements,
        ))
    }

    pub(super) fn variable_read(
        &self,
        subindex: u8,
        permissions: Attributes,
        w: &mut dyn StreamWriter,
    ) -> Result<(), SdoAbortCode> {
        if subindex != 0 {
            return Err(SdoAbortCode::SubindexDoesNotExist);
        }
        let m = self.variable_meta();
        if !m.attributes.permits_read(permissions) {
            return Err(SdoAbortCode::AttemptToReadWrOnlyObject);
        }
        self.notify_before_read(0, false, false)?;

        let guard = self.data.lock();
        encode::native_data_to_canopen_encoded_data(&guard, m.ty, m.n_elements, false, w)
            .map_err(|_| SdoAbortCode::GeneralError)
    }

    pub(super) fn variable_write(
        &self,
        subindex: u8,
        permissions: Attributes,
        r: &mut dyn StreamReader,
    ) -> Result<(), SdoAbortCode> {
        if subindex != 0 {
            return Err(SdoAbortCode::SubindexDoesNotExist);
        }
        let m = self.variable_meta();
        if !m.attributes.permits_write(permissions) {
            return Err(SdoAbortCode::AttemptToWriteRdOnlyObject);
        }

        let mut preview = vec![0u8; encode::native_size(m.ty, m.n_elements)];
        decode_checked(r, m.ty, m.n_elements, false, &mut preview)?;
        ensure_consumed(r, RemainingBits::SevenOrLess)?;

        self.notify_before_write(0, false, 0, &preview)?;

        {
            let mut guard = self.data.lock();
            guard.copy_from_slice(&preview);
        }
        self.notify_after_write(0, false);
        Ok(())
    }

    pub(super) fn variable_complete_read(
        &self,
        _incl_si0: bool,
        permissions: Attributes,
        w: &mut dyn StreamWriter,
    ) -> Result<(), SdoAbortCode> {
        // a VARIABLE object has no SI0; complete access degenerates to
        // subindex 0 with full declared length
        let m = self.variable_meta();
        if !m.attributes.permits_read(permissions) {
            return Err(SdoAbortCode::AttemptToReadWrOnlyObject);
        }
        self.notify_before_read(0, true, false)?;

        let guard = self.data.lock();
        encode::native_data_to_canopen_encoded_data(&guard, m.ty, m.n_elements, true, w)
            .map_err(|_| SdoAbortCode::GeneralError)
    }

    pub(super) fn variable_complete_write(
        &self,
        _incl_si0: bool,
        permissions: Attributes,
        r: &mut dyn StreamReader,
        ernob: RemainingBits,
    ) -> Result<(), SdoAbortCode> {
        let m = self.variable_meta();
        if !m.attributes.permits_write(permissions) {
            return Err(SdoAbortCode::AttemptToWriteRdOnlyObject);
        }

        let mut preview = vec![0u8; encode::native_size(m.ty, m.n_elements)];
        decode_checked(r, m.ty, m.n_elements, true, &mut preview)?;
        ensure_consumed(r, ernob)?;

        self.notify_before_write(0, true, 0, &preview)?;

        {
            let mut guard = self.data.lock();
            guard.copy_from_slice(&preview);
        }
        self.notify_after_write(0, true);
        Ok(())
    }
}

pub(super) fn decode_checked(
    r: &mut dyn StreamReader,
    ty: DataType,
    n_elements: u16,
    complete_access: bool,
    native: &mut [u8],
) -> Result<(), SdoAbortCode> {
    encode::canopen_encoded_data_to_native_data(r, ty, n_elements, complete_access, native)
        .map_err(map_stream_error)
}

pub(super) fn ensure_consumed(
    r: &mut dyn StreamReader,
    policy: RemainingBits,
) -> Result<(), SdoAbortCode> {
    r.ensure_all_data_consumed(policy).map_err(map_stream_error)
}

pub(super) fn map_stream_error(e: StreamError) -> SdoAbortCode {
    match e {
        StreamError::Empty => SdoAbortCode::DataTypeMismatchTooSmall,
        StreamError::RemainingBits => SdoAbortCode::DataTypeMismatchTooLong,
        _ => SdoAbortCode::GeneralError,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blue_infra::stream::{Endian, MemStreamReader, VectorStreamWriter};

    fn rw_var(ty: DataType, n: u16, initial: &[u8]) -> Object {
        Object::new_variable(
            "test-var",
            ty,
            n,
            Attributes::ACCESS_RW,
            Some(initial),
            None,
        )
        .unwrap()
    }

    #[test]
    fn test_ctor_validation() {
        assert!(matches!(
            Object::new_variable("x", DataType::Null, 1, Attributes::ACCESS_RW, None, None),
            Err(ObjectError::DataTypeNotSupported(_))
        ));
        assert!(Object::new_variable(
            "x",
            DataType::Unsigned32,
            2,
            Attributes::ACCESS_RW,
            None,
            None
        )
        .is_err());
        assert!(Object::new_variable(
            "x",
            DataType::VisibleString,
            0,
            Attributes::ACCESS_RW,
            None,
            None
        )
        .is_err());
        assert!(Object::new_variable(
            "x",
            DataType::Unsigned8,
            1,
            Attributes::TXMAP,
            None,
            None
        )
        .is_err());
    }

    #[test]
    fn test_metadata() {
        let obj = rw_var(DataType::Unsigned16, 1, &0u16.to_ne_bytes());
        assert_eq!(obj.object_code(), super::super::ObjectCode::Variable);
        assert_eq!(obj.object_data_type(), DataType::Unsigned16);
        assert_eq!(obj.max_nb_of_subindices(), 1);
        assert_eq!(obj.subidx_max_size(0).unwrap(), 16);
        assert_eq!(
            obj.subidx_max_size(1),
            Err(SdoAbortCode::SubindexDoesNotExist)
        );
        assert_eq!(obj.subidx_data_type(0).unwrap(), DataType::Unsigned16);
    }

    #[test]
    fn test_read_encodes_little_endian() {
        let obj = rw_var(DataType::Unsigned16, 1, &0xABCDu16.to_ne_bytes());
        let mut w = VectorStreamWriter::new(Endian::Little);
        obj.read(0, Attributes::ACCESS_RD, &mut w).unwrap();
        assert_eq!(w.into_vec(), [0xCD, 0xAB]);
    }

    #[test]
    fn test_write_commits() {
        let obj = rw_var(DataType::Unsigned16, 1, &0u16.to_ne_bytes());
        let wire = [0x34u8, 0x12];
        let mut r = MemStreamReader::new(&wire, Endian::Little);
        obj.write(0, Attributes::ACCESS_WR, &mut r).unwrap();
        obj.with_native_data(|d| {
            assert_eq!(u16::from_ne_bytes([d[0], d[1]]), 0x1234);
        });
    }

    #[test]
    fn test_permission_denied() {
        let obj = Object::new_variable(
            "ro",
            DataType::Unsigned8,
            1,
            Attributes::ACCESS_RD,
            None,
            None,
        )
        .unwrap();
        let wire = [1u8];
        let mut r = MemStreamReader::new(&wire, Endian::Little);
        assert_eq!(
            obj.write(0, Attributes::ACCESS_WR, &mut r),
            Err(SdoAbortCode::AttemptToWriteRdOnlyObject)
        );

        let obj = Object::new_variable(
            "wo",
            DataType::Unsigned8,
            1,
            Attributes::ACCESS_WR,
            None,
            None,
        )
        .unwrap();
        let mut w = VectorStreamWriter::new(Endian::Little);
        assert_eq!(
            obj.read(0, Attributes::ACCESS_RD, &mut w),
            Err(SdoAbortCode::AttemptToReadWrOnlyObject)
        );
    }

    #[test]
    fn test_write_size_mismatch() {
        let obj = rw_var(DataType::Unsigned32, 1, &[0; 4]);

        // too short
        let wire = [1u8, 2];
        let mut r = MemStreamReader::new(&wire, Endian::Little);
        assert_eq!(
            obj.write(0, Attributes::ACCESS_WR, &mut r),
            Err(SdoAbortCode::DataTypeMismatchTooSmall)
        );

        // too long
        let wire = [1u8, 2, 3, 4, 5];
        let mut r = MemStreamReader::new(&wire, Endian::Little);
        assert_eq!(
            obj.write(0, Attributes::ACCESS_WR, &mut r),
            Err(SdoAbortCode::DataTypeMismatchTooLong)
        );

        // unchanged
        obj.with_native_data(|d| assert_eq!(d, [0; 4]));
    }

    #[test]
    fn test_before_write_rejection_rolls_back() {
        struct Reject;
        impl ObjectNotifiable for Reject {
            fn on_before_write(
                &self,
                _o: &Object,
                _s: u8,
                _c: bool,
                _v: u8,
                _p: &[u8],
            ) -> Result<(), SdoAbortCode> {
                Err(SdoAbortCode::ValueTooHigh)
            }
        }

        let obj = Object::new_variable(
            "guarded",
            DataType::Unsigned8,
            1,
            Attributes::ACCESS_RW,
            Some(&[7]),
            Some(Arc::new(Reject)),
        )
        .unwrap();

        let wire = [9u8];
        let mut r = MemStreamReader::new(&wire, Endian::Little);
        assert_eq!(
            obj.write(0, Attributes::ACCESS_WR, &mut r),
            Err(SdoAbortCode::ValueTooHigh)
        );
        obj.with_native_data(|d| assert_eq!(d, [7]));
    }

    #[test]
    fn test_visible_string_actual_size_and_read() {
        let mut initial = vec![0u8; 8];
        initial[..3].copy_from_slice(b"abc");
        let obj = rw_var(DataType::VisibleString, 8, &initial);

        assert_eq!(obj.subidx_actual_size(0).unwrap(), 24);
        assert_eq!(obj.subidx_max_size(0).unwrap(), 64);

        let mut w = VectorStreamWriter::new(Endian::Little);
        obj.read(0, Attributes::ACCESS_RD, &mut w).unwrap();
        assert_eq!(w.into_vec(), b"abc");
    }

    #[test]
    fn test_bool_variable_is_one_bit() {
        let obj = rw_var(DataType::Boolean, 1, &[1]);
        let mut w = VectorStreamWriter::new(Endian::Little);
        obj.read(0, Attributes::ACCESS_RD, &mut w).unwrap();
        w.align_to_byte_boundary(false).unwrap();
        assert_eq!(w.into_vec(), [0x01]);

        let wire = [0x00u8];
        let mut r = MemStreamReader::new(&wire, Endian::Little);
        obj.write(0, Attributes::ACCESS_WR, &mut r).unwrap();
        obj.with_native_data(|d| assert_eq!(d, [0]));
    }
}
