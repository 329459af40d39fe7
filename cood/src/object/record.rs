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

//! RECORD objects: heterogeneous subindices mapped onto one native struct
//! image.
//!
//! The constructor validates every declared subindex against the image
//! size, including gap subindices that must restore byte alignment before
//! byte-typed neighbors. A complete write assembles the whole would-be
//! image in a scratch buffer, lets the before-write callback inspect it,
//! and only then commits; fields that are pure read-only keep their old
//! value.

use super::variable::{ensure_consumed, map_stream_error};
use super::{Object, ObjectError, ObjectMeta, ObjectNotifiable, SubIdxDescr};
use crate::attributes::Attributes;
use crate::data_types::DataType;
use crate::encode;
use crate::sdo_abort::SdoAbortCode;
use blue_infra::stream::{RemainingBits, StreamReader, StreamWriter};
use blue_infra::SharedString;
use blue_osal::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU16};
use std::sync::Arc;

pub(crate) struct RecordMeta {
    pub(crate) si0: u8,
    pub(crate) struct_size: usize,
    pub(crate) descrs: Vec<SubIdxDescr>,
    pub(crate) stream_size_bits: usize,
}

impl RecordMeta {
    pub(crate) fn existing_descr(&self, subindex: u8) -> Result<&SubIdxDescr, SdoAbortCode> {
        if subindex == 0 || subindex > self.si0 {
            return Err(SdoAbortCode::SubindexDoesNotExist);
        }
        let d = &self.descrs[subindex as usize - 1];
        if d.is_empty() {
            Err(SdoAbortCode::SubindexDoesNotExist)
        } else {
            Ok(d)
        }
    }
}

fn validate(
    si0: u8,
    struct_size: usize,
    descrs: &[SubIdxDescr],
) -> Result<usize, ObjectError> {
    if descrs.len() != si0 as usize {
        return Err(ObjectError::InvalidArgument(
            "number of descriptions does not match SI0",
        ));
    }

    let mut stream_size_bits = 0usize;
    let mut prev_was_gap = false;

    for d in descrs {
        if d.ty == DataType::Null {
            if d.n_elements == 0 {
                // empty subindex
                if d.name.is_some()
                    || !d.attributes.is_empty()
                    || d.byte_offset != 0
                    || d.bit_offset != 0
                {
                    return Err(ObjectError::InvalidArgument(
                        "invalid description of empty subindex",
                    ));
                }
                prev_was_gap = false;
            } else {
                // gap subindex
                if d.name.is_none()
                    || (!d.attributes.is_readable() && !d.attributes.is_writeable())
                    || d.byte_offset != 0
                    || d.bit_offset != 0
                {
                    return Err(ObjectError::InvalidArgument(
                        "invalid description of gap subindex",
                    ));
                }
                if prev_was_gap {
                    return Err(ObjectError::InvalidArgument("adjacent gap subindices"));
                }
                prev_was_gap = true;
                stream_size_bits += d.n_elements as usize;
            }
            continue;
        }

        // normal subindex
        if d.name.is_none() {
            return Err(ObjectError::InvalidArgument("subindex has no name"));
        }
        if !d.attributes.is_readable() && !d.attributes.is_writeable() {
            return Err(ObjectError::InvalidArgument(
                "subindex has no read or write permission",
            ));
        }

        let bits = d.ty.bit_length_in_stream();
        if d.ty.is_string_like() {
            if d.n_elements == 0 || d.n_elements as usize > 0xFFFE / bits {
                return Err(ObjectError::InvalidArgument(
                    "'n_elements' out of range for string-like subindex",
                ));
            }
        } else if d.n_elements != 1 {
            return Err(ObjectError::InvalidArgument(
                "'n_elements' must be 1 for scalar subindex",
            ));
        }

        if d.ty.is_native_bit_stuffed() {
            if d.bit_offset > 7 {
                return Err(ObjectError::InvalidArgument("invalid 'bit_offset'"));
            }
            let last_byte = d.byte_offset + (d.bit_offset as usize + bits + 7) / 8;
            if last_byte > struct_size {
                return Err(ObjectError::InvalidArgument(
                    "subindex data outside the native structure",
                ));
            }
        } else {
            if d.bit_offset != 0 {
                return Err(ObjectError::InvalidArgument("invalid 'bit_offset'"));
            }
            let nbytes = d.ty.bit_length_in_memory() / 8 * d.n_elements as usize;
            if d.byte_offset + nbytes > struct_size {
                return Err(ObjectError::InvalidArgument(
                    "subindex data outside the native structure",
                ));
            }
        }

        if d.ty.is_bit_based() {
            stream_size_bits += bits * d.n_elements as usize;
        } else {
            let padding = (8 - stream_size_bits % 8) % 8;
            if padding != 0 {
                if prev_was_gap {
                    return Err(ObjectError::InvalidArgument(
                        "gap subindex did not establish byte alignment",
                    ));
                }
                stream_size_bits += padding;
            }
            stream_size_bits += bits * d.n_elements as usize;
        }
        prev_was_gap = false;
    }

    Ok(stream_size_bits)
}

// LSB-aligned bit access into a stuffed native image.

fn read_stuffed_bits(image: &[u8], d: &SubIdxDescr) -> u8 {
    let nbits = d.ty.bit_length_in_stream();
    let mut bits = image[d.byte_offset] as u16;
    if d.bit_offset as usize + nbits > 8 {
        bits |= (image[d.byte_offset + 1] as u16) << 8;
    }
    ((bits >> d.bit_offset) & ((1 << nbits) - 1)) as u8
}

fn write_stuffed_bits(image: &mut [u8], d: &SubIdxDescr, new_bits: u8) {
    let nbits = d.ty.bit_length_in_stream();
    let mask = (1u16 << nbits) - 1;
    let mut cur = image[d.byte_offset] as u16;
    if d.bit_offset as usize + nbits > 8 {
        cur |= (image[d.byte_offset + 1] as u16) << 8;
    }
    cur &= !(mask << d.bit_offset);
    cur |= ((new_bits as u16) & mask) << d.bit_offset;
    image[d.byte_offset] = cur as u8;
    if d.bit_offset as usize + nbits > 8 {
        image[d.byte_offset + 1] = (cur >> 8) as u8;
    }
}

impl Object {
    /// Creates a RECORD object over a native struct image of
    /// `struct_size` bytes described subindex by subindex in `descrs`.
    pub fn new_record(
        name: &str,
        si0: u8,
        struct_size: usize,
        descrs: Vec<SubIdxDescr>,
        initial: Option<&[u8]>,
        notifiable: Option<Arc<dyn ObjectNotifiable>>,
    ) -> Result<Object, ObjectError> {
        let stream_size_bits = validate(si0, struct_size, &descrs)?;

        let image = match initial {
            None => vec![0; struct_size],
            Some(data) => {
                if data.len() != struct_size {
                    return Err(ObjectError::InvalidArgument(
                        "'initial' does not match 'struct_size'",
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
            meta: ObjectMeta::Record(RecordMeta {
                si0,
                struct_size,
                descrs,
                stream_size_bits,
            }),
            data: Mutex::new(image),
        })
    }

    fn record_meta(&self) -> &RecordMeta {
        match &self.meta {
            ObjectMeta::Record(m) => m,
            _ => unreachable!(),
        }
    }

    pub(super) fn record_actual_size(&self, subindex: u8) -> Result<usize, SdoAbortCode> {
        if subindex == 0 {
            return Ok(8);
        }
        let m = self.record_meta();
        let d = m.existing_descr(subindex)?;
        if d.ty == DataType::VisibleString {
            self.notify_before_read(subindex, false, true)?;
        }
        let guard = self.data.lock();
        Ok(encode::determine_size_of_canopen_encoded_data(
            &guard[d.byte_offset..],
            d.ty,
            d.n_elements,
        ))
    }

    pub(super) fn record_read(
        &self,
        subindex: u8,
        permissions: Attributes,
        w: &mut dyn StreamWriter,
    ) -> Result<(), SdoAbortCode> {
        let m = self.record_meta();
        if subindex > m.si0 {
            return Err(SdoAbortCode::SubindexDoesNotExist);
        }

        if subindex == 0 {
            if !permissions.intersects(Attributes::ACCESS_RD) {
                return Err(SdoAbortCode::AttemptToReadWrOnlyObject);
            }
            self.notify_before_read(0, false, false)?;
            return w.write_u8(m.si0).map_err(|_| SdoAbortCode::GeneralError);
        }

        let d = &m.descrs[subindex as usize - 1];
        if d.is_empty() {
            return Err(SdoAbortCode::SubindexDoesNotExist);
        }
        if !d.attributes.permits_read(permissions) {
            return Err(SdoAbortCode::AttemptToReadWrOnlyObject);
        }

        if d.is_gap() {
            return w
                .fill_bits(d.n_elements as usize, false)
                .map_err(|_| SdoAbortCode::GeneralError);
        }

        self.notify_before_read(subindex, false, false)?;

        let guard = self.data.lock();
        let result = if d.ty.is_native_bit_stuffed() {
            let bits = [read_stuffed_bits(&guard, d)];
            encode::native_data_to_canopen_encoded_data(&bits, d.ty, 1, false, w)
        } else {
            encode::native_data_to_canopen_encoded_data(
                &guard[d.byte_offset..],
                d.ty,
                d.n_elements,
                false,
                w,
            )
        };
        result.map_err(|_| SdoAbortCode::GeneralError)
    }

    pub(super) fn record_write(
        &self,
        subindex: u8,
        permissions: Attributes,
        r: &mut dyn StreamReader,
    ) -> Result<(), SdoAbortCode> {
        let m = self.record_meta();
        if subindex > m.si0 {
            return Err(SdoAbortCode::SubindexDoesNotExist);
        }
        if subindex == 0 {
            // SI0 of a RECORD is fixed
            return Err(SdoAbortCode::AttemptToWriteRdOnlyObject);
        }

        let d = &m.descrs[subindex as usize - 1];
        if d.is_empty() {
            return Err(SdoAbortCode::SubindexDoesNotExist);
        }
        if !d.attributes.permits_write(permissions) {
            return Err(SdoAbortCode::AttemptToWriteRdOnlyObject);
        }

        if d.is_gap() {
            // gap data is ignored, but its bits must be present
            r.skip(d.n_elements as usize).map_err(map_stream_error)?;
            return ensure_consumed(r, RemainingBits::SevenOrLess);
        }

        let nbytes = if d.ty.is_native_bit_stuffed() {
            1
        } else {
            encode::native_size(d.ty, d.n_elements)
        };
        let mut preview = vec![0u8; nbytes];
        encode::canopen_encoded_data_to_native_data(r, d.ty, d.n_elements, false, &mut preview)
            .map_err(map_stream_error)?;
        ensure_consumed(r, RemainingBits::SevenOrLess)?;

        self.notify_before_write(subindex, false, 0, &preview)?;

        {
            let mut guard = self.data.lock();
            if d.ty.is_native_bit_stuffed() {
                write_stuffed_bits(&mut guard, d, preview[0]);
            } else {
                guard[d.byte_offset..d.byte_offset + nbytes].copy_from_slice(&preview);
            }
        }
        self.notify_after_write(subindex, false);
        Ok(())
    }

    pub(super) fn record_complete_read(
        &self,
        incl_si0: bool,
        si0_16bit: bool,
        permissions: Attributes,
        w: &mut dyn StreamWriter,
    ) -> Result<(), SdoAbortCode> {
        let m = self.record_meta();

        if incl_si0 && !permissions.intersects(Attributes::ACCESS_RD) {
            return Err(SdoAbortCode::AttemptToReadWrOnlyObject);
        }
        for d in &m.descrs {
            if !d.is_empty()
                && d.attributes.is_readable()
                && !d.attributes.permits_read(permissions)
            {
                return Err(SdoAbortCode::AttemptToReadWrOnlyObject);
            }
        }

        self.notify_before_read(if incl_si0 { 0 } else { 1 }, true, false)?;

        let guard = self.data.lock();
        let result: Result<(), blue_infra::stream::StreamError> = (|| {
            if incl_si0 {
                if si0_16bit {
                    w.write_u16(m.si0 as u16)?;
                } else {
                    w.write_u8(m.si0)?;
                }
            }

            for d in &m.descrs {
                if d.is_empty() {
                    continue;
                }
                if d.is_gap() || !d.attributes.is_readable() {
                    // gaps and pure write-only subindices read as zeros
                    let nbits = d.ty.bit_length_in_stream() * d.n_elements as usize;
                    if d.ty.is_bit_based() {
                        w.fill_bits(nbits, false)?;
                    } else {
                        w.fill_bytes(nbits / 8, 0)?;
                    }
                } else if d.ty.is_native_bit_stuffed() {
                    let bits = [read_stuffed_bits(&guard, d)];
                    encode::native_data_to_canopen_encoded_data(&bits, d.ty, 1, true, w)?;
                } else {
                    encode::native_data_to_canopen_encoded_data(
                        &guard[d.byte_offset..],
                        d.ty,
                        d.n_elements,
                        true,
                        w,
                    )?;
                }
            }
            Ok(())
        })();
        result.map_err(|_| SdoAbortCode::GeneralError)
    }

    pub(super) fn record_complete_write(
        &self,
        incl_si0: bool,
        si0_16bit: bool,
        permissions: Attributes,
        r: &mut dyn StreamReader,
        ernob: RemainingBits,
    ) -> Result<(), SdoAbortCode> {
        let m = self.record_meta();

        // check permissions and find subindices whose data must survive
        let mut any_pure_ro = false;
        for d in &m.descrs {
            if d.is_empty() {
                continue;
            }
            if !d.attributes.is_writeable() {
                if !d.is_gap() {
                    any_pure_ro = true;
                }
            } else if !d.attributes.permits_write(permissions) {
                return Err(SdoAbortCode::AttemptToWriteRdOnlyObject);
            }
        }

        // assemble the would-be image
        let mut scratch = vec![0u8; m.struct_size];
        let parse_result: Result<(), SdoAbortCode> = (|| {
            if incl_si0 {
                // SI0 is read first; it is pure read-only here, so the
                // provided value must match
                let v = if si0_16bit {
                    r.read_u16().map_err(map_stream_error)?
                } else {
                    r.read_u8().map_err(map_stream_error)? as u16
                };
                if v != m.si0 as u16 {
                    return Err(SdoAbortCode::UnsupportedAccessToObject);
                }
            }

            for d in &m.descrs {
                if d.is_empty() {
                    continue;
                }
                if d.is_gap() {
                    r.skip(d.n_elements as usize).map_err(map_stream_error)?;
                } else if !d.attributes.is_writeable() {
                    // skip the stream bits of pure read-only subindices
                    let nbits = d.ty.bit_length_in_stream() * d.n_elements as usize;
                    if d.ty.is_bit_based() {
                        r.skip(nbits).map_err(map_stream_error)?;
                    } else {
                        // a byte read swallows the padding bits first
                        let _ = r.read_u8().map_err(map_stream_error)?;
                        r.skip(nbits - 8).map_err(map_stream_error)?;
                    }
                } else if d.ty.is_native_bit_stuffed() {
                    let mut bits = [0u8; 1];
                    encode::canopen_encoded_data_to_native_data(r, d.ty, 1, true, &mut bits)
                        .map_err(map_stream_error)?;
                    write_stuffed_bits(&mut scratch, d, bits[0]);
                } else {
                    let nbytes = encode::native_size(d.ty, d.n_elements);
                    encode::canopen_encoded_data_to_native_data(
                        r,
                        d.ty,
                        d.n_elements,
                        true,
                        &mut scratch[d.byte_offset..d.byte_offset + nbytes],
                    )
                    .map_err(map_stream_error)?;
                }
            }
            ensure_consumed(r, ernob)
        })();
        parse_result?;

        self.notify_before_write(
            if incl_si0 { 0 } else { 1 },
            true,
            if incl_si0 { m.si0 } else { 0 },
            &scratch,
        )?;

        {
            let mut guard = self.data.lock();
            if !any_pure_ro {
                guard.copy_from_slice(&scratch);
            } else {
                // commit field by field, keeping pure read-only data
                for d in &m.descrs {
                    if d.is_empty() || d.is_gap() || !d.attributes.is_writeable() {
                        continue;
                    }
                    if d.ty.is_native_bit_stuffed() {
                        let bits = read_stuffed_bits(&scratch, d);
                        write_stuffed_bits(&mut guard, d, bits);
                    } else {
                        let nbytes = encode::native_size(d.ty, d.n_elements);
                        guard[d.byte_offset..d.byte_offset + nbytes]
                            .copy_from_slice(&scratch[d.byte_offset..d.byte_offset + nbytes]);
                    }
                }
            }
        }
        self.notify_after_write(if incl_si0 { 0 } else { 1 }, true);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blue_infra::stream::{Endian, MemStreamReader, VectorStreamWriter};
    use std::sync::Mutex as StdMutex;

    // native image: { u16 a; u8 flags_bit0: 1; }
    fn s2_descrs(si2_attrs: Attributes) -> Vec<SubIdxDescr> {
        vec![
            SubIdxDescr::new("a", DataType::Unsigned16, Attributes::ACCESS_RW, 1, 0, 0),
            SubIdxDescr::new("b", DataType::Boolean, si2_attrs, 1, 2, 0),
        ]
    }

    #[test]
    fn test_ctor_validation() {
        // descr count mismatch
        assert!(Object::new_record("r", 3, 3, s2_descrs(Attributes::ACCESS_RD), None, None).is_err());
        // field outside the struct
        let bad = vec![SubIdxDescr::new(
            "a",
            DataType::Unsigned32,
            Attributes::ACCESS_RW,
            1,
            1,
            0,
        )];
        assert!(Object::new_record("r", 1, 4, bad, None, None).is_err());
        // missing name
        let mut d = SubIdxDescr::new("a", DataType::Unsigned8, Attributes::ACCESS_RW, 1, 0, 0);
        d.name = None;
        assert!(Object::new_record("r", 1, 1, vec![d], None, None).is_err());
        // no access permission
        let d = SubIdxDescr::new("a", DataType::Unsigned8, Attributes::BACKUP, 1, 0, 0);
        assert!(Object::new_record("r", 1, 1, vec![d], None, None).is_err());
        // invalid bit offset for byte-typed field
        let d = SubIdxDescr::new("a", DataType::Unsigned8, Attributes::ACCESS_RW, 1, 0, 3);
        assert!(Object::new_record("r", 1, 2, vec![d], None, None).is_err());
        // adjacent gaps
        let descrs = vec![
            SubIdxDescr::gap("gap1", 4),
            SubIdxDescr::gap("gap2", 4),
        ];
        assert!(Object::new_record("r", 2, 1, descrs, None, None).is_err());
        // gap not restoring byte alignment before a byte-typed field
        let descrs = vec![
            SubIdxDescr::new("flag", DataType::Boolean, Attributes::ACCESS_RW, 1, 0, 0),
            SubIdxDescr::gap("gap", 3),
            SubIdxDescr::new("x", DataType::Unsigned8, Attributes::ACCESS_RW, 1, 1, 0),
        ];
        assert!(Object::new_record("r", 3, 2, descrs, None, None).is_err());
        // the same layout with a full padding gap is fine
        let descrs = vec![
            SubIdxDescr::new("flag", DataType::Boolean, Attributes::ACCESS_RW, 1, 0, 0),
            SubIdxDescr::gap("gap", 7),
            SubIdxDescr::new("x", DataType::Unsigned8, Attributes::ACCESS_RW, 1, 1, 0),
        ];
        assert!(Object::new_record("r", 3, 2, descrs, None, None).is_ok());
    }

    #[test]
    fn test_metadata() {
        let obj = Object::new_record("rec", 2, 3, s2_descrs(Attributes::ACCESS_RD), None, None)
            .unwrap();
        assert_eq!(obj.object_code(), super::super::ObjectCode::Record);
        assert_eq!(obj.object_data_type(), DataType::Domain);
        assert_eq!(obj.nb_of_subindices(), 3);
        assert_eq!(obj.subidx_data_type(0).unwrap(), DataType::Unsigned8);
        assert_eq!(obj.subidx_data_type(1).unwrap(), DataType::Unsigned16);
        assert_eq!(obj.subidx_data_type(2).unwrap(), DataType::Boolean);
        assert_eq!(obj.subidx_name(2).unwrap(), "b");
        assert_eq!(obj.subidx_attributes(0).unwrap(), Attributes::ACCESS_RD);
        // 16 bits for 'a', 1 bit for 'b'
        assert_eq!(obj.object_stream_size(false), 8 + 17);
        assert_eq!(obj.object_stream_size(true), 16 + 17);
    }

    struct CallbackLog {
        after_writes: StdMutex<Vec<(u8, bool)>>,
    }

    impl ObjectNotifiable for CallbackLog {
        fn on_after_write(&self, _o: &Object, subindex: u8, complete_access: bool) {
            self.after_writes
                .lock()
                .unwrap()
                .push((subindex, complete_access));
        }
    }

    #[test]
    fn test_single_write_with_callbacks() {
        let log = Arc::new(CallbackLog {
            after_writes: StdMutex::new(Vec::new()),
        });
        let obj = Object::new_record(
            "rec",
            2,
            3,
            s2_descrs(Attributes::ACCESS_RD),
            None,
            Some(log.clone()),
        )
        .unwrap();

        let wire = [0xCDu8, 0xAB];
        let mut r = MemStreamReader::new(&wire, Endian::Little);
        obj.write(1, Attributes::WR_PREOP | Attributes::ACCESS_RD, &mut r)
            .unwrap();

        obj.with_native_data(|d| {
            assert_eq!(u16::from_ne_bytes([d[0], d[1]]), 0xABCD);
            assert_eq!(d[2] & 1, 0);
        });
        assert_eq!(*log.after_writes.lock().unwrap(), [(1u8, false)]);
    }

    #[test]
    fn test_write_read_only_subindex() {
        let obj = Object::new_record("rec", 2, 3, s2_descrs(Attributes::ACCESS_RD), None, None)
            .unwrap();
        let wire = [0x01u8];
        let mut r = MemStreamReader::new(&wire, Endian::Little);
        assert_eq!(
            obj.write(2, Attributes::ACCESS_RW, &mut r),
            Err(SdoAbortCode::AttemptToWriteRdOnlyObject)
        );
        // SI0 is never writeable
        let mut r = MemStreamReader::new(&wire, Endian::Little);
        assert_eq!(
            obj.write(0, Attributes::ACCESS_RW, &mut r),
            Err(SdoAbortCode::AttemptToWriteRdOnlyObject)
        );
    }

    #[test]
    fn test_stuffed_bit_read_write() {
        let obj = Object::new_record("rec", 2, 3, s2_descrs(Attributes::ACCESS_RW), None, None)
            .unwrap();

        let wire = [0x01u8];
        let mut r = MemStreamReader::new(&wire, Endian::Little);
        obj.write(2, Attributes::ACCESS_WR, &mut r).unwrap();
        obj.with_native_data(|d| assert_eq!(d[2] & 1, 1));

        let mut w = VectorStreamWriter::new(Endian::Little);
        obj.read(2, Attributes::ACCESS_RD, &mut w).unwrap();
        w.align_to_byte_boundary(false).unwrap();
        assert_eq!(w.into_vec(), [0x01]);
    }

    #[test]
    fn test_complete_read_layout() {
        let mut image = [0u8; 3];
        image[..2].copy_from_slice(&0x1234u16.to_ne_bytes());
        image[2] = 1;
        let obj = Object::new_record(
            "rec",
            2,
            3,
            s2_descrs(Attributes::ACCESS_RD),
            Some(&image),
            None,
        )
        .unwrap();

        let mut w = VectorStreamWriter::new(Endian::Little);
        obj.complete_read(true, false, Attributes::ACCESS_RD, &mut w)
            .unwrap();
        w.align_to_byte_boundary(false).unwrap();
        // SI0, 'a' little-endian, 'b' as one bit
        assert_eq!(w.into_vec(), [2, 0x34, 0x12, 0x01]);
    }

    #[test]
    fn test_complete_write_preserves_read_only_fields() {
        let mut image = [0u8; 3];
        image[..2].copy_from_slice(&0xFFFFu16.to_ne_bytes());
        image[2] = 1; // the RO bit is set
        let obj = Object::new_record(
            "rec",
            2,
            3,
            s2_descrs(Attributes::ACCESS_RD),
            Some(&image),
            None,
        )
        .unwrap();

        // write SI0=2, a=0xABCD, b=0 (attempted, but b is pure RO)
        let wire = [2u8, 0xCD, 0xAB, 0x00];
        let mut r = MemStreamReader::new(&wire, Endian::Little);
        obj.complete_write(
            true,
            false,
            Attributes::ACCESS_RW,
            &mut r,
            RemainingBits::SevenOrLess,
        )
        .unwrap();

        obj.with_native_data(|d| {
            assert_eq!(u16::from_ne_bytes([d[0], d[1]]), 0xABCD);
            // the read-only bit kept its value
            assert_eq!(d[2] & 1, 1);
        });
    }

    #[test]
    fn test_complete_write_si0_mismatch_rejected() {
        let obj = Object::new_record("rec", 2, 3, s2_descrs(Attributes::ACCESS_RD), None, None)
            .unwrap();
        let wire = [3u8, 0xCD, 0xAB, 0x00];
        let mut r = MemStreamReader::new(&wire, Endian::Little);
        assert_eq!(
            obj.complete_write(
                true,
                false,
                Attributes::ACCESS_RW,
                &mut r,
                RemainingBits::SevenOrLess,
            ),
            Err(SdoAbortCode::UnsupportedAccessToObject)
        );
    }

    #[test]
    fn test_before_write_sees_would_be_image() {
        struct Inspect {
            seen: StdMutex<Vec<u8>>,
        }
        impl ObjectNotifiable for Inspect {
            fn on_before_write(
                &self,
                _o: &Object,
                _s: u8,
                _c: bool,
                _v: u8,
                preview: &[u8],
            ) -> Result<(), SdoAbortCode> {
                *self.seen.lock().unwrap() = preview.to_vec();
                Ok(())
            }
        }

        let insp = Arc::new(Inspect {
            seen: StdMutex::new(Vec::new()),
        });
        let obj = Object::new_record(
            "rec",
            2,
            3,
            s2_descrs(Attributes::ACCESS_RW),
            None,
            Some(insp.clone()),
        )
        .unwrap();

        let wire = [2u8, 0x78, 0x56, 0x01];
        let mut r = MemStreamReader::new(&wire, Endian::Little);
        obj.complete_write(
            true,
            false,
            Attributes::ACCESS_RW,
            &mut r,
            RemainingBits::SevenOrLess,
        )
        .unwrap();

        let seen = insp.seen.lock().unwrap();
        assert_eq!(u16::from_ne_bytes([seen[0], seen[1]]), 0x5678);
        assert_eq!(seen[2] & 1, 1);
    }

    #[test]
    fn test_gap_and_empty_subindices() {
        // SI1 bool, SI2 gap(7), SI3 empty, SI4 u8
        let descrs = vec![
            SubIdxDescr::new("flag", DataType::Boolean, Attributes::ACCESS_RW, 1, 0, 0),
            SubIdxDescr::gap("align", 7),
            SubIdxDescr::empty(),
            SubIdxDescr::new("x", DataType::Unsigned8, Attributes::ACCESS_RW, 1, 1, 0),
        ];
        let obj = Object::new_record("rec", 4, 2, descrs, Some(&[1, 0x7E]), None).unwrap();

        assert!(obj.is_subindex_empty(3).unwrap());
        assert_eq!(
            obj.subidx_data_type(3),
            Err(SdoAbortCode::SubindexDoesNotExist)
        );
        assert_eq!(obj.object_stream_size(false), 8 + 1 + 7 + 8);

        // gap reads as zero bits
        let mut w = VectorStreamWriter::new(Endian::Little);
        obj.complete_read(true, false, Attributes::ACCESS_RD, &mut w)
            .unwrap();
        assert_eq!(w.into_vec(), [4, 0x01, 0x7E]);

        // complete write: gap bits ignored, empty consumes nothing
        let wire = [4u8, 0xFF, 0x42];
        let mut r = MemStreamReader::new(&wire, Endian::Little);
        obj.complete_write(
            true,
            false,
            Attributes::ACCESS_RW,
            &mut r,
            RemainingBits::SevenOrLess,
        )
        .unwrap();
        obj.with_native_data(|d| {
            assert_eq!(d[0] & 1, 1);
            assert_eq!(d[1], 0x42);
        });
    }
}
