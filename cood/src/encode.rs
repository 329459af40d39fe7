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

//! Conversion between native memory and CANopen encoded stream data.
//!
//! The wire form is little-endian regardless of the stream's endianness
//! setting, so multi-byte values are emitted byte by byte. Native images
//! store integers in host byte order; odd-sized integers (24/40/48/56 bit)
//! live in the next larger native integer and are sign-extended on decode.
//!
//! One native byte holds one boolean element; bit-stuffed native storage is
//! unpacked by the caller before encoding.

use crate::data_types::DataType;
use blue_infra::stream::{Result, StreamReader, StreamWriter};

/// Bytes one element occupies in native memory. Zero for `Null`.
pub fn native_element_size(ty: DataType) -> usize {
    match ty {
        DataType::Boolean => 1,
        _ => ty.bit_length_in_memory() / 8,
    }
}

/// Bytes the native image of `n_elements` elements occupies.
pub fn native_size(ty: DataType, n_elements: u16) -> usize {
    native_element_size(ty) * n_elements as usize
}

fn is_signed(ty: DataType) -> bool {
    matches!(
        ty,
        DataType::Integer8
            | DataType::Integer16
            | DataType::Integer24
            | DataType::Integer32
            | DataType::Integer40
            | DataType::Integer48
            | DataType::Integer56
            | DataType::Integer64
    )
}

fn read_native_uint(native: &[u8], nbytes: usize) -> u64 {
    let mut le = [0u8; 8];
    for i in 0..nbytes {
        le[i] = if cfg!(target_endian = "big") {
            native[nbytes - 1 - i]
        } else {
            native[i]
        };
    }
    u64::from_le_bytes(le)
}

fn write_native_uint(native: &mut [u8], nbytes: usize, value: u64) {
    let le = value.to_le_bytes();
    for i in 0..nbytes {
        let b = le[i];
        if cfg!(target_endian = "big") {
            native[nbytes - 1 - i] = b;
        } else {
            native[i] = b;
        }
    }
}

/// Encodes `n_elements` elements from `native` into the stream.
///
/// For `VisibleString` without complete access only the actual content up
/// to the first NUL is written; with complete access the full declared
/// length is written, zero padded.
pub fn native_data_to_canopen_encoded_data(
    native: &[u8],
    ty: DataType,
    n_elements: u16,
    complete_access: bool,
    w: &mut dyn StreamWriter,
) -> Result<()> {
    let n = n_elements as usize;
    match ty {
        DataType::Null => w.fill_bits(n, false),
        DataType::Boolean => {
            for i in 0..n {
                w.write_bool(native[i] & 1 != 0)?;
            }
            Ok(())
        }
        DataType::VisibleString => {
            let actual = memchr::memchr(0, &native[..n]).unwrap_or(n);
            w.write_bytes(&native[..actual])?;
            if complete_access {
                w.fill_bytes(n - actual, 0)?;
            }
            Ok(())
        }
        DataType::OctetString | DataType::Domain => w.write_bytes(&native[..n]),
        DataType::UnicodeString => {
            for i in 0..n {
                let v = read_native_uint(&native[i * 2..], 2);
                w.write_u8(v as u8)?;
                w.write_u8((v >> 8) as u8)?;
            }
            Ok(())
        }
        _ => {
            let m = native_element_size(ty);
            let s = ty.bit_length_in_stream() / 8;
            for i in 0..n {
                let v = read_native_uint(&native[i * m..], m);
                for b in 0..s {
                    w.write_u8((v >> (8 * b)) as u8)?;
                }
            }
            Ok(())
        }
    }
}

/// Decodes `n_elements` elements from the stream into `native`.
///
/// For `VisibleString` without complete access a shorter stream is legal;
/// the remainder of the native field is zero filled.
pub fn canopen_encoded_data_to_native_data(
    r: &mut dyn StreamReader,
    ty: DataType,
    n_elements: u16,
    complete_access: bool,
    native: &mut [u8],
) -> Result<()> {
    let n = n_elements as usize;
    match ty {
        DataType::Null => r.skip(n),
        DataType::Boolean => {
            for i in 0..n {
                native[i] = r.read_bool()? as u8;
            }
            Ok(())
        }
        DataType::VisibleString => {
            let avail = if complete_access {
                n
            } else {
                (r.remaining_bits() / 8).min(n)
            };
            r.read_bytes(&mut native[..avail])?;
            // content ends at the first NUL; clear the remainder
            let end = memchr::memchr(0, &native[..avail]).unwrap_or(avail);
            native[end..n].fill(0);
            Ok(())
        }
        DataType::OctetString | DataType::Domain => r.read_bytes(&mut native[..n]),
        DataType::UnicodeString => {
            for i in 0..n {
                let lo = r.read_u8()? as u64;
                let hi = r.read_u8()? as u64;
                write_native_uint(&mut native[i * 2..], 2, lo | (hi << 8));
            }
            Ok(())
        }
        _ => {
            let m = native_element_size(ty);
            let s = ty.bit_length_in_stream() / 8;
            for i in 0..n {
                let mut v: u64 = 0;
                for b in 0..s {
                    v |= (r.read_u8()? as u64) << (8 * b);
                }
                if is_signed(ty) && s < 8 && (v >> (8 * s - 1)) & 1 != 0 {
                    v |= u64::MAX << (8 * s);
                }
                write_native_uint(&mut native[i * m..], m, v);
            }
            Ok(())
        }
    }
}

/// Size in bits of the encoded form of the given native data.
///
/// `VisibleString` measures the actual content up to the first NUL; all
/// other types have a fixed size.
pub fn determine_size_of_canopen_encoded_data(
    native: &[u8],
    ty: DataType,
    n_elements: u16,
) -> usize {
    let n = n_elements as usize;
    match ty {
        DataType::VisibleString => 8 * memchr::memchr(0, &native[..n]).unwrap_or(n),
        _ => ty.bit_length_in_stream() * n,
    }
}
