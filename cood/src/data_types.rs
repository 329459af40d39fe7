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

//! CANopen data types with their CiA-301 codes and bit-length tables.

use enum_iterator::Sequence;
use std::fmt;

/// CANopen data types. `Null` marks gaps and empty subindices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Sequence)]
#[repr(u16)]
pub enum DataType {
    Null = 0x0000,
    Boolean = 0x0001,
    Integer8 = 0x0002,
    Integer16 = 0x0003,
    Integer32 = 0x0004,
    Unsigned8 = 0x0005,
    Unsigned16 = 0x0006,
    Unsigned32 = 0x0007,
    Real32 = 0x0008,
    VisibleString = 0x0009,
    OctetString = 0x000A,
    UnicodeString = 0x000B,
    Domain = 0x000F,
    Integer24 = 0x0010,
    Real64 = 0x0011,
    Integer40 = 0x0012,
    Integer48 = 0x0013,
    Integer56 = 0x0014,
    Integer64 = 0x0015,
    Unsigned24 = 0x0016,
    Unsigned40 = 0x0018,
    Unsigned48 = 0x0019,
    Unsigned56 = 0x001A,
    Unsigned64 = 0x001B,
}

impl DataType {
    pub fn try_from_u16(value: u16) -> Option<DataType> {
        enum_iterator::all::<DataType>().find(|d| *d as u16 == value)
    }

    /// Number of bits one element of this type occupies in the CANopen
    /// encoded stream. `Null` counts one bit per declared element (gaps).
    pub fn bit_length_in_stream(&self) -> usize {
        match self {
            DataType::Null => 1,
            DataType::Boolean => 1,
            DataType::Integer8 | DataType::Unsigned8 => 8,
            DataType::Integer16 | DataType::Unsigned16 => 16,
            DataType::Integer24 | DataType::Unsigned24 => 24,
            DataType::Integer32 | DataType::Unsigned32 | DataType::Real32 => 32,
            DataType::Integer40 | DataType::Unsigned40 => 40,
            DataType::Integer48 | DataType::Unsigned48 => 48,
            DataType::Integer56 | DataType::Unsigned56 => 56,
            DataType::Integer64 | DataType::Unsigned64 | DataType::Real64 => 64,
            DataType::VisibleString | DataType::OctetString | DataType::Domain => 8,
            DataType::UnicodeString => 16,
        }
    }

    /// Number of bits one element occupies in native memory. Odd-sized
    /// integers live in the next larger native integer.
    pub fn bit_length_in_memory(&self) -> usize {
        match self {
            DataType::Null => 0,
            DataType::Boolean => 1,
            DataType::Integer24 | DataType::Unsigned24 => 32,
            DataType::Integer40
            | DataType::Unsigned40
            | DataType::Integer48
            | DataType::Unsigned48
            | DataType::Integer56
            | DataType::Unsigned56 => 64,
            _ => self.bit_length_in_stream(),
        }
    }

    /// True if the type is packed bitwise in the encoded stream.
    pub fn is_bit_based(&self) -> bool {
        matches!(self, DataType::Boolean | DataType::Null)
    }

    /// True if the native representation is bits stuffed into shared bytes
    /// (addressed with a bit offset) rather than whole bytes.
    pub fn is_native_bit_stuffed(&self) -> bool {
        matches!(self, DataType::Boolean)
    }

    /// True for the string-like types with a per-element stream width.
    pub fn is_string_like(&self) -> bool {
        matches!(
            self,
            DataType::VisibleString | DataType::OctetString | DataType::UnicodeString
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            DataType::Null => "NULL",
            DataType::Boolean => "BOOLEAN",
            DataType::Integer8 => "INTEGER8",
            DataType::Integer16 => "INTEGER16",
            DataType::Integer24 => "INTEGER24",
            DataType::Integer32 => "INTEGER32",
            DataType::Integer40 => "INTEGER40",
            DataType::Integer48 => "INTEGER48",
            DataType::Integer56 => "INTEGER56",
            DataType::Integer64 => "INTEGER64",
            DataType::Unsigned8 => "UNSIGNED8",
            DataType::Unsigned16 => "UNSIGNED16",
            DataType::Unsigned24 => "UNSIGNED24",
            DataType::Unsigned32 => "UNSIGNED32",
            DataType::Unsigned40 => "UNSIGNED40",
            DataType::Unsigned48 => "UNSIGNED48",
            DataType::Unsigned56 => "UNSIGNED56",
            DataType::Unsigned64 => "UNSIGNED64",
            DataType::Real32 => "REAL32",
            DataType::Real64 => "REAL64",
            DataType::VisibleString => "VISIBLE_STRING",
            DataType::OctetString => "OCTET_STRING",
            DataType::UnicodeString => "UNICODE_STRING",
            DataType::Domain => "DOMAIN",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
