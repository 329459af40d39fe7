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

//! SDO abort codes.
//!
//! Object accesses report failures through these structured codes; they are
//! never raised as panics or errors of another kind.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum SdoAbortCode {
    GeneralError = 0x0800_0000,
    CantTransferOrStoreData = 0x0800_0020,
    OutOfMemory = 0x0504_0005,
    UnsupportedAccessToObject = 0x0601_0000,
    AttemptToReadWrOnlyObject = 0x0601_0001,
    AttemptToWriteRdOnlyObject = 0x0601_0002,
    ObjectDoesNotExist = 0x0602_0000,
    GeneralParameterIncompatibility = 0x0604_0043,
    DataTypeMismatch = 0x0607_0010,
    DataTypeMismatchTooLong = 0x0607_0012,
    DataTypeMismatchTooSmall = 0x0607_0013,
    SubindexDoesNotExist = 0x0609_0011,
    ValueRangeExceeded = 0x0609_0030,
    ValueTooHigh = 0x0609_0031,
    ValueTooLow = 0x0609_0032,
}

impl SdoAbortCode {
    pub const ALL: [SdoAbortCode; 15] = [
        SdoAbortCode::GeneralError,
        SdoAbortCode::CantTransferOrStoreData,
        SdoAbortCode::OutOfMemory,
        SdoAbortCode::UnsupportedAccessToObject,
        SdoAbortCode::AttemptToReadWrOnlyObject,
        SdoAbortCode::AttemptToWriteRdOnlyObject,
        SdoAbortCode::ObjectDoesNotExist,
        SdoAbortCode::GeneralParameterIncompatibility,
        SdoAbortCode::DataTypeMismatch,
        SdoAbortCode::DataTypeMismatchTooLong,
        SdoAbortCode::DataTypeMismatchTooSmall,
        SdoAbortCode::SubindexDoesNotExist,
        SdoAbortCode::ValueRangeExceeded,
        SdoAbortCode::ValueTooHigh,
        SdoAbortCode::ValueTooLow,
    ];

    pub fn to_u32(self) -> u32 {
        self as u32
    }

    pub fn from_u32(value: u32) -> Option<SdoAbortCode> {
        Self::ALL.iter().copied().find(|c| c.to_u32() == value)
    }

    pub fn description(&self) -> &'static str {
        match self {
            SdoAbortCode::GeneralError => "General error",
            SdoAbortCode::CantTransferOrStoreData => "Data cannot be transferred or stored",
            SdoAbortCode::OutOfMemory => "Out of memory",
            SdoAbortCode::UnsupportedAccessToObject => "Unsupported access to an object",
            SdoAbortCode::AttemptToReadWrOnlyObject => "Attempt to read a write only object",
            SdoAbortCode::AttemptToWriteRdOnlyObject => "Attempt to write a read only object",
            SdoAbortCode::ObjectDoesNotExist => "Object does not exist in the object dictionary",
            SdoAbortCode::GeneralParameterIncompatibility => {
                "General parameter incompatibility reason"
            }
            SdoAbortCode::DataTypeMismatch => "Data type does not match",
            SdoAbortCode::DataTypeMismatchTooLong => {
                "Data type does not match, length of service parameter too high"
            }
            SdoAbortCode::DataTypeMismatchTooSmall => {
                "Data type does not match, length of service parameter too low"
            }
            SdoAbortCode::SubindexDoesNotExist => "Sub-index does not exist",
            SdoAbortCode::ValueRangeExceeded => "Value range of parameter exceeded",
            SdoAbortCode::ValueTooHigh => "Value of parameter written too high",
            SdoAbortCode::ValueTooLow => "Value of parameter written too low",
        }
    }
}

impl fmt::Display for SdoAbortCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010X}: {}", self.to_u32(), self.description())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_values() {
        assert_eq!(SdoAbortCode::GeneralError.to_u32(), 0x0800_0000);
        assert_eq!(SdoAbortCode::SubindexDoesNotExist.to_u32(), 0x0609_0011);
        assert_eq!(
            SdoAbortCode::AttemptToWriteRdOnlyObject.to_u32(),
            0x0601_0002
        );
    }

    #[test]
    fn test_round_trip() {
        for c in SdoAbortCode::ALL {
            assert_eq!(SdoAbortCode::from_u32(c.to_u32()), Some(c));
        }
        assert_eq!(SdoAbortCode::from_u32(0xDEAD_BEEF), None);
    }

    #[test]
    fn test_display() {
        let s = format!("{}", SdoAbortCode::ObjectDoesNotExist);
        assert!(s.starts_with("0x06020000"));
    }
}
