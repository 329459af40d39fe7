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

//! Access attributes of object subindices.
//!
//! Permission checks AND the requester's attribute set with the stored one;
//! any common bit grants the access.

use bitflags::bitflags;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Attributes: u16 {
        /// Readable in PRE-OPERATIONAL state.
        const RD_PREOP = 0x0001;
        /// Readable in SAFE-OPERATIONAL state.
        const RD_SAFEOP = 0x0002;
        /// Readable in OPERATIONAL state.
        const RD_OP = 0x0004;
        /// Writeable in PRE-OPERATIONAL state.
        const WR_PREOP = 0x0010;
        /// Writeable in SAFE-OPERATIONAL state.
        const WR_SAFEOP = 0x0020;
        /// Writeable in OPERATIONAL state.
        const WR_OP = 0x0040;
        /// Mappable into an RX-PDO.
        const RXMAP = 0x0100;
        /// Mappable into a TX-PDO.
        const TXMAP = 0x0200;
        /// Part of backup data.
        const BACKUP = 0x1000;
        /// Part of settings data.
        const SETTINGS = 0x2000;

        /// Readable in any state.
        const ACCESS_RD = Self::RD_PREOP.bits() | Self::RD_SAFEOP.bits() | Self::RD_OP.bits();
        /// Writeable in any state.
        const ACCESS_WR = Self::WR_PREOP.bits() | Self::WR_SAFEOP.bits() | Self::WR_OP.bits();
        /// Full read/write access in any state.
        const ACCESS_RW = Self::ACCESS_RD.bits() | Self::ACCESS_WR.bits();
    }
}

impl Attributes {
    /// True if the stored attributes grant a read to a requester holding
    /// `permissions`.
    pub fn permits_read(&self, permissions: Attributes) -> bool {
        !(*self & Attributes::ACCESS_RD & permissions).is_empty()
    }

    /// True if the stored attributes grant a write to a requester holding
    /// `permissions`.
    pub fn permits_write(&self, permissions: Attributes) -> bool {
        !(*self & Attributes::ACCESS_WR & permissions).is_empty()
    }

    /// True if the subindex can be read at all.
    pub fn is_readable(&self) -> bool {
        self.intersects(Attributes::ACCESS_RD)
    }

    /// True if the subindex can be written at all.
    pub fn is_writeable(&self) -> bool {
        self.intersects(Attributes::ACCESS_WR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_check_is_intersection() {
        let attrs = Attributes::RD_PREOP | Attributes::WR_PREOP;
        assert!(attrs.permits_read(Attributes::ACCESS_RD));
        assert!(attrs.permits_read(Attributes::RD_PREOP));
        assert!(!attrs.permits_read(Attributes::RD_OP));
        assert!(attrs.permits_write(Attributes::WR_PREOP));
        assert!(!attrs.permits_write(Attributes::WR_OP));
        // read permission never grants a write
        assert!(!attrs.permits_write(Attributes::ACCESS_RD));
    }

    #[test]
    fn test_readable_writeable() {
        assert!(Attributes::ACCESS_RD.is_readable());
        assert!(!Attributes::ACCESS_RD.is_writeable());
        assert!(Attributes::ACCESS_RW.is_writeable());
        assert!(!(Attributes::BACKUP | Attributes::TXMAP).is_readable());
    }
}
