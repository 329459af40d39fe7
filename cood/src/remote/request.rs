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

//! Remote-access requests.
//!
//! Envelope layout (little-endian):
//!
//! ```text
//! u8  version
//! u8  request type
//! u32 max response size
//! ... type specific payload ...
//! u8  rsCount
//! rsCount * ReturnStackItem
//! ```

use super::response::Response;
use super::return_stack::ReturnStackItem;
use super::{RemoteAccessError, PROTOCOL_VERSION};
use crate::attributes::Attributes;
use blue_infra::stream::{StreamReader, StreamWriter};

const TYPE_WRITE: u8 = 1;
const TYPE_READ: u8 = 2;
const TYPE_WRITE_COMPLETE: u8 = 3;
const TYPE_READ_COMPLETE: u8 = 4;
const TYPE_PING: u8 = 5;

const FLAG_INCL_SI0: u8 = 0x01;
const FLAG_SI0_16BIT: u8 = 0x02;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestPayload {
    /// Write one subindex.
    Write {
        index: u16,
        subindex: u8,
        permissions: Attributes,
        data: Vec<u8>,
    },
    /// Read one subindex.
    Read {
        index: u16,
        subindex: u8,
        permissions: Attributes,
    },
    /// Write the whole object.
    WriteComplete {
        index: u16,
        incl_si0: bool,
        si0_16bit: bool,
        permissions: Attributes,
        data: Vec<u8>,
    },
    /// Read the whole object.
    ReadComplete {
        index: u16,
        incl_si0: bool,
        si0_16bit: bool,
        permissions: Attributes,
    },
    /// Connectivity probe.
    Ping,
}

impl RequestPayload {
    fn type_code(&self) -> u8 {
        match self {
            RequestPayload::Write { .. } => TYPE_WRITE,
            RequestPayload::Read { .. } => TYPE_READ,
            RequestPayload::WriteComplete { .. } => TYPE_WRITE_COMPLETE,
            RequestPayload::ReadComplete { .. } => TYPE_READ_COMPLETE,
            RequestPayload::Ping => TYPE_PING,
        }
    }

    fn binary_size(&self) -> usize {
        match self {
            RequestPayload::Write { data, .. } => 2 + 1 + 2 + 2 + data.len(),
            RequestPayload::Read { .. } => 2 + 1 + 2,
            RequestPayload::WriteComplete { data, .. } => 2 + 1 + 2 + 2 + data.len(),
            RequestPayload::ReadComplete { .. } => 2 + 1 + 2,
            RequestPayload::Ping => 0,
        }
    }
}

/// A remote-access request with response-size budget and return stack.
#[derive(Debug)]
pub struct Request {
    payload: RequestPayload,
    max_response_size: u32,
    return_stack: Vec<ReturnStackItem>,
}

impl Request {
    /// Upper bound for the return stack.
    pub const MAX_NB_OF_RSI: usize = 255;

    /// Smallest `max_response_size` a request may announce: the smallest
    /// useful response must fit.
    pub const MIN_USEFUL_REQUEST_SIZE: usize = Response::MIN_USEFUL_RESPONSE_SIZE;

    /// Largest representable request/response size.
    pub const MAX_REQUEST_SIZE: usize = u32::MAX as usize;

    /// Creates a request. `max_response_size` must be within
    /// [`MIN_USEFUL_REQUEST_SIZE`](Self::MIN_USEFUL_REQUEST_SIZE) ..=
    /// [`MAX_REQUEST_SIZE`](Self::MAX_REQUEST_SIZE); it excludes eventual
    /// return stack items, which enlarge the budget as they are pushed.
    pub fn new(
        payload: RequestPayload,
        max_response_size: usize,
    ) -> Result<Self, RemoteAccessError> {
        if !(Self::MIN_USEFUL_REQUEST_SIZE..=Self::MAX_REQUEST_SIZE)
            .contains(&max_response_size)
        {
            return Err(RemoteAccessError::MaxResponseSizeOutOfRange);
        }
        Ok(Self {
            payload,
            max_response_size: max_response_size as u32,
            return_stack: Vec::new(),
        })
    }

    pub fn payload(&self) -> &RequestPayload {
        &self.payload
    }

    /// Effective maximum response size, including pushed return stack
    /// items.
    pub fn max_response_size(&self) -> usize {
        self.max_response_size as usize
    }

    /// Serialized size of the return stack in bytes.
    pub fn return_stack_size(&self) -> usize {
        self.return_stack.len() * ReturnStackItem::BINARY_SIZE
    }

    /// Pushes a routing item, growing the response budget by the item's
    /// wire size. Fails without mutating the request when the stack is
    /// full or the budget bound is reached.
    pub fn push(&mut self, item: ReturnStackItem) -> Result<(), RemoteAccessError> {
        if self.return_stack.len() >= Self::MAX_NB_OF_RSI {
            return Err(RemoteAccessError::TooManyReturnStackItems);
        }
        let new_size = self
            .max_response_size
            .checked_add(ReturnStackItem::BINARY_SIZE as u32)
            .ok_or(RemoteAccessError::MaxResponseSizeOutOfRange)?;
        self.return_stack.push(item);
        self.max_response_size = new_size;
        Ok(())
    }

    /// Transfers the return stack to the caller, shrinking the response
    /// budget correspondingly. The request's stack is empty afterwards.
    pub fn extract_return_stack(&mut self) -> Vec<ReturnStackItem> {
        let stack = std::mem::take(&mut self.return_stack);
        self.max_response_size -= (stack.len() * ReturnStackItem::BINARY_SIZE) as u32;
        stack
    }

    /// Size of the serialized request in bytes.
    pub fn binary_size(&self) -> usize {
        1 + 1 + 4 + self.payload.binary_size() + 1 + self.return_stack_size()
    }

    pub fn to_binary(&self, w: &mut dyn StreamWriter) -> Result<(), RemoteAccessError> {
        w.write_u8(PROTOCOL_VERSION)?;
        w.write_u8(self.payload.type_code())?;
        w.write_u32(self.max_response_size)?;

        match &self.payload {
            RequestPayload::Write {
                index,
                subindex,
                permissions,
                data,
            } => {
                w.write_u16(*index)?;
                w.write_u8(*subindex)?;
                w.write_u16(permissions.bits())?;
                w.write_u16(data.len() as u16)?;
                w.write_bytes(data)?;
            }
            RequestPayload::Read {
                index,
                subindex,
                permissions,
            } => {
                w.write_u16(*index)?;
                w.write_u8(*subindex)?;
                w.write_u16(permissions.bits())?;
            }
            RequestPayload::WriteComplete {
                index,
                incl_si0,
                si0_16bit,
                permissions,
                data,
            } => {
                w.write_u16(*index)?;
                w.write_u8(flags(*incl_si0, *si0_16bit))?;
                w.write_u16(permissions.bits())?;
                w.write_u16(data.len() as u16)?;
                w.write_bytes(data)?;
            }
            RequestPayload::ReadComplete {
                index,
                incl_si0,
                si0_16bit,
                permissions,
            } => {
                w.write_u16(*index)?;
                w.write_u8(flags(*incl_si0, *si0_16bit))?;
                w.write_u16(permissions.bits())?;
            }
            RequestPayload::Ping => {}
        }

        w.write_u8(self.return_stack.len() as u8)?;
        for item in &self.return_stack {
            item.to_binary(w)?;
        }
        Ok(())
    }

    pub fn from_binary(r: &mut dyn StreamReader) -> Result<Request, RemoteAccessError> {
        let version = r.read_u8()?;
        if version != PROTOCOL_VERSION {
            return Err(RemoteAccessError::UnknownVersion(version));
        }
        let type_code = r.read_u8()?;
        let max_response_size = r.read_u32()? as usize;
        if !(Self::MIN_USEFUL_REQUEST_SIZE..=Self::MAX_REQUEST_SIZE)
            .contains(&max_response_size)
        {
            return Err(RemoteAccessError::MaxResponseSizeOutOfRange);
        }

        let payload = match type_code {
            TYPE_WRITE => {
                let index = r.read_u16()?;
                let subindex = r.read_u8()?;
                let permissions = Attributes::from_bits_truncate(r.read_u16()?);
                let len = r.read_u16()? as usize;
                let mut data = vec![0u8; len];
                r.read_bytes(&mut data)?;
                RequestPayload::Write {
                    index,
                    subindex,
                    permissions,
                    data,
                }
            }
            TYPE_READ => RequestPayload::Read {
                index: r.read_u16()?,
                subindex: r.read_u8()?,
                permissions: Attributes::from_bits_truncate(r.read_u16()?),
            },
            TYPE_WRITE_COMPLETE => {
                let index = r.read_u16()?;
                let fl = r.read_u8()?;
                let permissions = Attributes::from_bits_truncate(r.read_u16()?);
                let len = r.read_u16()? as usize;
                let mut data = vec![0u8; len];
                r.read_bytes(&mut data)?;
                RequestPayload::WriteComplete {
                    index,
                    incl_si0: fl & FLAG_INCL_SI0 != 0,
                    si0_16bit: fl & FLAG_SI0_16BIT != 0,
                    permissions,
                    data,
                }
            }
            TYPE_READ_COMPLETE => {
                let index = r.read_u16()?;
                let fl = r.read_u8()?;
                RequestPayload::ReadComplete {
                    index,
                    incl_si0: fl & FLAG_INCL_SI0 != 0,
                    si0_16bit: fl & FLAG_SI0_16BIT != 0,
                    permissions: Attributes::from_bits_truncate(r.read_u16()?),
                }
            }
            TYPE_PING => RequestPayload::Ping,
            other => return Err(RemoteAccessError::UnknownType(other)),
        };

        let rs_count = r.read_u8()? as usize;
        let mut return_stack = Vec::with_capacity(rs_count);
        for _ in 0..rs_count {
            return_stack.push(ReturnStackItem::from_binary(r)?);
        }

        Ok(Request {
            payload,
            max_response_size: max_response_size as u32,
            return_stack,
        })
    }
}

fn flags(incl_si0: bool, si0_16bit: bool) -> u8 {
    (if incl_si0 { FLAG_INCL_SI0 } else { 0 }) | (if si0_16bit { FLAG_SI0_16BIT } else { 0 })
}
