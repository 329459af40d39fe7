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

//! Remote-access responses.
//!
//! A response carries the request's return stack back; each router on the
//! reply path pops the top item to find its next hop.

use super::return_stack::ReturnStackItem;
use super::{RemoteAccessError, PROTOCOL_VERSION};
use crate::sdo_abort::SdoAbortCode;
use blue_infra::stream::{StreamReader, StreamWriter};

const TYPE_WRITE_RSP: u8 = 0x81;
const TYPE_READ_RSP: u8 = 0x82;
const TYPE_WRITE_COMPLETE_RSP: u8 = 0x83;
const TYPE_READ_COMPLETE_RSP: u8 = 0x84;
const TYPE_PONG: u8 = 0x85;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponsePayload {
    Write {
        status: Result<(), SdoAbortCode>,
    },
    Read {
        status: Result<(), SdoAbortCode>,
        data: Vec<u8>,
    },
    WriteComplete {
        status: Result<(), SdoAbortCode>,
    },
    ReadComplete {
        status: Result<(), SdoAbortCode>,
        data: Vec<u8>,
    },
    Pong,
}

impl ResponsePayload {
    fn type_code(&self) -> u8 {
        match self {
            ResponsePayload::Write { .. } => TYPE_WRITE_RSP,
            ResponsePayload::Read { .. } => TYPE_READ_RSP,
            ResponsePayload::WriteComplete { .. } => TYPE_WRITE_COMPLETE_RSP,
            ResponsePayload::ReadComplete { .. } => TYPE_READ_COMPLETE_RSP,
            ResponsePayload::Pong => TYPE_PONG,
        }
    }

    fn binary_size(&self) -> usize {
        match self {
            ResponsePayload::Write { .. } | ResponsePayload::WriteComplete { .. } => 4,
            ResponsePayload::Read { data, .. } | ResponsePayload::ReadComplete { data, .. } => {
                4 + 2 + data.len()
            }
            ResponsePayload::Pong => 0,
        }
    }
}

fn status_to_u32(status: &Result<(), SdoAbortCode>) -> u32 {
    match status {
        Ok(()) => 0,
        Err(code) => code.to_u32(),
    }
}

fn status_from_u32(value: u32) -> Result<(), SdoAbortCode> {
    if value == 0 {
        Ok(())
    } else {
        Err(SdoAbortCode::from_u32(value).unwrap_or(SdoAbortCode::GeneralError))
    }
}

#[derive(Debug)]
pub struct Response {
    payload: ResponsePayload,
    return_stack: Vec<ReturnStackItem>,
}

impl Response {
    /// Smallest response that still transports information: envelope plus
    /// a status word.
    pub const MIN_USEFUL_RESPONSE_SIZE: usize = 1 + 1 + 4 + 1;

    /// Largest representable response size.
    pub const MAX_RESPONSE_SIZE: usize = u32::MAX as usize;

    pub fn new(payload: ResponsePayload) -> Self {
        Self {
            payload,
            return_stack: Vec::new(),
        }
    }

    pub fn payload(&self) -> &ResponsePayload {
        &self.payload
    }

    /// Installs the reply path, typically the stack extracted from the
    /// request.
    pub fn set_return_stack(&mut self, stack: Vec<ReturnStackItem>) {
        self.return_stack = stack;
    }

    /// Pops the topmost routing item (reverse order of the pushes).
    pub fn pop_return_stack(&mut self) -> Option<ReturnStackItem> {
        self.return_stack.pop()
    }

    pub fn return_stack_size(&self) -> usize {
        self.return_stack.len() * ReturnStackItem::BINARY_SIZE
    }

    pub fn binary_size(&self) -> usize {
        1 + 1 + self.payload.binary_size() + 1 + self.return_stack_size()
    }

    pub fn to_binary(&self, w: &mut dyn StreamWriter) -> Result<(), RemoteAccessError> {
        w.write_u8(PROTOCOL_VERSION)?;
        w.write_u8(self.payload.type_code())?;

        match &self.payload {
            ResponsePayload::Write { status } | ResponsePayload::WriteComplete { status } => {
                w.write_u32(status_to_u32(status))?;
            }
            ResponsePayload::Read { status, data }
            | ResponsePayload::ReadComplete { status, data } => {
                w.write_u32(status_to_u32(status))?;
                w.write_u16(data.len() as u16)?;
                w.write_bytes(data)?;
            }
            ResponsePayload::Pong => {}
        }

        w.write_u8(self.return_stack.len() as u8)?;
        for item in &self.return_stack {
            item.to_binary(w)?;
        }
        Ok(())
    }

    pub fn from_binary(r: &mut dyn StreamReader) -> Result<Response, RemoteAccessError> {
        let version = r.read_u8()?;
        if version != PROTOCOL_VERSION {
            return Err(RemoteAccessError::UnknownVersion(version));
        }
        let type_code = r.read_u8()?;

        let payload = match type_code {
            TYPE_WRITE_RSP => ResponsePayload::Write {
                status: status_from_u32(r.read_u32()?),
            },
            TYPE_WRITE_COMPLETE_RSP => ResponsePayload::WriteComplete {
                status: status_from_u32(r.read_u32()?),
            },
            TYPE_READ_RSP | TYPE_READ_COMPLETE_RSP => {
                let status = status_from_u32(r.read_u32()?);
                let len = r.read_u16()? as usize;
                let mut data = vec![0u8; len];
                r.read_bytes(&mut data)?;
                if type_code == TYPE_READ_RSP {
                    ResponsePayload::Read { status, data }
                } else {
                    ResponsePayload::ReadComplete { status, data }
                }
            }
            TYPE_PONG => ResponsePayload::Pong,
            other => return Err(RemoteAccessError::UnknownType(other)),
        };

        let rs_count = r.read_u8()? as usize;
        let mut return_stack = Vec::with_capacity(rs_count);
        for _ in 0..rs_count {
            return_stack.push(ReturnStackItem::from_binary(r)?);
        }

        Ok(Response {
            payload,
            return_stack,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blue_infra::stream::{Endian, MemStreamReader, VectorStreamWriter};

    #[test]
    fn test_round_trip_read_response() {
        let mut rsp = Response::new(ResponsePayload::Read {
            status: Ok(()),
            data: vec![1, 2, 3],
        });
        rsp.set_return_stack(vec![
            ReturnStackItem::new(0, 1),
            ReturnStackItem::new(2, 3),
        ]);

        let mut w = VectorStreamWriter::new(Endian::Little);
        rsp.to_binary(&mut w).unwrap();
        let data = w.into_vec();
        assert_eq!(data.len(), rsp.binary_size());

        let mut r = MemStreamReader::new(&data, Endian::Little);
        let mut decoded = Response::from_binary(&mut r).unwrap();
        assert_eq!(decoded.payload(), rsp.payload());

        // popped in reverse order of the pushes
        assert_eq!(decoded.pop_return_stack(), Some(ReturnStackItem::new(2, 3)));
        assert_eq!(decoded.pop_return_stack(), Some(ReturnStackItem::new(0, 1)));
        assert_eq!(decoded.pop_return_stack(), None);
    }

    #[test]
    fn test_round_trip_abort_status() {
        let rsp = Response::new(ResponsePayload::Write {
            status: Err(SdoAbortCode::SubindexDoesNotExist),
        });
        let mut w = VectorStreamWriter::new(Endian::Little);
        rsp.to_binary(&mut w).unwrap();
        let data = w.into_vec();
        // status on the wire, little-endian
        assert_eq!(&data[2..6], &0x0609_0011u32.to_le_bytes());

        let mut r = MemStreamReader::new(&data, Endian::Little);
        let decoded = Response::from_binary(&mut r).unwrap();
        assert_eq!(
            decoded.payload(),
            &ResponsePayload::Write {
                status: Err(SdoAbortCode::SubindexDoesNotExist)
            }
        );
    }

    #[test]
    fn test_min_useful_response_size_matches_smallest() {
        let rsp = Response::new(ResponsePayload::Write { status: Ok(()) });
        assert_eq!(rsp.binary_size(), Response::MIN_USEFUL_RESPONSE_SIZE);
    }

    #[test]
    fn test_unknown_type_rejected() {
        let data = [PROTOCOL_VERSION, 0x7F, 0, 0, 0, 0, 0];
        let mut r = MemStreamReader::new(&data, Endian::Little);
        assert_eq!(
            Response::from_binary(&mut r).unwrap_err(),
            RemoteAccessError::UnknownType(0x7F)
        );
    }
}
