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

//! Remote access to an object dictionary.
//!
//! Requests and responses travel as little-endian, version-tagged binary
//! envelopes. Each request carries a maximum-response-size budget and a
//! LIFO return stack that intermediate routers use to reconstruct the
//! reply path; pushing an item onto the stack enlarges the budget by the
//! item's wire size so the answer can carry the stack back.

mod request;
mod response;
mod return_stack;
mod server;

pub use request::{Request, RequestPayload};
pub use response::{Response, ResponsePayload};
pub use return_stack::ReturnStackItem;
pub use server::process_request;

use blue_infra::stream::StreamError;
use std::fmt;

/// Protocol version emitted and accepted by this implementation.
pub const PROTOCOL_VERSION: u8 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteAccessError {
    /// More than 255 return stack items.
    TooManyReturnStackItems,
    /// The effective maximum response size would leave its valid range.
    MaxResponseSizeOutOfRange,
    /// Unknown protocol version encountered during deserialization.
    UnknownVersion(u8),
    /// Unknown request/response type encountered during deserialization.
    UnknownType(u8),
    /// Malformed binary (truncated, trailing bytes, bad field value).
    Malformed,
    /// Underlying stream failure.
    Stream(StreamError),
}

impl fmt::Display for RemoteAccessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteAccessError::TooManyReturnStackItems => {
                f.write_str("return stack limited to 255 items")
            }
            RemoteAccessError::MaxResponseSizeOutOfRange => {
                f.write_str("maximum response size out of range")
            }
            RemoteAccessError::UnknownVersion(v) => {
                write!(f, "unknown protocol version {}", v)
            }
            RemoteAccessError::UnknownType(t) => write!(f, "unknown message type {:#04X}", t),
            RemoteAccessError::Malformed => f.write_str("malformed binary"),
            RemoteAccessError::Stream(e) => write!(f, "stream error: {}", e),
        }
    }
}

impl std::error::Error for RemoteAccessError {}

impl From<StreamError> for RemoteAccessError {
    fn from(e: StreamError) -> Self {
        RemoteAccessError::Stream(e)
    }
}
