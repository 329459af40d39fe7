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

//! CANopen object dictionary runtime.
//!
//! Typed, permissioned, introspectable objects (VARIABLE/ARRAY/RECORD) in a
//! thread-safe dictionary, the CANopen wire encoding for their data, and a
//! framed request/response envelope for remote dictionary access.

pub mod attributes;
pub mod data_types;
pub mod dictionary;
pub mod encode;
pub mod object;
pub mod remote;
pub mod sdo_abort;

pub use attributes::Attributes;
pub use data_types::DataType;
pub use dictionary::{ObjectDictionary, ObjectPtr, OdError};
pub use object::{Object, ObjectCode, ObjectError, ObjectNotifiable, SubIdxDescr};
pub use sdo_abort::SdoAbortCode;
