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

//! Request execution against an object dictionary.
//!
//! Control flow: request -> dictionary lookup (read lock via the object
//! pointer) -> object operation (per-object data mutex) -> stream encoder
//! -> response. The request's return stack moves into the response so the
//! routers on the way back can pop their hops.

use super::request::{Request, RequestPayload};
use super::response::{Response, ResponsePayload};
use crate::attributes::Attributes;
use crate::dictionary::ObjectDictionary;
use crate::object::RemainingBits;
use crate::sdo_abort::SdoAbortCode;
use blue_infra::stream::{Endian, MemStreamReader, StreamWriter, VectorStreamWriter};
use log::debug;

/// Executes `request` against `od` and builds the matching response.
pub fn process_request(od: &ObjectDictionary, mut request: Request) -> Response {
    let return_stack = request.extract_return_stack();
    // the response must fit the budget after the stack is carried back
    let data_budget = request
        .max_response_size()
        .saturating_sub(Response::MIN_USEFUL_RESPONSE_SIZE + 2);

    let payload = match request.payload() {
        RequestPayload::Ping => ResponsePayload::Pong,

        RequestPayload::Write {
            index,
            subindex,
            permissions,
            data,
        } => ResponsePayload::Write {
            status: execute_write(od, *index, *subindex, *permissions, data),
        },

        RequestPayload::WriteComplete {
            index,
            incl_si0,
            si0_16bit,
            permissions,
            data,
        } => ResponsePayload::WriteComplete {
            status: execute_write_complete(
                od, *index, *incl_si0, *si0_16bit, *permissions, data,
            ),
        },

        RequestPayload::Read {
            index,
            subindex,
            permissions,
        } => {
            let (status, data) =
                execute_read(od, *index, *subindex, *permissions, data_budget);
            ResponsePayload::Read { status, data }
        }

        RequestPayload::ReadComplete {
            index,
            incl_si0,
            si0_16bit,
            permissions,
        } => {
            let (status, data) = execute_read_complete(
                od,
                *index,
                *incl_si0,
                *si0_16bit,
                *permissions,
                data_budget,
            );
            ResponsePayload::ReadComplete { status, data }
        }
    };

    let mut response = Response::new(payload);
    response.set_return_stack(return_stack);
    response
}

fn execute_write(
    od: &ObjectDictionary,
    index: u16,
    subindex: u8,
    permissions: Attributes,
    data: &[u8],
) -> Result<(), SdoAbortCode> {
    let obj = od
        .get_object(index)
        .ok_or(SdoAbortCode::ObjectDoesNotExist)?;
    let mut r = MemStreamReader::new(data, Endian::Little);
    let status = obj.write(subindex, permissions, &mut r);
    if let Err(code) = status {
        debug!("remote write {:#06X}:{} aborted: {}", index, subindex, code);
    }
    status
}

fn execute_write_complete(
    od: &ObjectDictionary,
    index: u16,
    incl_si0: bool,
    si0_16bit: bool,
    permissions: Attributes,
    data: &[u8],
) -> Result<(), SdoAbortCode> {
    let obj = od
        .get_object(index)
        .ok_or(SdoAbortCode::ObjectDoesNotExist)?;
    let mut r = MemStreamReader::new(data, Endian::Little);
    let status = obj.complete_write(
        incl_si0,
        si0_16bit,
        permissions,
        &mut r,
        RemainingBits::SevenOrLess,
    );
    if let Err(code) = status {
        debug!("remote complete-write {:#06X} aborted: {}", index, code);
    }
    status
}

fn execute_read(
    od: &ObjectDictionary,
    index: u16,
    subindex: u8,
    permissions: Attributes,
    budget: usize,
) -> (Result<(), SdoAbortCode>, Vec<u8>) {
    let Some(obj) = od.get_object(index) else {
        return (Err(SdoAbortCode::ObjectDoesNotExist), Vec::new());
    };
    let mut w = VectorStreamWriter::new(Endian::Little);
    match obj.read(subindex, permissions, &mut w) {
        Ok(()) => finish_read(w, budget),
        Err(code) => (Err(code), Vec::new()),
    }
}

fn execute_read_complete(
    od: &ObjectDictionary,
    index: u16,
    incl_si0: bool,
    si0_16bit: bool,
    permissions: Attributes,
    budget: usize,
) -> (Result<(), SdoAbortCode>, Vec<u8>) {
    let Some(obj) = od.get_object(index) else {
        return (Err(SdoAbortCode::ObjectDoesNotExist), Vec::new());
    };
    let mut w = VectorStreamWriter::new(Endian::Little);
    match obj.complete_read(incl_si0, si0_16bit, permissions, &mut w) {
        Ok(()) => finish_read(w, budget),
        Err(code) => (Err(code), Vec::new()),
    }
}

fn finish_read(
    mut w: VectorStreamWriter,
    budget: usize,
) -> (Result<(), SdoAbortCode>, Vec<u8>) {
    if w.align_to_byte_boundary(false).is_err() {
        return (Err(SdoAbortCode::GeneralError), Vec::new());
    }
    let data = w.into_vec();
    if data.len() > budget {
        return (Err(SdoAbortCode::CantTransferOrStoreData), Vec::new());
    }
    (Ok(()), data)
}
