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

//! Remote access end to end: envelope round trips and request execution
//! against a dictionary.

use blue_cood::remote::{
    process_request, Request, RequestPayload, Response, ResponsePayload, ReturnStackItem,
};
use blue_cood::{
    Attributes, DataType, Object, ObjectDictionary, ObjectNotifiable, SdoAbortCode, SubIdxDescr,
};
use blue_infra::stream::{Endian, MemStreamReader, MemStreamWriter, StreamWriter};
use std::sync::{Arc, Mutex as StdMutex};

fn round_trip(request: Request) -> Request {
    let mut storage = [0u8; 512];
    let mut w = MemStreamWriter::new(&mut storage, Endian::Little);
    request.to_binary(&mut w).unwrap();
    let size = w.nb_of_bytes_written();
    assert_eq!(size, request.binary_size());
    w.close();

    let mut r = MemStreamReader::new(&storage[..size], Endian::Little);
    Request::from_binary(&mut r).unwrap()
}

#[test]
fn write_request_envelope_round_trip() {
    let mut request = Request::new(
        RequestPayload::Write {
            index: 0x1002,
            subindex: 12,
            permissions: Attributes::WR_PREOP,
            data: vec![0x56, 0x89],
        },
        1024,
    )
    .unwrap();
    request.push(ReturnStackItem::new(0, 1)).unwrap();
    request.push(ReturnStackItem::new(2, 3)).unwrap();

    // envelope + payload + rsCount + two items
    let header = 1 + 1 + 4;
    let payload = 2 + 1 + 2 + 2 + 2;
    assert_eq!(request.binary_size(), header + payload + 1 + 2 * 8);

    let mut decoded = round_trip(request);
    assert!(matches!(
        decoded.payload(),
        RequestPayload::Write { index: 0x1002, subindex: 12, .. }
    ));
    assert_eq!(decoded.max_response_size(), 1024 + 16);
    let stack = decoded.extract_return_stack();
    assert_eq!(
        stack,
        [ReturnStackItem::new(0, 1), ReturnStackItem::new(2, 3)]
    );
    assert_eq!(decoded.max_response_size(), 1024);
}

struct AfterWriteLog {
    calls: StdMutex<Vec<(u8, bool)>>,
}

impl ObjectNotifiable for AfterWriteLog {
    fn on_after_write(&self, _o: &Object, subindex: u8, complete_access: bool) {
        self.calls.lock().unwrap().push((subindex, complete_access));
    }
}

fn build_od(log: Arc<AfterWriteLog>) -> ObjectDictionary {
    let od = ObjectDictionary::new();

    // { u16 a; bool b : 1; } with 'b' pure read-only
    let record = Object::new_record(
        "pair",
        2,
        3,
        vec![
            SubIdxDescr::new("a", DataType::Unsigned16, Attributes::ACCESS_RW, 1, 0, 0),
            SubIdxDescr::new("b", DataType::Boolean, Attributes::ACCESS_RD, 1, 2, 0),
        ],
        None,
        Some(log),
    )
    .unwrap();
    od.add(record, 0x2000).unwrap();

    let var = Object::new_variable(
        "speed",
        DataType::Unsigned32,
        1,
        Attributes::ACCESS_RW,
        Some(&0x0102_0304u32.to_ne_bytes()),
        None,
    )
    .unwrap();
    od.add(var, 0x1000).unwrap();

    od
}

#[test]
fn record_write_via_remote_access() {
    let log = Arc::new(AfterWriteLog {
        calls: StdMutex::new(Vec::new()),
    });
    let od = build_od(log.clone());

    let request = Request::new(
        RequestPayload::Write {
            index: 0x2000,
            subindex: 1,
            permissions: Attributes::WR_PREOP | Attributes::ACCESS_RD,
            data: vec![0xCD, 0xAB],
        },
        1024,
    )
    .unwrap();

    let response = process_request(&od, round_trip(request));
    assert_eq!(response.payload(), &ResponsePayload::Write { status: Ok(()) });

    let obj = od.get_object(0x2000).unwrap();
    obj.with_native_data(|d| {
        assert_eq!(u16::from_ne_bytes([d[0], d[1]]), 0xABCD);
        assert_eq!(d[2] & 1, 0);
    });
    drop(obj);

    assert_eq!(*log.calls.lock().unwrap(), [(1u8, false)]);
    od.clear();
}

#[test]
fn read_and_complete_read_via_remote_access() {
    let log = Arc::new(AfterWriteLog {
        calls: StdMutex::new(Vec::new()),
    });
    let od = build_od(log);

    let request = Request::new(
        RequestPayload::Read {
            index: 0x1000,
            subindex: 0,
            permissions: Attributes::RD_OP,
        },
        1024,
    )
    .unwrap();
    let response = process_request(&od, round_trip(request));
    assert_eq!(
        response.payload(),
        &ResponsePayload::Read {
            status: Ok(()),
            data: vec![0x04, 0x03, 0x02, 0x01],
        }
    );

    let request = Request::new(
        RequestPayload::ReadComplete {
            index: 0x2000,
            incl_si0: true,
            si0_16bit: false,
            permissions: Attributes::ACCESS_RD,
        },
        1024,
    )
    .unwrap();
    let response = process_request(&od, round_trip(request));
    // SI0, 'a' = 0, padding + RO bit = 0
    assert_eq!(
        response.payload(),
        &ResponsePayload::ReadComplete {
            status: Ok(()),
            data: vec![2, 0x00, 0x00, 0x00],
        }
    );
    od.clear();
}

#[test]
fn complete_write_preserves_read_only_fields_via_remote_access() {
    let log = Arc::new(AfterWriteLog {
        calls: StdMutex::new(Vec::new()),
    });
    let od = build_od(log.clone());

    // preset the read-only bit
    {
        let obj = od.get_object(0x2000).unwrap();
        obj.modify_native_data(|d| d[2] = 1);
    }

    let request = Request::new(
        RequestPayload::WriteComplete {
            index: 0x2000,
            incl_si0: true,
            si0_16bit: false,
            permissions: Attributes::ACCESS_RW,
            data: vec![2, 0x34, 0x12, 0x00],
        },
        1024,
    )
    .unwrap();
    let response = process_request(&od, round_trip(request));
    assert_eq!(
        response.payload(),
        &ResponsePayload::WriteComplete { status: Ok(()) }
    );

    let obj = od.get_object(0x2000).unwrap();
    obj.with_native_data(|d| {
        assert_eq!(u16::from_ne_bytes([d[0], d[1]]), 0x1234);
        // the read-only flag survived the complete write
        assert_eq!(d[2] & 1, 1);
    });
    drop(obj);
    assert_eq!(*log.calls.lock().unwrap(), [(0u8, true)]);
    od.clear();
}

#[test]
fn aborts_travel_back_as_status() {
    let log = Arc::new(AfterWriteLog {
        calls: StdMutex::new(Vec::new()),
    });
    let od = build_od(log);

    // unknown object
    let request = Request::new(
        RequestPayload::Read {
            index: 0x7000,
            subindex: 0,
            permissions: Attributes::ACCESS_RD,
        },
        1024,
    )
    .unwrap();
    let response = process_request(&od, request);
    assert_eq!(
        response.payload(),
        &ResponsePayload::Read {
            status: Err(SdoAbortCode::ObjectDoesNotExist),
            data: Vec::new(),
        }
    );

    // write to the read-only record bit
    let request = Request::new(
        RequestPayload::Write {
            index: 0x2000,
            subindex: 2,
            permissions: Attributes::ACCESS_RW,
            data: vec![0x01],
        },
        1024,
    )
    .unwrap();
    let response = process_request(&od, request);
    assert_eq!(
        response.payload(),
        &ResponsePayload::Write {
            status: Err(SdoAbortCode::AttemptToWriteRdOnlyObject),
        }
    );
    od.clear();
}

#[test]
fn response_size_budget_is_enforced() {
    let log = Arc::new(AfterWriteLog {
        calls: StdMutex::new(Vec::new()),
    });
    let od = build_od(log);

    // minimal budget cannot carry four data bytes
    let request = Request::new(
        RequestPayload::Read {
            index: 0x1000,
            subindex: 0,
            permissions: Attributes::ACCESS_RD,
        },
        Request::MIN_USEFUL_REQUEST_SIZE,
    )
    .unwrap();
    let response = process_request(&od, request);
    assert_eq!(
        response.payload(),
        &ResponsePayload::Read {
            status: Err(SdoAbortCode::CantTransferOrStoreData),
            data: Vec::new(),
        }
    );
    od.clear();
}

#[test]
fn return_stack_rides_along_and_pops_in_reverse() {
    let log = Arc::new(AfterWriteLog {
        calls: StdMutex::new(Vec::new()),
    });
    let od = build_od(log);

    let mut request = Request::new(RequestPayload::Ping, 64).unwrap();
    request.push(ReturnStackItem::new(10, 11)).unwrap();
    request.push(ReturnStackItem::new(20, 21)).unwrap();

    let mut response = process_request(&od, round_trip(request));
    assert_eq!(response.payload(), &ResponsePayload::Pong);

    // serialize the response across the wire, too
    let mut w_storage = [0u8; 64];
    let mut w = MemStreamWriter::new(&mut w_storage, Endian::Little);
    response.to_binary(&mut w).unwrap();
    let size = w.nb_of_bytes_written();
    let mut r = MemStreamReader::new(&w_storage[..size], Endian::Little);
    let mut decoded = Response::from_binary(&mut r).unwrap();

    assert_eq!(decoded.pop_return_stack(), Some(ReturnStackItem::new(20, 21)));
    assert_eq!(decoded.pop_return_stack(), Some(ReturnStackItem::new(10, 11)));
    assert_eq!(decoded.pop_return_stack(), None);
    od.clear();
}
