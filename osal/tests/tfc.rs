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

//! Virtual-clock scenarios.
//!
//! All participants of the virtual clock share one process-wide state, so
//! everything runs inside a single test function executed on one runner
//! thread.

#![cfg(feature = "tfc")]

use blue_osal::thread;
use blue_osal::{SchedPolicy, Semaphore, Thread, TimePoint, TimeSpan};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};

#[test]
fn virtual_clock_scenarios() {
    sleep_advances_without_wall_time();
    concurrent_deadlines_fire_at_one_instant();
    semaphore_deadline_on_virtual_clock();
    cancellation_wakes_virtual_wait();
}

fn sleep_advances_without_wall_time() {
    let wall = Instant::now();
    let start = TimePoint::now_monotonic();

    let t = Thread::new("tfc-sleep");
    t.start(
        || {
            thread::sleep_ms(60_000);
            None
        },
        SchedPolicy::Other,
        0,
        0,
    )
    .unwrap();
    t.join().unwrap();

    let advanced = TimePoint::now_monotonic().checked_diff(start).unwrap();
    assert!(advanced >= TimeSpan::from_sec(60).unwrap());
    // a minute of virtual time in (much) less than a minute of wall time
    assert!(wall.elapsed() < Duration::from_secs(10));
}

fn concurrent_deadlines_fire_at_one_instant() {
    let wakes = Arc::new(StdMutex::new(Vec::new()));
    let t1 = Thread::new("tfc-sleeper-1");
    let t2 = Thread::new("tfc-sleeper-2");

    for t in [&t1, &t2] {
        let wakes = wakes.clone();
        t.start(
            move || {
                thread::sleep_ms(1000);
                wakes.lock().unwrap().push(TimePoint::now_monotonic());
                None
            },
            SchedPolicy::Other,
            0,
            0,
        )
        .unwrap();
    }
    t1.join().unwrap();
    t2.join().unwrap();

    let wakes = wakes.lock().unwrap();
    assert_eq!(wakes.len(), 2);
    assert_eq!(wakes[0], wakes[1]);
}

fn semaphore_deadline_on_virtual_clock() {
    let sem = Arc::new(Semaphore::new(0));
    let sem2 = sem.clone();

    let start = TimePoint::now_monotonic();
    let t = Thread::new("tfc-sem");
    t.start(
        move || {
            let deadline = TimePoint::now_monotonic()
                .checked_add(TimeSpan::from_ms(250).unwrap())
                .unwrap();
            assert!(!sem2.wait_with_deadline(deadline));
            None
        },
        SchedPolicy::Other,
        0,
        0,
    )
    .unwrap();
    t.join().unwrap();

    let advanced = TimePoint::now_monotonic().checked_diff(start).unwrap();
    assert!(advanced >= TimeSpan::from_ms(250).unwrap());
    assert!(!sem.try_wait());
}

fn cancellation_wakes_virtual_wait() {
    let sem = Arc::new(Semaphore::new(0));
    let sem2 = sem.clone();

    let t = Thread::new("tfc-cancel");
    t.start(
        move || {
            sem2.wait();
            None
        },
        SchedPolicy::Other,
        0,
        0,
    )
    .unwrap();

    // give the worker a moment to reach the wait site
    std::thread::sleep(Duration::from_millis(50));
    t.cancel().unwrap();
    let r = t.join().unwrap();
    assert!(r.cancelled);
}
