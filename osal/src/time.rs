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

//! Time points and time spans with overflow-checked arithmetic.
//!
//! A failed operation returns an error and leaves both operands untouched.

use blue_infra::bits;
use std::fmt;
use std::time::Duration;

pub(crate) const NSEC_PER_SEC: i64 = 1_000_000_000;

/// Arithmetic overflowed the representable range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeError;

impl fmt::Display for TimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("time arithmetic overflow")
    }
}

impl std::error::Error for TimeError {}

/// Signed span of time with nanosecond resolution.
///
/// Range is the full `i64` nanosecond range, about +/- 292 years.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeSpan {
    ns: i64,
}

impl TimeSpan {
    pub const ZERO: TimeSpan = TimeSpan { ns: 0 };
    pub const MIN: TimeSpan = TimeSpan { ns: i64::MIN };
    pub const MAX: TimeSpan = TimeSpan { ns: i64::MAX };

    pub const fn from_ns(ns: i64) -> Self {
        Self { ns }
    }

    pub fn from_us(us: i64) -> Result<Self, TimeError> {
        Ok(Self {
            ns: us.checked_mul(1_000).ok_or(TimeError)?,
        })
    }

    pub fn from_ms(ms: i64) -> Result<Self, TimeError> {
        Ok(Self {
            ns: ms.checked_mul(1_000_000).ok_or(TimeError)?,
        })
    }

    pub fn from_sec(sec: i64) -> Result<Self, TimeError> {
        Ok(Self {
            ns: sec.checked_mul(NSEC_PER_SEC).ok_or(TimeError)?,
        })
    }

    pub fn from_min(min: i64) -> Result<Self, TimeError> {
        Ok(Self {
            ns: min.checked_mul(60 * NSEC_PER_SEC).ok_or(TimeError)?,
        })
    }

    pub fn from_hr(hr: i64) -> Result<Self, TimeError> {
        Ok(Self {
            ns: hr.checked_mul(3_600 * NSEC_PER_SEC).ok_or(TimeError)?,
        })
    }

    pub fn from_days(days: i64) -> Result<Self, TimeError> {
        Ok(Self {
            ns: days.checked_mul(86_400 * NSEC_PER_SEC).ok_or(TimeError)?,
        })
    }

    pub const fn ns(&self) -> i64 {
        self.ns
    }

    pub const fn us(&self) -> i64 {
        self.ns / 1_000
    }

    pub const fn ms(&self) -> i64 {
        self.ns / 1_000_000
    }

    pub const fn sec(&self) -> i64 {
        self.ns / NSEC_PER_SEC
    }

    pub fn checked_add(&self, rhs: TimeSpan) -> Result<TimeSpan, TimeError> {
        Ok(Self {
            ns: bits::overflow_aware_add(self.ns, rhs.ns).ok_or(TimeError)?,
        })
    }

    pub fn checked_sub(&self, rhs: TimeSpan) -> Result<TimeSpan, TimeError> {
        Ok(Self {
            ns: bits::overflow_aware_sub(self.ns, rhs.ns).ok_or(TimeError)?,
        })
    }

    pub fn checked_neg(&self) -> Result<TimeSpan, TimeError> {
        Ok(Self {
            ns: self.ns.checked_neg().ok_or(TimeError)?,
        })
    }

    /// Conversion for waiting; negative spans clamp to zero.
    pub fn to_duration(&self) -> Duration {
        if self.ns <= 0 {
            Duration::ZERO
        } else {
            Duration::from_nanos(self.ns as u64)
        }
    }
}

impl fmt::Display for TimeSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ns < 0 {
            f.write_str("-")?;
        }
        // i64::MIN has no positive counterpart; render via u64
        let mut rest = self.ns.unsigned_abs();
        let days = rest / (86_400 * NSEC_PER_SEC as u64);
        rest %= 86_400 * NSEC_PER_SEC as u64;
        let hr = rest / (3_600 * NSEC_PER_SEC as u64);
        rest %= 3_600 * NSEC_PER_SEC as u64;
        let min = rest / (60 * NSEC_PER_SEC as u64);
        rest %= 60 * NSEC_PER_SEC as u64;
        let sec = rest / NSEC_PER_SEC as u64;
        rest %= NSEC_PER_SEC as u64;
        if days != 0 {
            write!(f, "{}d ", days)?;
        }
        write!(f, "{:02}:{:02}:{:02}.{:09}", hr, min, sec, rest)
    }
}

/// A point on the monotonic or realtime clock.
///
/// Always normalized: `nsec` is in `0..1_000_000_000`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimePoint {
    sec: i64,
    nsec: u32,
}

impl TimePoint {
    pub const ZERO: TimePoint = TimePoint { sec: 0, nsec: 0 };

    /// Creates a normalized time point from seconds and a nanosecond part
    /// that may exceed one second.
    pub fn new(sec: i64, nsec: i64) -> Result<Self, TimeError> {
        let extra_sec = nsec.div_euclid(NSEC_PER_SEC);
        let nsec = nsec.rem_euclid(NSEC_PER_SEC);
        Ok(Self {
            sec: sec.checked_add(extra_sec).ok_or(TimeError)?,
            nsec: nsec as u32,
        })
    }

    pub const fn sec(&self) -> i64 {
        self.sec
    }

    pub const fn nsec(&self) -> u32 {
        self.nsec
    }

    pub(crate) fn total_ns(&self) -> i128 {
        self.sec as i128 * NSEC_PER_SEC as i128 + self.nsec as i128
    }

    pub(crate) fn from_total_ns(ns: i128) -> Self {
        Self {
            sec: (ns.div_euclid(NSEC_PER_SEC as i128)) as i64,
            nsec: (ns.rem_euclid(NSEC_PER_SEC as i128)) as u32,
        }
    }

    /// Reads the monotonic clock. With the `tfc` feature this is the virtual
    /// clock.
    pub fn now_monotonic() -> Self {
        cfg_if::cfg_if! {
            if #[cfg(feature = "tfc")] {
                crate::tfc::now()
            } else {
                Self::read_clock(libc::CLOCK_MONOTONIC)
            }
        }
    }

    /// Reads the realtime (wall) clock of the host.
    pub fn now_realtime() -> Self {
        Self::read_clock(libc::CLOCK_REALTIME)
    }

    #[allow(dead_code)]
    fn read_clock(clock: libc::clockid_t) -> Self {
        let mut ts = libc::timespec {
            tv_sec: 0,
            tv_nsec: 0,
        };
        // clock_gettime only fails for invalid clock ids
        let rc = unsafe { libc::clock_gettime(clock, &mut ts) };
        assert_eq!(rc, 0, "clock_gettime failed");
        Self {
            sec: ts.tv_sec,
            nsec: ts.tv_nsec as u32,
        }
    }

    /// Re-reads the monotonic clock into this time point.
    pub fn latch_monotonic(&mut self) {
        *self = Self::now_monotonic();
    }

    pub fn checked_add(&self, span: TimeSpan) -> Result<TimePoint, TimeError> {
        let total = self
            .total_ns()
            .checked_add(span.ns() as i128)
            .ok_or(TimeError)?;
        Self::checked_from_total(total)
    }

    pub fn checked_sub(&self, span: TimeSpan) -> Result<TimePoint, TimeError> {
        let total = self
            .total_ns()
            .checked_sub(span.ns() as i128)
            .ok_or(TimeError)?;
        Self::checked_from_total(total)
    }

    /// Difference of two time points. Fails if it does not fit a
    /// [`TimeSpan`].
    pub fn checked_diff(&self, rhs: TimePoint) -> Result<TimeSpan, TimeError> {
        let diff = self.total_ns() - rhs.total_ns();
        if diff < i64::MIN as i128 || diff > i64::MAX as i128 {
            return Err(TimeError);
        }
        Ok(TimeSpan::from_ns(diff as i64))
    }

    fn checked_from_total(total: i128) -> Result<TimePoint, TimeError> {
        const MIN: i128 = i64::MIN as i128 * NSEC_PER_SEC as i128;
        const MAX: i128 = (i64::MAX as i128 + 1) * NSEC_PER_SEC as i128 - 1;
        if !(MIN..=MAX).contains(&total) {
            return Err(TimeError);
        }
        Ok(Self::from_total_ns(total))
    }
}

impl fmt::Display for TimePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:09}s", self.sec, self.nsec)
    }
}
