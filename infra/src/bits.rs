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

//! Portable bit-level helpers.
//!
//! Every function here compiles down to the machine intrinsic where one
//! exists; the zero/all-ones inputs are well defined (the full bit width is
//! returned), so callers never have to special-case them.

/// Counts leading zeros. `count_leading_zeros(0)` is 32.
#[inline]
pub fn count_leading_zeros(x: u32) -> u32 {
    x.leading_zeros()
}

/// Counts leading ones. `count_leading_ones(u32::MAX)` is 32.
#[inline]
pub fn count_leading_ones(x: u32) -> u32 {
    x.leading_ones()
}

/// Counts trailing zeros. `count_trailing_zeros(0)` is 32.
#[inline]
pub fn count_trailing_zeros(x: u32) -> u32 {
    x.trailing_zeros()
}

/// Counts trailing ones. `count_trailing_ones(u32::MAX)` is 32.
#[inline]
pub fn count_trailing_ones(x: u32) -> u32 {
    x.trailing_ones()
}

/// Reverses the bit order of an 8 bit value.
#[inline]
pub fn reverse_bits_8(value: u8) -> u8 {
    value.reverse_bits()
}

/// Reverses the bit order of a 16 bit value.
#[inline]
pub fn reverse_bits_16(value: u16) -> u16 {
    value.reverse_bits()
}

/// Reverses the bit order of a 32 bit value.
#[inline]
pub fn reverse_bits_32(value: u32) -> u32 {
    value.reverse_bits()
}

/// Adds two signed 64 bit values. Returns `None` on overflow.
#[inline]
pub fn overflow_aware_add(a: i64, b: i64) -> Option<i64> {
    a.checked_add(b)
}

/// Adds two signed 64 bit values and narrows the sum to 32 bit.
/// Returns `None` if the sum overflows 64 bit or does not fit into `i32`.
#[inline]
pub fn overflow_aware_add_narrow(a: i64, b: i64) -> Option<i32> {
    i32::try_from(a.checked_add(b)?).ok()
}

/// Subtracts two signed 64 bit values. Returns `None` on overflow.
#[inline]
pub fn overflow_aware_sub(a: i64, b: i64) -> Option<i64> {
    a.checked_sub(b)
}

/// Subtracts two signed 64 bit values and narrows the difference to 32 bit.
#[inline]
pub fn overflow_aware_sub_narrow(a: i64, b: i64) -> Option<i32> {
    i32::try_from(a.checked_sub(b)?).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_leading_zeros() {
        assert_eq!(count_leading_zeros(0), 32);
        assert_eq!(count_leading_zeros(1), 31);
        assert_eq!(count_leading_zeros(8), 28);
        assert_eq!(count_leading_zeros(0x8000_0000), 0);
        assert_eq!(count_leading_zeros(u32::MAX), 0);
    }

    #[test]
    fn test_count_leading_ones() {
        assert_eq!(count_leading_ones(0), 0);
        assert_eq!(count_leading_ones(u32::MAX), 32);
        assert_eq!(count_leading_ones(0xFFFF_FFF0), 28);
    }

    #[test]
    fn test_count_trailing_zeros() {
        assert_eq!(count_trailing_zeros(0), 32);
        assert_eq!(count_trailing_zeros(1), 0);
        assert_eq!(count_trailing_zeros(8), 3);
        assert_eq!(count_trailing_zeros(0x8000_0000), 31);
    }

    #[test]
    fn test_count_trailing_ones() {
        assert_eq!(count_trailing_ones(0), 0);
        assert_eq!(count_trailing_ones(7), 3);
        assert_eq!(count_trailing_ones(u32::MAX), 32);
    }

    #[test]
    fn test_reverse_bits_8() {
        assert_eq!(reverse_bits_8(0x00), 0x00);
        assert_eq!(reverse_bits_8(0x01), 0x80);
        assert_eq!(reverse_bits_8(0x12), 0x48);
        assert_eq!(reverse_bits_8(reverse_bits_8(0xA7)), 0xA7);
    }

    #[test]
    fn test_reverse_bits_16() {
        assert_eq!(reverse_bits_16(0x0001), 0x8000);
        assert_eq!(reverse_bits_16(0x1234), 0x2C48);
        assert_eq!(reverse_bits_16(reverse_bits_16(0xBEEF)), 0xBEEF);
    }

    #[test]
    fn test_reverse_bits_32() {
        assert_eq!(reverse_bits_32(0x12345678), 0x1E6A2C48);
        assert_eq!(reverse_bits_32(0x1E6A2C48), 0x12345678);
        assert_eq!(reverse_bits_32(0x0000_0001), 0x8000_0000);
        assert_eq!(reverse_bits_32(reverse_bits_32(0xDEAD_BEEF)), 0xDEAD_BEEF);
    }

    #[test]
    fn test_overflow_aware_add() {
        assert_eq!(overflow_aware_add(2, 3), Some(5));
        assert_eq!(overflow_aware_add(i64::MAX, 1), None);
        assert_eq!(overflow_aware_add(i64::MIN, -1), None);
        assert_eq!(overflow_aware_add(i64::MAX, i64::MIN), Some(-1));
    }

    #[test]
    fn test_overflow_aware_add_narrow() {
        assert_eq!(overflow_aware_add_narrow(1, 2), Some(3));
        assert_eq!(overflow_aware_add_narrow(i32::MAX as i64, 0), Some(i32::MAX));
        assert_eq!(overflow_aware_add_narrow(i32::MAX as i64, 1), None);
        assert_eq!(overflow_aware_add_narrow(i64::MAX, 1), None);
    }

    #[test]
    fn test_overflow_aware_sub() {
        assert_eq!(overflow_aware_sub(2, 3), Some(-1));
        assert_eq!(overflow_aware_sub(i64::MIN, 1), None);
        assert_eq!(overflow_aware_sub(0, i64::MIN), None);
    }

    #[test]
    fn test_overflow_aware_sub_narrow() {
        assert_eq!(overflow_aware_sub_narrow(2, 3), Some(-1));
        assert_eq!(overflow_aware_sub_narrow(i32::MIN as i64, 1), None);
        assert_eq!(overflow_aware_sub_narrow(0, i64::MIN), None);
    }
}
