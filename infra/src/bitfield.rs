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

//! A dynamically sized bit vector.
//!
//! Storage bits beyond the logical length are kept at zero after every
//! mutating operation, so whole-word comparison and search never see stale
//! data.

const BITS_PER_WORD: usize = u64::BITS as usize;

#[derive(Default, Clone)]
pub struct BitField {
    nb_of_bits: usize,
    words: Vec<u64>,
}

#[inline]
const fn words_for(bits: usize) -> usize {
    bits.div_ceil(BITS_PER_WORD)
}

impl BitField {
    pub const fn new() -> Self {
        Self {
            nb_of_bits: 0,
            words: Vec::new(),
        }
    }

    /// Creates a bit field with `nb_of_bits` bits, all cleared.
    pub fn with_size(nb_of_bits: usize) -> Self {
        Self {
            nb_of_bits,
            words: vec![0; words_for(nb_of_bits)],
        }
    }

    /// Creates a bit field from a byte image. Byte 0 provides bits 0..8
    /// (LSB first), byte 1 provides bits 8..16, and so on.
    pub fn from_bytes(nb_of_bits: usize, data: &[u8]) -> Self {
        assert!(
            data.len() * 8 >= nb_of_bits,
            "BitField::from_bytes: 'data' provides fewer bits than 'nb_of_bits'"
        );

        let mut bf = Self::with_size(nb_of_bits);
        for i in 0..nb_of_bits {
            if (data[i / 8] >> (i % 8)) & 1 != 0 {
                bf.words[i / BITS_PER_WORD] |= 1u64 << (i % BITS_PER_WORD);
            }
        }
        bf
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nb_of_bits
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nb_of_bits == 0
    }

    /// Resizes to `new_size` bits. The prefix up to `min(old, new)` is
    /// preserved, new bits read as zero.
    pub fn resize(&mut self, new_size: usize) {
        self.words.resize(words_for(new_size), 0);
        self.nb_of_bits = new_size;
        self.clear_upper_bits();
    }

    #[inline]
    pub fn get_bit(&self, index: usize) -> bool {
        assert!(index < self.nb_of_bits, "BitField::get_bit: 'index' out of bounds");
        (self.words[index / BITS_PER_WORD] >> (index % BITS_PER_WORD)) & 1 != 0
    }

    #[inline]
    pub fn set_bit(&mut self, index: usize) {
        assert!(index < self.nb_of_bits, "BitField::set_bit: 'index' out of bounds");
        self.words[index / BITS_PER_WORD] |= 1u64 << (index % BITS_PER_WORD);
    }

    #[inline]
    pub fn clear_bit(&mut self, index: usize) {
        assert!(index < self.nb_of_bits, "BitField::clear_bit: 'index' out of bounds");
        self.words[index / BITS_PER_WORD] &= !(1u64 << (index % BITS_PER_WORD));
    }

    #[inline]
    pub fn write_bit(&mut self, index: usize, value: bool) {
        if value {
            self.set_bit(index);
        } else {
            self.clear_bit(index);
        }
    }

    pub fn clear_all(&mut self) {
        self.words.fill(0);
    }

    pub fn set_all(&mut self) {
        self.words.fill(u64::MAX);
        self.clear_upper_bits();
    }

    /// Extracts up to 64 bits starting at `index`. Bit `index` lands in the
    /// LSB of the result.
    pub fn get_bits(&self, index: usize, n: usize) -> u64 {
        assert!(n >= 1 && n <= 64, "BitField::get_bits: 'n' out of bounds");
        assert!(
            index < self.nb_of_bits && n <= self.nb_of_bits - index,
            "BitField::get_bits: range out of bounds"
        );

        let mut result = 0u64;
        for i in (0..n).rev() {
            result = (result << 1) | (self.get_bit(index + i) as u64);
        }
        result
    }

    /// Inserts the lowest `n` bits of `value` starting at `index`.
    pub fn set_bits(&mut self, index: usize, n: usize, value: u64) {
        assert!(n >= 1 && n <= 64, "BitField::set_bits: 'n' out of bounds");
        assert!(
            index < self.nb_of_bits && n <= self.nb_of_bits - index,
            "BitField::set_bits: range out of bounds"
        );

        for i in 0..n {
            self.write_bit(index + i, (value >> i) & 1 != 0);
        }
    }

    /// Finds the first set bit at or after `from`. Returns `None` if there
    /// is none.
    pub fn find_first_set(&self, from: usize) -> Option<usize> {
        self.scan(from, false)
    }

    /// Finds the first cleared bit at or after `from`.
    pub fn find_first_cleared(&self, from: usize) -> Option<usize> {
        self.scan(from, true)
    }

    fn scan(&self, from: usize, cleared_not_set: bool) -> Option<usize> {
        if from >= self.nb_of_bits {
            return None;
        }

        let mut word_idx = from / BITS_PER_WORD;
        let mut word = if cleared_not_set {
            !self.words[word_idx]
        } else {
            self.words[word_idx]
        };
        // mask off bits below 'from'
        word &= u64::MAX << (from % BITS_PER_WORD);

        loop {
            if word != 0 {
                let bit = word_idx * BITS_PER_WORD + word.trailing_zeros() as usize;
                return (bit < self.nb_of_bits).then_some(bit);
            }

            word_idx += 1;
            if word_idx == self.words.len() {
                return None;
            }
            word = if cleared_not_set {
                !self.words[word_idx]
            } else {
                self.words[word_idx]
            };
        }
    }

    // Keeps the invariant: storage bits at and beyond nb_of_bits are zero.
    fn clear_upper_bits(&mut self) {
        let used = self.nb_of_bits % BITS_PER_WORD;
        if used != 0 {
            if let Some(last) = self.words.last_mut() {
                *last &= (1u64 << used) - 1;
            }
        }
    }
}

impl PartialEq for BitField {
    fn eq(&self, other: &Self) -> bool {
        self.nb_of_bits == other.nb_of_bits && self.words == other.words
    }
}

impl Eq for BitField {}

impl core::fmt::Debug for BitField {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "BitField({} bits)", self.nb_of_bits)
    }
}
