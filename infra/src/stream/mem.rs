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

//! Memory backed stream implementations.

use super::{
    Endian, ReaderState, Result, StreamError, StreamReader, StreamWriter, WriterState,
};

/// Stream writer over a caller-supplied slice with fixed capacity.
pub struct MemStreamWriter<'a> {
    buf: &'a mut [u8],
    pos: usize,
    state: WriterState,
    endian: Endian,
    bit_buf: u16,
    nb_bits: u8,
}

impl<'a> MemStreamWriter<'a> {
    pub fn new(buf: &'a mut [u8], endian: Endian) -> Self {
        let state = if buf.is_empty() {
            WriterState::Full
        } else {
            WriterState::Open
        };
        Self {
            buf,
            pos: 0,
            state,
            endian,
            bit_buf: 0,
            nb_bits: 0,
        }
    }

    /// Number of whole bytes emitted so far.
    pub fn nb_of_bytes_written(&self) -> usize {
        self.pos
    }

    fn check_writable(&mut self) -> Result<()> {
        match self.state {
            WriterState::Open => Ok(()),
            WriterState::Full => {
                self.state = WriterState::Error;
                Err(StreamError::Full)
            }
            WriterState::Closed => Err(StreamError::Closed),
            WriterState::Error => Err(StreamError::ErrorState),
        }
    }

    fn emit(&mut self, byte: u8) -> Result<()> {
        if self.pos >= self.buf.len() {
            self.state = WriterState::Error;
            return Err(StreamError::Full);
        }
        self.buf[self.pos] = byte;
        self.pos += 1;
        if self.pos == self.buf.len() && self.nb_bits == 0 {
            self.state = WriterState::Full;
        }
        Ok(())
    }

    fn flush_carry(&mut self) -> Result<()> {
        if self.nb_bits != 0 {
            let byte = self.bit_buf as u8;
            self.bit_buf = 0;
            self.nb_bits = 0;
            self.emit(byte)?;
        }
        Ok(())
    }
}

impl StreamWriter for MemStreamWriter<'_> {
    fn state(&self) -> WriterState {
        self.state
    }

    fn endian(&self) -> Endian {
        self.endian
    }

    fn remaining_capacity(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn nb_of_cached_bits(&self) -> u8 {
        self.nb_bits
    }

    fn push_byte(&mut self, byte: u8) -> Result<()> {
        self.check_writable()?;
        self.flush_carry()?;
        self.emit(byte)
    }

    fn push_bits(&mut self, bits: u8, n: u8) -> Result<()> {
        assert!(n <= 8, "push_bits: 'n' exceeds 8");
        if n == 0 {
            return Ok(());
        }
        self.check_writable()?;

        let mask = ((1u16 << n) - 1) as u16;
        self.bit_buf |= ((bits as u16) & mask) << self.nb_bits;
        self.nb_bits += n;

        if self.nb_bits >= 8 {
            let byte = self.bit_buf as u8;
            self.bit_buf >>= 8;
            self.nb_bits -= 8;
            self.emit(byte)?;
        }
        Ok(())
    }

    fn close(&mut self) {
        if self.state == WriterState::Open || self.state == WriterState::Full {
            let _ = self.flush_carry();
        }
        self.state = WriterState::Closed;
    }
}

/// Growable stream writer over a `Vec<u8>`; never runs full.
pub struct VectorStreamWriter {
    vec: Vec<u8>,
    state: WriterState,
    endian: Endian,
    bit_buf: u16,
    nb_bits: u8,
}

impl VectorStreamWriter {
    pub fn new(endian: Endian) -> Self {
        Self {
            vec: Vec::new(),
            state: WriterState::Open,
            endian,
            bit_buf: 0,
            nb_bits: 0,
        }
    }

    pub fn with_capacity(capacity: usize, endian: Endian) -> Self {
        let mut w = Self::new(endian);
        w.vec.reserve(capacity);
        w
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.vec
    }

    /// Flushes cached bits (zero-padded) and yields the assembled buffer.
    pub fn into_vec(mut self) -> Vec<u8> {
        self.flush_carry();
        std::mem::take(&mut self.vec)
    }

    fn check_writable(&self) -> Result<()> {
        match self.state {
            WriterState::Open => Ok(()),
            WriterState::Closed => Err(StreamError::Closed),
            _ => Err(StreamError::ErrorState),
        }
    }

    fn flush_carry(&mut self) {
        if self.nb_bits != 0 {
            self.vec.push(self.bit_buf as u8);
            self.bit_buf = 0;
            self.nb_bits = 0;
        }
    }
}

impl StreamWriter for VectorStreamWriter {
    fn state(&self) -> WriterState {
        self.state
    }

    fn endian(&self) -> Endian {
        self.endian
    }

    fn remaining_capacity(&self) -> usize {
        usize::MAX
    }

    fn nb_of_cached_bits(&self) -> u8 {
        self.nb_bits
    }

    fn push_byte(&mut self, byte: u8) -> Result<()> {
        self.check_writable()?;
        self.flush_carry();
        self.vec.push(byte);
        Ok(())
    }

    fn push_bits(&mut self, bits: u8, n: u8) -> Result<()> {
        assert!(n <= 8, "push_bits: 'n' exceeds 8");
        if n == 0 {
            return Ok(());
        }
        self.check_writable()?;

        let mask = ((1u16 << n) - 1) as u16;
        self.bit_buf |= ((bits as u16) & mask) << self.nb_bits;
        self.nb_bits += n;

        if self.nb_bits >= 8 {
            self.vec.push(self.bit_buf as u8);
            self.bit_buf >>= 8;
            self.nb_bits -= 8;
        }
        Ok(())
    }

    fn close(&mut self) {
        if self.state == WriterState::Open {
            self.flush_carry();
        }
        self.state = WriterState::Closed;
    }
}

/// Stream reader over a borrowed slice.
pub struct MemStreamReader<'a> {
    buf: &'a [u8],
    pos: usize,
    state: ReaderState,
    endian: Endian,
    bit_buf: u16,
    nb_bits: u8,
}

impl<'a> MemStreamReader<'a> {
    pub fn new(buf: &'a [u8], endian: Endian) -> Self {
        let state = if buf.is_empty() {
            ReaderState::Empty
        } else {
            ReaderState::Open
        };
        Self {
            buf,
            pos: 0,
            state,
            endian,
            bit_buf: 0,
            nb_bits: 0,
        }
    }

    fn check_readable(&mut self) -> Result<()> {
        match self.state {
            ReaderState::Open => Ok(()),
            ReaderState::Empty => {
                self.state = ReaderState::Error;
                Err(StreamError::Empty)
            }
            ReaderState::Closed => Err(StreamError::Closed),
            ReaderState::Error => Err(StreamError::ErrorState),
        }
    }

    fn update_empty(&mut self) {
        if self.pos == self.buf.len() && self.nb_bits == 0 && self.state == ReaderState::Open {
            self.state = ReaderState::Empty;
        }
    }
}

impl StreamReader for MemStreamReader<'_> {
    fn state(&self) -> ReaderState {
        self.state
    }

    fn endian(&self) -> Endian {
        self.endian
    }

    fn remaining_bits(&self) -> usize {
        (self.buf.len() - self.pos) * 8 + self.nb_bits as usize
    }

    fn pop_byte(&mut self) -> Result<u8> {
        self.check_readable()?;

        // a byte access discards the rest of a partially consumed byte
        self.bit_buf = 0;
        self.nb_bits = 0;

        if self.pos >= self.buf.len() {
            self.state = ReaderState::Error;
            return Err(StreamError::Empty);
        }
        let b = self.buf[self.pos];
        self.pos += 1;
        self.update_empty();
        Ok(b)
    }

    fn pop_bits(&mut self, n: u8) -> Result<u8> {
        assert!(n <= 8, "pop_bits: 'n' exceeds 8");
        if n == 0 {
            return Ok(0);
        }
        self.check_readable()?;

        while self.nb_bits < n {
            if self.pos >= self.buf.len() {
                self.state = ReaderState::Error;
                return Err(StreamError::Empty);
            }
            self.bit_buf |= (self.buf[self.pos] as u16) << self.nb_bits;
            self.pos += 1;
            self.nb_bits += 8;
        }

        let mask = ((1u16 << n) - 1) as u16;
        let bits = (self.bit_buf & mask) as u8;
        self.bit_buf >>= n;
        self.nb_bits -= n;
        self.update_empty();
        Ok(bits)
    }

    fn skip(&mut self, nbits: usize) -> Result<()> {
        if nbits == 0 {
            return Ok(());
        }
        self.check_readable()?;

        if nbits > self.remaining_bits() {
            self.state = ReaderState::Error;
            return Err(StreamError::Empty);
        }

        let mut left = nbits;

        // cached bits first
        let from_cache = left.min(self.nb_bits as usize);
        self.bit_buf >>= from_cache;
        self.nb_bits -= from_cache as u8;
        left -= from_cache;

        // whole bytes
        let whole = left / 8;
        self.pos += whole;
        left -= whole * 8;

        // head of the next byte
        if left != 0 {
            self.bit_buf = (self.buf[self.pos] >> left) as u16;
            self.pos += 1;
            self.nb_bits = 8 - left as u8;
        }

        self.update_empty();
        Ok(())
    }

    fn close(&mut self) {
        self.state = ReaderState::Closed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::RemainingBits;

    #[test]
    fn test_write_read_little_endian() {
        let mut storage = [0u8; 16];
        let mut w = MemStreamWriter::new(&mut storage, Endian::Little);
        w.write_u16(0xABCD).unwrap();
        w.write_u32(0x11223344).unwrap();
        w.write_u8(0x5A).unwrap();
        assert_eq!(w.nb_of_bytes_written(), 7);
        w.close();
        assert_eq!(w.state(), WriterState::Closed);

        assert_eq!(&storage[..7], &[0xCD, 0xAB, 0x44, 0x33, 0x22, 0x11, 0x5A]);

        let mut r = MemStreamReader::new(&storage[..7], Endian::Little);
        assert_eq!(r.read_u16().unwrap(), 0xABCD);
        assert_eq!(r.read_u32().unwrap(), 0x11223344);
        assert_eq!(r.read_u8().unwrap(), 0x5A);
        assert_eq!(r.state(), ReaderState::Empty);
        r.ensure_all_data_consumed(RemainingBits::Zero).unwrap();
    }

    #[test]
    fn test_write_read_big_endian() {
        let mut storage = [0u8; 8];
        let mut w = MemStreamWriter::new(&mut storage, Endian::Big);
        w.write_u32(0x11223344).unwrap();
        assert_eq!(&storage[..4], &[0x11, 0x22, 0x33, 0x44]);

        let mut r = MemStreamReader::new(&storage[..4], Endian::Big);
        assert_eq!(r.read_u32().unwrap(), 0x11223344);
    }

    #[test]
    fn test_bit_packing_is_lsb_first() {
        let mut w = VectorStreamWriter::new(Endian::Big);
        w.write_bool(true).unwrap();
        w.write_bool(false).unwrap();
        w.push_bits(0b101, 3).unwrap();
        assert_eq!(w.nb_of_cached_bits(), 5);
        let padding = w.align_to_byte_boundary(true).unwrap();
        assert_eq!(padding, 3);
        // bits: 1,0,1,0,1 then three one-bits of padding
        assert_eq!(w.into_vec(), vec![0b1111_0101]);
    }

    #[test]
    fn test_byte_write_pads_cached_bits() {
        let mut w = VectorStreamWriter::new(Endian::Little);
        w.push_bits(0b11, 2).unwrap();
        w.write_u8(0xAA).unwrap();
        assert_eq!(w.into_vec(), vec![0b0000_0011, 0xAA]);
    }

    #[test]
    fn test_fill_bits_zero_is_noop() {
        let mut w = VectorStreamWriter::new(Endian::Little);
        w.push_bits(0b1, 1).unwrap();
        w.fill_bits(0, true).unwrap();
        assert_eq!(w.nb_of_cached_bits(), 1);
        assert!(w.as_slice().is_empty());
    }

    #[test]
    fn test_fill_bits_and_bytes() {
        let mut w = VectorStreamWriter::new(Endian::Little);
        w.fill_bits(12, true).unwrap();
        w.align_to_byte_boundary(false).unwrap();
        w.fill_bytes(2, 0x55).unwrap();
        assert_eq!(w.into_vec(), vec![0xFF, 0x0F, 0x55, 0x55]);
    }

    #[test]
    fn test_writer_full_and_sticky_error() {
        let mut storage = [0u8; 2];
        let mut w = MemStreamWriter::new(&mut storage, Endian::Little);
        w.write_u16(0x1234).unwrap();
        assert_eq!(w.state(), WriterState::Full);
        assert_eq!(w.remaining_capacity(), 0);

        assert_eq!(w.write_u8(1), Err(StreamError::Full));
        assert_eq!(w.state(), WriterState::Error);
        // error state is permanent
        assert_eq!(w.write_u8(1), Err(StreamError::ErrorState));
    }

    #[test]
    fn test_writer_closed_rejects() {
        let mut storage = [0u8; 4];
        let mut w = MemStreamWriter::new(&mut storage, Endian::Little);
        w.close();
        assert_eq!(w.write_u8(1), Err(StreamError::Closed));
    }

    #[test]
    fn test_close_flushes_cached_bits() {
        let mut storage = [0u8; 4];
        let mut w = MemStreamWriter::new(&mut storage, Endian::Little);
        w.push_bits(0b101, 3).unwrap();
        w.close();
        assert_eq!(storage[0], 0b0000_0101);
    }

    #[test]
    fn test_reader_empty_and_sticky_error() {
        let data = [0x01u8];
        let mut r = MemStreamReader::new(&data, Endian::Little);
        assert_eq!(r.read_u8().unwrap(), 1);
        assert_eq!(r.state(), ReaderState::Empty);
        assert_eq!(r.read_u8(), Err(StreamError::Empty));
        assert_eq!(r.state(), ReaderState::Error);
        assert_eq!(r.read_u8(), Err(StreamError::ErrorState));
    }

    #[test]
    fn test_reader_bits_across_byte_boundary() {
        let data = [0b1010_1010u8, 0b0000_1111];
        let mut r = MemStreamReader::new(&data, Endian::Little);
        assert_eq!(r.pop_bits(6).unwrap(), 0b10_1010);
        // crosses into the second byte: remaining "10" + "1111" of byte 2
        assert_eq!(r.pop_bits(6).unwrap(), 0b1111_10);
        assert_eq!(r.remaining_bits(), 4);
    }

    #[test]
    fn test_byte_read_discards_cached_bits() {
        let data = [0xFFu8, 0x42];
        let mut r = MemStreamReader::new(&data, Endian::Little);
        assert_eq!(r.pop_bits(3).unwrap(), 0b111);
        assert_eq!(r.read_u8().unwrap(), 0x42);
        assert_eq!(r.state(), ReaderState::Empty);
    }

    #[test]
    fn test_skip() {
        let data = [0x00u8, 0xFF, 0b0000_0110];
        let mut r = MemStreamReader::new(&data, Endian::Little);
        r.skip(9).unwrap();
        assert_eq!(r.pop_bits(7).unwrap(), 0b111_1111);
        r.skip(1).unwrap();
        assert_eq!(r.pop_bits(2).unwrap(), 0b11);
        r.skip(5).unwrap();
        assert_eq!(r.state(), ReaderState::Empty);
        assert_eq!(r.skip(1), Err(StreamError::Empty));
    }

    #[test]
    fn test_ensure_all_data_consumed_policies() {
        let data = [0x12u8, 0x34];
        let mut r = MemStreamReader::new(&data, Endian::Little);
        r.pop_bits(4).unwrap();
        // 12 bits left
        assert_eq!(
            r.ensure_all_data_consumed(RemainingBits::SevenOrLess),
            Err(StreamError::RemainingBits)
        );
        r.pop_byte().unwrap();
        // byte access discarded 4 cached bits, one byte was consumed: 0 left
        r.ensure_all_data_consumed(RemainingBits::SevenOrLess).unwrap();
        r.ensure_all_data_consumed(RemainingBits::Zero).unwrap();

        let mut r2 = MemStreamReader::new(&data, Endian::Little);
        r2.pop_bits(4).unwrap();
        r2.pop_bits(8).unwrap();
        // 4 bits left
        r2.ensure_all_data_consumed(RemainingBits::SevenOrLess).unwrap();
        assert_eq!(
            r2.ensure_all_data_consumed(RemainingBits::Zero),
            Err(StreamError::RemainingBits)
        );
        r2.ensure_all_data_consumed(RemainingBits::Any).unwrap();
    }

    #[test]
    fn test_float_round_trip_is_bit_exact() {
        let mut w = VectorStreamWriter::new(Endian::Little);
        w.write_f32(core::f32::consts::PI).unwrap();
        w.write_f64(-0.0).unwrap();
        w.write_f32(f32::NAN).unwrap();
        let data = w.into_vec();

        let mut r = MemStreamReader::new(&data, Endian::Little);
        assert_eq!(r.read_f32().unwrap().to_bits(), core::f32::consts::PI.to_bits());
        assert_eq!(r.read_f64().unwrap().to_bits(), (-0.0f64).to_bits());
        assert_eq!(r.read_f32().unwrap().to_bits(), f32::NAN.to_bits());
    }

    #[test]
    fn test_string_and_line() {
        let mut w = VectorStreamWriter::new(Endian::Little);
        w.write_str("abc").unwrap();
        w.write_line("def").unwrap();
        let data = w.into_vec();
        assert_eq!(data, b"abc\0def\n");

        let mut r = MemStreamReader::new(&data, Endian::Little);
        assert_eq!(r.read_string().unwrap(), "abc");
        assert_eq!(r.read_line().unwrap(), "def");
        assert_eq!(r.state(), ReaderState::Empty);
    }

    #[test]
    fn test_write_bits_slice() {
        let mut w = VectorStreamWriter::new(Endian::Little);
        w.write_bits(&[0xA5, 0x03], 10).unwrap();
        w.align_to_byte_boundary(false).unwrap();
        assert_eq!(w.into_vec(), vec![0xA5, 0x03]);
    }

    #[test]
    fn test_vector_writer_grows() {
        let mut w = VectorStreamWriter::new(Endian::Little);
        for i in 0..1000u32 {
            w.write_u32(i).unwrap();
        }
        assert_eq!(w.as_slice().len(), 4000);
        assert_eq!(w.remaining_capacity(), usize::MAX);
    }
}
