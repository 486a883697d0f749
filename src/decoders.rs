/*
===============================================================================

  PROGRAMMERS:

    martin.isenburg@rapidlasso.com  -  http://rapidlasso.com
    uday.karan@gmail.com - Hobu, Inc.

  COPYRIGHT:

    (c) 2007-2014, martin isenburg, rapidlasso - tools to catch reality
    (c) 2014, Uday Verma, Hobu, Inc.
    (c) 2019, Thomas Montaigu

    This is free software; you can redistribute and/or modify it under the
    terms of the GNU Lesser General Licence as published by the Free Software
    Foundation. See the COPYING file for more information.

    This software is distributed WITHOUT ANY WARRANTY and without even the
    implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.

  CHANGE HISTORY:
    6 June 2019: Translated to Rust
===============================================================================
*/

// Fast arithmetic coding implementation
// -> 32-bit variables, 32-bit product, periodic updates, table decoding
//
// Based on the arithmetic coder by Amir Said (said@ieee.org) &
// William A. Pearlman (pearlw@ecse.rpi.edu), as described in
// Lossless Compression Handbook, ed. K. Sayood
// Chapter 5: Arithmetic Coding (A. Said), pp. 101-152, Academic Press, 2003

use byteorder::ReadBytesExt;
use std::io::{Error, ErrorKind, Read};

use crate::models::{self, DM_LENGTH_SHIFT};

// maximum AC interval length
pub const AC_MAX_LENGTH: u32 = 0xFFFF_FFFF;
// threshold for renormalization
pub const AC_MIN_LENGTH: u32 = 0x0100_0000;

#[inline]
fn corrupt(what: &str) -> Error {
    Error::new(ErrorKind::InvalidData, format!("corrupt stream: {}", what))
}

pub struct ArithmeticDecoder<T: Read> {
    in_stream: T,
    value: u32,
    length: u32,
}

impl<T: Read> ArithmeticDecoder<T> {
    pub fn new(in_stream: T) -> Self {
        Self {
            in_stream,
            value: 0,
            length: AC_MAX_LENGTH,
        }
    }

    pub fn reset(&mut self) {
        self.value = 0;
        self.length = AC_MAX_LENGTH;
    }

    /// Primes the decoder with the first 4 bytes of a chunk.
    pub fn read_init_bytes(&mut self) -> std::io::Result<()> {
        let mut v = [0u8; 4];
        self.in_stream.read_exact(&mut v)?;
        self.value = u32::from_be_bytes(v);
        self.length = AC_MAX_LENGTH;
        Ok(())
    }

    pub fn decode_bit(&mut self, model: &mut models::ArithmeticBitModel) -> std::io::Result<u32> {
        let x = model.bit_0_prob * (self.length >> models::BM_LENGTH_SHIFT); // product l x p0

        let sym = self.value >= x;
        if !sym {
            self.length = x;
            model.bit_0_count += 1;
        } else {
            self.value -= x;
            self.length -= x;
        }
        if self.length < AC_MIN_LENGTH {
            self.renorm_dec_interval()?;
        }
        model.bits_until_update -= 1;
        if model.bits_until_update == 0 {
            model.update();
        }
        Ok(sym as u32)
    }

    pub fn decode_symbol(&mut self, model: &mut models::ArithmeticModel) -> std::io::Result<u32> {
        let mut sym;
        let mut n;
        let mut x;
        let mut y = self.length;

        if !model.decoder_table.is_empty() {
            // use table look-up for faster decoding
            self.length >>= DM_LENGTH_SHIFT;
            let dv = self.value / self.length;
            let t = (dv >> model.table_shift) as usize;
            if t + 1 >= model.decoder_table.len() {
                return Err(corrupt("symbol outside of the model table"));
            }

            // initial decision based on table look-up
            sym = model.decoder_table[t];
            n = model.decoder_table[t + 1] + 1;

            // finish with bisection search
            while n > sym + 1 {
                let k = (sym + n) >> 1;
                if model.distribution[k as usize] > dv {
                    n = k;
                } else {
                    sym = k;
                }
            }
            // compute products
            x = model.distribution[sym as usize] * self.length;
            if sym != model.last_symbol {
                y = model.distribution[sym as usize + 1] * self.length;
            }
        } else {
            x = 0;
            sym = 0;
            self.length >>= DM_LENGTH_SHIFT;
            n = model.symbols;
            let mut k = n >> 1;

            loop {
                let z = self.length * model.distribution[k as usize];
                if z > self.value {
                    n = k;
                    y = z; // value is smaller
                } else {
                    sym = k;
                    x = z; // value is larger or equal
                }
                k = (sym + n) >> 1;
                if k == sym {
                    break;
                }
            }
        }

        // update interval
        self.value = self.value.wrapping_sub(x);
        self.length = y.wrapping_sub(x);

        if self.length < AC_MIN_LENGTH {
            self.renorm_dec_interval()?;
        }
        model.symbol_count[sym as usize] += 1;
        model.symbols_until_update -= 1;
        if model.symbols_until_update == 0 {
            model.update();
        }
        Ok(sym)
    }

    #[inline]
    fn read_raw(&mut self, bits: u32) -> std::io::Result<u32> {
        // decode symbol, change length
        self.length >>= bits;
        let sym = self.value / self.length;
        if u64::from(sym) >= (1u64 << bits) {
            return Err(corrupt("raw symbol too large"));
        }
        // update interval
        self.value -= self.length * sym;
        if self.length < AC_MIN_LENGTH {
            self.renorm_dec_interval()?;
        }
        Ok(sym)
    }

    pub fn read_bit(&mut self) -> std::io::Result<u32> {
        self.read_raw(1)
    }

    /// Reads `bits` raw bits, `bits` must be in `1..=32`.
    pub fn read_bits(&mut self, bits: u32) -> std::io::Result<u32> {
        debug_assert!(bits > 0 && bits <= 32);
        if bits > 19 {
            let low = u32::from(self.read_short()?);
            let high = self.read_bits(bits - 16)? << 16;
            Ok(high | low)
        } else {
            self.read_raw(bits)
        }
    }

    pub fn read_byte(&mut self) -> std::io::Result<u8> {
        Ok(self.read_raw(8)? as u8)
    }

    pub fn read_short(&mut self) -> std::io::Result<u16> {
        Ok(self.read_raw(16)? as u16)
    }

    pub fn read_int(&mut self) -> std::io::Result<u32> {
        let lower_int = self.read_short()?;
        let upper_int = self.read_short()?;
        Ok(u32::from(upper_int) << 16 | u32::from(lower_int))
    }

    pub fn read_int_64(&mut self) -> std::io::Result<u64> {
        let lower_int = u64::from(self.read_int()?);
        let upper_int = u64::from(self.read_int()?);
        Ok((upper_int << 32) | lower_int)
    }

    fn renorm_dec_interval(&mut self) -> std::io::Result<()> {
        loop {
            self.value = (self.value << 8) | u32::from(self.in_stream.read_u8()?);
            self.length <<= 8;
            if self.length >= AC_MIN_LENGTH {
                break;
            }
        }
        Ok(())
    }

    pub fn length(&self) -> u32 {
        self.length
    }

    pub fn value(&self) -> u32 {
        self.value
    }

    pub fn get_ref(&self) -> &T {
        &self.in_stream
    }

    pub fn get_mut(&mut self) -> &mut T {
        &mut self.in_stream
    }

    pub fn into_inner(self) -> T {
        self.in_stream
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::encoders::ArithmeticEncoder;
    use crate::models::{ArithmeticBitModel, ArithmeticModelBuilder};
    use proptest::prelude::*;
    use std::io::Cursor;

    #[test]
    fn test_init_reads_big_endian() {
        let mut decoder = ArithmeticDecoder::new(Cursor::new(vec![0x12, 0x34, 0x56, 0x78]));
        decoder.read_init_bytes().unwrap();
        assert_eq!(decoder.value(), 0x1234_5678);
        assert_eq!(decoder.length(), AC_MAX_LENGTH);
    }

    #[test]
    fn test_init_on_short_stream_is_exhaustion() {
        let mut decoder = ArithmeticDecoder::new(Cursor::new(vec![0x12, 0x34]));
        let err = decoder.read_init_bytes().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_raw_symbol_overflow_is_corrupt() {
        // value >= length means the byte stream cannot come from the encoder
        let mut decoder = ArithmeticDecoder::new(Cursor::new(vec![0xFF; 16]));
        decoder.read_init_bytes().unwrap();
        decoder.length = AC_MIN_LENGTH;
        let err = decoder.read_byte().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
    }

    #[test]
    fn test_raw_values_round_trip() {
        let mut encoder = ArithmeticEncoder::new(Cursor::new(Vec::<u8>::new()));
        encoder.write_bit(1).unwrap();
        encoder.write_bits(5, 17).unwrap();
        encoder.write_bits(27, 0x5AB_CDEF).unwrap();
        encoder.write_byte(0xA5).unwrap();
        encoder.write_short(0xBEEF).unwrap();
        encoder.write_int(0xDEAD_BEEF).unwrap();
        encoder.write_int64(0x0123_4567_89AB_CDEF).unwrap();
        encoder.done().unwrap();

        let data = encoder.into_inner().into_inner();
        let mut decoder = ArithmeticDecoder::new(Cursor::new(data));
        decoder.read_init_bytes().unwrap();
        assert_eq!(decoder.read_bit().unwrap(), 1);
        assert_eq!(decoder.read_bits(5).unwrap(), 17);
        assert_eq!(decoder.read_bits(27).unwrap(), 0x5AB_CDEF);
        assert_eq!(decoder.read_byte().unwrap(), 0xA5);
        assert_eq!(decoder.read_short().unwrap(), 0xBEEF);
        assert_eq!(decoder.read_int().unwrap(), 0xDEAD_BEEF);
        assert_eq!(decoder.read_int_64().unwrap(), 0x0123_4567_89AB_CDEF);
    }

    proptest! {
        #[test]
        fn interval_stays_normalized(ops in proptest::collection::vec((0u8..4, any::<u32>()), 1..300)) {
            let mut encoder = ArithmeticEncoder::new(Cursor::new(Vec::<u8>::new()));
            let mut model = ArithmeticModelBuilder::new(40).for_compression(true).build();
            let mut bit_model = ArithmeticBitModel::new();
            for (op, v) in &ops {
                match op {
                    0 => encoder.encode_symbol(&mut model, v % 40).unwrap(),
                    1 => encoder.encode_bit(&mut bit_model, v & 1).unwrap(),
                    2 => encoder.write_bits(13, v & 0x1FFF).unwrap(),
                    _ => encoder.write_int(*v).unwrap(),
                }
            }
            encoder.done().unwrap();
            let data = encoder.into_inner().into_inner();

            let mut decoder = ArithmeticDecoder::new(Cursor::new(data));
            let mut model = ArithmeticModelBuilder::new(40).build();
            let mut bit_model = ArithmeticBitModel::new();
            decoder.read_init_bytes().unwrap();
            for (op, v) in &ops {
                let decoded = match op {
                    0 => decoder.decode_symbol(&mut model).unwrap() == v % 40,
                    1 => decoder.decode_bit(&mut bit_model).unwrap() == v & 1,
                    2 => decoder.read_bits(13).unwrap() == v & 0x1FFF,
                    _ => decoder.read_int().unwrap() == *v,
                };
                prop_assert!(decoded);
                prop_assert!(decoder.length() >= AC_MIN_LENGTH);
            }
        }

        #[test]
        fn garbage_never_panics(bytes in proptest::collection::vec(any::<u8>(), 4..64)) {
            let mut decoder = ArithmeticDecoder::new(Cursor::new(bytes));
            let mut model = ArithmeticModelBuilder::new(256).build();
            decoder.read_init_bytes().unwrap();
            for _ in 0..64 {
                if decoder.decode_symbol(&mut model).is_err() {
                    break;
                }
                if decoder.read_short().is_err() {
                    break;
                }
                prop_assert!(decoder.length() >= AC_MIN_LENGTH);
            }
        }
    }
}
