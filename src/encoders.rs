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
// William A. Pearlman (pearlw@ecse.rpi.edu)

use std::io::Write;

use crate::decoders::{AC_MAX_LENGTH, AC_MIN_LENGTH};
use crate::models::{self, DM_LENGTH_SHIFT};

const AC_BUFFER_SIZE: usize = 1024;

/// Encoder producing the byte stream read by [`ArithmeticDecoder`].
///
/// Bytes are staged in a two-halves ring buffer so that a carry can
/// still propagate into bytes that were produced but not yet written.
///
/// [`ArithmeticDecoder`]: crate::decoders::ArithmeticDecoder
pub struct ArithmeticEncoder<T: Write> {
    out_buffer: Vec<u8>,
    out_byte: usize,
    end_byte: usize,

    base: u32,
    length: u32,

    out_stream: T,
}

impl<T: Write> ArithmeticEncoder<T> {
    pub fn new(out_stream: T) -> Self {
        Self {
            out_buffer: vec![0u8; 2 * AC_BUFFER_SIZE],
            out_byte: 0,
            end_byte: 2 * AC_BUFFER_SIZE,
            base: 0,
            length: AC_MAX_LENGTH,
            out_stream,
        }
    }

    pub fn reset(&mut self) {
        self.base = 0;
        self.length = AC_MAX_LENGTH;
        self.out_byte = 0;
        self.end_byte = 2 * AC_BUFFER_SIZE;
        for b in &mut self.out_buffer {
            *b = 0;
        }
    }

    /// Flushes the final bytes, the encoder must be reset before being used again.
    pub fn done(&mut self) -> std::io::Result<()> {
        let init_base = self.base;
        let another_byte;

        if self.length > 2 * AC_MIN_LENGTH {
            // base offset, set new length for 1 more byte
            self.base = self.base.wrapping_add(AC_MIN_LENGTH);
            self.length = AC_MIN_LENGTH >> 1;
            another_byte = true;
        } else {
            // base offset, set new length for 2 more bytes
            self.base = self.base.wrapping_add(AC_MIN_LENGTH >> 1);
            self.length = AC_MIN_LENGTH >> 9;
            another_byte = false;
        }

        if init_base > self.base {
            self.propagate_carry();
        }
        self.renorm_enc_interval()?;

        if self.end_byte != 2 * AC_BUFFER_SIZE {
            self.out_stream
                .write_all(&self.out_buffer[AC_BUFFER_SIZE..2 * AC_BUFFER_SIZE])?;
        }
        if self.out_byte != 0 {
            self.out_stream.write_all(&self.out_buffer[..self.out_byte])?;
        }

        self.out_stream.write_all(&[0u8, 0u8])?;
        if another_byte {
            self.out_stream.write_all(&[0u8])?;
        }
        Ok(())
    }

    pub fn encode_bit(
        &mut self,
        model: &mut models::ArithmeticBitModel,
        sym: u32,
    ) -> std::io::Result<()> {
        debug_assert!(sym <= 1);
        // product l x p0
        let x = model.bit_0_prob * (self.length >> models::BM_LENGTH_SHIFT);

        if sym == 0 {
            self.length = x;
            model.bit_0_count += 1;
        } else {
            let init_base = self.base;
            self.base = self.base.wrapping_add(x);
            self.length -= x;
            if init_base > self.base {
                self.propagate_carry();
            }
        }
        if self.length < AC_MIN_LENGTH {
            self.renorm_enc_interval()?;
        }

        model.bits_until_update -= 1;
        if model.bits_until_update == 0 {
            model.update();
        }
        Ok(())
    }

    pub fn encode_symbol(
        &mut self,
        model: &mut models::ArithmeticModel,
        sym: u32,
    ) -> std::io::Result<()> {
        debug_assert!(sym <= model.last_symbol);
        let init_base = self.base;

        if sym == model.last_symbol {
            let x = model.distribution[sym as usize] * (self.length >> DM_LENGTH_SHIFT);
            self.base = self.base.wrapping_add(x);
            self.length -= x;
        } else {
            self.length >>= DM_LENGTH_SHIFT;
            let x = model.distribution[sym as usize] * self.length;
            self.base = self.base.wrapping_add(x);
            self.length = model.distribution[sym as usize + 1] * self.length - x;
        }

        if init_base > self.base {
            self.propagate_carry();
        }
        if self.length < AC_MIN_LENGTH {
            self.renorm_enc_interval()?;
        }
        model.symbol_count[sym as usize] += 1;
        model.symbols_until_update -= 1;
        if model.symbols_until_update == 0 {
            model.update();
        }
        Ok(())
    }

    #[inline]
    fn write_raw(&mut self, bits: u32, sym: u32) -> std::io::Result<()> {
        let init_base = self.base;
        self.length >>= bits;
        self.base = self.base.wrapping_add(sym * self.length);
        // overflow = carry
        if init_base > self.base {
            self.propagate_carry();
        }
        if self.length < AC_MIN_LENGTH {
            self.renorm_enc_interval()?;
        }
        Ok(())
    }

    pub fn write_bit(&mut self, sym: u32) -> std::io::Result<()> {
        debug_assert!(sym <= 1);
        self.write_raw(1, sym)
    }

    pub fn write_bits(&mut self, bits: u32, sym: u32) -> std::io::Result<()> {
        debug_assert!(bits > 0 && bits <= 32 && u64::from(sym) < (1u64 << bits));
        if bits > 19 {
            self.write_short((sym & 0xFFFF) as u16)?;
            self.write_raw(bits - 16, sym >> 16)
        } else {
            self.write_raw(bits, sym)
        }
    }

    pub fn write_byte(&mut self, sym: u8) -> std::io::Result<()> {
        self.write_raw(8, u32::from(sym))
    }

    pub fn write_short(&mut self, sym: u16) -> std::io::Result<()> {
        self.write_raw(16, u32::from(sym))
    }

    pub fn write_int(&mut self, sym: u32) -> std::io::Result<()> {
        // lower 16 bits
        self.write_short((sym & 0xFFFF) as u16)?;
        // upper 16 bits
        self.write_short((sym >> 16) as u16)
    }

    pub fn write_int64(&mut self, sym: u64) -> std::io::Result<()> {
        // lower 32 bits
        self.write_int((sym & 0xFFFF_FFFF) as u32)?;
        // upper 32 bits
        self.write_int((sym >> 32) as u32)
    }

    pub fn get_ref(&self) -> &T {
        &self.out_stream
    }

    pub fn get_mut(&mut self) -> &mut T {
        &mut self.out_stream
    }

    pub fn into_inner(self) -> T {
        self.out_stream
    }

    fn propagate_carry(&mut self) {
        let mut b = if self.out_byte == 0 {
            2 * AC_BUFFER_SIZE - 1
        } else {
            self.out_byte - 1
        };
        while self.out_buffer[b] == 0xFF {
            self.out_buffer[b] = 0;
            b = if b == 0 { 2 * AC_BUFFER_SIZE - 1 } else { b - 1 };
        }
        self.out_buffer[b] += 1;
    }

    fn renorm_enc_interval(&mut self) -> std::io::Result<()> {
        loop {
            self.out_buffer[self.out_byte] = (self.base >> 24) as u8;
            self.out_byte += 1;
            if self.out_byte == self.end_byte {
                self.manage_out_buffer()?;
            }
            self.base <<= 8;
            // length multiplied by 256
            self.length <<= 8;
            if self.length >= AC_MIN_LENGTH {
                break;
            }
        }
        Ok(())
    }

    fn manage_out_buffer(&mut self) -> std::io::Result<()> {
        if self.out_byte == 2 * AC_BUFFER_SIZE {
            self.out_byte = 0;
        }
        self.out_stream
            .write_all(&self.out_buffer[self.out_byte..self.out_byte + AC_BUFFER_SIZE])?;
        self.end_byte = self.out_byte + AC_BUFFER_SIZE;
        Ok(())
    }
}
