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

//! Little endian packing of the primitive and record types found in point data.

use byteorder::{ByteOrder, LittleEndian};

pub trait Packable: Sized {
    /// Number of bytes of the packed representation
    const SIZE: usize;

    /// # Panics
    ///
    /// Panics if `input` is shorter than `SIZE`
    fn unpack_from(input: &[u8]) -> Self;

    /// # Panics
    ///
    /// Panics if `output` is shorter than `SIZE`
    fn pack_into(&self, output: &mut [u8]);
}

impl Packable for u8 {
    const SIZE: usize = 1;

    fn unpack_from(input: &[u8]) -> Self {
        input[0]
    }

    fn pack_into(&self, output: &mut [u8]) {
        output[0] = *self;
    }
}

impl Packable for i8 {
    const SIZE: usize = 1;

    fn unpack_from(input: &[u8]) -> Self {
        input[0] as i8
    }

    fn pack_into(&self, output: &mut [u8]) {
        output[0] = *self as u8;
    }
}

macro_rules! impl_packable_with_byteorder {
    ($type:ty, $size:expr, $read:ident, $write:ident) => {
        impl Packable for $type {
            const SIZE: usize = $size;

            #[inline]
            fn unpack_from(input: &[u8]) -> Self {
                LittleEndian::$read(&input[..$size])
            }

            #[inline]
            fn pack_into(&self, output: &mut [u8]) {
                LittleEndian::$write(&mut output[..$size], *self)
            }
        }
    };
}

impl_packable_with_byteorder!(u16, 2, read_u16, write_u16);
impl_packable_with_byteorder!(i16, 2, read_i16, write_i16);
impl_packable_with_byteorder!(u32, 4, read_u32, write_u32);
impl_packable_with_byteorder!(i32, 4, read_i32, write_i32);
impl_packable_with_byteorder!(u64, 8, read_u64, write_u64);
impl_packable_with_byteorder!(i64, 8, read_i64, write_i64);
impl_packable_with_byteorder!(f64, 8, read_f64, write_f64);

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_packer() {
        let in_val: i32 = -25;
        let mut buf = [0u8; 4];
        in_val.pack_into(&mut buf);
        assert_eq!(buf, [0xE7, 0xFF, 0xFF, 0xFF]);
        assert_eq!(i32::unpack_from(&buf), in_val);
    }

    #[test]
    fn test_float_keeps_bits() {
        let mut buf = [0u8; 8];
        let v = -0.0f64;
        v.pack_into(&mut buf);
        assert_eq!(f64::unpack_from(&buf).to_bits(), v.to_bits());
    }
}
