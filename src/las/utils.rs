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

use num_traits::{clamp, Zero};

/// Median of the last 5 values added, used to predict coordinate differences.
#[derive(Copy, Clone, Debug)]
pub struct StreamingMedian<T: Zero + Copy + PartialOrd> {
    values: [T; 5],
    high: bool,
}

impl<T: Zero + Copy + PartialOrd> Default for StreamingMedian<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Zero + Copy + PartialOrd> StreamingMedian<T> {
    pub fn new() -> Self {
        Self {
            values: [T::zero(); 5],
            high: true,
        }
    }

    pub fn add(&mut self, v: T) {
        let values = &mut self.values;
        if self.high {
            if v < values[2] {
                values[4] = values[3];
                values[3] = values[2];
                if v < values[0] {
                    values[2] = values[1];
                    values[1] = values[0];
                    values[0] = v;
                } else if v < values[1] {
                    values[2] = values[1];
                    values[1] = v;
                } else {
                    values[2] = v;
                }
            } else {
                if v < values[3] {
                    values[4] = values[3];
                    values[3] = v;
                } else {
                    values[4] = v;
                }
                self.high = false;
            }
        } else if values[2] < v {
            values[0] = values[1];
            values[1] = values[2];
            if values[4] < v {
                values[2] = values[3];
                values[3] = values[4];
                values[4] = v;
            } else if values[3] < v {
                values[2] = values[3];
                values[3] = v;
            } else {
                values[2] = v;
            }
        } else {
            if values[1] < v {
                values[0] = values[1];
                values[1] = v;
            } else {
                values[0] = v;
            }
            self.high = true;
        }
    }

    pub fn get(&self) -> T {
        self.values[2]
    }
}

#[inline]
pub(crate) fn u32_zero_bit(n: u32) -> u32 {
    n & 0xFF_FF_FF_FE
}

#[inline]
pub(crate) fn u8_clamp(n: i32) -> u8 {
    clamp(n, i32::from(u8::MIN), i32::from(u8::MAX)) as u8
}

#[inline]
pub(crate) fn i8_clamp(n: i32) -> i8 {
    clamp(n, i32::from(i8::MIN), i32::from(i8::MAX)) as i8
}

#[inline(always)]
pub(crate) fn lower_byte(n: u16) -> u8 {
    (n & 0x00_FF) as u8
}

#[inline(always)]
pub(crate) fn upper_byte(n: u16) -> u8 {
    (n >> 8) as u8
}

#[inline(always)]
pub(crate) fn lower_byte_changed(lhs: u16, rhs: u16) -> bool {
    lower_byte(lhs) != lower_byte(rhs)
}

#[inline(always)]
pub(crate) fn upper_byte_changed(lhs: u16, rhs: u16) -> bool {
    upper_byte(lhs) != upper_byte(rhs)
}

#[inline]
pub fn i32_quantize(n: f32) -> i32 {
    if n >= 0.0f32 {
        (n + 0.5f32) as i32
    } else {
        (n - 0.5f32) as i32
    }
}

#[inline]
pub fn i16_quantize(n: f32) -> i16 {
    if n >= 0.0f32 {
        (n + 0.5f32) as i16
    } else {
        (n - 0.5f32) as i16
    }
}

// for LAS files with the return (r) and the number (n) of
// returns field correctly populated the mapping should really
// be only the following.
//  { 15, 15, 15, 15, 15, 15, 15, 15 },
//  { 15,  0, 15, 15, 15, 15, 15, 15 },
//  { 15,  1,  2, 15, 15, 15, 15, 15 },
//  { 15,  3,  4,  5, 15, 15, 15, 15 },
//  { 15,  6,  7,  8,  9, 15, 15, 15 },
//  { 15, 10, 11, 12, 13, 14, 15, 15 },
//  { 15, 15, 15, 15, 15, 15, 15, 15 },
//  { 15, 15, 15, 15, 15, 15, 15, 15 }
// however, some files start the numbering of r and n with 0,
// only have return counts r, or only have number of return
// counts n, or mix up the position of r and n. we therefore
// "complete" the table to also map those "undesired" r & n
// combinations to different contexts
pub const NUMBER_RETURN_MAP: [[u8; 8]; 8] = [
    [15, 14, 13, 12, 11, 10, 9, 8],
    [14, 0, 1, 3, 6, 10, 10, 9],
    [13, 1, 2, 4, 7, 11, 11, 10],
    [12, 3, 4, 5, 8, 12, 12, 11],
    [11, 6, 7, 8, 9, 13, 13, 12],
    [10, 10, 11, 12, 13, 14, 14, 13],
    [9, 10, 11, 12, 13, 14, 15, 14],
    [8, 9, 10, 11, 12, 13, 14, 15],
];

// same completion as above, the "clean" table being
// the distance between r and n
pub const NUMBER_RETURN_LEVEL: [[u8; 8]; 8] = [
    [0, 1, 2, 3, 4, 5, 6, 7],
    [1, 0, 1, 2, 3, 4, 5, 6],
    [2, 1, 0, 1, 2, 3, 4, 5],
    [3, 2, 1, 0, 1, 2, 3, 4],
    [4, 3, 2, 1, 0, 1, 2, 3],
    [5, 4, 3, 2, 1, 0, 1, 2],
    [6, 5, 4, 3, 2, 1, 0, 1],
    [7, 6, 5, 4, 3, 2, 1, 0],
];

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_streaming_median() {
        let mut median = StreamingMedian::<i32>::new();
        assert_eq!(median.get(), 0);
        for v in &[10, 20, 30, 40, 50] {
            median.add(*v);
        }
        assert_eq!(median.get(), 30);
        median.add(-100);
        median.add(-100);
        assert_eq!(median.get(), 20);
    }

    #[test]
    fn test_clamps_and_quantize() {
        assert_eq!(u8_clamp(-3), 0);
        assert_eq!(u8_clamp(300), 255);
        assert_eq!(i8_clamp(-200), -128);
        assert_eq!(i8_clamp(15), 15);
        assert_eq!(i32_quantize(2.5), 3);
        assert_eq!(i32_quantize(-2.5), -3);
        assert_eq!(i16_quantize(0.006 * 15000.0), 90);
    }
}
