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

//! Defines the GpsTime item and its compression.
//!
//! The double is reinterpreted as a 64 bit integer and up to four interleaved
//! time sequences are tracked, each with its last value and last difference.

use crate::packers::Packable;

const GPS_TIME_MULTI: i32 = 500;
const GPS_TIME_MULTI_MINUS: i32 = -10;
const GPS_TIME_MULTI_UNCHANGED: i32 = GPS_TIME_MULTI - GPS_TIME_MULTI_MINUS + 1;
const GPS_TIME_MULTI_CODE_FULL: i32 = GPS_TIME_MULTI - GPS_TIME_MULTI_MINUS + 2;
const GPS_TIME_MULTI_TOTAL: i32 = GPS_TIME_MULTI - GPS_TIME_MULTI_MINUS + 6;

/// Struct to store GpsTime
///
/// As the value (f64 in LAS files) needs to be reinterpreted
/// (not simply converted with 'as') to i64 during compression / decompression
/// this struct provides a convenient wrapper
#[derive(Default, Copy, Clone, Debug, PartialEq)]
pub struct GpsTime {
    pub value: i64,
}

impl From<f64> for GpsTime {
    fn from(v: f64) -> Self {
        Self {
            value: v.to_bits() as i64,
        }
    }
}

impl From<GpsTime> for f64 {
    fn from(gps: GpsTime) -> Self {
        f64::from_bits(gps.value as u64)
    }
}

impl Packable for GpsTime {
    const SIZE: usize = 8;

    fn unpack_from(input: &[u8]) -> Self {
        Self {
            value: i64::unpack_from(input),
        }
    }

    fn pack_into(&self, output: &mut [u8]) {
        self.value.pack_into(output)
    }
}

pub mod v2 {
    use std::io::{Read, Write};

    use crate::compressors::{IntegerCompressor, IntegerCompressorBuilder};
    use crate::decoders::ArithmeticDecoder;
    use crate::decompressors::{IntegerDecompressor, IntegerDecompressorBuilder};
    use crate::encoders::ArithmeticEncoder;
    use crate::las::utils::i32_quantize;
    use crate::models::{ArithmeticModel, ArithmeticModelBuilder};
    use crate::packers::Packable;
    use crate::record::{FieldCompressor, FieldDecompressor};

    use super::{
        GpsTime, GPS_TIME_MULTI, GPS_TIME_MULTI_CODE_FULL, GPS_TIME_MULTI_MINUS,
        GPS_TIME_MULTI_TOTAL, GPS_TIME_MULTI_UNCHANGED,
    };

    // Common parts for both a compressor and decompressor go here
    struct Common {
        gps_time_multi: ArithmeticModel,
        gps_time_0_diff: ArithmeticModel,
        last: usize,
        next: usize,
        last_gps_times: [GpsTime; 4],
        last_gps_time_diffs: [i32; 4],
        multi_extreme_counters: [i32; 4],
    }

    impl Common {
        fn new(compress: bool) -> Self {
            Self {
                gps_time_multi: ArithmeticModelBuilder::new(GPS_TIME_MULTI_TOTAL as u32)
                    .for_compression(compress)
                    .build(),
                gps_time_0_diff: ArithmeticModelBuilder::new(6)
                    .for_compression(compress)
                    .build(),
                last: 0,
                next: 0,
                last_gps_times: [GpsTime::default(); 4],
                last_gps_time_diffs: [0i32; 4],
                multi_extreme_counters: [0i32; 4],
            }
        }

        fn reset(&mut self) {
            self.gps_time_multi.reset();
            self.gps_time_0_diff.reset();
            self.last = 0;
            self.next = 0;
            self.last_gps_times = [GpsTime::default(); 4];
            self.last_gps_time_diffs = [0i32; 4];
            self.multi_extreme_counters = [0i32; 4];
        }

        /// Counts one more extreme multiplier for the current sequence,
        /// after too many of them the current difference becomes the reference.
        fn count_extreme_multi(&mut self, gps_time_diff: i32) {
            let counter = &mut self.multi_extreme_counters[self.last];
            *counter += 1;
            if *counter > 3 {
                self.last_gps_time_diffs[self.last] = gps_time_diff;
                *counter = 0;
            }
        }

        /// Returns the offset (1 to 3) of another sequence whose last value
        /// is within 32 bits of `value`.
        fn other_sequence_close_to(&self, value: i64) -> Option<usize> {
            (1..4).find(|i| {
                let diff_64 = value.wrapping_sub(self.last_gps_times[(self.last + i) & 3].value);
                diff_64 == i64::from(diff_64 as i32)
            })
        }

        fn start_new_sequence(&mut self) {
            self.next = (self.next + 1) & 3;
            self.last = self.next;
            self.last_gps_time_diffs[self.last] = 0;
            self.multi_extreme_counters[self.last] = 0;
        }
    }

    pub struct GpsTimeCompressor {
        ic_gps_time: IntegerCompressor,
        common: Common,
    }

    impl Default for GpsTimeCompressor {
        fn default() -> Self {
            Self {
                ic_gps_time: IntegerCompressorBuilder::new()
                    .bits(32)
                    .contexts(9)
                    .build_initialized(),
                common: Common::new(true),
            }
        }
    }

    impl GpsTimeCompressor {
        fn compress_full<W: Write>(
            &mut self,
            encoder: &mut ArithmeticEncoder<W>,
            current: GpsTime,
        ) -> std::io::Result<()> {
            self.ic_gps_time.compress(
                encoder,
                (self.common.last_gps_times[self.common.last].value >> 32) as i32,
                (current.value >> 32) as i32,
                8,
            )?;
            encoder.write_int(current.value as u32)?;
            self.common.start_new_sequence();
            Ok(())
        }

        fn compress_multi<W: Write>(
            &mut self,
            encoder: &mut ArithmeticEncoder<W>,
            diff: i32,
        ) -> std::io::Result<()> {
            let last = self.common.last;
            let last_diff = self.common.last_gps_time_diffs[last];
            let multi = i32_quantize(diff as f32 / last_diff as f32);

            if multi == 1 {
                // the case we assume we get most often for regular spaced pulses
                encoder.encode_symbol(&mut self.common.gps_time_multi, 1)?;
                self.ic_gps_time.compress(encoder, last_diff, diff, 1)?;
                self.common.multi_extreme_counters[last] = 0;
            } else if multi > 0 {
                if multi < GPS_TIME_MULTI {
                    // positive multipliers up to GPS_TIME_MULTI are compressed directly
                    encoder.encode_symbol(&mut self.common.gps_time_multi, multi as u32)?;
                    let context = if multi < 10 { 2 } else { 3 };
                    self.ic_gps_time
                        .compress(encoder, multi.wrapping_mul(last_diff), diff, context)?;
                } else {
                    encoder.encode_symbol(&mut self.common.gps_time_multi, GPS_TIME_MULTI as u32)?;
                    self.ic_gps_time.compress(
                        encoder,
                        GPS_TIME_MULTI.wrapping_mul(last_diff),
                        diff,
                        4,
                    )?;
                    self.common.count_extreme_multi(diff);
                }
            } else if multi < 0 {
                if multi > GPS_TIME_MULTI_MINUS {
                    // negative multipliers larger than GPS_TIME_MULTI_MINUS are compressed directly
                    encoder.encode_symbol(
                        &mut self.common.gps_time_multi,
                        (GPS_TIME_MULTI - multi) as u32,
                    )?;
                    self.ic_gps_time
                        .compress(encoder, multi.wrapping_mul(last_diff), diff, 5)?;
                } else {
                    encoder.encode_symbol(
                        &mut self.common.gps_time_multi,
                        (GPS_TIME_MULTI - GPS_TIME_MULTI_MINUS) as u32,
                    )?;
                    self.ic_gps_time.compress(
                        encoder,
                        GPS_TIME_MULTI_MINUS.wrapping_mul(last_diff),
                        diff,
                        6,
                    )?;
                    self.common.count_extreme_multi(diff);
                }
            } else {
                encoder.encode_symbol(&mut self.common.gps_time_multi, 0)?;
                self.ic_gps_time.compress(encoder, 0, diff, 7)?;
                self.common.count_extreme_multi(diff);
            }
            Ok(())
        }
    }

    impl<W: Write> FieldCompressor<W> for GpsTimeCompressor {
        fn size_of_field(&self) -> usize {
            GpsTime::SIZE
        }

        fn compress_first(&mut self, dst: &mut W, buf: &[u8]) -> std::io::Result<()> {
            self.common.last_gps_times[0] = GpsTime::unpack_from(buf);
            dst.write_all(&buf[..GpsTime::SIZE])
        }

        fn compress_with(
            &mut self,
            encoder: &mut ArithmeticEncoder<W>,
            buf: &[u8],
        ) -> std::io::Result<()> {
            let current = GpsTime::unpack_from(buf);
            loop {
                let last = self.common.last;
                let last_value = self.common.last_gps_times[last].value;
                let diff_64 = current.value.wrapping_sub(last_value);
                let diff_32 = diff_64 as i32;
                let fits_32_bits = diff_64 == i64::from(diff_32);

                if self.common.last_gps_time_diffs[last] == 0 {
                    if current.value == last_value {
                        encoder.encode_symbol(&mut self.common.gps_time_0_diff, 0)?;
                        return Ok(());
                    }
                    if fits_32_bits {
                        encoder.encode_symbol(&mut self.common.gps_time_0_diff, 1)?;
                        self.ic_gps_time.compress(encoder, 0, diff_32, 0)?;
                        self.common.last_gps_time_diffs[last] = diff_32;
                        self.common.multi_extreme_counters[last] = 0;
                    } else if let Some(i) = self.common.other_sequence_close_to(current.value) {
                        // the value belongs to another sequence
                        encoder.encode_symbol(&mut self.common.gps_time_0_diff, (i + 2) as u32)?;
                        self.common.last = (last + i) & 3;
                        continue;
                    } else {
                        encoder.encode_symbol(&mut self.common.gps_time_0_diff, 2)?;
                        self.compress_full(encoder, current)?;
                    }
                } else {
                    if current.value == last_value {
                        encoder.encode_symbol(
                            &mut self.common.gps_time_multi,
                            GPS_TIME_MULTI_UNCHANGED as u32,
                        )?;
                        return Ok(());
                    }
                    if fits_32_bits {
                        self.compress_multi(encoder, diff_32)?;
                    } else if let Some(i) = self.common.other_sequence_close_to(current.value) {
                        encoder.encode_symbol(
                            &mut self.common.gps_time_multi,
                            (GPS_TIME_MULTI_CODE_FULL + i as i32) as u32,
                        )?;
                        self.common.last = (last + i) & 3;
                        continue;
                    } else {
                        encoder.encode_symbol(
                            &mut self.common.gps_time_multi,
                            GPS_TIME_MULTI_CODE_FULL as u32,
                        )?;
                        self.compress_full(encoder, current)?;
                    }
                }
                self.common.last_gps_times[self.common.last] = current;
                return Ok(());
            }
        }

        fn reset(&mut self) {
            self.ic_gps_time.init();
            self.common.reset();
        }
    }

    pub struct GpsTimeDecompressor {
        ic_gps_time: IntegerDecompressor,
        common: Common,
    }

    impl Default for GpsTimeDecompressor {
        fn default() -> Self {
            Self {
                ic_gps_time: IntegerDecompressorBuilder::new()
                    .bits(32)
                    .contexts(9)
                    .build_initialized(),
                common: Common::new(false),
            }
        }
    }

    impl GpsTimeDecompressor {
        fn decompress_full<R: Read>(
            &mut self,
            decoder: &mut ArithmeticDecoder<R>,
        ) -> std::io::Result<()> {
            let high = self.ic_gps_time.decompress(
                decoder,
                (self.common.last_gps_times[self.common.last].value >> 32) as i32,
                8,
            )?;
            let low = decoder.read_int()?;
            let next = (self.common.next + 1) & 3;
            self.common.last_gps_times[next].value = (i64::from(high) << 32) | i64::from(low);
            self.common.start_new_sequence();
            Ok(())
        }

        fn decompress_multi<R: Read>(
            &mut self,
            decoder: &mut ArithmeticDecoder<R>,
            multi: i32,
        ) -> std::io::Result<()> {
            let last = self.common.last;
            let last_diff = self.common.last_gps_time_diffs[last];
            let diff = if multi == 0 {
                let diff = self.ic_gps_time.decompress(decoder, 0, 7)?;
                self.common.count_extreme_multi(diff);
                diff
            } else if multi < GPS_TIME_MULTI {
                let context = if multi < 10 { 2 } else { 3 };
                self.ic_gps_time
                    .decompress(decoder, multi.wrapping_mul(last_diff), context)?
            } else if multi == GPS_TIME_MULTI {
                let diff = self.ic_gps_time.decompress(
                    decoder,
                    GPS_TIME_MULTI.wrapping_mul(last_diff),
                    4,
                )?;
                self.common.count_extreme_multi(diff);
                diff
            } else {
                let multi = GPS_TIME_MULTI - multi;
                if multi > GPS_TIME_MULTI_MINUS {
                    self.ic_gps_time
                        .decompress(decoder, multi.wrapping_mul(last_diff), 5)?
                } else {
                    let diff = self.ic_gps_time.decompress(
                        decoder,
                        GPS_TIME_MULTI_MINUS.wrapping_mul(last_diff),
                        6,
                    )?;
                    self.common.count_extreme_multi(diff);
                    diff
                }
            };
            let value = &mut self.common.last_gps_times[last].value;
            *value = value.wrapping_add(i64::from(diff));
            Ok(())
        }
    }

    impl<R: Read> FieldDecompressor<R> for GpsTimeDecompressor {
        fn size_of_field(&self) -> usize {
            GpsTime::SIZE
        }

        fn decompress_first(&mut self, src: &mut R, first_point: &mut [u8]) -> std::io::Result<()> {
            src.read_exact(&mut first_point[..GpsTime::SIZE])?;
            self.common.last_gps_times[0] = GpsTime::unpack_from(first_point);
            Ok(())
        }

        fn decompress_with(
            &mut self,
            decoder: &mut ArithmeticDecoder<R>,
            buf: &mut [u8],
        ) -> std::io::Result<()> {
            loop {
                let last = self.common.last;
                if self.common.last_gps_time_diffs[last] == 0 {
                    let multi = decoder.decode_symbol(&mut self.common.gps_time_0_diff)? as usize;
                    match multi {
                        0 => {}
                        1 => {
                            // the difference can be represented with 32 bits
                            let diff = self.ic_gps_time.decompress(decoder, 0, 0)?;
                            self.common.last_gps_time_diffs[last] = diff;
                            let value = &mut self.common.last_gps_times[last].value;
                            *value = value.wrapping_add(i64::from(diff));
                            self.common.multi_extreme_counters[last] = 0;
                        }
                        2 => self.decompress_full(decoder)?,
                        _ => {
                            // we switch to another sequence
                            self.common.last = (last + multi - 2) & 3;
                            continue;
                        }
                    }
                } else {
                    let multi = decoder.decode_symbol(&mut self.common.gps_time_multi)? as i32;
                    if multi == 1 {
                        let diff = self.ic_gps_time.decompress(
                            decoder,
                            self.common.last_gps_time_diffs[last],
                            1,
                        )?;
                        let value = &mut self.common.last_gps_times[last].value;
                        *value = value.wrapping_add(i64::from(diff));
                        self.common.multi_extreme_counters[last] = 0;
                    } else if multi < GPS_TIME_MULTI_UNCHANGED {
                        self.decompress_multi(decoder, multi)?;
                    } else if multi == GPS_TIME_MULTI_CODE_FULL {
                        self.decompress_full(decoder)?;
                    } else if multi > GPS_TIME_MULTI_CODE_FULL {
                        self.common.last = (last + (multi - GPS_TIME_MULTI_CODE_FULL) as usize) & 3;
                        continue;
                    }
                }
                self.common.last_gps_times[self.common.last].pack_into(buf);
                return Ok(());
            }
        }

        fn reset(&mut self) {
            self.ic_gps_time.init();
            self.common.reset();
        }
    }
}

#[cfg(test)]
mod test {
    use super::v2::{GpsTimeCompressor, GpsTimeDecompressor};
    use super::*;
    use crate::decoders::ArithmeticDecoder;
    use crate::encoders::ArithmeticEncoder;
    use crate::record::{FieldCompressor, FieldDecompressor};
    use std::io::Cursor;

    fn round_trip(times: &[f64]) -> Vec<f64> {
        let mut compressor = GpsTimeCompressor::default();
        let mut out = Cursor::new(Vec::<u8>::new());
        let mut buf = [0u8; 8];
        GpsTime::from(times[0]).pack_into(&mut buf);
        FieldCompressor::compress_first(&mut compressor, &mut out, &buf).unwrap();
        let mut encoder = ArithmeticEncoder::new(out);
        for t in &times[1..] {
            GpsTime::from(*t).pack_into(&mut buf);
            compressor.compress_with(&mut encoder, &buf).unwrap();
        }
        encoder.done().unwrap();

        let mut src = Cursor::new(encoder.into_inner().into_inner());
        let mut decompressor = GpsTimeDecompressor::default();
        let mut decoded = vec![];
        FieldDecompressor::decompress_first(&mut decompressor, &mut src, &mut buf).unwrap();
        decoded.push(f64::from(GpsTime::unpack_from(&buf)));
        let mut decoder = ArithmeticDecoder::new(src);
        decoder.read_init_bytes().unwrap();
        for _ in &times[1..] {
            decompressor.decompress_with(&mut decoder, &mut buf).unwrap();
            decoded.push(f64::from(GpsTime::unpack_from(&buf)));
        }
        decoded
    }

    #[test]
    fn test_regular_pulses() {
        let times: Vec<f64> = (0..1000).map(|i| 1000.0 + f64::from(i) * 0.000_01).collect();
        assert_eq!(round_trip(&times), times);
    }

    #[test]
    fn test_interleaved_sequences() {
        // two flight lines far apart in time, alternating, plus repeats
        let mut times = vec![];
        for i in 0..200 {
            let t = f64::from(i);
            times.push(10.0 + t * 0.5);
            times.push(10.0 + t * 0.5);
            times.push(5.0e8 + t * 0.25);
            if i % 17 == 0 {
                times.push(-3.0e9);
            }
        }
        assert_eq!(round_trip(&times), times);
    }

    #[test]
    fn test_out_of_order_multipliers() {
        let times = [
            100.0, 100.001, 100.002, 99.5, 99.5001, 150.0, 100.0, 100.003, 100.5, 1.0e15,
            100.004, 0.0, -0.0,
        ];
        let decoded = round_trip(&times);
        for (d, t) in decoded.iter().zip(times.iter()) {
            assert_eq!(d.to_bits(), t.to_bits());
        }
    }
}
