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

//! Defines the legacy (LAS 1.0 to 1.3) point layout and its compression.

use crate::packers::Packable;

/// The 20 bytes core point record.
#[derive(Default, Copy, Clone, PartialEq, Debug)]
pub struct Point10 {
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub intensity: u16,

    // 3 bits
    pub return_number: u8,
    // 3 bits
    pub number_of_returns_of_given_pulse: u8,
    // 1 bit
    pub scan_direction_flag: bool,
    // 1 bit
    pub edge_of_flight_line: bool,

    // 5 bits for classification the rest are bit flags
    pub classification: u8,

    pub scan_angle_rank: i8,
    pub user_data: u8,
    pub point_source_id: u16,
}

impl Point10 {
    pub fn populate_bit_fields_from(&mut self, byte: u8) {
        self.return_number = byte & 0x7;
        self.number_of_returns_of_given_pulse = (byte >> 3) & 0x7;
        self.scan_direction_flag = ((byte >> 6) & 0x1) != 0;
        self.edge_of_flight_line = ((byte >> 7) & 0x1) != 0;
    }

    pub fn bit_fields_to_byte(&self) -> u8 {
        ((self.edge_of_flight_line as u8) << 7)
            | ((self.scan_direction_flag as u8) << 6)
            | (self.number_of_returns_of_given_pulse & 0x7) << 3
            | (self.return_number & 0x7)
    }
}

impl Packable for Point10 {
    const SIZE: usize = 20;

    fn unpack_from(input: &[u8]) -> Self {
        let mut point = Point10 {
            x: i32::unpack_from(&input[0..4]),
            y: i32::unpack_from(&input[4..8]),
            z: i32::unpack_from(&input[8..12]),
            intensity: u16::unpack_from(&input[12..14]),
            classification: input[15],
            scan_angle_rank: input[16] as i8,
            user_data: input[17],
            point_source_id: u16::unpack_from(&input[18..20]),
            ..Default::default()
        };
        point.populate_bit_fields_from(input[14]);
        point
    }

    fn pack_into(&self, output: &mut [u8]) {
        self.x.pack_into(&mut output[0..4]);
        self.y.pack_into(&mut output[4..8]);
        self.z.pack_into(&mut output[8..12]);
        self.intensity.pack_into(&mut output[12..14]);
        output[14] = self.bit_fields_to_byte();
        output[15] = self.classification;
        output[16] = self.scan_angle_rank as u8;
        output[17] = self.user_data;
        self.point_source_id.pack_into(&mut output[18..20]);
    }
}

pub mod v2 {
    use std::io::{Read, Write};

    use crate::compressors::{IntegerCompressor, IntegerCompressorBuilder};
    use crate::decoders::ArithmeticDecoder;
    use crate::decompressors::{IntegerDecompressor, IntegerDecompressorBuilder};
    use crate::encoders::ArithmeticEncoder;
    use crate::las::utils::{self, StreamingMedian};
    use crate::models::{ArithmeticModel, ArithmeticModelBuilder};
    use crate::packers::Packable;
    use crate::record::{FieldCompressor, FieldDecompressor};

    use super::Point10;

    /// Bit map of the fields (other than x, y, z) that changed since the last point
    #[derive(Copy, Clone)]
    struct ChangedValues(u32);

    impl ChangedValues {
        fn between(current: &Point10, last: &Point10, last_intensity: u16) -> Self {
            let bit_fields_changed = current.bit_fields_to_byte() != last.bit_fields_to_byte();
            let intensity_changed = last_intensity != current.intensity;
            let classification_changed = last.classification != current.classification;
            let scan_angle_rank_changed = last.scan_angle_rank != current.scan_angle_rank;
            let user_data_changed = last.user_data != current.user_data;
            let point_source_id_changed = last.point_source_id != current.point_source_id;
            ChangedValues(
                (bit_fields_changed as u32) << 5
                    | (intensity_changed as u32) << 4
                    | (classification_changed as u32) << 3
                    | (scan_angle_rank_changed as u32) << 2
                    | (user_data_changed as u32) << 1
                    | (point_source_id_changed as u32),
            )
        }

        fn bit_fields_changed(self) -> bool {
            (self.0 & (1 << 5)) != 0
        }

        fn intensity_changed(self) -> bool {
            (self.0 & (1 << 4)) != 0
        }

        fn classification_changed(self) -> bool {
            (self.0 & (1 << 3)) != 0
        }

        fn scan_angle_rank_changed(self) -> bool {
            (self.0 & (1 << 2)) != 0
        }

        fn user_data_changed(self) -> bool {
            (self.0 & (1 << 1)) != 0
        }

        fn point_source_id_changed(self) -> bool {
            (self.0 & 1) != 0
        }
    }

    #[inline]
    fn y_context(n: u8, k_x: u32) -> u32 {
        (n == 1) as u32 + if k_x < 20 { utils::u32_zero_bit(k_x) } else { 20 }
    }

    #[inline]
    fn z_context(n: u8, k_x: u32, k_y: u32) -> u32 {
        let k_bits = (k_x + k_y) / 2;
        (n == 1) as u32 + if k_bits < 18 { utils::u32_zero_bit(k_bits) } else { 18 }
    }

    // State shared by the compressor and the decompressor
    struct Common {
        last_point: Point10,
        last_intensity: [u16; 16],
        last_x_diff_median: [StreamingMedian<i32>; 16],
        last_y_diff_median: [StreamingMedian<i32>; 16],
        last_height: [i32; 8],

        changed_values: ArithmeticModel,
        // indexed by the scan direction flag
        scan_angle_rank: Vec<ArithmeticModel>,
        // 256 each, indexed by the last value
        bit_byte: Vec<ArithmeticModel>,
        classification: Vec<ArithmeticModel>,
        user_data: Vec<ArithmeticModel>,
    }

    impl Common {
        fn new(compress: bool) -> Self {
            let model = |symbols| {
                ArithmeticModelBuilder::new(symbols)
                    .for_compression(compress)
                    .build()
            };
            Self {
                last_point: Point10::default(),
                last_intensity: [0u16; 16],
                last_x_diff_median: [StreamingMedian::new(); 16],
                last_y_diff_median: [StreamingMedian::new(); 16],
                last_height: [0i32; 8],
                changed_values: model(64),
                scan_angle_rank: (0..2).map(|_| model(256)).collect(),
                bit_byte: (0..256).map(|_| model(256)).collect(),
                classification: (0..256).map(|_| model(256)).collect(),
                user_data: (0..256).map(|_| model(256)).collect(),
            }
        }

        fn reset(&mut self) {
            self.last_point = Point10::default();
            self.last_intensity = [0u16; 16];
            self.last_x_diff_median = [StreamingMedian::new(); 16];
            self.last_y_diff_median = [StreamingMedian::new(); 16];
            self.last_height = [0i32; 8];
            self.changed_values.reset();
            self.scan_angle_rank
                .iter_mut()
                .chain(self.bit_byte.iter_mut())
                .chain(self.classification.iter_mut())
                .chain(self.user_data.iter_mut())
                .for_each(ArithmeticModel::reset);
        }
    }

    pub struct Point10Compressor {
        ic_intensity: IntegerCompressor,
        ic_point_source_id: IntegerCompressor,
        ic_dx: IntegerCompressor,
        ic_dy: IntegerCompressor,
        ic_z: IntegerCompressor,
        common: Common,
    }

    impl Default for Point10Compressor {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Point10Compressor {
        pub fn new() -> Self {
            Self {
                ic_intensity: IntegerCompressorBuilder::new()
                    .bits(16)
                    .contexts(4)
                    .build_initialized(),
                ic_point_source_id: IntegerCompressorBuilder::new().bits(16).build_initialized(),
                ic_dx: IntegerCompressorBuilder::new()
                    .bits(32)
                    .contexts(2)
                    .build_initialized(),
                ic_dy: IntegerCompressorBuilder::new()
                    .bits(32)
                    .contexts(22)
                    .build_initialized(),
                ic_z: IntegerCompressorBuilder::new()
                    .bits(32)
                    .contexts(20)
                    .build_initialized(),
                common: Common::new(true),
            }
        }
    }

    impl<W: Write> FieldCompressor<W> for Point10Compressor {
        fn size_of_field(&self) -> usize {
            Point10::SIZE
        }

        fn compress_first(&mut self, dst: &mut W, buf: &[u8]) -> std::io::Result<()> {
            self.common.last_point = Point10::unpack_from(buf);
            dst.write_all(&buf[..Point10::SIZE])
        }

        fn compress_with(
            &mut self,
            encoder: &mut ArithmeticEncoder<W>,
            buf: &[u8],
        ) -> std::io::Result<()> {
            let current = Point10::unpack_from(buf);
            let last = self.common.last_point;

            let r = current.return_number;
            let n = current.number_of_returns_of_given_pulse;
            let m = utils::NUMBER_RETURN_MAP[n as usize][r as usize] as usize;
            let l = utils::NUMBER_RETURN_LEVEL[n as usize][r as usize] as usize;

            let changed_values =
                ChangedValues::between(&current, &last, self.common.last_intensity[m]);
            encoder.encode_symbol(&mut self.common.changed_values, changed_values.0)?;

            if changed_values.bit_fields_changed() {
                let last_b = last.bit_fields_to_byte();
                encoder.encode_symbol(
                    &mut self.common.bit_byte[last_b as usize],
                    u32::from(current.bit_fields_to_byte()),
                )?;
            }

            if changed_values.intensity_changed() {
                self.ic_intensity.compress(
                    encoder,
                    i32::from(self.common.last_intensity[m]),
                    i32::from(current.intensity),
                    (m as u32).min(3),
                )?;
                self.common.last_intensity[m] = current.intensity;
            }

            if changed_values.classification_changed() {
                encoder.encode_symbol(
                    &mut self.common.classification[last.classification as usize],
                    u32::from(current.classification),
                )?;
            }

            if changed_values.scan_angle_rank_changed() {
                // the difference wraps around as a byte
                encoder.encode_symbol(
                    &mut self.common.scan_angle_rank[current.scan_direction_flag as usize],
                    u32::from(current.scan_angle_rank.wrapping_sub(last.scan_angle_rank) as u8),
                )?;
            }

            if changed_values.user_data_changed() {
                encoder.encode_symbol(
                    &mut self.common.user_data[last.user_data as usize],
                    u32::from(current.user_data),
                )?;
            }

            if changed_values.point_source_id_changed() {
                self.ic_point_source_id.compress(
                    encoder,
                    i32::from(last.point_source_id),
                    i32::from(current.point_source_id),
                    0,
                )?;
            }

            let median = self.common.last_x_diff_median[m].get();
            let diff = current.x.wrapping_sub(last.x);
            self.ic_dx.compress(encoder, median, diff, (n == 1) as u32)?;
            self.common.last_x_diff_median[m].add(diff);

            let median = self.common.last_y_diff_median[m].get();
            let diff = current.y.wrapping_sub(last.y);
            let context = y_context(n, self.ic_dx.k());
            self.ic_dy.compress(encoder, median, diff, context)?;
            self.common.last_y_diff_median[m].add(diff);

            let context = z_context(n, self.ic_dx.k(), self.ic_dy.k());
            self.ic_z
                .compress(encoder, self.common.last_height[l], current.z, context)?;
            self.common.last_height[l] = current.z;

            self.common.last_point = current;
            Ok(())
        }

        fn reset(&mut self) {
            self.ic_intensity.init();
            self.ic_point_source_id.init();
            self.ic_dx.init();
            self.ic_dy.init();
            self.ic_z.init();
            self.common.reset();
        }
    }

    pub struct Point10Decompressor {
        ic_intensity: IntegerDecompressor,
        ic_point_source_id: IntegerDecompressor,
        ic_dx: IntegerDecompressor,
        ic_dy: IntegerDecompressor,
        ic_z: IntegerDecompressor,
        common: Common,
    }

    impl Default for Point10Decompressor {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Point10Decompressor {
        pub fn new() -> Self {
            Self {
                ic_intensity: IntegerDecompressorBuilder::new()
                    .bits(16)
                    .contexts(4)
                    .build_initialized(),
                ic_point_source_id: IntegerDecompressorBuilder::new()
                    .bits(16)
                    .build_initialized(),
                ic_dx: IntegerDecompressorBuilder::new()
                    .bits(32)
                    .contexts(2)
                    .build_initialized(),
                ic_dy: IntegerDecompressorBuilder::new()
                    .bits(32)
                    .contexts(22)
                    .build_initialized(),
                ic_z: IntegerDecompressorBuilder::new()
                    .bits(32)
                    .contexts(20)
                    .build_initialized(),
                common: Common::new(false),
            }
        }
    }

    impl<R: Read> FieldDecompressor<R> for Point10Decompressor {
        fn size_of_field(&self) -> usize {
            Point10::SIZE
        }

        fn decompress_first(&mut self, src: &mut R, first_point: &mut [u8]) -> std::io::Result<()> {
            src.read_exact(&mut first_point[..Point10::SIZE])?;
            self.common.last_point = Point10::unpack_from(first_point);
            // the first intensity is not used as a prediction
            self.common.last_point.intensity = 0;
            Ok(())
        }

        fn decompress_with(
            &mut self,
            decoder: &mut ArithmeticDecoder<R>,
            buf: &mut [u8],
        ) -> std::io::Result<()> {
            let changed_values =
                ChangedValues(decoder.decode_symbol(&mut self.common.changed_values)?);
            let last = &mut self.common.last_point;

            let (n, m, l) = if changed_values.0 != 0 {
                if changed_values.bit_fields_changed() {
                    let b = last.bit_fields_to_byte();
                    let b = decoder.decode_symbol(&mut self.common.bit_byte[b as usize])?;
                    last.populate_bit_fields_from(b as u8);
                }

                let r = last.return_number as usize;
                let n = last.number_of_returns_of_given_pulse;
                let m = utils::NUMBER_RETURN_MAP[n as usize][r] as usize;
                let l = utils::NUMBER_RETURN_LEVEL[n as usize][r] as usize;

                if changed_values.intensity_changed() {
                    last.intensity = self.ic_intensity.decompress(
                        decoder,
                        i32::from(self.common.last_intensity[m]),
                        (m as u32).min(3),
                    )? as u16;
                    self.common.last_intensity[m] = last.intensity;
                } else {
                    last.intensity = self.common.last_intensity[m];
                }

                if changed_values.classification_changed() {
                    last.classification = decoder.decode_symbol(
                        &mut self.common.classification[last.classification as usize],
                    )? as u8;
                }

                if changed_values.scan_angle_rank_changed() {
                    let diff = decoder.decode_symbol(
                        &mut self.common.scan_angle_rank[last.scan_direction_flag as usize],
                    )? as u8;
                    last.scan_angle_rank = last.scan_angle_rank.wrapping_add(diff as i8);
                }

                if changed_values.user_data_changed() {
                    last.user_data = decoder
                        .decode_symbol(&mut self.common.user_data[last.user_data as usize])?
                        as u8;
                }

                if changed_values.point_source_id_changed() {
                    last.point_source_id = self.ic_point_source_id.decompress(
                        decoder,
                        i32::from(last.point_source_id),
                        0,
                    )? as u16;
                }
                (n, m, l)
            } else {
                let r = last.return_number as usize;
                let n = last.number_of_returns_of_given_pulse;
                (
                    n,
                    utils::NUMBER_RETURN_MAP[n as usize][r] as usize,
                    utils::NUMBER_RETURN_LEVEL[n as usize][r] as usize,
                )
            };

            let median = self.common.last_x_diff_median[m].get();
            let diff = self.ic_dx.decompress(decoder, median, (n == 1) as u32)?;
            last.x = last.x.wrapping_add(diff);
            self.common.last_x_diff_median[m].add(diff);

            let median = self.common.last_y_diff_median[m].get();
            let context = y_context(n, self.ic_dx.k());
            let diff = self.ic_dy.decompress(decoder, median, context)?;
            last.y = last.y.wrapping_add(diff);
            self.common.last_y_diff_median[m].add(diff);

            let context = z_context(n, self.ic_dx.k(), self.ic_dy.k());
            last.z = self
                .ic_z
                .decompress(decoder, self.common.last_height[l], context)?;
            self.common.last_height[l] = last.z;

            last.pack_into(buf);
            Ok(())
        }

        fn reset(&mut self) {
            self.ic_intensity.init();
            self.ic_point_source_id.init();
            self.ic_dx.init();
            self.ic_dy.init();
            self.ic_z.init();
            self.common.reset();
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_bit_fields_byte() {
        let mut p = Point10::default();
        p.populate_bit_fields_from(0b1101_0011);
        assert_eq!(p.return_number, 3);
        assert_eq!(p.number_of_returns_of_given_pulse, 2);
        assert!(p.scan_direction_flag);
        assert!(p.edge_of_flight_line);
        assert_eq!(p.bit_fields_to_byte(), 0b1101_0011);
    }

    #[test]
    fn test_layout() {
        let p = Point10 {
            x: 1,
            y: -2,
            z: 3,
            intensity: 0x1234,
            return_number: 1,
            number_of_returns_of_given_pulse: 2,
            scan_direction_flag: false,
            edge_of_flight_line: true,
            classification: 9,
            scan_angle_rank: -12,
            user_data: 7,
            point_source_id: 0xBEEF,
        };
        let mut buf = [0u8; 20];
        p.pack_into(&mut buf);
        assert_eq!(&buf[12..14], &[0x34, 0x12]);
        assert_eq!(buf[14], 0b1001_0001);
        assert_eq!(buf[16], (-12i8) as u8);
        assert_eq!(Point10::unpack_from(&buf), p);
    }
}
