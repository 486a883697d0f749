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

//! Module with the definition of a RGB struct and implementations of
//! Compressors and Decompressors

use crate::las::utils::{lower_byte_changed, upper_byte_changed};
use crate::packers::Packable;

/// Struct representing a RGB component of a point, in compliance with
/// the LAS format
#[derive(Default, Copy, Clone, Debug, PartialEq)]
pub struct RGB {
    pub red: u16,
    pub green: u16,
    pub blue: u16,
}

impl Packable for RGB {
    const SIZE: usize = 6;

    fn unpack_from(input: &[u8]) -> Self {
        Self {
            red: u16::unpack_from(&input[0..2]),
            green: u16::unpack_from(&input[2..4]),
            blue: u16::unpack_from(&input[4..6]),
        }
    }

    fn pack_into(&self, output: &mut [u8]) {
        self.red.pack_into(&mut output[0..2]);
        self.green.pack_into(&mut output[2..4]);
        self.blue.pack_into(&mut output[4..6]);
    }
}

/// Which bytes of each color changed, bit 6 is set when
/// the color is not a shade of grey.
#[derive(Copy, Clone)]
struct ColorDiff(u8);

impl ColorDiff {
    fn from_points(current: &RGB, last: &RGB) -> Self {
        let v = (lower_byte_changed(current.red, last.red) as u8)
            | (upper_byte_changed(current.red, last.red) as u8) << 1
            | (lower_byte_changed(current.green, last.green) as u8) << 2
            | (upper_byte_changed(current.green, last.green) as u8) << 3
            | (lower_byte_changed(current.blue, last.blue) as u8) << 4
            | (upper_byte_changed(current.blue, last.blue) as u8) << 5
            | ((current.red != current.green || current.red != current.blue) as u8) << 6;
        ColorDiff(v)
    }

    fn lower_red_byte_changed(self) -> bool {
        self.0 & 1 != 0
    }

    fn upper_red_byte_changed(self) -> bool {
        self.0 & (1 << 1) != 0
    }

    fn lower_green_byte_changed(self) -> bool {
        self.0 & (1 << 2) != 0
    }

    fn upper_green_byte_changed(self) -> bool {
        self.0 & (1 << 3) != 0
    }

    fn lower_blue_byte_changed(self) -> bool {
        self.0 & (1 << 4) != 0
    }

    fn upper_blue_byte_changed(self) -> bool {
        self.0 & (1 << 5) != 0
    }

    fn is_colored(self) -> bool {
        self.0 & (1 << 6) != 0
    }
}

pub mod v2 {
    //! Contains the implementation for the Version 2 of the RGB Compression / Decompression
    use std::io::{Read, Write};

    use crate::decoders::ArithmeticDecoder;
    use crate::encoders::ArithmeticEncoder;
    use crate::las::utils::{lower_byte, u8_clamp, upper_byte};
    use crate::models::{ArithmeticModel, ArithmeticModelBuilder};
    use crate::packers::Packable;
    use crate::record::{FieldCompressor, FieldDecompressor};

    use super::{ColorDiff, RGB};

    pub(crate) struct RGBModels {
        byte_used: ArithmeticModel,
        lower_red_byte: ArithmeticModel,
        upper_red_byte: ArithmeticModel,
        lower_green_byte: ArithmeticModel,
        upper_green_byte: ArithmeticModel,
        lower_blue_byte: ArithmeticModel,
        upper_blue_byte: ArithmeticModel,
    }

    impl RGBModels {
        pub(crate) fn new(compress: bool) -> Self {
            let model = |symbols| {
                ArithmeticModelBuilder::new(symbols)
                    .for_compression(compress)
                    .build()
            };
            Self {
                byte_used: model(128),
                lower_red_byte: model(256),
                upper_red_byte: model(256),
                lower_green_byte: model(256),
                upper_green_byte: model(256),
                lower_blue_byte: model(256),
                upper_blue_byte: model(256),
            }
        }

        pub(crate) fn reset(&mut self) {
            self.byte_used.reset();
            self.lower_red_byte.reset();
            self.upper_red_byte.reset();
            self.lower_green_byte.reset();
            self.upper_green_byte.reset();
            self.lower_blue_byte.reset();
            self.upper_blue_byte.reset();
        }
    }

    pub(crate) fn compress_rgb_using<W: Write>(
        encoder: &mut ArithmeticEncoder<W>,
        models: &mut RGBModels,
        current: &RGB,
        last: &RGB,
    ) -> std::io::Result<()> {
        let mut diff_l = 0i32;
        let mut diff_h = 0i32;

        let color_diff = ColorDiff::from_points(current, last);
        encoder.encode_symbol(&mut models.byte_used, u32::from(color_diff.0))?;

        if color_diff.lower_red_byte_changed() {
            diff_l = i32::from(lower_byte(current.red)) - i32::from(lower_byte(last.red));
            encoder.encode_symbol(&mut models.lower_red_byte, u32::from(diff_l as u8))?;
        }
        if color_diff.upper_red_byte_changed() {
            diff_h = i32::from(upper_byte(current.red)) - i32::from(upper_byte(last.red));
            encoder.encode_symbol(&mut models.upper_red_byte, u32::from(diff_h as u8))?;
        }

        if color_diff.is_colored() {
            if color_diff.lower_green_byte_changed() {
                let corr = i32::from(lower_byte(current.green))
                    - i32::from(u8_clamp(diff_l + i32::from(lower_byte(last.green))));
                encoder.encode_symbol(&mut models.lower_green_byte, u32::from(corr as u8))?;
            }
            if color_diff.lower_blue_byte_changed() {
                diff_l = (diff_l + i32::from(lower_byte(current.green))
                    - i32::from(lower_byte(last.green)))
                    / 2;
                let corr = i32::from(lower_byte(current.blue))
                    - i32::from(u8_clamp(diff_l + i32::from(lower_byte(last.blue))));
                encoder.encode_symbol(&mut models.lower_blue_byte, u32::from(corr as u8))?;
            }
            if color_diff.upper_green_byte_changed() {
                let corr = i32::from(upper_byte(current.green))
                    - i32::from(u8_clamp(diff_h + i32::from(upper_byte(last.green))));
                encoder.encode_symbol(&mut models.upper_green_byte, u32::from(corr as u8))?;
            }
            if color_diff.upper_blue_byte_changed() {
                diff_h = (diff_h + i32::from(upper_byte(current.green))
                    - i32::from(upper_byte(last.green)))
                    / 2;
                let corr = i32::from(upper_byte(current.blue))
                    - i32::from(u8_clamp(diff_h + i32::from(upper_byte(last.blue))));
                encoder.encode_symbol(&mut models.upper_blue_byte, u32::from(corr as u8))?;
            }
        }
        Ok(())
    }

    pub(crate) fn decompress_rgb_using<R: Read>(
        decoder: &mut ArithmeticDecoder<R>,
        models: &mut RGBModels,
        last: &RGB,
    ) -> std::io::Result<RGB> {
        let color_diff = ColorDiff(decoder.decode_symbol(&mut models.byte_used)? as u8);
        let mut current = RGB::default();

        if color_diff.lower_red_byte_changed() {
            let corr = decoder.decode_symbol(&mut models.lower_red_byte)? as u8;
            current.red = u16::from(corr.wrapping_add(lower_byte(last.red)));
        } else {
            current.red = last.red & 0x00FF;
        }
        if color_diff.upper_red_byte_changed() {
            let corr = decoder.decode_symbol(&mut models.upper_red_byte)? as u8;
            current.red |= u16::from(corr.wrapping_add(upper_byte(last.red))) << 8;
        } else {
            current.red |= last.red & 0xFF00;
        }

        if color_diff.is_colored() {
            let mut diff = i32::from(lower_byte(current.red)) - i32::from(lower_byte(last.red));
            if color_diff.lower_green_byte_changed() {
                let corr = decoder.decode_symbol(&mut models.lower_green_byte)? as u8;
                current.green = u16::from(
                    corr.wrapping_add(u8_clamp(diff + i32::from(lower_byte(last.green)))),
                );
            } else {
                current.green = last.green & 0x00FF;
            }
            if color_diff.lower_blue_byte_changed() {
                let corr = decoder.decode_symbol(&mut models.lower_blue_byte)? as u8;
                diff = (diff + i32::from(lower_byte(current.green))
                    - i32::from(lower_byte(last.green)))
                    / 2;
                current.blue = u16::from(
                    corr.wrapping_add(u8_clamp(diff + i32::from(lower_byte(last.blue)))),
                );
            } else {
                current.blue = last.blue & 0x00FF;
            }

            let mut diff = i32::from(upper_byte(current.red)) - i32::from(upper_byte(last.red));
            if color_diff.upper_green_byte_changed() {
                let corr = decoder.decode_symbol(&mut models.upper_green_byte)? as u8;
                current.green |= u16::from(
                    corr.wrapping_add(u8_clamp(diff + i32::from(upper_byte(last.green)))),
                ) << 8;
            } else {
                current.green |= last.green & 0xFF00;
            }
            if color_diff.upper_blue_byte_changed() {
                let corr = decoder.decode_symbol(&mut models.upper_blue_byte)? as u8;
                diff = (diff + i32::from(upper_byte(current.green))
                    - i32::from(upper_byte(last.green)))
                    / 2;
                current.blue |= u16::from(
                    corr.wrapping_add(u8_clamp(diff + i32::from(upper_byte(last.blue)))),
                ) << 8;
            } else {
                current.blue |= last.blue & 0xFF00;
            }
        } else {
            current.green = current.red;
            current.blue = current.red;
        }
        Ok(current)
    }

    pub struct LasRGBCompressor {
        last: RGB,
        models: RGBModels,
    }

    impl Default for LasRGBCompressor {
        fn default() -> Self {
            Self {
                last: RGB::default(),
                models: RGBModels::new(true),
            }
        }
    }

    impl<W: Write> FieldCompressor<W> for LasRGBCompressor {
        fn size_of_field(&self) -> usize {
            RGB::SIZE
        }

        fn compress_first(&mut self, dst: &mut W, buf: &[u8]) -> std::io::Result<()> {
            self.last = RGB::unpack_from(buf);
            dst.write_all(&buf[..RGB::SIZE])
        }

        fn compress_with(
            &mut self,
            encoder: &mut ArithmeticEncoder<W>,
            buf: &[u8],
        ) -> std::io::Result<()> {
            let current = RGB::unpack_from(buf);
            compress_rgb_using(encoder, &mut self.models, &current, &self.last)?;
            self.last = current;
            Ok(())
        }

        fn reset(&mut self) {
            self.last = RGB::default();
            self.models.reset();
        }
    }

    pub struct LasRGBDecompressor {
        last: RGB,
        models: RGBModels,
    }

    impl Default for LasRGBDecompressor {
        fn default() -> Self {
            Self {
                last: RGB::default(),
                models: RGBModels::new(false),
            }
        }
    }

    impl<R: Read> FieldDecompressor<R> for LasRGBDecompressor {
        fn size_of_field(&self) -> usize {
            RGB::SIZE
        }

        fn decompress_first(&mut self, src: &mut R, first_point: &mut [u8]) -> std::io::Result<()> {
            src.read_exact(&mut first_point[..RGB::SIZE])?;
            self.last = RGB::unpack_from(first_point);
            Ok(())
        }

        fn decompress_with(
            &mut self,
            decoder: &mut ArithmeticDecoder<R>,
            buf: &mut [u8],
        ) -> std::io::Result<()> {
            let current = decompress_rgb_using(decoder, &mut self.models, &self.last)?;
            self.last = current;
            current.pack_into(buf);
            Ok(())
        }

        fn reset(&mut self) {
            self.last = RGB::default();
            self.models.reset();
        }
    }
}

#[cfg(test)]
mod test {
    use super::v2::{LasRGBCompressor, LasRGBDecompressor};
    use super::*;
    use crate::decoders::ArithmeticDecoder;
    use crate::encoders::ArithmeticEncoder;
    use crate::record::{FieldCompressor, FieldDecompressor};
    use std::io::Cursor;

    #[test]
    fn test_color_diff_grey_flag() {
        let grey = RGB {
            red: 100,
            green: 100,
            blue: 100,
        };
        assert!(!ColorDiff::from_points(&grey, &RGB::default()).is_colored());
        let colored = RGB { blue: 7, ..grey };
        assert!(ColorDiff::from_points(&colored, &grey).is_colored());
    }

    #[test]
    fn test_rgb_round_trip() {
        let colors: Vec<RGB> = (0..500u32)
            .map(|i| {
                if i % 5 == 0 {
                    let v = (i * 131) as u16;
                    RGB {
                        red: v,
                        green: v,
                        blue: v,
                    }
                } else {
                    RGB {
                        red: (i * 257) as u16,
                        green: (65535 - i * 3) as u16,
                        blue: (i * i) as u16,
                    }
                }
            })
            .collect();

        let mut compressor = LasRGBCompressor::default();
        let mut buf = [0u8; 6];
        let mut out = Cursor::new(Vec::<u8>::new());
        colors[0].pack_into(&mut buf);
        FieldCompressor::compress_first(&mut compressor, &mut out, &buf).unwrap();
        let mut encoder = ArithmeticEncoder::new(out);
        for c in &colors[1..] {
            c.pack_into(&mut buf);
            compressor.compress_with(&mut encoder, &buf).unwrap();
        }
        encoder.done().unwrap();

        let mut src = Cursor::new(encoder.into_inner().into_inner());
        let mut decompressor = LasRGBDecompressor::default();
        FieldDecompressor::decompress_first(&mut decompressor, &mut src, &mut buf).unwrap();
        assert_eq!(RGB::unpack_from(&buf), colors[0]);
        let mut decoder = ArithmeticDecoder::new(src);
        decoder.read_init_bytes().unwrap();
        for c in &colors[1..] {
            decompressor.decompress_with(&mut decoder, &mut buf).unwrap();
            assert_eq!(&RGB::unpack_from(&buf), c);
        }
    }
}
