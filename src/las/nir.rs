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

//! Near infrared channel, stored after the RGB values in the RGBNIR14 item.
//!
//! The item is coded point by point: the color part exactly like RGB12,
//! followed by the NIR value.

use crate::las::rgb::RGB;
use crate::packers::Packable;

#[derive(Default, Copy, Clone, Debug, PartialEq)]
pub struct RGBNir {
    pub rgb: RGB,
    pub nir: u16,
}

impl Packable for RGBNir {
    const SIZE: usize = 8;

    fn unpack_from(input: &[u8]) -> Self {
        Self {
            rgb: RGB::unpack_from(&input[0..6]),
            nir: u16::unpack_from(&input[6..8]),
        }
    }

    fn pack_into(&self, output: &mut [u8]) {
        self.rgb.pack_into(&mut output[0..6]);
        self.nir.pack_into(&mut output[6..8]);
    }
}

pub mod v2 {
    use std::io::{Read, Write};

    use crate::decoders::ArithmeticDecoder;
    use crate::encoders::ArithmeticEncoder;
    use crate::las::rgb::v2::{compress_rgb_using, decompress_rgb_using, RGBModels};
    use crate::las::utils::{lower_byte, lower_byte_changed, upper_byte, upper_byte_changed};
    use crate::models::{ArithmeticModel, ArithmeticModelBuilder};
    use crate::packers::Packable;
    use crate::record::{FieldCompressor, FieldDecompressor};

    use super::RGBNir;

    struct NirModels {
        bytes_used: ArithmeticModel,
        diff_0: ArithmeticModel,
        diff_1: ArithmeticModel,
    }

    impl NirModels {
        fn new(compress: bool) -> Self {
            let model = |symbols| {
                ArithmeticModelBuilder::new(symbols)
                    .for_compression(compress)
                    .build()
            };
            Self {
                bytes_used: model(4),
                diff_0: model(256),
                diff_1: model(256),
            }
        }

        fn reset(&mut self) {
            self.bytes_used.reset();
            self.diff_0.reset();
            self.diff_1.reset();
        }
    }

    pub struct LasRGBNirCompressor {
        last: RGBNir,
        rgb_models: RGBModels,
        nir_models: NirModels,
    }

    impl Default for LasRGBNirCompressor {
        fn default() -> Self {
            Self {
                last: RGBNir::default(),
                rgb_models: RGBModels::new(true),
                nir_models: NirModels::new(true),
            }
        }
    }

    impl<W: Write> FieldCompressor<W> for LasRGBNirCompressor {
        fn size_of_field(&self) -> usize {
            RGBNir::SIZE
        }

        fn compress_first(&mut self, dst: &mut W, buf: &[u8]) -> std::io::Result<()> {
            self.last = RGBNir::unpack_from(buf);
            dst.write_all(&buf[..RGBNir::SIZE])
        }

        fn compress_with(
            &mut self,
            encoder: &mut ArithmeticEncoder<W>,
            buf: &[u8],
        ) -> std::io::Result<()> {
            let current = RGBNir::unpack_from(buf);
            compress_rgb_using(encoder, &mut self.rgb_models, &current.rgb, &self.last.rgb)?;

            let low_changed = lower_byte_changed(current.nir, self.last.nir);
            let high_changed = upper_byte_changed(current.nir, self.last.nir);
            let sym = (low_changed as u32) | (high_changed as u32) << 1;
            encoder.encode_symbol(&mut self.nir_models.bytes_used, sym)?;
            if low_changed {
                let diff = lower_byte(current.nir).wrapping_sub(lower_byte(self.last.nir));
                encoder.encode_symbol(&mut self.nir_models.diff_0, u32::from(diff))?;
            }
            if high_changed {
                let diff = upper_byte(current.nir).wrapping_sub(upper_byte(self.last.nir));
                encoder.encode_symbol(&mut self.nir_models.diff_1, u32::from(diff))?;
            }
            self.last = current;
            Ok(())
        }

        fn reset(&mut self) {
            self.last = RGBNir::default();
            self.rgb_models.reset();
            self.nir_models.reset();
        }
    }

    pub struct LasRGBNirDecompressor {
        last: RGBNir,
        rgb_models: RGBModels,
        nir_models: NirModels,
    }

    impl Default for LasRGBNirDecompressor {
        fn default() -> Self {
            Self {
                last: RGBNir::default(),
                rgb_models: RGBModels::new(false),
                nir_models: NirModels::new(false),
            }
        }
    }

    impl<R: Read> FieldDecompressor<R> for LasRGBNirDecompressor {
        fn size_of_field(&self) -> usize {
            RGBNir::SIZE
        }

        fn decompress_first(&mut self, src: &mut R, first_point: &mut [u8]) -> std::io::Result<()> {
            src.read_exact(&mut first_point[..RGBNir::SIZE])?;
            self.last = RGBNir::unpack_from(first_point);
            Ok(())
        }

        fn decompress_with(
            &mut self,
            decoder: &mut ArithmeticDecoder<R>,
            buf: &mut [u8],
        ) -> std::io::Result<()> {
            let rgb = decompress_rgb_using(decoder, &mut self.rgb_models, &self.last.rgb)?;

            let sym = decoder.decode_symbol(&mut self.nir_models.bytes_used)?;
            let mut low = lower_byte(self.last.nir);
            let mut high = upper_byte(self.last.nir);
            if sym & 1 != 0 {
                let diff = decoder.decode_symbol(&mut self.nir_models.diff_0)? as u8;
                low = low.wrapping_add(diff);
            }
            if sym & 2 != 0 {
                let diff = decoder.decode_symbol(&mut self.nir_models.diff_1)? as u8;
                high = high.wrapping_add(diff);
            }

            self.last = RGBNir {
                rgb,
                nir: u16::from(high) << 8 | u16::from(low),
            };
            self.last.pack_into(buf);
            Ok(())
        }

        fn reset(&mut self) {
            self.last = RGBNir::default();
            self.rgb_models.reset();
            self.nir_models.reset();
        }
    }
}

#[cfg(test)]
mod test {
    use super::v2::{LasRGBNirCompressor, LasRGBNirDecompressor};
    use super::*;
    use crate::decoders::ArithmeticDecoder;
    use crate::encoders::ArithmeticEncoder;
    use crate::record::{FieldCompressor, FieldDecompressor};
    use std::io::Cursor;

    #[test]
    fn test_nir_bytes_wrap() {
        let values: Vec<RGBNir> = [0u16, 0x00FF, 0x0100, 0xFFFF, 0x0000, 0x7F80, 0x7F80, 0x1234]
            .iter()
            .enumerate()
            .map(|(i, &nir)| RGBNir {
                rgb: RGB {
                    red: i as u16,
                    green: 2 * i as u16,
                    blue: 3,
                },
                nir,
            })
            .collect();

        let mut compressor = LasRGBNirCompressor::default();
        let mut buf = [0u8; 8];
        let mut out = Cursor::new(Vec::<u8>::new());
        values[0].pack_into(&mut buf);
        FieldCompressor::compress_first(&mut compressor, &mut out, &buf).unwrap();
        let mut encoder = ArithmeticEncoder::new(out);
        for v in &values[1..] {
            v.pack_into(&mut buf);
            compressor.compress_with(&mut encoder, &buf).unwrap();
        }
        encoder.done().unwrap();

        let mut src = Cursor::new(encoder.into_inner().into_inner());
        let mut decompressor = LasRGBNirDecompressor::default();
        FieldDecompressor::decompress_first(&mut decompressor, &mut src, &mut buf).unwrap();
        let mut decoder = ArithmeticDecoder::new(src);
        decoder.read_init_bytes().unwrap();
        for v in &values[1..] {
            decompressor.decompress_with(&mut decoder, &mut buf).unwrap();
            assert_eq!(&RGBNir::unpack_from(&buf), v);
        }
    }
}
