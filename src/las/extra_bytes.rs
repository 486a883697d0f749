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

//! Extra bytes appended to a point record, each coded as the wrapping
//! difference to the same byte of the previous point.

pub mod v2 {
    use std::io::{Read, Write};

    use crate::decoders::ArithmeticDecoder;
    use crate::encoders::ArithmeticEncoder;
    use crate::models::{ArithmeticModel, ArithmeticModelBuilder};
    use crate::record::{FieldCompressor, FieldDecompressor};

    fn byte_models(count: usize, compress: bool) -> Vec<ArithmeticModel> {
        (0..count)
            .map(|_| {
                ArithmeticModelBuilder::new(256)
                    .for_compression(compress)
                    .build()
            })
            .collect()
    }

    pub struct LasExtraByteCompressor {
        last_bytes: Vec<u8>,
        models: Vec<ArithmeticModel>,
    }

    impl LasExtraByteCompressor {
        pub fn new(count: usize) -> Self {
            Self {
                last_bytes: vec![0u8; count],
                models: byte_models(count, true),
            }
        }
    }

    impl<W: Write> FieldCompressor<W> for LasExtraByteCompressor {
        fn size_of_field(&self) -> usize {
            self.last_bytes.len()
        }

        fn compress_first(&mut self, dst: &mut W, buf: &[u8]) -> std::io::Result<()> {
            let count = self.last_bytes.len();
            self.last_bytes.copy_from_slice(&buf[..count]);
            dst.write_all(&buf[..count])
        }

        fn compress_with(
            &mut self,
            encoder: &mut ArithmeticEncoder<W>,
            buf: &[u8],
        ) -> std::io::Result<()> {
            for ((last, current), model) in self
                .last_bytes
                .iter_mut()
                .zip(buf)
                .zip(self.models.iter_mut())
            {
                let diff = current.wrapping_sub(*last);
                encoder.encode_symbol(model, u32::from(diff))?;
                *last = *current;
            }
            Ok(())
        }

        fn reset(&mut self) {
            self.last_bytes.iter_mut().for_each(|b| *b = 0);
            self.models.iter_mut().for_each(ArithmeticModel::reset);
        }
    }

    pub struct LasExtraByteDecompressor {
        last_bytes: Vec<u8>,
        models: Vec<ArithmeticModel>,
    }

    impl LasExtraByteDecompressor {
        pub fn new(count: usize) -> Self {
            Self {
                last_bytes: vec![0u8; count],
                models: byte_models(count, false),
            }
        }
    }

    impl<R: Read> FieldDecompressor<R> for LasExtraByteDecompressor {
        fn size_of_field(&self) -> usize {
            self.last_bytes.len()
        }

        fn decompress_first(&mut self, src: &mut R, first_point: &mut [u8]) -> std::io::Result<()> {
            let count = self.last_bytes.len();
            src.read_exact(&mut first_point[..count])?;
            self.last_bytes.copy_from_slice(&first_point[..count]);
            Ok(())
        }

        fn decompress_with(
            &mut self,
            decoder: &mut ArithmeticDecoder<R>,
            buf: &mut [u8],
        ) -> std::io::Result<()> {
            for ((last, out), model) in self
                .last_bytes
                .iter_mut()
                .zip(buf.iter_mut())
                .zip(self.models.iter_mut())
            {
                let diff = decoder.decode_symbol(model)? as u8;
                *last = last.wrapping_add(diff);
                *out = *last;
            }
            Ok(())
        }

        fn reset(&mut self) {
            self.last_bytes.iter_mut().for_each(|b| *b = 0);
            self.models.iter_mut().for_each(ArithmeticModel::reset);
        }
    }
}

#[cfg(test)]
mod test {
    use super::v2::{LasExtraByteCompressor, LasExtraByteDecompressor};
    use crate::decoders::ArithmeticDecoder;
    use crate::encoders::ArithmeticEncoder;
    use crate::record::{FieldCompressor, FieldDecompressor};
    use std::io::Cursor;

    #[test]
    fn test_extra_bytes_round_trip() {
        let records: Vec<[u8; 3]> = (0..300u32)
            .map(|i| [i as u8, 255 - (i % 7) as u8, (i * i) as u8])
            .collect();

        let mut compressor = LasExtraByteCompressor::new(3);
        let mut out = Cursor::new(Vec::<u8>::new());
        FieldCompressor::compress_first(&mut compressor, &mut out, &records[0]).unwrap();
        let mut encoder = ArithmeticEncoder::new(out);
        for r in &records[1..] {
            compressor.compress_with(&mut encoder, r).unwrap();
        }
        encoder.done().unwrap();

        let mut src = Cursor::new(encoder.into_inner().into_inner());
        let mut decompressor = LasExtraByteDecompressor::new(3);
        let mut buf = [0u8; 3];
        FieldDecompressor::decompress_first(&mut decompressor, &mut src, &mut buf).unwrap();
        assert_eq!(buf, records[0]);
        let mut decoder = ArithmeticDecoder::new(src);
        decoder.read_init_bytes().unwrap();
        for r in &records[1..] {
            decompressor.decompress_with(&mut decoder, &mut buf).unwrap();
            assert_eq!(&buf, r);
        }
    }
}
