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

//! Predictive integer decompression.
//!
//! A value is coded as a corrector relative to a prediction. The corrector is
//! split into `k`, the number of significant bits, coded with a per-context
//! model, and the bits themselves, coded with one model per `k`.

use std::io::Read;

use crate::decoders::ArithmeticDecoder;
use crate::models::{ArithmeticBitModel, ArithmeticModel, ArithmeticModelBuilder};

pub(crate) const DEFAULT_BITS: u32 = 16;
pub(crate) const DEFAULT_CONTEXTS: u32 = 1;
pub(crate) const DEFAULT_BITS_HIGH: u32 = 8;
pub(crate) const DEFAULT_RANGE: u32 = 0;

/// The interval correctors are folded into.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) struct CorrectorRange {
    pub(crate) bits: u32,
    pub(crate) range: u32,
    pub(crate) min: i32,
    pub(crate) max: i32,
}

impl CorrectorRange {
    pub(crate) fn new(bits: u32, range: u32) -> Self {
        if range != 0 {
            // the corrector's significant bits and range
            let mut corr_bits = 32 - range.leading_zeros();
            if range == 1u32 << (corr_bits - 1) {
                corr_bits -= 1;
            }
            let min = -((range / 2) as i32);
            Self {
                bits: corr_bits,
                range,
                min,
                max: min.wrapping_add(range as i32).wrapping_sub(1),
            }
        } else if bits != 0 && bits < 32 {
            let range = 1u32 << bits;
            let min = -((range / 2) as i32);
            Self {
                bits,
                range,
                min,
                max: min.wrapping_add(range as i32).wrapping_sub(1),
            }
        } else {
            Self {
                bits: 32,
                range: 0,
                min: i32::MIN,
                max: i32::MAX,
            }
        }
    }

    /// Models coding `k`, the number of bits of the corrector, for each context.
    pub(crate) fn k_models(&self, contexts: u32, compress: bool) -> Vec<ArithmeticModel> {
        (0..contexts)
            .map(|_| {
                ArithmeticModelBuilder::new(self.bits + 1)
                    .for_compression(compress)
                    .build()
            })
            .collect()
    }

    /// Models coding the (high) bits of correctors of each `k` in `1..=bits`.
    pub(crate) fn corrector_models(&self, bits_high: u32, compress: bool) -> Vec<ArithmeticModel> {
        (1..=self.bits)
            .map(|i| {
                ArithmeticModelBuilder::new(1 << i.min(bits_high))
                    .for_compression(compress)
                    .build()
            })
            .collect()
    }
}

#[derive(Clone)]
pub struct IntegerDecompressor {
    k: u32,
    sentinel: bool,

    contexts: u32,
    bits_high: u32,
    corr: CorrectorRange,

    m_bits: Vec<ArithmeticModel>,
    m_corrector0: ArithmeticBitModel,
    m_corrector: Vec<ArithmeticModel>,
}

impl IntegerDecompressor {
    pub fn new(bits: u32, contexts: u32, bits_high: u32, range: u32) -> Self {
        Self {
            k: 0,
            sentinel: false,
            contexts,
            bits_high,
            corr: CorrectorRange::new(bits, range),
            m_bits: vec![],
            m_corrector0: ArithmeticBitModel::new(),
            m_corrector: vec![],
        }
    }

    /// Number of bits of the last decoded corrector
    pub fn k(&self) -> u32 {
        self.k
    }

    /// `true` when the last decoded corrector had 32 significant bits,
    /// in which case the corrector used was the minimum of the range.
    pub fn last_corrector_was_sentinel(&self) -> bool {
        self.sentinel
    }

    pub fn corrector_min(&self) -> i32 {
        self.corr.min
    }

    pub fn corrector_max(&self) -> i32 {
        self.corr.max
    }

    /// Allocates the models on first call, resets them on later ones.
    pub fn init(&mut self) {
        if self.m_bits.is_empty() {
            self.m_bits = self.corr.k_models(self.contexts, false);
            self.m_corrector = self.corr.corrector_models(self.bits_high, false);
        } else {
            self.m_bits.iter_mut().for_each(ArithmeticModel::reset);
            self.m_corrector.iter_mut().for_each(ArithmeticModel::reset);
        }
        self.m_corrector0.reset();
        self.k = 0;
        self.sentinel = false;
    }

    pub fn decompress<T: Read>(
        &mut self,
        dec: &mut ArithmeticDecoder<T>,
        pred: i32,
        context: u32,
    ) -> std::io::Result<i32> {
        let corr = self.read_corrector(dec, context)?;
        let mut real = pred.wrapping_add(corr);
        if real < 0 {
            real = real.wrapping_add(self.corr.range as i32);
        } else if (real as u32) >= self.corr.range {
            real = real.wrapping_sub(self.corr.range as i32);
        }
        Ok(real)
    }

    fn read_corrector<T: Read>(
        &mut self,
        dec: &mut ArithmeticDecoder<T>,
        context: u32,
    ) -> std::io::Result<i32> {
        // decode within which interval the corrector is falling
        self.k = dec.decode_symbol(&mut self.m_bits[context as usize])?;
        self.sentinel = false;

        if self.k == 0 {
            return Ok(dec.decode_bit(&mut self.m_corrector0)? as i32);
        }
        if self.k >= 32 {
            self.sentinel = true;
            return Ok(self.corr.min);
        }

        // decode the exact location of the corrector within the interval
        let model = &mut self.m_corrector[(self.k - 1) as usize];
        let c = if self.k <= self.bits_high {
            // for small k we can do this in one step
            dec.decode_symbol(model)?
        } else {
            // for larger k we need to do this in two steps
            let k1 = self.k - self.bits_high;
            let high = dec.decode_symbol(model)?;
            let low = dec.read_bits(k1)?;
            (high << k1) | low
        };

        // translate c back into its correct interval
        let c = if c >= (1u32 << (self.k - 1)) {
            // [ 2^(k-1) ... 2^k - 1 ] -> [ 2^(k-1) + 1 ... 2^k ]
            (c as i32).wrapping_add(1)
        } else {
            // [ 0 ... 2^(k-1) - 1 ] -> [ -(2^k - 1) ... -(2^(k-1)) ]
            (c as i32).wrapping_sub(((1u64 << self.k) - 1) as i32)
        };
        Ok(c)
    }
}

pub struct IntegerDecompressorBuilder {
    bits: u32,
    contexts: u32,
    bits_high: u32,
    range: u32,
}

impl Default for IntegerDecompressorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl IntegerDecompressorBuilder {
    pub fn new() -> Self {
        Self {
            bits: DEFAULT_BITS,
            contexts: DEFAULT_CONTEXTS,
            bits_high: DEFAULT_BITS_HIGH,
            range: DEFAULT_RANGE,
        }
    }

    pub fn bits(&mut self, bits: u32) -> &mut Self {
        self.bits = bits;
        self
    }

    pub fn contexts(&mut self, contexts: u32) -> &mut Self {
        self.contexts = contexts;
        self
    }

    pub fn bits_high(&mut self, bits_high: u32) -> &mut Self {
        self.bits_high = bits_high;
        self
    }

    pub fn range(&mut self, range: u32) -> &mut Self {
        self.range = range;
        self
    }

    pub fn build(&self) -> IntegerDecompressor {
        IntegerDecompressor::new(self.bits, self.contexts, self.bits_high, self.range)
    }

    pub fn build_initialized(&self) -> IntegerDecompressor {
        let mut idc = self.build();
        idc.init();
        idc
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::compressors::IntegerCompressorBuilder;
    use crate::encoders::ArithmeticEncoder;
    use proptest::prelude::*;
    use std::io::Cursor;

    #[test]
    fn test_corrector_ranges() {
        let c = CorrectorRange::new(16, 0);
        assert_eq!((c.bits, c.range, c.min, c.max), (16, 1 << 16, -32768, 32767));

        let c = CorrectorRange::new(32, 0);
        assert_eq!((c.bits, c.range, c.min, c.max), (32, 0, i32::MIN, i32::MAX));

        // exact power of two loses one bit
        let c = CorrectorRange::new(0, 256);
        assert_eq!((c.bits, c.min, c.max), (8, -128, 127));

        let c = CorrectorRange::new(0, 300);
        assert_eq!((c.bits, c.min, c.max), (9, -150, 149));
    }

    #[test]
    fn test_models_are_lazily_allocated() {
        let mut idc = IntegerDecompressorBuilder::new().bits(32).contexts(3).build();
        assert!(idc.m_bits.is_empty());
        idc.init();
        assert_eq!(idc.m_bits.len(), 3);
        assert_eq!(idc.m_bits[0].num_symbols(), 33);
        assert_eq!(idc.m_corrector.len(), 32);
        assert_eq!(idc.m_corrector[2].num_symbols(), 8);
        assert_eq!(idc.m_corrector[20].num_symbols(), 256);
    }

    fn round_trip(bits: u32, values: &[(i32, i32)]) -> Vec<i32> {
        let mut ic = IntegerCompressorBuilder::new()
            .bits(bits)
            .contexts(2)
            .build_initialized();
        let mut encoder = ArithmeticEncoder::new(Cursor::new(Vec::<u8>::new()));
        for (i, &(pred, real)) in values.iter().enumerate() {
            ic.compress(&mut encoder, pred, real, (i % 2) as u32).unwrap();
        }
        encoder.done().unwrap();

        let mut idc = IntegerDecompressorBuilder::new()
            .bits(bits)
            .contexts(2)
            .build_initialized();
        let mut decoder = ArithmeticDecoder::new(Cursor::new(encoder.into_inner().into_inner()));
        decoder.read_init_bytes().unwrap();
        values
            .iter()
            .enumerate()
            .map(|(i, &(pred, _))| idc.decompress(&mut decoder, pred, (i % 2) as u32).unwrap())
            .collect()
    }

    #[test]
    fn test_extreme_32_bit_differences() {
        let values = [
            (0, i32::MAX),
            (i32::MAX, i32::MIN),
            (i32::MIN, i32::MAX),
            (-1, 0),
            (5, 5),
            (i32::MIN, i32::MIN + 1),
        ];
        let expected: Vec<i32> = values.iter().map(|v| v.1).collect();
        assert_eq!(round_trip(32, &values), expected);
    }

    #[test]
    fn test_sentinel_is_flagged() {
        // a difference of exactly i32::MIN needs 32 bits
        let values = [(0, i32::MIN)];
        let mut ic = IntegerCompressorBuilder::new().bits(32).build_initialized();
        let mut encoder = ArithmeticEncoder::new(Cursor::new(Vec::<u8>::new()));
        ic.compress(&mut encoder, values[0].0, values[0].1, 0).unwrap();
        encoder.done().unwrap();

        let mut idc = IntegerDecompressorBuilder::new().bits(32).build_initialized();
        let mut decoder = ArithmeticDecoder::new(Cursor::new(encoder.into_inner().into_inner()));
        decoder.read_init_bytes().unwrap();
        assert_eq!(idc.decompress(&mut decoder, 0, 0).unwrap(), i32::MIN);
        assert!(idc.last_corrector_was_sentinel());
        assert_eq!(idc.k(), 32);
    }

    proptest! {
        #[test]
        fn decoded_16_bit_values_stay_in_range(values in proptest::collection::vec((0i32..65536, 0i32..65536), 1..200)) {
            let expected: Vec<i32> = values.iter().map(|v| v.1).collect();
            let decoded = round_trip(16, &values);
            for v in &decoded {
                prop_assert!(*v >= 0 && *v < 65536);
            }
            prop_assert_eq!(decoded, expected);
        }

        #[test]
        fn any_32_bit_values_round_trip(values in proptest::collection::vec((any::<i32>(), any::<i32>()), 1..200)) {
            let expected: Vec<i32> = values.iter().map(|v| v.1).collect();
            prop_assert_eq!(round_trip(32, &values), expected);
        }
    }
}
