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

//! Predictive integer compression, the counterpart of [`IntegerDecompressor`].
//!
//! [`IntegerDecompressor`]: crate::decompressors::IntegerDecompressor

use std::io::Write;

use crate::decompressors::{
    CorrectorRange, DEFAULT_BITS, DEFAULT_BITS_HIGH, DEFAULT_CONTEXTS, DEFAULT_RANGE,
};
use crate::encoders::ArithmeticEncoder;
use crate::models::{ArithmeticBitModel, ArithmeticModel};

pub struct IntegerCompressor {
    k: u32,

    contexts: u32,
    bits_high: u32,
    corr: CorrectorRange,

    m_bits: Vec<ArithmeticModel>,
    m_corrector0: ArithmeticBitModel,
    m_corrector: Vec<ArithmeticModel>,
}

impl IntegerCompressor {
    pub fn new(bits: u32, contexts: u32, bits_high: u32, range: u32) -> Self {
        Self {
            k: 0,
            contexts,
            bits_high,
            corr: CorrectorRange::new(bits, range),
            m_bits: vec![],
            m_corrector0: ArithmeticBitModel::new(),
            m_corrector: vec![],
        }
    }

    pub fn k(&self) -> u32 {
        self.k
    }

    pub fn init(&mut self) {
        if self.m_bits.is_empty() {
            self.m_bits = self.corr.k_models(self.contexts, true);
            self.m_corrector = self.corr.corrector_models(self.bits_high, true);
        } else {
            self.m_bits.iter_mut().for_each(ArithmeticModel::reset);
            self.m_corrector.iter_mut().for_each(ArithmeticModel::reset);
        }
        self.m_corrector0.reset();
        self.k = 0;
    }

    pub fn compress<W: Write>(
        &mut self,
        enc: &mut ArithmeticEncoder<W>,
        pred: i32,
        real: i32,
        context: u32,
    ) -> std::io::Result<()> {
        // the corrector will be within the interval [ - (corr_range - 1)  ...  + (corr_range - 1) ]
        let mut corr = real.wrapping_sub(pred);
        // we fold the corrector into the interval [ corr_min  ...  corr_max ]
        if corr < self.corr.min {
            corr = corr.wrapping_add(self.corr.range as i32);
        } else if corr > self.corr.max {
            corr = corr.wrapping_sub(self.corr.range as i32);
        }
        self.write_corrector(enc, corr, context)
    }

    fn write_corrector<W: Write>(
        &mut self,
        enc: &mut ArithmeticEncoder<W>,
        c: i32,
        context: u32,
    ) -> std::io::Result<()> {
        // find the tightest interval [ - (2^k - 1)  ...  + (2^k) ] that contains c
        let c1 = if c <= 0 {
            c.wrapping_neg() as u32
        } else {
            (c - 1) as u32
        };
        self.k = 32 - c1.leading_zeros();

        // the number k is between 0 and corr_bits and describes the interval the corrector falls into
        enc.encode_symbol(&mut self.m_bits[context as usize], self.k)?;

        if self.k == 0 {
            // then c is 0 or 1
            return enc.encode_bit(&mut self.m_corrector0, c as u32);
        }
        if self.k >= 32 {
            return Ok(());
        }

        // translate c into the interval [ 0 ... + 2^k - 1 ]
        let c = if c >= 0 {
            (c - 1) as u32
        } else {
            (i64::from(c) + ((1i64 << self.k) - 1)) as u32
        };

        let model = &mut self.m_corrector[(self.k - 1) as usize];
        if self.k <= self.bits_high {
            // for small k we code the interval in one step
            enc.encode_symbol(model, c)
        } else {
            // for larger k we code the interval in two steps
            let k1 = self.k - self.bits_high;
            enc.encode_symbol(model, c >> k1)?;
            enc.write_bits(k1, c & ((1u32 << k1) - 1))
        }
    }
}

pub struct IntegerCompressorBuilder {
    bits: u32,
    contexts: u32,
    bits_high: u32,
    range: u32,
}

impl Default for IntegerCompressorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl IntegerCompressorBuilder {
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

    pub fn build(&self) -> IntegerCompressor {
        IntegerCompressor::new(self.bits, self.contexts, self.bits_high, self.range)
    }

    pub fn build_initialized(&self) -> IntegerCompressor {
        let mut ic = self.build();
        ic.init();
        ic
    }
}
