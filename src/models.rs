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

//! Adaptive probability models driving the arithmetic coder.
//!
//! Both models are owned by the codec that uses them and are reset
//! in place at the start of every chunk.

// length bits discarded before mult.
pub(crate) const DM_LENGTH_SHIFT: u32 = 15;
// for adaptive models
pub(crate) const DM_MAX_COUNT: u32 = 1 << DM_LENGTH_SHIFT;

// length bits discarded before mult.
pub(crate) const BM_LENGTH_SHIFT: u32 = 13;
// for adaptive models
pub(crate) const BM_MAX_COUNT: u32 = 1 << BM_LENGTH_SHIFT;

pub(crate) const MIN_SYMBOLS: u32 = 2;
pub(crate) const MAX_SYMBOLS: u32 = 1 << 11;

/// Adaptive model over `symbols` symbols.
#[derive(Debug, Clone)]
pub struct ArithmeticModel {
    pub(crate) symbols: u32,
    pub(crate) compress: bool,

    pub(crate) distribution: Vec<u32>,
    pub(crate) symbol_count: Vec<u32>,
    pub(crate) decoder_table: Vec<u32>,

    pub(crate) total_count: u32,
    pub(crate) update_cycle: u32,
    pub(crate) symbols_until_update: u32,
    pub(crate) last_symbol: u32,
    pub(crate) table_size: u32,
    pub(crate) table_shift: u32,
}

impl ArithmeticModel {
    /// # Panics
    ///
    /// Panics if `symbols` is not in `2..=2048`
    pub fn new(symbols: u32, compress: bool) -> Self {
        assert!(
            (MIN_SYMBOLS..=MAX_SYMBOLS).contains(&symbols),
            "Invalid number of symbols: {}",
            symbols
        );

        let (table_size, table_shift) = if !compress && symbols > 16 {
            let mut table_bits = 3u32;
            while symbols > (1u32 << (table_bits + 2)) {
                table_bits += 1;
            }
            (1u32 << table_bits, DM_LENGTH_SHIFT - table_bits)
        } else {
            (0, 0)
        };

        let mut model = Self {
            symbols,
            compress,
            distribution: vec![0u32; symbols as usize],
            symbol_count: vec![0u32; symbols as usize],
            decoder_table: vec![0u32; if table_size > 0 { table_size as usize + 2 } else { 0 }],
            total_count: 0,
            update_cycle: 0,
            symbols_until_update: 0,
            last_symbol: symbols - 1,
            table_size,
            table_shift,
        };
        model.reset();
        model
    }

    /// Puts the model back in its initial, equiprobable, state
    /// without reallocating its tables.
    pub fn reset(&mut self) {
        for count in &mut self.symbol_count {
            *count = 1;
        }
        self.total_count = 0;
        self.update_cycle = self.symbols;
        self.update();
        self.update_cycle = (self.symbols + 6) >> 1;
        self.symbols_until_update = self.update_cycle;
    }

    pub fn update(&mut self) {
        // halve counts when a threshold is reached
        self.total_count += self.update_cycle;
        if self.total_count > DM_MAX_COUNT {
            self.total_count = 0;
            for symbol_count in &mut self.symbol_count {
                *symbol_count = (*symbol_count + 1) >> 1;
                self.total_count += *symbol_count;
            }
        }

        // compute cumulative distribution, decoder table
        let mut sum = 0u32;
        let scale = 0x8000_0000u32 / self.total_count;

        if self.compress || self.table_size == 0 {
            for (symbol_distribution, symbol_count) in
                self.distribution.iter_mut().zip(&self.symbol_count)
            {
                *symbol_distribution = (scale.wrapping_mul(sum)) >> (31 - DM_LENGTH_SHIFT);
                sum += *symbol_count;
            }
        } else {
            let mut s = 0usize;
            for (k, (symbol_distribution, symbol_count)) in self
                .distribution
                .iter_mut()
                .zip(&self.symbol_count)
                .enumerate()
            {
                *symbol_distribution = (scale.wrapping_mul(sum)) >> (31 - DM_LENGTH_SHIFT);
                sum += *symbol_count;
                let w = (*symbol_distribution >> self.table_shift) as usize;
                while s < w {
                    s += 1;
                    self.decoder_table[s] = (k - 1) as u32;
                }
            }
            self.decoder_table[0] = 0;
            while s <= self.table_size as usize {
                s += 1;
                self.decoder_table[s] = self.symbols - 1;
            }
        }

        self.update_cycle = (5 * self.update_cycle) >> 2;
        let max_cycle = (self.symbols + 6) << 3;
        if self.update_cycle > max_cycle {
            self.update_cycle = max_cycle;
        }
        self.symbols_until_update = self.update_cycle;
    }

    pub fn num_symbols(&self) -> u32 {
        self.symbols
    }
}

/// Adaptive binary model
#[derive(Debug, Clone)]
pub struct ArithmeticBitModel {
    pub(crate) bit_0_count: u32,
    pub(crate) bit_count: u32,
    pub(crate) bit_0_prob: u32,
    pub(crate) bits_until_update: u32,
    pub(crate) update_cycle: u32,
}

impl ArithmeticBitModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn update(&mut self) {
        // halve counts when a threshold is reached
        self.bit_count += self.update_cycle;
        if self.bit_count > BM_MAX_COUNT {
            self.bit_count = (self.bit_count + 1) >> 1;
            self.bit_0_count = (self.bit_0_count + 1) >> 1;
            if self.bit_0_count == self.bit_count {
                self.bit_count += 1;
            }
        }

        // compute scaled bit 0 probability
        let scale = 0x8000_0000u32 / self.bit_count;
        self.bit_0_prob = (self.bit_0_count * scale) >> (31 - BM_LENGTH_SHIFT);

        // set frequency of model updates
        self.update_cycle = (5 * self.update_cycle) >> 2;
        if self.update_cycle > 64 {
            self.update_cycle = 64;
        }
        self.bits_until_update = self.update_cycle;
    }
}

impl Default for ArithmeticBitModel {
    fn default() -> Self {
        // initialization to equiprobable model
        Self {
            bit_0_count: 1,
            bit_count: 2,
            bit_0_prob: 1u32 << (BM_LENGTH_SHIFT - 1),
            // start with frequent updates
            bits_until_update: 4,
            update_cycle: 4,
        }
    }
}

pub struct ArithmeticModelBuilder {
    symbols: u32,
    compress: bool,
}

impl ArithmeticModelBuilder {
    pub fn new(symbols: u32) -> Self {
        Self {
            symbols,
            compress: false,
        }
    }

    /// Models used for compression do not need the decoding table
    pub fn for_compression(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    pub fn build(self) -> ArithmeticModel {
        ArithmeticModel::new(self.symbols, self.compress)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_decoder_table_only_when_decompressing() {
        let m = ArithmeticModelBuilder::new(256).build();
        assert_eq!(m.table_size, 64);
        assert_eq!(m.decoder_table.len(), 66);

        let m = ArithmeticModelBuilder::new(256).for_compression(true).build();
        assert_eq!(m.table_size, 0);
        assert!(m.decoder_table.is_empty());

        let m = ArithmeticModelBuilder::new(16).build();
        assert!(m.decoder_table.is_empty());
    }

    #[test]
    fn test_reset_restores_initial_state() {
        let mut m = ArithmeticModelBuilder::new(64).build();
        let fresh = m.clone();
        for _ in 0..1000 {
            m.symbol_count[3] += 1;
            m.symbols_until_update -= 1;
            if m.symbols_until_update == 0 {
                m.update();
            }
        }
        assert_ne!(m.distribution, fresh.distribution);
        m.reset();
        assert_eq!(m.distribution, fresh.distribution);
        assert_eq!(m.decoder_table, fresh.decoder_table);
        assert_eq!(m.update_cycle, fresh.update_cycle);
        assert_eq!(m.symbols_until_update, fresh.symbols_until_update);
    }

    #[test]
    fn test_update_cycle_is_capped() {
        let mut m = ArithmeticModelBuilder::new(2).build();
        for _ in 0..100 {
            m.update();
        }
        assert_eq!(m.update_cycle, (2 + 6) << 3);

        let mut b = ArithmeticBitModel::new();
        for _ in 0..100 {
            b.update();
        }
        assert_eq!(b.update_cycle, 64);
        assert!(b.bit_count <= BM_MAX_COUNT + 64);
    }

    #[test]
    #[should_panic]
    fn test_too_many_symbols() {
        let _ = ArithmeticModelBuilder::new(MAX_SYMBOLS + 1).build();
    }
}
