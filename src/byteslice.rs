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


//! Splitting of byte slices into consecutive pieces of different sizes.
use std::iter::FusedIterator;

/// Iterator over consecutive sub-slices whose sizes are given.
///
/// Iteration stops when the sizes are exhausted or when a size
/// exceeds what is left of the slice.
pub struct ChunksIrregular<'a> {
    remainder: &'a [u8],
    sizes: std::slice::Iter<'a, usize>,
}

impl<'a> ChunksIrregular<'a> {
    pub fn new(slc: &'a [u8], sizes: &'a [usize]) -> Self {
        Self {
            remainder: slc,
            sizes: sizes.iter(),
        }
    }
}

impl<'a> Iterator for ChunksIrregular<'a> {
    type Item = &'a [u8];

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let size = *self.sizes.next()?;
        if size > self.remainder.len() {
            return None;
        }
        let (head, tail) = self.remainder.split_at(size);
        self.remainder = tail;
        Some(head)
    }
}

impl<'a> FusedIterator for ChunksIrregular<'a> {}

/// Mutable version of [`ChunksIrregular`].
pub struct ChunksIrregularMut<'a> {
    remainder: &'a mut [u8],
    sizes: std::slice::Iter<'a, usize>,
}

impl<'a> ChunksIrregularMut<'a> {
    pub fn new(slc: &'a mut [u8], sizes: &'a [usize]) -> Self {
        Self {
            remainder: slc,
            sizes: sizes.iter(),
        }
    }
}

impl<'a> Iterator for ChunksIrregularMut<'a> {
    type Item = &'a mut [u8];

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let size = *self.sizes.next()?;
        if size > self.remainder.len() {
            return None;
        }
        let tmp = std::mem::take(&mut self.remainder);
        let (head, tail) = tmp.split_at_mut(size);
        self.remainder = tail;
        Some(head)
    }
}

impl<'a> FusedIterator for ChunksIrregularMut<'a> {}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_split_by_sizes() {
        let data = [0u8, 1, 2, 3, 4, 5];
        let sizes = [1, 3, 0, 2, 4];
        let chunks: Vec<&[u8]> = ChunksIrregular::new(&data, &sizes).collect();
        assert_eq!(chunks, vec![&[0u8][..], &[1, 2, 3], &[], &[4, 5]]);

        let mut data = [0u8; 5];
        let sizes = [2, 3];
        for (i, chunk) in ChunksIrregularMut::new(&mut data, &sizes).enumerate() {
            chunk.iter_mut().for_each(|b| *b = i as u8 + 1);
        }
        assert_eq!(data, [1, 1, 2, 2, 2]);
    }
}
