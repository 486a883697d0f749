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


//! Module with all the things related to LAZ chunk tables
use std::io::{Read, Seek, SeekFrom, Write};
use std::ops::Index;
use std::slice::SliceIndex;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::compressors::IntegerCompressorBuilder;
use crate::decoders::ArithmeticDecoder;
use crate::decompressors::IntegerDecompressorBuilder;
use crate::encoders::ArithmeticEncoder;
use crate::errors::LazError;

/// Indices of the contexts used for the IntegerCompressor/IntegerDecompressor
/// when decompressing/compressing parts of the chunk table
const POINT_COUNT_CONTEXT: u32 = 0;
const BYTE_COUNT_CONTEXT: u32 = 1;

/// An entry describe one chunk and contains 2 information:
///
/// - The number of bytes in the compressed chunk
/// - The number of points in the compressed chunk
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct ChunkTableEntry {
    pub point_count: u64,
    pub byte_count: u64,
}

/// The ChunkTable contains chunk entries for a LAZ stream.
///
/// The ChunkTable has two ways of being stored
/// depending on if the chunks are fixed-size or variable-sized
///
/// - fixed-size chunks -> Only the number of bytes of the chunk is stored
/// - variable-size chunks -> Both the number of points and the number of bytes are stored
#[derive(Default, Debug, Clone, Eq, PartialEq)]
pub struct ChunkTable(Vec<ChunkTableEntry>);

impl ChunkTable {
    /// Size in bytes of the offset to the chunk table.
    ///
    /// These bytes are the very first ones of the compressed data.
    pub const OFFSET_SIZE: u64 = 8;

    /// Reads the chunk table, the `src` position **must** be at the start of the table.
    ///
    /// When the chunks are fixed-size, the point count of every entry is `chunk_size`,
    /// which is not correct for the last chunk.
    ///
    /// The position of `src` is left at the end of the table.
    pub fn read_from<R: Read>(
        src: &mut R,
        variable_size: bool,
        chunk_size: u32,
    ) -> crate::Result<Self> {
        let version = src.read_u32::<LittleEndian>()?;
        if version != 0 {
            return Err(LazError::CorruptChunkTable);
        }
        let number_of_chunks = src.read_u32::<LittleEndian>()?;
        if number_of_chunks == 0 {
            return Ok(ChunkTable::default());
        }

        let mut decompressor = IntegerDecompressorBuilder::new()
            .bits(32)
            .contexts(2)
            .build_initialized();
        let mut decoder = ArithmeticDecoder::new(src);
        decoder.read_init_bytes()?;

        let mut chunk_table = ChunkTable::with_capacity(number_of_chunks.min(1 << 16) as usize);
        let mut previous_entry = ChunkTableEntry::default();
        for _ in 0..number_of_chunks {
            let point_count = if variable_size {
                decompressor.decompress(
                    &mut decoder,
                    previous_entry.point_count as i32,
                    POINT_COUNT_CONTEXT,
                )? as u32
            } else {
                chunk_size
            };
            let byte_count = decompressor.decompress(
                &mut decoder,
                previous_entry.byte_count as i32,
                BYTE_COUNT_CONTEXT,
            )? as u32;

            let current_entry = ChunkTableEntry {
                point_count: u64::from(point_count),
                byte_count: u64::from(byte_count),
            };
            chunk_table.push(current_entry);
            previous_entry = current_entry;
        }
        Ok(chunk_table)
    }

    /// Writes the chunk table to the `dst`.
    pub fn write_to<W: Write>(&self, dst: &mut W, variable_size: bool) -> std::io::Result<()> {
        dst.write_u32::<LittleEndian>(0)?;
        dst.write_u32::<LittleEndian>(self.len() as u32)?;
        if self.is_empty() {
            return Ok(());
        }

        let mut encoder = ArithmeticEncoder::new(dst);
        let mut compressor = IntegerCompressorBuilder::new()
            .bits(32)
            .contexts(2)
            .build_initialized();

        let mut previous_entry = ChunkTableEntry::default();
        for current_entry in &self.0 {
            if variable_size {
                compressor.compress(
                    &mut encoder,
                    previous_entry.point_count as i32,
                    current_entry.point_count as i32,
                    POINT_COUNT_CONTEXT,
                )?;
            }
            compressor.compress(
                &mut encoder,
                previous_entry.byte_count as i32,
                current_entry.byte_count as i32,
                BYTE_COUNT_CONTEXT,
            )?;
            previous_entry = *current_entry;
        }
        encoder.done()
    }

    /// Positions of the start of each chunk, the last value is the end of the last chunk.
    ///
    /// Fails if a chunk has no bytes, as the starts must be strictly increasing.
    pub fn chunk_starts(&self, chunks_start: u64) -> crate::Result<Vec<u64>> {
        let mut starts = Vec::with_capacity(self.len() + 1);
        starts.push(chunks_start);
        let mut position = chunks_start;
        for entry in &self.0 {
            if entry.byte_count == 0 {
                return Err(LazError::CorruptChunkTable);
            }
            position += entry.byte_count;
            starts.push(position);
        }
        Ok(starts)
    }

    /// Cumulative number of points before each chunk, the last value is the total.
    pub fn chunk_totals(&self) -> Vec<u64> {
        std::iter::once(0)
            .chain(self.0.iter().scan(0u64, |total, entry| {
                *total += entry.point_count;
                Some(*total)
            }))
            .collect()
    }
}

impl ChunkTable {
    pub fn with_capacity(capacity: usize) -> Self {
        Self(Vec::<ChunkTableEntry>::with_capacity(capacity))
    }

    pub fn push(&mut self, entry: ChunkTableEntry) {
        self.0.push(entry);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<[ChunkTableEntry]> for ChunkTable {
    fn as_ref(&self) -> &[ChunkTableEntry] {
        &self.0
    }
}

impl<'a> IntoIterator for &'a ChunkTable {
    type Item = <std::slice::Iter<'a, ChunkTableEntry> as Iterator>::Item;
    type IntoIter = std::slice::Iter<'a, ChunkTableEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl<I> Index<I> for ChunkTable
where
    I: SliceIndex<[ChunkTableEntry]>,
{
    type Output = <I as SliceIndex<[ChunkTableEntry]>>::Output;

    fn index(&self, index: I) -> &Self::Output {
        &self.0[index]
    }
}

/// Updates the 'chunk table offset'
///
/// This function expects the position of the destination to be at the start of the chunk_table
/// (whether it is written or not) and the offset to have already been reserved.
///
/// The position of the destination is untouched.
pub(super) fn update_chunk_table_offset<W: Write + Seek>(
    dst: &mut W,
    offset_pos: SeekFrom,
) -> std::io::Result<()> {
    let start_of_chunk_table_pos = dst.seek(SeekFrom::Current(0))?;
    dst.seek(offset_pos)?;
    dst.write_i64::<LittleEndian>(start_of_chunk_table_pos as i64)?;
    dst.seek(SeekFrom::Start(start_of_chunk_table_pos))?;
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Cursor;

    fn table(entries: &[(u64, u64)]) -> ChunkTable {
        let mut table = ChunkTable::default();
        for &(point_count, byte_count) in entries {
            table.push(ChunkTableEntry {
                point_count,
                byte_count,
            });
        }
        table
    }

    #[test]
    fn test_variable_table_round_trip() {
        let table = table(&[(10, 120), (3, 40), (700, 9000), (1, 25)]);
        let mut data = Cursor::new(Vec::<u8>::new());
        table.write_to(&mut data, true).unwrap();
        data.set_position(0);
        let read = ChunkTable::read_from(&mut data, true, u32::MAX).unwrap();
        assert_eq!(read, table);
        assert_eq!(read.chunk_totals(), vec![0, 10, 13, 713, 714]);
        assert_eq!(
            read.chunk_starts(8).unwrap(),
            vec![8, 128, 168, 9168, 9193]
        );
    }

    #[test]
    fn test_fixed_table_uses_chunk_size() {
        let written = table(&[(5, 70), (5, 64)]);
        let mut data = Cursor::new(Vec::<u8>::new());
        written.write_to(&mut data, false).unwrap();
        data.set_position(0);
        let read = ChunkTable::read_from(&mut data, false, 5).unwrap();
        assert_eq!(read, written);
    }

    #[test]
    fn test_invalid_tables() {
        let mut data = Cursor::new(vec![1u8, 0, 0, 0, 0, 0, 0, 0]);
        assert!(matches!(
            ChunkTable::read_from(&mut data, false, 5),
            Err(LazError::CorruptChunkTable)
        ));

        let empty_chunk = table(&[(5, 70), (5, 0)]);
        assert!(matches!(
            empty_chunk.chunk_starts(8),
            Err(LazError::CorruptChunkTable)
        ));
    }
}
