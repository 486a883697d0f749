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


//! Decompression of the chunks of an in-memory LAZ buffer using multiple threads.

use std::io::{Cursor, Seek, SeekFrom};

use byteorder::{LittleEndian, ReadBytesExt};
use rayon::prelude::*;

use crate::byteslice::{ChunksIrregular, ChunksIrregularMut};
use crate::errors::LazError;
use crate::laszip::chunk_table::ChunkTable;
use crate::laszip::{CompressorType, LazVlr};
use crate::record::PointRecordDecompressor;

/// Decompresses all the points of `compressed_points_data` into `decompressed_points`.
///
/// Each chunk is decompressed on the rayon thread pool.
///
/// `compressed_points_data` starts with the offset to the chunk table, which is
/// mandatory here. The size of `decompressed_points` gives the number of points,
/// it must be a multiple of the record size.
pub fn par_decompress_buffer(
    compressed_points_data: &[u8],
    decompressed_points: &mut [u8],
    laz_vlr: &LazVlr,
) -> crate::Result<()> {
    if laz_vlr.compressor() != CompressorType::PointWiseChunked {
        return Err(LazError::UnsupportedCompressorType(laz_vlr.compressor()));
    }
    let point_size = laz_vlr.items_size() as usize;
    if point_size == 0 || decompressed_points.len() % point_size != 0 {
        return Err(LazError::BufferLenNotMultipleOfPointSize {
            buffer_len: decompressed_points.len(),
            point_size,
        });
    }

    let mut cursor = Cursor::new(compressed_points_data);
    let offset = cursor.read_i64::<LittleEndian>()?;
    if offset < ChunkTable::OFFSET_SIZE as i64 || offset as usize > compressed_points_data.len() {
        return Err(LazError::MissingChunkTable);
    }
    cursor.seek(SeekFrom::Start(offset as u64))?;
    let chunk_table = ChunkTable::read_from(
        &mut cursor,
        laz_vlr.uses_variably_sized_chunks(),
        laz_vlr.chunk_size(),
    )?;
    let chunk_starts = chunk_table.chunk_starts(ChunkTable::OFFSET_SIZE)?;
    let data_end = chunk_starts
        .last()
        .copied()
        .unwrap_or(ChunkTable::OFFSET_SIZE) as usize;
    if data_end > compressed_points_data.len() {
        return Err(LazError::CorruptChunkTable);
    }

    // The number of points of the last fixed-size chunk is not in the table,
    // it is deduced from the output size
    let mut remaining_points = (decompressed_points.len() / point_size) as u64;
    let mut byte_sizes = Vec::with_capacity(chunk_table.len());
    let mut output_sizes = Vec::with_capacity(chunk_table.len());
    for entry in &chunk_table {
        let point_count = entry.point_count.min(remaining_points);
        remaining_points -= point_count;
        byte_sizes.push(entry.byte_count as usize);
        output_sizes.push(point_count as usize * point_size);
    }
    if remaining_points != 0 {
        return Err(LazError::BufferLenNotMultipleOfPointSize {
            buffer_len: decompressed_points.len(),
            point_size,
        });
    }

    let compressed_points = &compressed_points_data[ChunkTable::OFFSET_SIZE as usize..data_end];
    let input_chunks_iter = ChunksIrregular::new(compressed_points, &byte_sizes);
    let output_chunks_iter = ChunksIrregularMut::new(decompressed_points, &output_sizes);

    // zip cannot be turned into a parallel iterator, the jobs are collected first
    let decompression_jobs: Vec<(usize, (&[u8], &mut [u8]))> = input_chunks_iter
        .zip(output_chunks_iter)
        .enumerate()
        .collect();
    let tabled_chunks = chunk_table.len() as u32;
    decompression_jobs
        .into_par_iter()
        .map(|(index, (chunk_in, chunk_out))| {
            let src = Cursor::new(chunk_in);
            let mut record_decompressor = PointRecordDecompressor::new(src, laz_vlr.items())?;
            record_decompressor
                .decompress_many(chunk_out)
                .map_err(|e| match e.kind() {
                    std::io::ErrorKind::UnexpectedEof => LazError::EndOfData {
                        chunk: index as u32,
                    },
                    std::io::ErrorKind::InvalidData => LazError::CorruptChunk {
                        chunk: index as u32,
                        tabled_chunks,
                    },
                    _ => LazError::IoError(e),
                })
        })
        .collect::<crate::Result<()>>()
}
