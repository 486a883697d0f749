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


//! Module with the important struct that people wishing
//! to compress or decompress LAZ data can use
//!
//! It defines the [`PointReader`] & [`PointWriter`]
//! as well as the LasZip VLR data and how to build it
use std::io::{Cursor, Seek, Write};

pub use chunk_table::{ChunkTable, ChunkTableEntry};
#[cfg(feature = "parallel")]
pub use parallel::par_decompress_buffer;
pub use reader::PointReader;
pub use vlr::{
    CompressorType, LazItem, LazItemRecordBuilder, LazItemType, LazVlr, LazVlrBuilder,
    DEFAULT_CHUNK_SIZE,
};
pub use writer::PointWriter;

use crate::errors::LazError;

mod chunk_table;
#[cfg(feature = "parallel")]
mod parallel;
mod reader;
mod vlr;
mod writer;

/// Decompresses all the points of `compressed_points_data` into `decompressed_points`.
///
/// The number of points is given by the size of `decompressed_points`.
pub fn decompress_buffer(
    compressed_points_data: &[u8],
    decompressed_points: &mut [u8],
    laz_vlr: &LazVlr,
) -> crate::Result<()> {
    let point_size = laz_vlr.items_size() as usize;
    if point_size == 0 || decompressed_points.len() % point_size != 0 {
        return Err(LazError::BufferLenNotMultipleOfPointSize {
            buffer_len: decompressed_points.len(),
            point_size,
        });
    }
    let mut reader = PointReader::new();
    reader.setup(laz_vlr)?;
    reader.init(Cursor::new(compressed_points_data))?;
    for record in decompressed_points.chunks_exact_mut(point_size) {
        reader.read_raw(record)?;
    }
    Ok(())
}

/// Compresses all the points of `uncompressed_points` and writes them to `dst`.
pub fn compress_buffer<W: Write + Seek>(
    dst: W,
    uncompressed_points: &[u8],
    laz_vlr: LazVlr,
) -> crate::Result<W> {
    let mut writer = PointWriter::new(dst, laz_vlr)?;
    writer.write_many(uncompressed_points)?;
    writer.done()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_create_laz_items() {
        assert_eq!(
            LazItemRecordBuilder::new()
                .add_item(LazItemType::Point10)
                .build()
                .len(),
            1
        );
    }

    #[test]
    fn test_buffer_round_trip() {
        let items = LazItemRecordBuilder::new()
            .add_item(LazItemType::Point10)
            .add_item(LazItemType::GpsTime)
            .build();
        let vlr = LazVlrBuilder::new()
            .with_laz_items(items)
            .with_chunk_size(7)
            .build();

        let mut points = vec![0u8; 28 * 30];
        for (i, p) in points.chunks_exact_mut(28).enumerate() {
            p[0] = i as u8;
            p[4] = (i * 3) as u8;
            p[14] = 0b0001_0001;
            p[20] = (i * 10) as u8;
        }

        let compressed = compress_buffer(Cursor::new(Vec::<u8>::new()), &points, vlr.clone())
            .unwrap()
            .into_inner();
        assert!(compressed.len() < points.len());

        let mut decompressed = vec![0u8; points.len()];
        decompress_buffer(&compressed, &mut decompressed, &vlr).unwrap();
        assert_eq!(decompressed, points);
    }
}
