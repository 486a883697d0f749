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


use std::io::{Seek, SeekFrom, Write};

use byteorder::{LittleEndian, WriteBytesExt};

use crate::errors::LazError;
use crate::las::point::LasPoint;
use crate::laszip::chunk_table::{self, ChunkTable, ChunkTableEntry};
use crate::laszip::{CompressorType, LazVlr};
use crate::record::PointRecordCompressor;

enum Sink<W: Write> {
    Raw(W),
    Compressed(PointRecordCompressor<W>),
}

impl<W: Write + Seek> Sink<W> {
    fn stream(&mut self) -> &mut W {
        match self {
            Sink::Raw(dst) => dst,
            Sink::Compressed(compressor) => compressor.get_mut(),
        }
    }

    fn into_inner(self) -> W {
        match self {
            Sink::Raw(dst) => dst,
            Sink::Compressed(compressor) => compressor.into_inner(),
        }
    }
}

/// Writes point records in the layout the [`PointReader`](super::PointReader) reads.
///
/// # Fixed-Size chunks
///
/// - Use [`write_raw`] and/or [`write_point`], a new chunk is started every `chunk_size` points.
/// - Use [`done`] when all the points are written.
///
/// # Variable-Size chunks
///
/// - Use [`write_raw`] and/or [`write_point`].
/// - Use [`finish_current_chunk`] to end a chunk.
/// - Use [`done`] when all the points are written.
///
/// [`write_raw`]: Self::write_raw
/// [`write_point`]: Self::write_point
/// [`finish_current_chunk`]: Self::finish_current_chunk
/// [`done`]: Self::done
pub struct PointWriter<W: Write + Seek> {
    vlr: LazVlr,
    sink: Sink<W>,
    record_size: usize,
    /// Scratch buffer `write_point` packs into
    record: Vec<u8>,
    /// Position of the offset to the chunk table
    start_pos: u64,
    /// Position where the current chunk started
    chunk_start_pos: u64,
    /// Entry for the chunk we are currently compressing
    current_chunk_entry: ChunkTableEntry,
    chunk_table: ChunkTable,
}

impl<W: Write + Seek> PointWriter<W> {
    /// Starts writing at the current position of `dst`.
    pub fn new(mut dst: W, vlr: LazVlr) -> crate::Result<Self> {
        let start_pos = dst.seek(SeekFrom::Current(0))?;
        let sink = match vlr.compressor() {
            CompressorType::None => Sink::Raw(dst),
            CompressorType::PointWise => {
                Sink::Compressed(PointRecordCompressor::new(dst, vlr.items())?)
            }
            CompressorType::PointWiseChunked => {
                let compressor = PointRecordCompressor::new(dst, vlr.items())?;
                let mut sink = Sink::Compressed(compressor);
                // until the table is written, the offset points to itself
                sink.stream().write_i64::<LittleEndian>(start_pos as i64)?;
                sink
            }
            CompressorType::LayeredChunked => {
                return Err(LazError::UnsupportedCompressorType(vlr.compressor()));
            }
        };
        let chunk_start_pos = match vlr.compressor() {
            CompressorType::PointWiseChunked => start_pos + ChunkTable::OFFSET_SIZE,
            _ => start_pos,
        };
        let record_size = vlr.items_size() as usize;
        Ok(Self {
            record_size,
            record: vec![0u8; record_size],
            vlr,
            sink,
            start_pos,
            chunk_start_pos,
            current_chunk_entry: ChunkTableEntry::default(),
            chunk_table: ChunkTable::default(),
        })
    }

    pub fn vlr(&self) -> &LazVlr {
        &self.vlr
    }

    /// Writes one record, the bytes of its items one after the other.
    pub fn write_raw(&mut self, record: &[u8]) -> crate::Result<()> {
        let record_size = self.record_size;
        if record.len() != record_size {
            return Err(LazError::BufferLenNotMultipleOfPointSize {
                buffer_len: record.len(),
                point_size: record_size,
            });
        }
        if self.vlr.compressor() == CompressorType::PointWiseChunked
            && self.current_chunk_entry.point_count == u64::from(self.vlr.chunk_size())
        {
            self.finish_chunk()?;
        }
        match &mut self.sink {
            Sink::Raw(dst) => dst.write_all(record)?,
            Sink::Compressed(compressor) => compressor.compress_next(record)?,
        }
        self.current_chunk_entry.point_count += 1;
        Ok(())
    }

    /// Writes many records, `records.len()` must be a multiple of the record size.
    pub fn write_many(&mut self, records: &[u8]) -> crate::Result<()> {
        let record_size = self.record_size;
        if record_size == 0 || records.len() % record_size != 0 {
            return Err(LazError::BufferLenNotMultipleOfPointSize {
                buffer_len: records.len(),
                point_size: record_size,
            });
        }
        for record in records.chunks_exact(record_size) {
            self.write_raw(record)?;
        }
        Ok(())
    }

    pub fn write_point(&mut self, point: &LasPoint) -> crate::Result<()> {
        let mut record = std::mem::take(&mut self.record);
        point.pack_into_items(self.vlr.items(), &mut record);
        let result = self.write_raw(&record);
        self.record = record;
        result
    }

    /// Ends the current chunk, the next points go in a new one.
    ///
    /// # Important
    ///
    /// Only call this when writing **variable-size** chunks.
    pub fn finish_current_chunk(&mut self) -> crate::Result<()> {
        if !self.vlr.uses_variably_sized_chunks() {
            return Err(LazError::InvalidState {
                operation: "finish_current_chunk",
                state: "fixed-size chunks",
            });
        }
        self.finish_chunk()
    }

    fn finish_chunk(&mut self) -> crate::Result<()> {
        if self.current_chunk_entry.point_count == 0 {
            return Ok(());
        }
        if let Sink::Compressed(compressor) = &mut self.sink {
            compressor.done()?;
            let position = compressor.get_mut().seek(SeekFrom::Current(0))?;
            self.current_chunk_entry.byte_count = position - self.chunk_start_pos;
            self.chunk_start_pos = position;
            compressor.reset();
        }
        self.chunk_table.push(self.current_chunk_entry);
        self.current_chunk_entry = ChunkTableEntry::default();
        Ok(())
    }

    /// Flushes the last chunk, writes the chunk table and gives back the destination.
    pub fn done(mut self) -> crate::Result<W> {
        match self.vlr.compressor() {
            CompressorType::PointWiseChunked => {
                self.finish_chunk()?;
                let stream = self.sink.stream();
                chunk_table::update_chunk_table_offset(stream, SeekFrom::Start(self.start_pos))?;
                self.chunk_table
                    .write_to(stream, self.vlr.uses_variably_sized_chunks())?;
            }
            CompressorType::PointWise => {
                if let Sink::Compressed(compressor) = &mut self.sink {
                    compressor.done()?;
                }
            }
            _ => {}
        }
        let mut dst = self.sink.into_inner();
        dst.flush()?;
        Ok(dst)
    }

    /// The chunks written so far.
    pub fn chunk_table(&self) -> &ChunkTable {
        &self.chunk_table
    }
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use super::*;
    use crate::laszip::{LazItemRecordBuilder, LazItemType, LazVlrBuilder, PointReader};

    fn point10_gps_vlr(chunk_size: u32) -> LazVlr {
        LazVlrBuilder::new()
            .with_laz_items(
                LazItemRecordBuilder::new()
                    .add_item(LazItemType::Point10)
                    .add_item(LazItemType::GpsTime)
                    .build(),
            )
            .with_chunk_size(chunk_size)
            .build()
    }

    fn make_point(i: i32) -> LasPoint {
        LasPoint {
            x: i * 17,
            y: -i * 3,
            z: 1000 + i % 11,
            intensity: (i * 40) as u16,
            return_number: 1,
            number_of_returns: 2,
            classification: (i % 8) as u8,
            gps_time: 100.5 + f64::from(i) * 0.25,
            ..LasPoint::default()
        }
    }

    #[test]
    fn test_write_point_then_read_back() {
        let vlr = point10_gps_vlr(10);
        let mut writer = PointWriter::new(Cursor::new(Vec::<u8>::new()), vlr.clone()).unwrap();
        for i in 0..25 {
            writer.write_point(&make_point(i)).unwrap();
        }
        assert_eq!(writer.chunk_table().len(), 2);
        let data = writer.done().unwrap().into_inner();

        let mut reader = PointReader::new();
        reader.setup(&vlr).unwrap();
        reader.init(Cursor::new(data)).unwrap();
        let mut point = LasPoint::default();
        for i in 0..25 {
            reader.read_point(&mut point).unwrap();
            assert_eq!(point, make_point(i));
        }
    }

    #[test]
    fn test_write_many_then_read_raw() {
        let vlr = point10_gps_vlr(4);
        let record_size = vlr.items_size() as usize;
        let mut records = vec![0u8; record_size * 9];
        for (i, record) in records.chunks_exact_mut(record_size).enumerate() {
            make_point(i as i32).pack_into_items(vlr.items(), record);
        }

        let mut writer = PointWriter::new(Cursor::new(Vec::<u8>::new()), vlr.clone()).unwrap();
        writer.write_many(&records[..record_size * 5]).unwrap();
        writer.write_raw(&records[record_size * 5..record_size * 6]).unwrap();
        writer.write_many(&records[record_size * 6..]).unwrap();
        let data = writer.done().unwrap().into_inner();

        let mut reader = PointReader::new();
        reader.setup(&vlr).unwrap();
        reader.init(Cursor::new(data)).unwrap();
        let mut record = vec![0u8; record_size];
        for expected in records.chunks_exact(record_size) {
            reader.read_raw(&mut record).unwrap();
            assert_eq!(record.as_slice(), expected);
        }
    }

    #[test]
    fn test_wrong_record_length_is_rejected() {
        let vlr = point10_gps_vlr(4);
        let mut writer = PointWriter::new(Cursor::new(Vec::<u8>::new()), vlr).unwrap();
        match writer.write_raw(&[0u8; 27]) {
            Err(LazError::BufferLenNotMultipleOfPointSize {
                buffer_len: 27,
                point_size: 28,
            }) => {}
            other => panic!("unexpected {:?}", other),
        }
        match writer.write_many(&[0u8; 30]) {
            Err(LazError::BufferLenNotMultipleOfPointSize {
                buffer_len: 30,
                point_size: 28,
            }) => {}
            other => panic!("unexpected {:?}", other),
        }
        // a point still packs into a full record after the failures
        writer.write_point(&make_point(3)).unwrap();
        writer.write_point(&make_point(4)).unwrap();
    }
}
