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


//! The chunked point reader.
//!
//! Compressed point data is laid out as follow:
//!
//! 1) offset to the chunk table (i64), only when chunks are used
//! 2) the chunks, each made of a raw point followed by arithmetic coded points
//! 3) the chunk table

use std::fmt;
use std::io::{Read, Seek, SeekFrom};

use byteorder::{LittleEndian, ReadBytesExt};
use log::Level;

use crate::diagnostics::{diag, Diagnostics};
use crate::errors::LazError;
use crate::las::point::LasPoint;
use crate::laszip::chunk_table::ChunkTable;
use crate::laszip::{CompressorType, LazItem, LazVlr};
use crate::record::{ItemDecompressor, PointRecordDecompressor};

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum ReaderState {
    Uninitialized,
    Configured,
    Streaming,
    Seeking,
    Done,
}

impl ReaderState {
    fn name(self) -> &'static str {
        match self {
            ReaderState::Uninitialized => "uninitialized",
            ReaderState::Configured => "configured",
            ReaderState::Streaming => "streaming",
            ReaderState::Seeking => "seeking",
            ReaderState::Done => "done",
        }
    }
}

impl fmt::Display for ReaderState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

enum Source<R: Read> {
    Raw(R),
    Compressed(PointRecordDecompressor<R>),
}

impl<R: Read + Seek> Source<R> {
    fn stream(&mut self) -> &mut R {
        match self {
            Source::Raw(src) => src,
            Source::Compressed(decompressor) => decompressor.get_mut(),
        }
    }

    fn into_inner(self) -> R {
        match self {
            Source::Raw(src) => src,
            Source::Compressed(decompressor) => decompressor.into_inner(),
        }
    }
}

/// Where the chunk table is, relative to the chunks.
enum TableLocation {
    At(u64),
    Interrupted,
}

/// Reads point records, raw or compressed, from a seekable byte stream.
///
/// The reader goes through the states
/// `uninitialized -> configured (setup) -> streaming (init) -> done (done)`.
///
/// Failed reads do not panic: the error is returned and its message is kept,
/// see [`last_error`](Self::last_error).
pub struct PointReader<R: Read + Seek> {
    state: ReaderState,
    diagnostics: Diagnostics,

    items: Vec<LazItem>,
    compressor: CompressorType,
    record_size: usize,
    fields: Option<Vec<ItemDecompressor>>,
    source: Option<Source<R>>,
    record: Vec<u8>,

    /// Position of the first point, or of the first chunk.
    point_start: u64,
    table_offset: i64,
    table_read: bool,
    variable_chunks: bool,
    chunk_size: u32,
    chunk_count: u32,
    at_chunk_start: bool,
    current_chunk: u32,
    tabled_chunks: u32,
    chunk_starts: Vec<u64>,
    chunk_totals: Vec<u64>,
    chunk_table: Option<ChunkTable>,

    last_error: Option<String>,
    last_warning: Option<String>,
}

impl<R: Read + Seek> Default for PointReader<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Read + Seek> PointReader<R> {
    pub fn new() -> Self {
        Self {
            state: ReaderState::Uninitialized,
            diagnostics: Diagnostics::default(),
            items: vec![],
            compressor: CompressorType::None,
            record_size: 0,
            fields: None,
            source: None,
            record: vec![],
            point_start: 0,
            table_offset: 0,
            table_read: false,
            variable_chunks: false,
            chunk_size: u32::MAX,
            chunk_count: 0,
            at_chunk_start: true,
            current_chunk: 0,
            tabled_chunks: 0,
            chunk_starts: vec![],
            chunk_totals: vec![],
            chunk_table: None,
            last_error: None,
            last_warning: None,
        }
    }

    pub fn with_diagnostics(mut self, diagnostics: Diagnostics) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    /// Selects the codecs from the record description.
    ///
    /// A vlr with [`CompressorType::None`] describes raw records.
    pub fn setup(&mut self, vlr: &LazVlr) -> crate::Result<()> {
        self.expect_state("setup", ReaderState::Uninitialized)?;
        let fields = match vlr.compressor() {
            CompressorType::None => None,
            CompressorType::PointWise | CompressorType::PointWiseChunked => {
                let fields = vlr
                    .items()
                    .iter()
                    .map(ItemDecompressor::from_laz_item)
                    .collect::<crate::Result<Vec<_>>>();
                Some(fields.map_err(|e| self.keep_error(e))?)
            }
            CompressorType::LayeredChunked => {
                return Err(
                    self.keep_error(LazError::UnsupportedCompressorType(vlr.compressor()))
                );
            }
        };

        self.items = vlr.items().to_vec();
        self.compressor = vlr.compressor();
        self.record_size = vlr.items_size() as usize;
        self.record = vec![0u8; self.record_size];
        self.fields = fields;
        if self.compressor == CompressorType::PointWiseChunked {
            self.chunk_size = vlr.chunk_size();
            self.variable_chunks = vlr.uses_variably_sized_chunks();
        } else {
            self.chunk_size = u32::MAX;
            self.variable_chunks = false;
        }
        self.state = ReaderState::Configured;
        Ok(())
    }

    /// Binds the reader to the stream, positioned at the start of the point data.
    pub fn init(&mut self, mut stream: R) -> crate::Result<()> {
        self.expect_state("init", ReaderState::Configured)?;
        if self.compressor == CompressorType::PointWiseChunked {
            self.table_offset = stream
                .read_i64::<LittleEndian>()
                .map_err(|e| self.keep_error(e.into()))?;
        }
        self.point_start = stream
            .seek(SeekFrom::Current(0))
            .map_err(|e| self.keep_error(e.into()))?;
        self.source = Some(match self.fields.take() {
            Some(fields) => Source::Compressed(PointRecordDecompressor::from_fields(stream, fields)),
            None => Source::Raw(stream),
        });
        self.table_read = self.compressor != CompressorType::PointWiseChunked;
        self.restart_chunks();
        self.state = ReaderState::Streaming;
        Ok(())
    }

    /// Reads the bytes of the next point record into `out`.
    pub fn read_raw(&mut self, out: &mut [u8]) -> crate::Result<()> {
        self.expect_state("read", ReaderState::Streaming)?;
        let result = self.read_record(out);
        result.map_err(|e| self.keep_error(e))
    }

    /// Reads the next point record and unpacks it into `point`.
    pub fn read_point(&mut self, point: &mut LasPoint) -> crate::Result<()> {
        let mut record = std::mem::take(&mut self.record);
        let result = self.read_raw(&mut record);
        if result.is_ok() {
            point.unpack_from_items(&self.items, &record);
        }
        self.record = record;
        result
    }

    /// Moves from point index `current` (the next point that would be read)
    /// to point index `target`.
    pub fn seek(&mut self, current: u64, target: u64) -> crate::Result<()> {
        self.expect_state("seek", ReaderState::Streaming)?;
        self.state = ReaderState::Seeking;
        let result = self.seek_to(current, target);
        self.state = ReaderState::Streaming;
        result.map_err(|e| self.keep_error(e))
    }

    /// Stops the reading and gives back the stream.
    ///
    /// Returns `None` when the reader was not streaming.
    pub fn done(&mut self) -> Option<R> {
        if self.state != ReaderState::Streaming {
            return None;
        }
        self.state = ReaderState::Done;
        self.source.take().map(Source::into_inner)
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn last_warning(&self) -> Option<&str> {
        self.last_warning.as_deref()
    }

    pub fn current_chunk(&self) -> u32 {
        self.current_chunk
    }

    /// The chunk table, once it has been read from the stream.
    pub fn chunk_table(&self) -> Option<&ChunkTable> {
        self.chunk_table.as_ref()
    }

    /// Number of chunks whose start position is known.
    pub fn tabled_chunks(&self) -> u32 {
        self.tabled_chunks
    }

    pub fn record_size(&self) -> usize {
        self.record_size
    }

    pub fn items(&self) -> &[LazItem] {
        &self.items
    }

    fn expect_state(&mut self, operation: &'static str, expected: ReaderState) -> crate::Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            let state = self.state.name();
            Err(self.keep_error(LazError::InvalidState { operation, state }))
        }
    }

    fn keep_error(&mut self, error: LazError) -> LazError {
        self.last_error = Some(error.to_string());
        error
    }

    fn warn(&mut self, message: String) {
        diag!(self.diagnostics, Level::Warn, "{}", message);
        self.last_warning = Some(message);
    }

    fn restart_chunks(&mut self) {
        self.current_chunk = 0;
        self.chunk_count = 0;
        self.at_chunk_start = true;
        if self.variable_chunks && self.chunk_totals.len() > 1 {
            self.chunk_size = (self.chunk_totals[1] - self.chunk_totals[0]) as u32;
        }
    }

    fn source_mut(&mut self) -> crate::Result<&mut Source<R>> {
        let state = self.state.name();
        self.source.as_mut().ok_or(LazError::InvalidState {
            operation: "read",
            state,
        })
    }

    fn stream_position(&mut self) -> crate::Result<u64> {
        Ok(self.source_mut()?.stream().seek(SeekFrom::Current(0))?)
    }

    fn read_record(&mut self, out: &mut [u8]) -> crate::Result<()> {
        let record_size = self.record_size;
        if out.len() < record_size {
            return Err(LazError::BufferLenNotMultipleOfPointSize {
                buffer_len: out.len(),
                point_size: record_size,
            });
        }
        let out = &mut out[..record_size];
        if let Source::Raw(src) = self.source_mut()? {
            return Ok(src.read_exact(out)?);
        }

        self.ensure_chunk_table()?;
        if !self.at_chunk_start && self.chunk_count == self.chunk_size {
            self.current_chunk += 1;
            if self.current_chunk < self.tabled_chunks {
                let here = self.stream_position()?;
                if self.chunk_starts[self.current_chunk as usize] != here {
                    // the previous chunk did not end where the table says
                    self.current_chunk -= 1;
                    return Err(self.corrupt_chunk());
                }
            }
            self.at_chunk_start = true;
        }
        if self.at_chunk_start {
            self.start_chunk()?;
        }

        self.chunk_count += 1;
        let result = match self.source_mut()? {
            Source::Compressed(decompressor) => decompressor.decompress_next(out),
            Source::Raw(_) => Ok(()),
        };
        match result {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                Err(LazError::EndOfData {
                    chunk: self.current_chunk,
                })
            }
            Err(e) if e.kind() == std::io::ErrorKind::InvalidData => Err(self.corrupt_chunk()),
            Err(e) => Err(e.into()),
        }
    }

    fn start_chunk(&mut self) -> crate::Result<()> {
        let chunked = self.compressor == CompressorType::PointWiseChunked;
        if chunked && self.current_chunk == self.tabled_chunks {
            // no or incomplete chunk table, the chunk starts are learned while reading
            let here = self.stream_position()?;
            self.chunk_starts.push(here);
            self.tabled_chunks += 1;
        } else if self.variable_chunks {
            let chunk = self.current_chunk as usize;
            if let (Some(first), Some(next)) =
                (self.chunk_totals.get(chunk), self.chunk_totals.get(chunk + 1))
            {
                self.chunk_size = (next - first) as u32;
            }
        }
        if let Source::Compressed(decompressor) = self.source_mut()? {
            decompressor.reset();
        }
        self.chunk_count = 0;
        self.at_chunk_start = false;
        Ok(())
    }

    /// Builds the corruption error, and if the start of the next chunk is known,
    /// moves there so that the next read resumes with it.
    fn corrupt_chunk(&mut self) -> LazError {
        let error = LazError::CorruptChunk {
            chunk: self.current_chunk,
            tabled_chunks: self.tabled_chunks,
        };
        diag!(self.diagnostics, Level::Error, "{}", error);
        let next_chunk = self.current_chunk + 1;
        if next_chunk < self.tabled_chunks {
            let next_start = self.chunk_starts[next_chunk as usize];
            if let Some(source) = self.source.as_mut() {
                if source.stream().seek(SeekFrom::Start(next_start)).is_ok() {
                    self.current_chunk = next_chunk;
                    self.at_chunk_start = true;
                }
            }
        }
        error
    }

    fn ensure_chunk_table(&mut self) -> crate::Result<()> {
        if self.table_read {
            return Ok(());
        }
        match self.read_chunk_table() {
            Ok(()) => {
                self.table_read = true;
                Ok(())
            }
            Err(error) if self.variable_chunks => {
                diag!(self.diagnostics, Level::Error, "{}", error);
                Err(match error {
                    LazError::IoError(_) => LazError::MissingChunkTable,
                    other => other,
                })
            }
            Err(error) => {
                self.table_read = true;
                self.warn(format!(
                    "chunk table unusable ({}), points are read sequentially",
                    error
                ));
                self.chunk_table = None;
                self.chunk_starts.clear();
                self.chunk_totals.clear();
                self.tabled_chunks = 0;
                let point_start = self.point_start;
                if self.stream_position()? != point_start {
                    self.source_mut()?
                        .stream()
                        .seek(SeekFrom::Start(point_start))?;
                }
                Ok(())
            }
        }
    }

    fn locate_chunk_table(&mut self) -> crate::Result<TableLocation> {
        let chunks_start = self.point_start as i64;
        let table_offset = self.table_offset;
        if table_offset + ChunkTable::OFFSET_SIZE as i64 == chunks_start {
            return Ok(TableLocation::Interrupted);
        }
        let stream = self.source_mut()?.stream();
        let offset = if table_offset == -1 {
            stream.seek(SeekFrom::End(-(ChunkTable::OFFSET_SIZE as i64)))?;
            stream.read_i64::<LittleEndian>()?
        } else {
            table_offset
        };
        if offset < chunks_start {
            return Err(LazError::MissingChunkTable);
        }
        Ok(TableLocation::At(offset as u64))
    }

    fn read_chunk_table(&mut self) -> crate::Result<()> {
        let offset = match self.locate_chunk_table()? {
            TableLocation::At(offset) => offset,
            TableLocation::Interrupted => {
                if self.variable_chunks {
                    return Err(LazError::MissingChunkTable);
                }
                self.warn("chunk table missing, the writer was interrupted".to_string());
                return Ok(());
            }
        };

        let (variable_chunks, chunk_size, point_start) =
            (self.variable_chunks, self.chunk_size, self.point_start);
        let stream = self.source_mut()?.stream();
        stream.seek(SeekFrom::Start(offset))?;
        let table = ChunkTable::read_from(stream, variable_chunks, chunk_size)?;
        stream.seek(SeekFrom::Start(point_start))?;

        let chunk_starts = table.chunk_starts(point_start)?;
        if variable_chunks && table.into_iter().any(|entry| entry.point_count == 0) {
            return Err(LazError::CorruptChunkTable);
        }
        if chunk_starts.last().copied() != Some(offset) {
            self.warn(format!(
                "chunk table ends its chunks at {} but is located at {}",
                chunk_starts.last().copied().unwrap_or(point_start),
                offset
            ));
        }
        diag!(
            self.diagnostics,
            Level::Debug,
            "chunk table with {} chunks read at {}",
            table.len(),
            offset
        );
        self.tabled_chunks = table.len() as u32;
        self.chunk_starts = chunk_starts;
        if variable_chunks {
            self.chunk_totals = table.chunk_totals();
            self.restart_chunks();
        }
        self.chunk_table = Some(table);
        Ok(())
    }

    /// Index of the first point of a chunk, only meaningful for known chunks.
    fn first_point_of(&self, chunk: u32) -> u64 {
        if self.variable_chunks {
            // chunks learned past the table start after the last tabled one
            let last = self.chunk_totals.len().saturating_sub(1);
            self.chunk_totals
                .get((chunk as usize).min(last))
                .copied()
                .unwrap_or(0)
        } else {
            u64::from(chunk) * u64::from(self.chunk_size)
        }
    }

    fn target_chunk(&self, target: u64) -> u32 {
        if self.variable_chunks {
            // largest chunk whose first point is <= target
            let tabled =
                (self.tabled_chunks as usize).min(self.chunk_totals.len().saturating_sub(1));
            let totals = &self.chunk_totals[..tabled];
            match totals.binary_search(&target) {
                Ok(i) => i as u32,
                Err(i) => i.saturating_sub(1) as u32,
            }
        } else {
            (target / u64::from(self.chunk_size)).min(u64::from(u32::MAX)) as u32
        }
    }

    fn seek_to(&mut self, current: u64, target: u64) -> crate::Result<()> {
        if let Some(Source::Raw(src)) = self.source.as_mut() {
            let position = self.point_start + self.record_size as u64 * target;
            src.seek(SeekFrom::Start(position))?;
            return Ok(());
        }

        self.ensure_chunk_table()?;
        let mut record = std::mem::take(&mut self.record);
        let result = self.seek_compressed(current, target, &mut record);
        self.record = record;
        result
    }

    fn seek_compressed(&mut self, current: u64, target: u64, record: &mut [u8]) -> crate::Result<()> {
        let delta = if self.compressor == CompressorType::PointWiseChunked && self.tabled_chunks > 0
        {
            let base_chunk = self.target_chunk(target).min(self.tabled_chunks - 1);
            let same_chunk = base_chunk == self.current_chunk
                && (self.at_chunk_start || self.chunk_count < self.chunk_size);
            if same_chunk && current <= target {
                target - current
            } else {
                self.move_to_chunk(base_chunk)?;
                target.saturating_sub(self.first_point_of(base_chunk))
            }
        } else if current > target {
            let point_start = self.point_start;
            self.source_mut()?
                .stream()
                .seek(SeekFrom::Start(point_start))?;
            self.restart_chunks();
            target
        } else {
            target - current
        };

        for _ in 0..delta {
            self.read_record(record)?;
        }
        Ok(())
    }

    fn move_to_chunk(&mut self, chunk: u32) -> crate::Result<()> {
        let start = self.chunk_starts[chunk as usize];
        self.source_mut()?.stream().seek(SeekFrom::Start(start))?;
        self.current_chunk = chunk;
        self.chunk_count = 0;
        self.at_chunk_start = true;
        Ok(())
    }
}
