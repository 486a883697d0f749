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


//! Point records: a sequence of field codecs driven by one arithmetic coder.
//!
//! A compressed chunk is organized as follow:
//!
//! 1) 1 raw point (every field written as-is)
//! 2) the arithmetic coded bytes of the remaining points of the chunk

use std::io::{Read, Write};

use crate::decoders::ArithmeticDecoder;
use crate::encoders::ArithmeticEncoder;
use crate::errors::LazError;
use crate::las::{extra_bytes, gps, nir, point10, rgb};
use crate::laszip::{LazItem, LazItemType};

/***************************************************************************************************
                    Decompression Related Traits
***************************************************************************************************/

pub trait FieldDecompressor<R: Read> {
    fn size_of_field(&self) -> usize;

    /// Reads the raw first point of a chunk, it becomes the reference for the next ones.
    fn decompress_first(&mut self, src: &mut R, first_point: &mut [u8]) -> std::io::Result<()>;

    fn decompress_with(
        &mut self,
        decoder: &mut ArithmeticDecoder<R>,
        buf: &mut [u8],
    ) -> std::io::Result<()>;

    /// Puts the models and the context back in their initial state (start of chunk).
    fn reset(&mut self);
}

/***************************************************************************************************
                    Compression related Traits
***************************************************************************************************/

pub trait FieldCompressor<W: Write> {
    fn size_of_field(&self) -> usize;

    fn compress_first(&mut self, dst: &mut W, buf: &[u8]) -> std::io::Result<()>;

    fn compress_with(
        &mut self,
        encoder: &mut ArithmeticEncoder<W>,
        buf: &[u8],
    ) -> std::io::Result<()>;

    fn reset(&mut self);
}

fn unsupported(item: &LazItem) -> LazError {
    LazError::UnsupportedLazItemVersion(item.item_type, item.version)
}

/// The field decompressors this crate knows.
pub enum ItemDecompressor {
    Point10(point10::v2::Point10Decompressor),
    GpsTime(gps::v2::GpsTimeDecompressor),
    Rgb(rgb::v2::LasRGBDecompressor),
    RgbNir(nir::v2::LasRGBNirDecompressor),
    ExtraBytes(extra_bytes::v2::LasExtraByteDecompressor),
}

impl ItemDecompressor {
    /// Selects the decompressor of a point-wise compressed item.
    ///
    /// Only version 2 of the items is supported, extended point and
    /// waveform items have no point-wise codec.
    pub fn from_laz_item(item: &LazItem) -> crate::Result<Self> {
        if item.version != 2 {
            return Err(unsupported(item));
        }
        match item.item_type {
            LazItemType::Byte(_) | LazItemType::Byte14(_) => Ok(ItemDecompressor::ExtraBytes(
                extra_bytes::v2::LasExtraByteDecompressor::new(usize::from(item.size)),
            )),
            LazItemType::Point10 => Ok(ItemDecompressor::Point10(Default::default())),
            LazItemType::GpsTime => Ok(ItemDecompressor::GpsTime(Default::default())),
            LazItemType::RGB12 | LazItemType::RGB14 => {
                Ok(ItemDecompressor::Rgb(Default::default()))
            }
            LazItemType::RGBNIR14 => Ok(ItemDecompressor::RgbNir(Default::default())),
            LazItemType::Point14 | LazItemType::WavePacket13 | LazItemType::WavePacket14 => {
                Err(unsupported(item))
            }
        }
    }
}

macro_rules! dispatch {
    ($self:expr, $inner:ident => $body:expr) => {
        match $self {
            ItemDecompressor::Point10($inner) => $body,
            ItemDecompressor::GpsTime($inner) => $body,
            ItemDecompressor::Rgb($inner) => $body,
            ItemDecompressor::RgbNir($inner) => $body,
            ItemDecompressor::ExtraBytes($inner) => $body,
        }
    };
}

impl<R: Read> FieldDecompressor<R> for ItemDecompressor {
    fn size_of_field(&self) -> usize {
        dispatch!(self, d => FieldDecompressor::<R>::size_of_field(d))
    }

    fn decompress_first(&mut self, src: &mut R, first_point: &mut [u8]) -> std::io::Result<()> {
        dispatch!(self, d => d.decompress_first(src, first_point))
    }

    fn decompress_with(
        &mut self,
        decoder: &mut ArithmeticDecoder<R>,
        buf: &mut [u8],
    ) -> std::io::Result<()> {
        dispatch!(self, d => d.decompress_with(decoder, buf))
    }

    fn reset(&mut self) {
        dispatch!(self, d => FieldDecompressor::<R>::reset(d))
    }
}

/// The field compressors this crate knows.
pub enum ItemCompressor {
    Point10(point10::v2::Point10Compressor),
    GpsTime(gps::v2::GpsTimeCompressor),
    Rgb(rgb::v2::LasRGBCompressor),
    RgbNir(nir::v2::LasRGBNirCompressor),
    ExtraBytes(extra_bytes::v2::LasExtraByteCompressor),
}

impl ItemCompressor {
    pub fn from_laz_item(item: &LazItem) -> crate::Result<Self> {
        if item.version != 2 {
            return Err(unsupported(item));
        }
        match item.item_type {
            LazItemType::Byte(_) | LazItemType::Byte14(_) => Ok(ItemCompressor::ExtraBytes(
                extra_bytes::v2::LasExtraByteCompressor::new(usize::from(item.size)),
            )),
            LazItemType::Point10 => Ok(ItemCompressor::Point10(Default::default())),
            LazItemType::GpsTime => Ok(ItemCompressor::GpsTime(Default::default())),
            LazItemType::RGB12 | LazItemType::RGB14 => Ok(ItemCompressor::Rgb(Default::default())),
            LazItemType::RGBNIR14 => Ok(ItemCompressor::RgbNir(Default::default())),
            LazItemType::Point14 | LazItemType::WavePacket13 | LazItemType::WavePacket14 => {
                Err(unsupported(item))
            }
        }
    }
}

macro_rules! dispatch_mut {
    ($self:expr, $inner:ident => $body:expr) => {
        match $self {
            ItemCompressor::Point10($inner) => $body,
            ItemCompressor::GpsTime($inner) => $body,
            ItemCompressor::Rgb($inner) => $body,
            ItemCompressor::RgbNir($inner) => $body,
            ItemCompressor::ExtraBytes($inner) => $body,
        }
    };
}

impl<W: Write> FieldCompressor<W> for ItemCompressor {
    fn size_of_field(&self) -> usize {
        dispatch_mut!(self, c => FieldCompressor::<W>::size_of_field(c))
    }

    fn compress_first(&mut self, dst: &mut W, buf: &[u8]) -> std::io::Result<()> {
        dispatch_mut!(self, c => c.compress_first(dst, buf))
    }

    fn compress_with(
        &mut self,
        encoder: &mut ArithmeticEncoder<W>,
        buf: &[u8],
    ) -> std::io::Result<()> {
        dispatch_mut!(self, c => c.compress_with(encoder, buf))
    }

    fn reset(&mut self) {
        dispatch_mut!(self, c => FieldCompressor::<W>::reset(c))
    }
}

/***************************************************************************************************
                    Record Decompressor
***************************************************************************************************/

/// Decompresses whole point records, field after field.
pub struct PointRecordDecompressor<R: Read> {
    field_decompressors: Vec<ItemDecompressor>,
    decoder: ArithmeticDecoder<R>,
    is_first_decompression: bool,
    record_size: usize,
}

impl<R: Read> PointRecordDecompressor<R> {
    pub fn new(input: R, laz_items: &[LazItem]) -> crate::Result<Self> {
        let field_decompressors = laz_items
            .iter()
            .map(ItemDecompressor::from_laz_item)
            .collect::<crate::Result<Vec<_>>>()?;
        Ok(Self::from_fields(input, field_decompressors))
    }

    pub fn from_fields(input: R, field_decompressors: Vec<ItemDecompressor>) -> Self {
        let record_size = field_decompressors
            .iter()
            .map(|field| FieldDecompressor::<R>::size_of_field(field))
            .sum();
        Self {
            field_decompressors,
            decoder: ArithmeticDecoder::new(input),
            is_first_decompression: true,
            record_size,
        }
    }

    pub fn record_size(&self) -> usize {
        self.record_size
    }

    pub fn decompress_next(&mut self, out: &mut [u8]) -> std::io::Result<()> {
        let mut field_start = 0;
        if self.is_first_decompression {
            for field in &mut self.field_decompressors {
                let field_end = field_start + FieldDecompressor::<R>::size_of_field(field);
                field.decompress_first(self.decoder.get_mut(), &mut out[field_start..field_end])?;
                field_start = field_end;
            }
            self.is_first_decompression = false;
            // the decoder is primed only once the raw point is read
            self.decoder.read_init_bytes()?;
        } else {
            for field in &mut self.field_decompressors {
                let field_end = field_start + FieldDecompressor::<R>::size_of_field(field);
                field.decompress_with(&mut self.decoder, &mut out[field_start..field_end])?;
                field_start = field_end;
            }
        }
        Ok(())
    }

    /// Decompresses as many records as `out` can hold.
    pub fn decompress_many(&mut self, out: &mut [u8]) -> std::io::Result<()> {
        let record_size = self.record_size;
        if record_size == 0 {
            return Ok(());
        }
        for record in out.chunks_exact_mut(record_size) {
            self.decompress_next(record)?;
        }
        Ok(())
    }

    /// Prepares for the start of a new chunk.
    pub fn reset(&mut self) {
        self.decoder.reset();
        self.is_first_decompression = true;
        for field in &mut self.field_decompressors {
            FieldDecompressor::<R>::reset(field);
        }
    }

    pub fn get_ref(&self) -> &R {
        self.decoder.get_ref()
    }

    pub fn get_mut(&mut self) -> &mut R {
        self.decoder.get_mut()
    }

    pub fn into_inner(self) -> R {
        self.decoder.into_inner()
    }
}

/***************************************************************************************************
                    Record Compressor
***************************************************************************************************/

pub struct PointRecordCompressor<W: Write> {
    field_compressors: Vec<ItemCompressor>,
    encoder: ArithmeticEncoder<W>,
    is_first_compression: bool,
    record_size: usize,
}

impl<W: Write> PointRecordCompressor<W> {
    pub fn new(output: W, laz_items: &[LazItem]) -> crate::Result<Self> {
        let field_compressors = laz_items
            .iter()
            .map(ItemCompressor::from_laz_item)
            .collect::<crate::Result<Vec<_>>>()?;
        let record_size = field_compressors
            .iter()
            .map(|field| FieldCompressor::<W>::size_of_field(field))
            .sum();
        Ok(Self {
            field_compressors,
            encoder: ArithmeticEncoder::new(output),
            is_first_compression: true,
            record_size,
        })
    }

    pub fn record_size(&self) -> usize {
        self.record_size
    }

    pub fn compress_next(&mut self, input: &[u8]) -> std::io::Result<()> {
        let mut field_start = 0;
        if self.is_first_compression {
            for field in &mut self.field_compressors {
                let field_end = field_start + FieldCompressor::<W>::size_of_field(field);
                field.compress_first(self.encoder.get_mut(), &input[field_start..field_end])?;
                field_start = field_end;
            }
            self.is_first_compression = false;
        } else {
            for field in &mut self.field_compressors {
                let field_end = field_start + FieldCompressor::<W>::size_of_field(field);
                field.compress_with(&mut self.encoder, &input[field_start..field_end])?;
                field_start = field_end;
            }
        }
        Ok(())
    }

    /// Flushes the arithmetic coded bytes of the current chunk.
    pub fn done(&mut self) -> std::io::Result<()> {
        if !self.is_first_compression {
            self.encoder.done()?;
        }
        Ok(())
    }

    pub fn reset(&mut self) {
        self.encoder.reset();
        self.is_first_compression = true;
        for field in &mut self.field_compressors {
            FieldCompressor::<W>::reset(field);
        }
    }

    pub fn get_ref(&self) -> &W {
        self.encoder.get_ref()
    }

    pub fn get_mut(&mut self) -> &mut W {
        self.encoder.get_mut()
    }

    pub fn into_inner(self) -> W {
        self.encoder.into_inner()
    }
}
