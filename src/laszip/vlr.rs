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

//! The LasZip VLR: the description of how point records are laid out and compressed.

use crate::errors::LazError;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

pub const DEFAULT_CHUNK_SIZE: u32 = 50_000;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
struct Version {
    major: u8,
    minor: u8,
    revision: u16,
}

impl Version {
    fn read_from<R: Read>(src: &mut R) -> std::io::Result<Self> {
        Ok(Self {
            major: src.read_u8()?,
            minor: src.read_u8()?,
            revision: src.read_u16::<LittleEndian>()?,
        })
    }

    fn write_to<W: Write>(&self, dst: &mut W) -> std::io::Result<()> {
        dst.write_u8(self.major)?;
        dst.write_u8(self.minor)?;
        dst.write_u16::<LittleEndian>(self.revision)
    }
}

/// The kinds of items a point record can be made of.
///
/// `Byte` and `Byte14` carry their number of bytes.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum LazItemType {
    Byte(u16),
    Point10,
    GpsTime,
    RGB12,
    WavePacket13,
    Point14,
    RGB14,
    RGBNIR14,
    WavePacket14,
    Byte14(u16),
}

impl LazItemType {
    pub fn size(&self) -> u16 {
        match self {
            LazItemType::Byte(size) => *size,
            LazItemType::Point10 => 20,
            LazItemType::GpsTime => 8,
            LazItemType::RGB12 => 6,
            LazItemType::WavePacket13 => 29,
            LazItemType::Point14 => 30,
            LazItemType::RGB14 => 6,
            LazItemType::RGBNIR14 => 8,
            LazItemType::WavePacket14 => 29,
            LazItemType::Byte14(size) => *size,
        }
    }

    fn from_code(code: u16, size: u16) -> Option<Self> {
        match code {
            0 => Some(LazItemType::Byte(size)),
            6 => Some(LazItemType::Point10),
            7 => Some(LazItemType::GpsTime),
            8 => Some(LazItemType::RGB12),
            9 => Some(LazItemType::WavePacket13),
            10 => Some(LazItemType::Point14),
            11 => Some(LazItemType::RGB14),
            12 => Some(LazItemType::RGBNIR14),
            13 => Some(LazItemType::WavePacket14),
            14 => Some(LazItemType::Byte14(size)),
            _ => None,
        }
    }
}

impl From<LazItemType> for u16 {
    fn from(t: LazItemType) -> Self {
        match t {
            LazItemType::Byte(_) => 0,
            LazItemType::Point10 => 6,
            LazItemType::GpsTime => 7,
            LazItemType::RGB12 => 8,
            LazItemType::WavePacket13 => 9,
            LazItemType::Point14 => 10,
            LazItemType::RGB14 => 11,
            LazItemType::RGBNIR14 => 12,
            LazItemType::WavePacket14 => 13,
            LazItemType::Byte14(_) => 14,
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct LazItem {
    pub(crate) item_type: LazItemType,
    pub(crate) size: u16,
    pub(crate) version: u16,
}

impl LazItem {
    pub fn new(item_type: LazItemType, version: u16) -> Self {
        Self {
            item_type,
            size: item_type.size(),
            version,
        }
    }

    pub fn item_type(&self) -> LazItemType {
        self.item_type
    }

    pub fn size(&self) -> u16 {
        self.size
    }

    pub fn version(&self) -> u16 {
        self.version
    }

    fn read_from<R: Read>(src: &mut R) -> crate::Result<Self> {
        let code = src.read_u16::<LittleEndian>()?;
        let size = src.read_u16::<LittleEndian>()?;
        let item_type =
            LazItemType::from_code(code, size).ok_or(LazError::UnknownLazItem(code))?;
        Ok(Self {
            item_type,
            size,
            version: src.read_u16::<LittleEndian>()?,
        })
    }

    fn write_to<W: Write>(&self, dst: &mut W) -> std::io::Result<()> {
        dst.write_u16::<LittleEndian>(self.item_type.into())?;
        dst.write_u16::<LittleEndian>(self.size)?;
        dst.write_u16::<LittleEndian>(self.version)
    }
}

/// Builds the list of items of a point record,
/// selecting the compression version this crate implements.
pub struct LazItemRecordBuilder {
    items: Vec<LazItemType>,
}

impl Default for LazItemRecordBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl LazItemRecordBuilder {
    pub fn new() -> Self {
        Self { items: vec![] }
    }

    pub fn add_item(&mut self, item_type: LazItemType) -> &mut Self {
        self.items.push(item_type);
        self
    }

    pub fn build(&self) -> Vec<LazItem> {
        self.items
            .iter()
            .map(|item_type| LazItem::new(*item_type, 2))
            .collect()
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum CompressorType {
    /// Points are not compressed
    None = 0,
    /// Points are compressed in one single chunk
    PointWise = 1,
    /// Points are compressed in chunks, each chunk can be decompressed independently
    PointWiseChunked = 2,
    /// Chunks where each field is stored in its own layer
    LayeredChunked = 3,
}

impl CompressorType {
    pub fn from_u16(t: u16) -> Option<Self> {
        match t {
            0 => Some(CompressorType::None),
            1 => Some(CompressorType::PointWise),
            2 => Some(CompressorType::PointWiseChunked),
            3 => Some(CompressorType::LayeredChunked),
            _ => None,
        }
    }
}

impl Default for CompressorType {
    fn default() -> Self {
        CompressorType::PointWiseChunked
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct LazVlr {
    pub(crate) compressor: CompressorType,
    coder: u16,

    version: Version,
    options: u32,
    pub(crate) chunk_size: u32,

    number_of_special_evlrs: i64,
    offset_to_special_evlrs: i64,

    items: Vec<LazItem>,
}

impl LazVlr {
    pub const USER_ID: &'static str = "laszip encoded";
    pub const RECORD_ID: u16 = 22204;
    pub const VARIABLE_CHUNK_SIZE: u32 = u32::MAX;

    pub fn from_laz_items(items: Vec<LazItem>) -> Self {
        Self {
            items,
            ..Default::default()
        }
    }

    pub fn from_buffer(record_data: &[u8]) -> crate::Result<Self> {
        let mut cursor = std::io::Cursor::new(record_data);
        Self::read_from(&mut cursor)
    }

    pub fn read_from<R: Read>(src: &mut R) -> crate::Result<Self> {
        let compressor_type = src.read_u16::<LittleEndian>()?;
        let compressor = CompressorType::from_u16(compressor_type)
            .ok_or(LazError::UnknownCompressorType(compressor_type))?;

        let coder = src.read_u16::<LittleEndian>()?;
        let version = Version::read_from(src)?;
        let options = src.read_u32::<LittleEndian>()?;
        let chunk_size = src.read_u32::<LittleEndian>()?;
        let number_of_special_evlrs = src.read_i64::<LittleEndian>()?;
        let offset_to_special_evlrs = src.read_i64::<LittleEndian>()?;
        let num_items = src.read_u16::<LittleEndian>()?;
        let items = (0..num_items)
            .map(|_| LazItem::read_from(src))
            .collect::<crate::Result<Vec<_>>>()?;

        Ok(Self {
            compressor,
            coder,
            version,
            options,
            chunk_size,
            number_of_special_evlrs,
            offset_to_special_evlrs,
            items,
        })
    }

    pub fn write_to<W: Write>(&self, dst: &mut W) -> std::io::Result<()> {
        dst.write_u16::<LittleEndian>(self.compressor as u16)?;
        dst.write_u16::<LittleEndian>(self.coder)?;
        self.version.write_to(dst)?;
        dst.write_u32::<LittleEndian>(self.options)?;
        dst.write_u32::<LittleEndian>(self.chunk_size)?;
        dst.write_i64::<LittleEndian>(self.number_of_special_evlrs)?;
        dst.write_i64::<LittleEndian>(self.offset_to_special_evlrs)?;
        dst.write_u16::<LittleEndian>(self.items.len() as u16)?;
        for item in &self.items {
            item.write_to(dst)?;
        }
        Ok(())
    }

    pub fn compressor(&self) -> CompressorType {
        self.compressor
    }

    pub fn uses_variably_sized_chunks(&self) -> bool {
        self.chunk_size == Self::VARIABLE_CHUNK_SIZE
    }

    pub fn chunk_size(&self) -> u32 {
        self.chunk_size
    }

    pub fn items(&self) -> &[LazItem] {
        &self.items
    }

    /// Size in bytes of one point record
    pub fn items_size(&self) -> u64 {
        self.items.iter().map(|item| u64::from(item.size)).sum()
    }
}

impl Default for LazVlr {
    fn default() -> Self {
        Self {
            compressor: Default::default(),
            coder: 0,
            version: Version {
                major: 2,
                minor: 2,
                revision: 0,
            },
            options: 0,
            chunk_size: DEFAULT_CHUNK_SIZE,
            number_of_special_evlrs: -1,
            offset_to_special_evlrs: -1,
            items: vec![],
        }
    }
}

pub struct LazVlrBuilder {
    laz_vlr: LazVlr,
}

impl Default for LazVlrBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl LazVlrBuilder {
    pub fn new() -> Self {
        Self {
            laz_vlr: Default::default(),
        }
    }

    pub fn with_laz_items(mut self, laz_items: Vec<LazItem>) -> Self {
        self.laz_vlr.items = laz_items;
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: u32) -> Self {
        self.laz_vlr.chunk_size = chunk_size;
        self
    }

    pub fn with_variable_chunk_size(mut self) -> Self {
        self.laz_vlr.chunk_size = LazVlr::VARIABLE_CHUNK_SIZE;
        self
    }

    pub fn with_compressor(mut self, compressor: CompressorType) -> Self {
        self.laz_vlr.compressor = compressor;
        self
    }

    pub fn build(self) -> LazVlr {
        self.laz_vlr
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_record_data_layout() {
        let items = LazItemRecordBuilder::new()
            .add_item(LazItemType::Point10)
            .add_item(LazItemType::GpsTime)
            .add_item(LazItemType::Byte(3))
            .build();
        let vlr = LazVlrBuilder::new()
            .with_laz_items(items)
            .with_chunk_size(1000)
            .build();

        let mut data = vec![];
        vlr.write_to(&mut data).unwrap();
        assert_eq!(data.len(), 34 + 3 * 6);
        assert_eq!(&data[0..2], &[2, 0]);
        assert_eq!(&data[12..16], &1000u32.to_le_bytes());
        assert_eq!(&data[34..40], &[6, 0, 20, 0, 2, 0]);

        let read = LazVlr::from_buffer(&data).unwrap();
        assert_eq!(read, vlr);
        assert_eq!(read.items_size(), 31);
    }

    #[test]
    fn test_unknown_codes() {
        let mut data = vec![];
        LazVlr::default().write_to(&mut data).unwrap();
        data[0] = 9;
        assert!(matches!(
            LazVlr::from_buffer(&data),
            Err(LazError::UnknownCompressorType(9))
        ));

        let vlr = LazVlrBuilder::new()
            .with_laz_items(vec![LazItem::new(LazItemType::Point10, 2)])
            .build();
        let mut data = vec![];
        vlr.write_to(&mut data).unwrap();
        data[34] = 42;
        assert!(matches!(
            LazVlr::from_buffer(&data),
            Err(LazError::UnknownLazItem(42))
        ));
    }
}
