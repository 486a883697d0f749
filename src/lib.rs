//! Lossless compression of LIDAR point records, in the LAZ format.
//!
//! Points are compressed by an adaptive arithmetic coder, field by field,
//! and grouped in independently decodable chunks so that a [`PointReader`]
//! can seek to any point. A [`LasIndex`] maps areas of the plane to the
//! intervals of point indices to read.
//!
//! # Writing and reading points
//!
//! ```
//! use std::io::Cursor;
//! use lazcodec::{LasPoint, LazError, LazItemRecordBuilder, LazItemType, LazVlrBuilder};
//! use lazcodec::{PointReader, PointWriter};
//!
//! # fn main() -> Result<(), LazError> {
//! let items = LazItemRecordBuilder::new()
//!             .add_item(LazItemType::Point10)
//!             .add_item(LazItemType::GpsTime)
//!             .build();
//! let vlr = LazVlrBuilder::new()
//!           .with_laz_items(items)
//!           .with_chunk_size(5_000)
//!           .build();
//!
//! let mut writer = PointWriter::new(Cursor::new(Vec::<u8>::new()), vlr.clone())?;
//! let mut point = LasPoint::default();
//! for i in 0..10 {
//!     point.x = i * 100;
//!     point.gps_time = f64::from(i);
//!     writer.write_point(&point)?;
//! }
//! let mut compressed = writer.done()?;
//! compressed.set_position(0);
//!
//! let mut reader = PointReader::new();
//! reader.setup(&vlr)?;
//! reader.init(compressed)?;
//! reader.seek(0, 7)?;
//! reader.read_point(&mut point)?;
//! assert_eq!(point.x, 700);
//! # Ok(())
//! # }
//! ```
//!
//! # Logging
//!
//! Messages go through the `log` facade with the `lazcodec` target,
//! and only when allowed by the [`Diagnostics`] given to the reader or the index.
//!
//! # Parallelism
//!
//! This crates has an optional feature 'parallel'.
//! When using this feature, [`par_decompress_buffer`] is exposed.
//!
//! [`par_decompress_buffer`]: laszip/fn.par_decompress_buffer.html

pub(crate) mod compressors;
pub(crate) mod decoders;
pub(crate) mod decompressors;
pub(crate) mod encoders;
pub(crate) mod models;

#[cfg(feature = "parallel")]
mod byteslice;
pub mod bytestream;
pub mod diagnostics;
pub mod errors;
pub mod index;
pub mod las;
pub mod laszip;
pub mod packers;
pub mod record;

pub use bytestream::NonSeekable;
pub use compressors::{IntegerCompressor, IntegerCompressorBuilder};
pub use decoders::ArithmeticDecoder;
pub use decompressors::{IntegerDecompressor, IntegerDecompressorBuilder};
pub use diagnostics::Diagnostics;
pub use encoders::ArithmeticEncoder;
pub use errors::{LazError, Result};
pub use index::{LasIndex, LasInterval, LasQuadtree};
pub use las::point::LasPoint;
pub use laszip::{compress_buffer, decompress_buffer};
#[cfg(feature = "parallel")]
pub use laszip::par_decompress_buffer;
pub use laszip::{
    ChunkTable, CompressorType, LazItem, LazItemRecordBuilder, LazItemType, LazVlr,
    LazVlrBuilder, PointReader, PointWriter,
};
pub use models::{ArithmeticBitModel, ArithmeticModel, ArithmeticModelBuilder};
