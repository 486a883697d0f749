//! Definitions of error related things.

use crate::laszip::{CompressorType, LazItemType};
use std::fmt;

/// Errors of this crate
#[derive(Debug)]
#[non_exhaustive]
pub enum LazError {
    /// The Laz item it not known
    UnknownLazItem(u16),
    /// The compression version used for the item is not supported
    UnsupportedLazItemVersion(LazItemType, u16),
    /// The type of compressor used is not known
    UnknownCompressorType(u16),
    /// The type of compressor exists but it is not supported
    UnsupportedCompressorType(CompressorType),
    /// The data ended in the middle of a chunk
    EndOfData { chunk: u32 },
    /// The arithmetic coded data of a chunk could not be decoded
    /// or did not end where the chunk table says it should
    CorruptChunk { chunk: u32, tabled_chunks: u32 },
    /// The chunk table could not be found in the file
    /// and it is required for the operation.
    MissingChunkTable,
    /// The chunk table exists but its content is invalid
    CorruptChunkTable,
    /// An operation was called while the reader was not in a state allowing it
    InvalidState {
        operation: &'static str,
        state: &'static str,
    },
    /// The bounding box given to the quadtree results in no cells
    InvalidQuadtree,
    /// A spatial index file did not have the expected layout
    InvalidIndexFile(String),
    BufferLenNotMultipleOfPointSize {
        buffer_len: usize,
        point_size: usize,
    },
    /// Wrapper around and io error from the std lib
    IoError(std::io::Error),
}

impl From<std::io::Error> for LazError {
    fn from(e: std::io::Error) -> Self {
        LazError::IoError(e)
    }
}

impl fmt::Display for LazError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LazError::UnknownLazItem(t) => write!(f, "Item with type code: {} is unknown", t),
            LazError::UnsupportedLazItemVersion(item_type, version) => write!(
                f,
                "Item {:?} with compression version: {} is not supported",
                item_type, version
            ),
            LazError::UnknownCompressorType(compressor_type) => {
                write!(f, "Compressor type {} is not valid", compressor_type)
            }
            LazError::UnsupportedCompressorType(compressor_type) => {
                write!(f, "Compressor type {:?} is not supported", compressor_type)
            }
            LazError::EndOfData { chunk } => {
                write!(f, "end-of-file during chunk with index {}", chunk)
            }
            LazError::CorruptChunk {
                chunk,
                tabled_chunks,
            } => write!(
                f,
                "chunk with index {} of {} is corrupt",
                chunk, tabled_chunks
            ),
            LazError::MissingChunkTable => write!(f, "The chunk table could not be found"),
            LazError::CorruptChunkTable => write!(f, "corrupt chunk table"),
            LazError::InvalidState { operation, state } => write!(
                f,
                "cannot {} while the reader is {}",
                operation, state
            ),
            LazError::InvalidQuadtree => {
                write!(f, "The bounding box does not contain any quadtree cell")
            }
            LazError::InvalidIndexFile(reason) => write!(f, "Invalid spatial index: {}", reason),
            LazError::BufferLenNotMultipleOfPointSize {
                buffer_len: bl,
                point_size: ps,
            } => write!(
                f,
                "The len of the buffer ({}) is not a multiple of the point size {}",
                bl, ps
            ),
            LazError::IoError(e) => write!(f, "IoError: {}", e),
        }
    }
}

impl std::error::Error for LazError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LazError::IoError(e) => Some(e),
            _ => None,
        }
    }
}

/// Result type used across the reader, writer and index layers.
pub type Result<T> = std::result::Result<T, LazError>;
