#![cfg(feature = "parallel")]

use std::io::Cursor;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use lazcodec::{
    compress_buffer, decompress_buffer, par_decompress_buffer, CompressorType, LazError,
    LazItemRecordBuilder, LazItemType, LazVlr, LazVlrBuilder, PointWriter,
};

fn vlr(chunk_size: u32) -> LazVlr {
    let items = LazItemRecordBuilder::new()
        .add_item(LazItemType::Point10)
        .add_item(LazItemType::GpsTime)
        .add_item(LazItemType::RGB12)
        .build();
    LazVlrBuilder::new()
        .with_laz_items(items)
        .with_chunk_size(chunk_size)
        .build()
}

fn raw_points(count: usize, point_size: usize) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(99);
    let mut points = vec![0u8; count * point_size];
    for (i, point) in points.chunks_exact_mut(point_size).enumerate() {
        rng.fill(&mut point[..12]);
        point[12] = rng.gen();
        // one return of one
        point[14] = 0b0000_1001;
        point[20..28].copy_from_slice(&(i as f64 * 0.25).to_le_bytes());
        rng.fill(&mut point[28..]);
    }
    points
}

#[test]
fn test_par_decompress_matches_sequential() {
    let vlr = vlr(1_000);
    let point_size = vlr.items_size() as usize;
    let points = raw_points(5_432, point_size);
    let compressed = compress_buffer(Cursor::new(Vec::<u8>::new()), &points, vlr.clone())
        .unwrap()
        .into_inner();

    let mut sequential = vec![0u8; points.len()];
    decompress_buffer(&compressed, &mut sequential, &vlr).unwrap();
    let mut parallel = vec![0u8; points.len()];
    par_decompress_buffer(&compressed, &mut parallel, &vlr).unwrap();
    assert_eq!(sequential, points);
    assert_eq!(parallel, points);
}

#[test]
fn test_par_decompress_less_than_chunk_size() {
    let vlr = vlr(50_000);
    let point_size = vlr.items_size() as usize;
    let points = raw_points(17, point_size);
    let compressed = compress_buffer(Cursor::new(Vec::<u8>::new()), &points, vlr.clone())
        .unwrap()
        .into_inner();

    let mut parallel = vec![0u8; points.len()];
    par_decompress_buffer(&compressed, &mut parallel, &vlr).unwrap();
    assert_eq!(parallel, points);
}

#[test]
fn test_par_decompress_variable_chunks() {
    let items = LazItemRecordBuilder::new()
        .add_item(LazItemType::Point10)
        .add_item(LazItemType::GpsTime)
        .add_item(LazItemType::RGB12)
        .build();
    let vlr = LazVlrBuilder::new()
        .with_laz_items(items)
        .with_variable_chunk_size()
        .build();
    let point_size = vlr.items_size() as usize;
    let points = raw_points(600, point_size);

    let mut writer = PointWriter::new(Cursor::new(Vec::<u8>::new()), vlr.clone()).unwrap();
    for (chunk, size) in [50usize, 250, 1, 299].iter().enumerate() {
        let start = [0usize, 50, 300, 301][chunk];
        writer
            .write_many(&points[start * point_size..(start + size) * point_size])
            .unwrap();
        writer.finish_current_chunk().unwrap();
    }
    let compressed = writer.done().unwrap().into_inner();

    let mut parallel = vec![0u8; points.len()];
    par_decompress_buffer(&compressed, &mut parallel, &vlr).unwrap();
    assert_eq!(parallel, points);
}

#[test]
fn test_par_decompress_needs_chunks() {
    let items = LazItemRecordBuilder::new()
        .add_item(LazItemType::Point10)
        .build();
    let vlr = LazVlrBuilder::new()
        .with_laz_items(items)
        .with_compressor(CompressorType::PointWise)
        .build();
    let mut out = vec![0u8; 20];
    match par_decompress_buffer(&[0u8; 64], &mut out, &vlr) {
        Err(LazError::UnsupportedCompressorType(CompressorType::PointWise)) => {}
        other => panic!("unexpected result {:?}", other),
    }
}
