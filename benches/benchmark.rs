#[macro_use]
extern crate criterion;

use criterion::Criterion;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use lazcodec::record::PointRecordCompressor;
use lazcodec::{
    compress_buffer, decompress_buffer, LazItem, LazItemRecordBuilder, LazItemType, LazVlrBuilder,
    PointReader,
};
use std::io::Cursor;

struct RawPointsData {
    point_size: usize,
    points_data: Vec<u8>,
}

impl RawPointsData {
    fn cycling_iterator(&self) -> std::iter::Cycle<std::slice::ChunksExact<u8>> {
        self.points_data.chunks_exact(self.point_size).cycle()
    }
}

/// Points of a record made of `items`, looking like a slow sweep over the ground.
fn synthetic_points(items: &[LazItem], count: usize) -> RawPointsData {
    let point_size = items.iter().map(|item| item.size() as usize).sum();
    let mut rng = StdRng::seed_from_u64(1);
    let mut points_data = vec![0u8; point_size * count];
    for (i, point) in points_data.chunks_exact_mut(point_size).enumerate() {
        let x = i as i32 * 10 + rng.gen_range(0..10);
        let y = rng.gen_range(0..5_000i32);
        let z = 300 + rng.gen_range(-20..20i32);
        point[0..4].copy_from_slice(&x.to_le_bytes());
        point[4..8].copy_from_slice(&y.to_le_bytes());
        point[8..12].copy_from_slice(&z.to_le_bytes());
        point[12..14].copy_from_slice(&rng.gen_range(0..1024u16).to_le_bytes());
        point[14] = 0b0000_1001;
        point[15] = 2;
        let mut start = 20;
        for item in &items[1..] {
            let end = start + item.size() as usize;
            match item.item_type() {
                LazItemType::GpsTime => {
                    let t = 40_000.0 + i as f64 * 0.000_05;
                    point[start..end].copy_from_slice(&t.to_le_bytes());
                }
                _ => rng.fill(&mut point[start..end]),
            }
            start = end;
        }
    }
    RawPointsData {
        point_size,
        points_data,
    }
}

fn record_compression_benchmark(c: &mut Criterion, name: &str, item_types: &[LazItemType]) {
    let mut builder = LazItemRecordBuilder::new();
    for item_type in item_types {
        builder.add_item(*item_type);
    }
    let items = builder.build();
    let raw_points_data = synthetic_points(&items, 10_000);

    let mut record_compressor =
        PointRecordCompressor::new(Cursor::new(Vec::<u8>::new()), &items).unwrap();

    c.bench_function(name, move |b| {
        let mut raw_pts_iter = raw_points_data.cycling_iterator();
        b.iter(|| record_compressor.compress_next(raw_pts_iter.next().unwrap()));
    });
}

fn point_0_v2_record_compression_benchmark(c: &mut Criterion) {
    record_compression_benchmark(c, "point_0_v2_compression", &[LazItemType::Point10]);
}

fn point_1_v2_record_compression_benchmark(c: &mut Criterion) {
    record_compression_benchmark(
        c,
        "point_1_v2_compression",
        &[LazItemType::Point10, LazItemType::GpsTime],
    );
}

fn point_3_v2_record_compression_benchmark(c: &mut Criterion) {
    record_compression_benchmark(
        c,
        "point_3_v2_compression",
        &[LazItemType::Point10, LazItemType::GpsTime, LazItemType::RGB12],
    );
}

fn buffer_decompression_benchmark(c: &mut Criterion) {
    let items = LazItemRecordBuilder::new()
        .add_item(LazItemType::Point10)
        .add_item(LazItemType::GpsTime)
        .add_item(LazItemType::RGB12)
        .build();
    let raw_points_data = synthetic_points(&items, 100_000);
    let vlr = LazVlrBuilder::new().with_laz_items(items).build();
    let compressed = compress_buffer(
        Cursor::new(Vec::<u8>::new()),
        &raw_points_data.points_data,
        vlr.clone(),
    )
    .unwrap()
    .into_inner();

    let mut out = vec![0u8; raw_points_data.points_data.len()];
    c.bench_function("point_3_v2_decompress_buffer", |b| {
        b.iter(|| decompress_buffer(&compressed, &mut out, &vlr).unwrap());
    });

    c.bench_function("point_3_v2_seek_last_chunk", |b| {
        b.iter(|| {
            let mut reader = PointReader::new();
            reader.setup(&vlr).unwrap();
            reader.init(Cursor::new(compressed.as_slice())).unwrap();
            reader.seek(0, 99_999).unwrap();
        });
    });
}

criterion_group!(
    version_2_point_formats,
    point_0_v2_record_compression_benchmark,
    point_1_v2_record_compression_benchmark,
    point_3_v2_record_compression_benchmark,
    buffer_decompression_benchmark
);
criterion_main!(version_2_point_formats);
