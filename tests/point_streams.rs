use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use lazcodec::record::PointRecordDecompressor;
use lazcodec::{
    ChunkTable, CompressorType, LasPoint, LazError, LazItem, LazItemRecordBuilder, LazItemType,
    LazVlr, LazVlrBuilder, PointReader, PointWriter,
};

fn random_points(seed: u64, count: usize) -> Vec<LasPoint> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut gps_time = 250_000.0;
    let (mut x, mut y) = (1_000_000i32, -500_000i32);
    let mut points = Vec::with_capacity(count);
    for i in 0..count {
        // flight lines overlap, so time sometimes goes back
        gps_time += if i % 97 == 96 {
            -rng.gen_range(0.5..50.0)
        } else {
            rng.gen_range(0.0..0.001)
        };
        x += rng.gen_range(-300..300);
        y += rng.gen_range(-300..300);
        let number_of_returns = rng.gen_range(1..=7u8);
        let extended_number_of_returns = rng.gen_range(1..=15u8);
        points.push(LasPoint {
            x,
            y,
            z: rng.gen_range(-2_000..20_000),
            intensity: rng.gen(),
            return_number: rng.gen_range(1..=number_of_returns),
            number_of_returns,
            scan_direction_flag: rng.gen(),
            edge_of_flight_line: rng.gen_bool(0.01),
            classification: rng.gen_range(0..32),
            scan_angle_rank: rng.gen_range(-90..=90),
            user_data: rng.gen(),
            point_source_id: (i / 400) as u16,
            scanner_channel: rng.gen_range(0..4),
            extended_classification_flags: rng.gen_range(0..16),
            extended_classification: rng.gen(),
            extended_return_number: rng.gen_range(1..=extended_number_of_returns),
            extended_number_of_returns,
            extended_scan_angle: rng.gen_range(-30_000..=30_000),
            gps_time,
            rgb: lazcodec::las::rgb::RGB {
                red: rng.gen(),
                green: rng.gen(),
                blue: rng.gen(),
            },
            nir: rng.gen(),
            wave_packet: rng.gen(),
            extra_bytes: (0..5).map(|_| rng.gen()).collect(),
        });
    }
    points
}

/// The point as it is once stored in a record made of `items`.
fn as_stored(point: &LasPoint, items: &[LazItem]) -> LasPoint {
    let size = items.iter().map(|item| usize::from(item.size())).sum();
    let mut record = vec![0u8; size];
    point.pack_into_items(items, &mut record);
    let mut stored = LasPoint::default();
    stored.unpack_from_items(items, &record);
    stored
}

fn write_points(vlr: &LazVlr, points: &[LasPoint]) -> Vec<u8> {
    let mut writer = PointWriter::new(Cursor::new(Vec::<u8>::new()), vlr.clone()).unwrap();
    for point in points {
        writer.write_point(point).unwrap();
    }
    writer.done().unwrap().into_inner()
}

fn reader_for(vlr: &LazVlr, data: Vec<u8>) -> PointReader<Cursor<Vec<u8>>> {
    let mut reader = PointReader::new();
    reader.setup(vlr).unwrap();
    reader.init(Cursor::new(data)).unwrap();
    reader
}

fn check_round_trip(item_types: &[LazItemType], compressor: CompressorType, chunk_size: u32) {
    let mut builder = LazItemRecordBuilder::new();
    for item_type in item_types {
        builder.add_item(*item_type);
    }
    let items = builder.build();
    let vlr = LazVlrBuilder::new()
        .with_laz_items(items.clone())
        .with_chunk_size(chunk_size)
        .with_compressor(compressor)
        .build();

    let points = random_points(u64::from(chunk_size), 2_345);
    let data = write_points(&vlr, &points);
    let mut reader = reader_for(&vlr, data);
    let mut point = LasPoint::default();
    for (i, expected) in points.iter().enumerate() {
        reader.read_point(&mut point).unwrap();
        assert_eq!(point, as_stored(expected, &items), "point {}", i);
    }
    assert!(reader.done().is_some());
}

#[test]
fn test_point10_round_trip() {
    check_round_trip(&[LazItemType::Point10], CompressorType::PointWiseChunked, 1_000);
}

#[test]
fn test_point10_gps_rgb_extra_bytes_round_trip() {
    check_round_trip(
        &[
            LazItemType::Point10,
            LazItemType::GpsTime,
            LazItemType::RGB12,
            LazItemType::Byte(5),
        ],
        CompressorType::PointWiseChunked,
        500,
    );
}

#[test]
fn test_rgb_nir_round_trip() {
    check_round_trip(
        &[LazItemType::Point10, LazItemType::GpsTime, LazItemType::RGBNIR14],
        CompressorType::PointWiseChunked,
        50_000,
    );
}

#[test]
fn test_single_chunk_round_trip() {
    check_round_trip(
        &[LazItemType::Point10, LazItemType::GpsTime, LazItemType::RGB12],
        CompressorType::PointWise,
        50_000,
    );
}

#[test]
fn test_raw_extended_points() {
    check_round_trip(
        &[LazItemType::Point14, LazItemType::RGBNIR14, LazItemType::WavePacket14],
        CompressorType::None,
        50_000,
    );
}

#[test]
fn test_extended_points_are_not_compressed() {
    let items = LazItemRecordBuilder::new()
        .add_item(LazItemType::Point14)
        .build();
    let vlr = LazVlrBuilder::new().with_laz_items(items).build();
    match PointWriter::new(Cursor::new(Vec::<u8>::new()), vlr.clone()) {
        Err(LazError::UnsupportedLazItemVersion(LazItemType::Point14, 2)) => {}
        Err(e) => panic!("unexpected error {}", e),
        Ok(_) => panic!("point14 should not be compressible"),
    }

    let mut reader = PointReader::<Cursor<Vec<u8>>>::new();
    assert!(reader.setup(&vlr).is_err());
    assert!(reader.last_error().is_some());
}

#[test]
fn test_chunks_of_one_point() {
    let items = LazItemRecordBuilder::new()
        .add_item(LazItemType::Point10)
        .add_item(LazItemType::GpsTime)
        .build();
    let vlr = LazVlrBuilder::new()
        .with_laz_items(items.clone())
        .with_chunk_size(1)
        .build();
    let points = random_points(1, 5);
    let data = write_points(&vlr, &points);
    let mut reader = reader_for(&vlr, data);

    let mut point = LasPoint::default();
    for expected in &points {
        reader.read_point(&mut point).unwrap();
        assert_eq!(point, as_stored(expected, &items));
    }
    let table = reader.chunk_table().unwrap();
    assert_eq!(table.len(), 5);
    assert_eq!(reader.tabled_chunks(), 5);

    reader.seek(5, 3).unwrap();
    reader.read_point(&mut point).unwrap();
    assert_eq!(point, as_stored(&points[3], &items));
    assert_eq!(reader.current_chunk(), 3);

    reader.seek(4, 1).unwrap();
    reader.read_point(&mut point).unwrap();
    assert_eq!(point, as_stored(&points[1], &items));
}

#[test]
fn test_seek_matches_sequential_reading() {
    let items = LazItemRecordBuilder::new()
        .add_item(LazItemType::Point10)
        .add_item(LazItemType::GpsTime)
        .add_item(LazItemType::RGB12)
        .build();
    let vlr = LazVlrBuilder::new()
        .with_laz_items(items.clone())
        .with_chunk_size(100)
        .build();
    let points = random_points(7, 1_000);
    let data = write_points(&vlr, &points);
    let mut reader = reader_for(&vlr, data);

    let mut point = LasPoint::default();
    let mut current = 0u64;
    for &target in &[0u64, 999, 250, 99, 100, 500, 499, 3, 4, 998] {
        reader.seek(current, target).unwrap();
        reader.read_point(&mut point).unwrap();
        assert_eq!(point, as_stored(&points[target as usize], &items), "target {}", target);
        current = target + 1;
    }
    assert!(reader.last_error().is_none());
}

#[test]
fn test_chunks_decode_independently() {
    let items = LazItemRecordBuilder::new()
        .add_item(LazItemType::Point10)
        .add_item(LazItemType::GpsTime)
        .build();
    let vlr = LazVlrBuilder::new()
        .with_laz_items(items.clone())
        .with_chunk_size(64)
        .build();
    let points = random_points(3, 300);
    let mut writer = PointWriter::new(Cursor::new(Vec::<u8>::new()), vlr.clone()).unwrap();
    for point in &points {
        writer.write_point(point).unwrap();
    }
    // the trailing partial chunk only lands in the table on done()
    assert_eq!(writer.chunk_table().len(), 4);
    let data = writer.done().unwrap().into_inner();

    let mut src = Cursor::new(data.as_slice());
    let table_offset = src.read_i64::<LittleEndian>().unwrap();
    src.set_position(table_offset as u64);
    let table = ChunkTable::read_from(&mut src, false, 64).unwrap();
    assert_eq!(table.len(), 5);

    let starts = table.chunk_starts(8).unwrap();
    let record_size = vlr.items_size() as usize;
    let mut record = vec![0u8; record_size];
    let mut point = LasPoint::default();
    // decode in reverse order, each chunk only sees its own bytes
    for (chunk, entry) in table.as_ref().iter().enumerate().rev() {
        let start = starts[chunk] as usize;
        let bytes = &data[start..start + entry.byte_count as usize];
        let mut decompressor = PointRecordDecompressor::new(Cursor::new(bytes), &items).unwrap();
        // fixed-size tables do not store the count of the last chunk
        let point_count = (points.len() - chunk * 64).min(64);
        for i in 0..point_count {
            decompressor.decompress_next(&mut record).unwrap();
            point.unpack_from_items(&items, &record);
            assert_eq!(point, as_stored(&points[chunk * 64 + i], &items));
        }
        assert_eq!(decompressor.get_ref().position(), entry.byte_count);
    }
}

#[test]
fn test_variable_size_chunks() {
    let items = LazItemRecordBuilder::new()
        .add_item(LazItemType::Point10)
        .add_item(LazItemType::RGB12)
        .build();
    let vlr = LazVlrBuilder::new()
        .with_laz_items(items.clone())
        .with_variable_chunk_size()
        .build();
    let points = random_points(11, 21);
    let chunk_sizes = [3usize, 10, 1, 7];

    let mut writer = PointWriter::new(Cursor::new(Vec::<u8>::new()), vlr.clone()).unwrap();
    let mut written = 0;
    for size in &chunk_sizes {
        for point in &points[written..written + size] {
            writer.write_point(point).unwrap();
        }
        writer.finish_current_chunk().unwrap();
        written += size;
    }
    let data = writer.done().unwrap().into_inner();
    let mut reader = reader_for(&vlr, data);

    let mut point = LasPoint::default();
    for expected in &points {
        reader.read_point(&mut point).unwrap();
        assert_eq!(point, as_stored(expected, &items));
    }
    let counts: Vec<u64> = reader
        .chunk_table()
        .unwrap()
        .as_ref()
        .iter()
        .map(|entry| entry.point_count)
        .collect();
    assert_eq!(counts, vec![3, 10, 1, 7]);

    reader.seek(21, 13).unwrap();
    reader.read_point(&mut point).unwrap();
    assert_eq!(point, as_stored(&points[13], &items));
    assert_eq!(reader.current_chunk(), 2);

    reader.seek(14, 2).unwrap();
    reader.read_point(&mut point).unwrap();
    assert_eq!(point, as_stored(&points[2], &items));
    assert_eq!(reader.current_chunk(), 0);
}

#[test]
fn test_finishing_fixed_chunks_is_refused() {
    let items = LazItemRecordBuilder::new()
        .add_item(LazItemType::Point10)
        .build();
    let vlr = LazVlrBuilder::new().with_laz_items(items).build();
    let mut writer = PointWriter::new(Cursor::new(Vec::<u8>::new()), vlr).unwrap();
    assert!(writer.finish_current_chunk().is_err());
}

#[test]
fn test_reader_operations_need_their_state() {
    let items = LazItemRecordBuilder::new()
        .add_item(LazItemType::Point10)
        .build();
    let vlr = LazVlrBuilder::new().with_laz_items(items).build();
    let mut reader = PointReader::<Cursor<Vec<u8>>>::new();
    let mut point = LasPoint::default();

    assert!(matches!(
        reader.read_point(&mut point),
        Err(LazError::InvalidState { .. })
    ));
    assert!(reader.init(Cursor::new(vec![])).is_err());
    reader.setup(&vlr).unwrap();
    assert!(reader.setup(&vlr).is_err());
    assert!(reader.done().is_none());
}
