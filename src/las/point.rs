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


//! The canonical in-memory point, filled from (and packed into) the raw item bytes.

use crate::las::gps::GpsTime;
use crate::las::nir::RGBNir;
use crate::las::point10::Point10;
use crate::las::point14::Point14;
use crate::las::rgb::RGB;
use crate::laszip::{LazItem, LazItemType};
use crate::packers::Packable;

pub const WAVE_PACKET_SIZE: usize = 29;

/// A point with every field any item of a record may carry.
///
/// Fields whose item is not part of the record keep their default value.
#[derive(Default, Clone, Debug, PartialEq)]
pub struct LasPoint {
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub intensity: u16,
    pub return_number: u8,
    pub number_of_returns: u8,
    pub scan_direction_flag: bool,
    pub edge_of_flight_line: bool,
    pub classification: u8,
    pub scan_angle_rank: i8,
    pub user_data: u8,
    pub point_source_id: u16,

    pub scanner_channel: u8,
    pub extended_classification_flags: u8,
    pub extended_classification: u8,
    pub extended_return_number: u8,
    pub extended_number_of_returns: u8,
    pub extended_scan_angle: i16,

    pub gps_time: f64,
    pub rgb: RGB,
    pub nir: u16,
    pub wave_packet: [u8; WAVE_PACKET_SIZE],
    pub extra_bytes: Vec<u8>,
}

impl LasPoint {
    /// Fills the point from the bytes of a record made of `items`.
    ///
    /// `record` must be at least as long as the sum of the item sizes.
    pub fn unpack_from_items(&mut self, items: &[LazItem], record: &[u8]) {
        self.extra_bytes.clear();
        let mut start = 0;
        for item in items {
            let end = start + usize::from(item.size());
            let bytes = &record[start..end];
            match item.item_type() {
                LazItemType::Point10 => self.set_legacy(&Point10::unpack_from(bytes)),
                LazItemType::Point14 => {
                    let point = Point14::unpack_from(bytes);
                    self.set_legacy(&point.to_legacy());
                    self.scanner_channel = point.scanner_channel;
                    self.extended_classification_flags = point.classification_flags;
                    self.extended_classification = point.classification;
                    self.extended_return_number = point.return_number;
                    self.extended_number_of_returns = point.number_of_returns;
                    self.extended_scan_angle = point.scan_angle;
                    self.gps_time = point.gps_time;
                }
                LazItemType::GpsTime => self.gps_time = GpsTime::unpack_from(bytes).into(),
                LazItemType::RGB12 | LazItemType::RGB14 => self.rgb = RGB::unpack_from(bytes),
                LazItemType::RGBNIR14 => {
                    let rgb_nir = RGBNir::unpack_from(bytes);
                    self.rgb = rgb_nir.rgb;
                    self.nir = rgb_nir.nir;
                }
                LazItemType::WavePacket13 | LazItemType::WavePacket14 => {
                    self.wave_packet.copy_from_slice(bytes)
                }
                LazItemType::Byte(_) | LazItemType::Byte14(_) => {
                    self.extra_bytes.extend_from_slice(bytes)
                }
            }
            start = end;
        }
    }

    /// Writes the point as a record made of `items`.
    ///
    /// Extra bytes missing from the point are written as zeros.
    pub fn pack_into_items(&self, items: &[LazItem], record: &mut [u8]) {
        let mut start = 0;
        let mut extra_bytes = self.extra_bytes.iter().copied();
        for item in items {
            let end = start + usize::from(item.size());
            let bytes = &mut record[start..end];
            match item.item_type() {
                LazItemType::Point10 => self.legacy().pack_into(bytes),
                LazItemType::Point14 => self.extended().pack_into(bytes),
                LazItemType::GpsTime => GpsTime::from(self.gps_time).pack_into(bytes),
                LazItemType::RGB12 | LazItemType::RGB14 => self.rgb.pack_into(bytes),
                LazItemType::RGBNIR14 => RGBNir {
                    rgb: self.rgb,
                    nir: self.nir,
                }
                .pack_into(bytes),
                LazItemType::WavePacket13 | LazItemType::WavePacket14 => {
                    bytes.copy_from_slice(&self.wave_packet)
                }
                LazItemType::Byte(_) | LazItemType::Byte14(_) => {
                    for b in bytes.iter_mut() {
                        *b = extra_bytes.next().unwrap_or(0);
                    }
                }
            }
            start = end;
        }
    }

    fn set_legacy(&mut self, point: &Point10) {
        self.x = point.x;
        self.y = point.y;
        self.z = point.z;
        self.intensity = point.intensity;
        self.return_number = point.return_number;
        self.number_of_returns = point.number_of_returns_of_given_pulse;
        self.scan_direction_flag = point.scan_direction_flag;
        self.edge_of_flight_line = point.edge_of_flight_line;
        self.classification = point.classification;
        self.scan_angle_rank = point.scan_angle_rank;
        self.user_data = point.user_data;
        self.point_source_id = point.point_source_id;
    }

    fn legacy(&self) -> Point10 {
        Point10 {
            x: self.x,
            y: self.y,
            z: self.z,
            intensity: self.intensity,
            return_number: self.return_number,
            number_of_returns_of_given_pulse: self.number_of_returns,
            scan_direction_flag: self.scan_direction_flag,
            edge_of_flight_line: self.edge_of_flight_line,
            classification: self.classification,
            scan_angle_rank: self.scan_angle_rank,
            user_data: self.user_data,
            point_source_id: self.point_source_id,
        }
    }

    fn extended(&self) -> Point14 {
        Point14 {
            x: self.x,
            y: self.y,
            z: self.z,
            intensity: self.intensity,
            return_number: self.extended_return_number,
            number_of_returns: self.extended_number_of_returns,
            classification_flags: self.extended_classification_flags,
            scanner_channel: self.scanner_channel,
            scan_direction_flag: self.scan_direction_flag,
            edge_of_flight_line: self.edge_of_flight_line,
            classification: self.extended_classification,
            user_data: self.user_data,
            scan_angle: self.extended_scan_angle,
            point_source_id: self.point_source_id,
            gps_time: self.gps_time,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::laszip::LazItemRecordBuilder;

    #[test]
    fn test_legacy_record_fills_point() {
        let items = LazItemRecordBuilder::new()
            .add_item(LazItemType::Point10)
            .add_item(LazItemType::GpsTime)
            .add_item(LazItemType::RGB12)
            .add_item(LazItemType::Byte(2))
            .build();

        let mut point = LasPoint::default();
        point.x = -12;
        point.y = 40;
        point.return_number = 2;
        point.number_of_returns = 3;
        point.classification = 6;
        point.gps_time = 1234.5;
        point.rgb = RGB {
            red: 1,
            green: 2,
            blue: 3,
        };
        point.extra_bytes = vec![7, 9];

        let mut record = vec![0u8; 36];
        point.pack_into_items(&items, &mut record);

        let mut read = LasPoint::default();
        read.unpack_from_items(&items, &record);
        assert_eq!(read, point);
    }

    #[test]
    fn test_extended_record_gets_legacy_view() {
        let items = vec![LazItem::new(LazItemType::Point14, 2)];
        let mut point = LasPoint::default();
        point.extended_return_number = 9;
        point.extended_number_of_returns = 10;
        point.extended_classification = 40;
        point.extended_scan_angle = -15000;
        point.gps_time = 8.0;

        let mut record = vec![0u8; 30];
        point.pack_into_items(&items, &mut record);

        let mut read = LasPoint::default();
        read.unpack_from_items(&items, &record);
        assert_eq!(read.return_number, 6);
        assert_eq!(read.number_of_returns, 7);
        assert_eq!(read.classification, 0);
        assert_eq!(read.scan_angle_rank, -90);
        assert_eq!(read.extended_classification, 40);
        assert_eq!(read.extended_return_number, 9);
        assert_eq!(read.gps_time, 8.0);
    }
}
