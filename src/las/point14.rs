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

//! The extended (LAS 1.4) 30 bytes point layout.
//!
//! Only raw Point14 items are handled, they are translated to the
//! legacy view so that the rest of the crate sees a single point type.

use crate::las::point10::Point10;
use crate::las::utils::{i16_quantize, i8_clamp};
use crate::packers::Packable;

#[derive(Default, Copy, Clone, PartialEq, Debug)]
pub struct Point14 {
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub intensity: u16,
    // 4 bits each
    pub return_number: u8,
    pub number_of_returns: u8,
    // 4 bits
    pub classification_flags: u8,
    // 2 bits
    pub scanner_channel: u8,
    pub scan_direction_flag: bool,
    pub edge_of_flight_line: bool,
    pub classification: u8,
    pub user_data: u8,
    pub scan_angle: i16,
    pub point_source_id: u16,
    pub gps_time: f64,
}

impl Point14 {
    /// Legacy view of the extended point.
    ///
    /// Return numbers and counts above 7 are folded so that
    /// the last return stays the last return.
    pub fn to_legacy(&self) -> Point10 {
        let (return_number, number_of_returns) = if self.number_of_returns > 7 {
            let r = if self.return_number > 6 {
                if self.return_number >= self.number_of_returns {
                    7
                } else {
                    6
                }
            } else {
                self.return_number
            };
            (r, 7)
        } else {
            (self.return_number, self.number_of_returns)
        };

        let classification = ((self.classification_flags << 5) & 0xFF)
            | if self.classification < 32 {
                self.classification
            } else {
                0
            };

        Point10 {
            x: self.x,
            y: self.y,
            z: self.z,
            intensity: self.intensity,
            return_number,
            number_of_returns_of_given_pulse: number_of_returns,
            scan_direction_flag: self.scan_direction_flag,
            edge_of_flight_line: self.edge_of_flight_line,
            classification,
            scan_angle_rank: i8_clamp(i32::from(i16_quantize(
                0.006f32 * f32::from(self.scan_angle),
            ))),
            user_data: self.user_data,
            point_source_id: self.point_source_id,
        }
    }
}

impl Packable for Point14 {
    const SIZE: usize = 30;

    fn unpack_from(input: &[u8]) -> Self {
        let returns = input[14];
        let flags = input[15];
        Self {
            x: i32::unpack_from(&input[0..4]),
            y: i32::unpack_from(&input[4..8]),
            z: i32::unpack_from(&input[8..12]),
            intensity: u16::unpack_from(&input[12..14]),
            return_number: returns & 0x0F,
            number_of_returns: returns >> 4,
            classification_flags: flags & 0x0F,
            scanner_channel: (flags >> 4) & 0x03,
            scan_direction_flag: (flags >> 6) & 0x1 != 0,
            edge_of_flight_line: (flags >> 7) & 0x1 != 0,
            classification: input[16],
            user_data: input[17],
            scan_angle: i16::unpack_from(&input[18..20]),
            point_source_id: u16::unpack_from(&input[20..22]),
            gps_time: f64::unpack_from(&input[22..30]),
        }
    }

    fn pack_into(&self, output: &mut [u8]) {
        self.x.pack_into(&mut output[0..4]);
        self.y.pack_into(&mut output[4..8]);
        self.z.pack_into(&mut output[8..12]);
        self.intensity.pack_into(&mut output[12..14]);
        output[14] = (self.number_of_returns << 4) | (self.return_number & 0x0F);
        output[15] = ((self.edge_of_flight_line as u8) << 7)
            | ((self.scan_direction_flag as u8) << 6)
            | ((self.scanner_channel & 0x03) << 4)
            | (self.classification_flags & 0x0F);
        output[16] = self.classification;
        output[17] = self.user_data;
        self.scan_angle.pack_into(&mut output[18..20]);
        self.point_source_id.pack_into(&mut output[20..22]);
        self.gps_time.pack_into(&mut output[22..30]);
    }
}
