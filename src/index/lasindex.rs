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


//! Spatial index of a point file: which point indices fall in which quadtree cell.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use log::Level;

use crate::diagnostics::{diag, Diagnostics};
use crate::errors::LazError;
use crate::index::interval::{Interval, IntervalCell, LasInterval};
use crate::index::quadtree::LasQuadtree;
use crate::laszip::PointReader;

pub const DEFAULT_MINIMUM_POINTS: u32 = 100_000;
pub const DEFAULT_MAXIMUM_INTERVALS: i32 = -1;

#[derive(Debug, Clone)]
pub struct LasIndex {
    quadtree: LasQuadtree,
    interval: LasInterval,
    query: Option<IntervalCell>,
    next_interval: usize,
    current: Option<Interval>,
}

impl LasIndex {
    pub fn new(quadtree: LasQuadtree, threshold: u32) -> Self {
        Self {
            quadtree,
            interval: LasInterval::new(threshold),
            query: None,
            next_interval: 0,
            current: None,
        }
    }

    pub fn quadtree(&self) -> &LasQuadtree {
        &self.quadtree
    }

    pub fn interval(&self) -> &LasInterval {
        &self.interval
    }

    /// Registers the point of index `point_index`, points must be added in increasing index order.
    pub fn add(&mut self, x: f64, y: f64, point_index: u32) {
        let cell = self.quadtree.get_cell_index(x, y);
        self.interval.add(point_index, cell);
    }

    /// Coarsens sparsely populated cells and limits the number of intervals.
    ///
    /// Four sibling cells holding together less than `minimum_points` are merged
    /// into their parent, as long as such merges happen.
    /// A negative `maximum_intervals` is a number of intervals per cell.
    pub fn complete(
        &mut self,
        minimum_points: u32,
        maximum_intervals: i32,
        diagnostics: &Diagnostics,
    ) {
        diag!(
            diagnostics,
            Level::Info,
            "before complete: {} cells, {} intervals",
            self.interval.number_cells(),
            self.interval.number_intervals()
        );

        if minimum_points > 0 {
            let mut candidates: HashMap<u32, u32> =
                self.interval.cells().map(|(index, cell)| (index, cell.full)).collect();
            let mut round = 0;
            while !candidates.is_empty() {
                let mut keys: Vec<u32> = candidates.keys().copied().collect();
                keys.sort_unstable();
                let mut merged = HashMap::new();
                for key in keys {
                    if !candidates.contains_key(&key) {
                        continue;
                    }
                    let (parent, children) = match self.quadtree.coarsen(key) {
                        Some(family) => family,
                        None => {
                            candidates.remove(&key);
                            continue;
                        }
                    };
                    let mut full = 0;
                    let mut present = 0;
                    for child in &children {
                        if let Some(child_full) = candidates.remove(child) {
                            full += child_full;
                            present += 1;
                        }
                    }
                    if present == 4
                        && full < minimum_points
                        && self.interval.merge_cells(&children, parent)
                    {
                        merged.insert(parent, full);
                    }
                }
                round += 1;
                diag!(
                    diagnostics,
                    Level::Info,
                    "coarsening round {}: {} cells merged into parents",
                    round,
                    merged.len()
                );
                candidates = merged;
            }
        }

        let cells: Vec<u32> = self.interval.cells().map(|(index, _)| index).collect();
        for cell in cells {
            self.quadtree.manage_cell(cell);
        }

        let maximum_intervals = if maximum_intervals < 0 {
            maximum_intervals
                .unsigned_abs()
                .saturating_mul(self.interval.number_cells())
        } else {
            maximum_intervals as u32
        };
        if maximum_intervals != 0 {
            if let Some(gap) = self.interval.merge_intervals(maximum_intervals) {
                diag!(diagnostics, Level::Info, "largest interval gap closed: {}", gap);
            }
        }

        diag!(
            diagnostics,
            Level::Info,
            "after complete: {} cells, {} intervals",
            self.interval.number_cells(),
            self.interval.number_intervals()
        );
    }

    /// Selects the points that may lie in the rectangle, returns false when there are none.
    pub fn intersect_rectangle(&mut self, r_min_x: f64, r_min_y: f64, r_max_x: f64, r_max_y: f64) -> bool {
        self.quadtree
            .intersect_rectangle(r_min_x, r_min_y, r_max_x, r_max_y);
        self.select_intersected()
    }

    pub fn intersect_tile(&mut self, ll_x: f32, ll_y: f32, size: f32) -> bool {
        self.quadtree.intersect_tile(ll_x, ll_y, size);
        self.select_intersected()
    }

    pub fn intersect_circle(&mut self, center_x: f64, center_y: f64, radius: f64) -> bool {
        self.quadtree.intersect_circle(center_x, center_y, radius);
        self.select_intersected()
    }

    fn select_intersected(&mut self) -> bool {
        self.query = self.interval.merge(self.quadtree.intersected_cells());
        self.next_interval = 0;
        self.current = None;
        self.query.is_some()
    }

    /// The intervals of the last query, sorted and disjoint.
    pub fn intervals(&self) -> &[Interval] {
        match &self.query {
            Some(query) => &query.intervals,
            None => &[],
        }
    }

    /// Number of points of the cells of the last query.
    pub fn query_full(&self) -> u32 {
        self.query.as_ref().map_or(0, |query| query.full)
    }

    /// Number of points spanned by the intervals of the last query.
    pub fn query_total(&self) -> u32 {
        self.query.as_ref().map_or(0, |query| query.total)
    }

    /// Positions the reader on the next point of the last query.
    ///
    /// `p_count` is the index of the next point the reader would read, it is updated
    /// when the reader is moved. The caller reads one point and increments `p_count`
    /// after each call returning true.
    pub fn seek_next<R: Read + Seek>(
        &mut self,
        reader: &mut PointReader<R>,
        p_count: &mut u64,
    ) -> crate::Result<bool> {
        let current = match self.current {
            Some(current) => current,
            None => {
                let next = match self
                    .query
                    .as_ref()
                    .and_then(|query| query.intervals.get(self.next_interval))
                {
                    Some(next) => *next,
                    None => return Ok(false),
                };
                self.next_interval += 1;
                let start = u64::from(next.start);
                if *p_count != start {
                    reader.seek(*p_count, start)?;
                    *p_count = start;
                }
                self.current = Some(next);
                next
            }
        };
        if *p_count >= u64::from(current.end) {
            self.current = None;
        }
        Ok(true)
    }

    pub fn read_from<R: Read>(src: &mut R) -> crate::Result<Self> {
        let mut signature = [0u8; 4];
        src.read_exact(&mut signature)?;
        if &signature != b"LASX" {
            return Err(LazError::InvalidIndexFile(
                "wrong index signature".to_string(),
            ));
        }
        let _version = src.read_u32::<LittleEndian>()?;
        let mut quadtree = LasQuadtree::read_from(src)?;
        let interval = LasInterval::read_from(src)?;
        for (cell, _) in interval.cells() {
            if quadtree.get_level(cell) > quadtree.levels {
                return Err(LazError::InvalidIndexFile(format!(
                    "cell {} is deeper than the quadtree",
                    cell
                )));
            }
            quadtree.manage_cell(cell);
        }
        Ok(Self {
            quadtree,
            interval,
            query: None,
            next_interval: 0,
            current: None,
        })
    }

    pub fn write_to<W: Write>(&self, dst: &mut W) -> std::io::Result<()> {
        dst.write_all(b"LASX")?;
        dst.write_u32::<LittleEndian>(0)?;
        self.quadtree.write_to(dst)?;
        self.interval.write_to(dst)
    }

    /// Reads the `.lax` file that sits next to the point file.
    pub fn read_from_path<P: AsRef<Path>>(point_file: P) -> crate::Result<Self> {
        let file = File::open(point_file.as_ref().with_extension("lax"))?;
        Self::read_from(&mut BufReader::new(file))
    }

    /// Writes the index as the `.lax` file next to the point file.
    pub fn write_to_path<P: AsRef<Path>>(&self, point_file: P) -> crate::Result<()> {
        let file = File::create(point_file.as_ref().with_extension("lax"))?;
        let mut dst = BufWriter::new(file);
        self.write_to(&mut dst)?;
        dst.flush()?;
        Ok(())
    }
}
