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


//! Per cell lists of point index intervals.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap};
use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::errors::LazError;

pub const DEFAULT_THRESHOLD: u32 = 1000;

/// Inclusive range of point indices.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Interval {
    pub start: u32,
    pub end: u32,
}

impl Interval {
    fn new(index: u32) -> Self {
        Self {
            start: index,
            end: index,
        }
    }

    fn len(&self) -> u32 {
        self.end - self.start + 1
    }
}

/// The intervals of one cell.
///
/// `full` is the number of points of the cell,
/// `total` the number of points spanned by its intervals.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct IntervalCell {
    pub intervals: Vec<Interval>,
    pub full: u32,
    pub total: u32,
}

impl IntervalCell {
    fn starting_at(index: u32) -> Self {
        Self {
            intervals: vec![Interval::new(index)],
            full: 1,
            total: 1,
        }
    }

    /// Returns true if a new interval was created.
    fn add(&mut self, index: u32, threshold: u32) -> bool {
        self.full += 1;
        let last = match self.intervals.last_mut() {
            Some(last) => last,
            None => {
                self.intervals.push(Interval::new(index));
                self.total += 1;
                return true;
            }
        };
        // indices are added in increasing order
        let diff = index.saturating_sub(last.end);
        if diff > threshold {
            self.intervals.push(Interval::new(index));
            self.total += 1;
            true
        } else {
            last.end = last.end.max(index);
            self.total += diff;
            false
        }
    }

    fn recompute_total(&mut self) {
        self.total = self.intervals.iter().map(Interval::len).sum();
    }

    /// Merges the intervals of several cells into one sorted list,
    /// intervals separated by at most `threshold` indices are joined.
    ///
    /// Also returns how many intervals disappeared in the process.
    fn merged<'a, I>(cells: I, threshold: u32) -> (Self, u32)
    where
        I: IntoIterator<Item = &'a IntervalCell>,
    {
        let mut full = 0;
        let mut all_intervals = vec![];
        for cell in cells {
            full += cell.full;
            all_intervals.extend_from_slice(&cell.intervals);
        }
        all_intervals.sort_by_key(|interval| interval.start);

        let mut merged = IntervalCell {
            intervals: Vec::with_capacity(all_intervals.len()),
            full,
            total: 0,
        };
        let mut removed = 0;
        for interval in all_intervals {
            match merged.intervals.last_mut() {
                Some(last) if interval.start <= last.end || interval.start - last.end <= threshold => {
                    if interval.end > last.end {
                        merged.total += interval.end - last.end;
                        last.end = interval.end;
                    }
                    removed += 1;
                }
                _ => {
                    merged.total += interval.len();
                    merged.intervals.push(interval);
                }
            }
        }
        (merged, removed)
    }
}

/// Intervals of point indices of each cell of the quadtree.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct LasInterval {
    threshold: u32,
    cells: BTreeMap<u32, IntervalCell>,
    number_intervals: u32,
}

impl LasInterval {
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold,
            cells: BTreeMap::new(),
            number_intervals: 0,
        }
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Adds the point `point_index` to the cell, returns true if a new interval was created.
    ///
    /// For each cell, the point indices must be given in increasing order.
    pub fn add(&mut self, point_index: u32, cell_index: u32) -> bool {
        let threshold = self.threshold;
        let created = match self.cells.get_mut(&cell_index) {
            Some(cell) => cell.add(point_index, threshold),
            None => {
                self.cells
                    .insert(cell_index, IntervalCell::starting_at(point_index));
                true
            }
        };
        if created {
            self.number_intervals += 1;
        }
        created
    }

    pub fn number_cells(&self) -> u32 {
        self.cells.len() as u32
    }

    pub fn number_intervals(&self) -> u32 {
        self.number_intervals
    }

    pub fn cells(&self) -> impl Iterator<Item = (u32, &IntervalCell)> {
        self.cells.iter().map(|(index, cell)| (*index, cell))
    }

    pub fn cell(&self, cell_index: u32) -> Option<&IntervalCell> {
        self.cells.get(&cell_index)
    }

    /// Replaces the cells by one cell holding all their intervals.
    ///
    /// Returns false if none of the cells exist.
    pub fn merge_cells(&mut self, indices: &[u32], new_index: u32) -> bool {
        let removed_cells: Vec<IntervalCell> = indices
            .iter()
            .filter_map(|index| self.cells.remove(index))
            .collect();
        if removed_cells.is_empty() {
            return false;
        }
        let (merged, removed) = IntervalCell::merged(&removed_cells, self.threshold);
        self.number_intervals -= removed;
        self.cells.insert(new_index, merged);
        true
    }

    /// Joins the intervals separated by the smallest gaps until at most
    /// `maximum_intervals` remain in addition to the first interval of each cell.
    ///
    /// Returns the largest gap that was closed.
    pub fn merge_intervals(&mut self, maximum_intervals: u32) -> Option<u32> {
        let maximum_intervals = maximum_intervals.saturating_sub(self.number_cells());

        // a gap is identified by its cell and the interval it follows
        let mut gaps = BinaryHeap::new();
        let mut sequence = 0u64;
        for (cell_index, cell) in &self.cells {
            for (i, pair) in cell.intervals.windows(2).enumerate() {
                let gap = pair[1].start - pair[0].end - 1;
                gaps.push(Reverse((gap, sequence, *cell_index, i)));
                sequence += 1;
            }
        }
        let mut size = gaps.len() as u32;
        if size <= maximum_intervals {
            return None;
        }

        // intervals are linked so that joining does not move the others
        let mut links: BTreeMap<u32, Vec<Option<usize>>> = self
            .cells
            .iter()
            .map(|(index, cell)| {
                let n = cell.intervals.len();
                let next = (0..n).map(|i| if i + 1 < n { Some(i + 1) } else { None });
                (*index, next.collect())
            })
            .collect();
        let mut largest_gap = None;

        while size > maximum_intervals {
            let Reverse((gap, _, cell_index, i)) = match gaps.pop() {
                Some(entry) => entry,
                None => break,
            };
            let (cell, next) = match (self.cells.get_mut(&cell_index), links.get_mut(&cell_index)) {
                (Some(cell), Some(next)) => (cell, next),
                _ => continue,
            };
            // the interval was joined into the one before it
            let j = match next[i] {
                Some(j) if cell.intervals[i].start <= cell.intervals[i].end => j,
                _ => continue,
            };
            cell.intervals[i].end = cell.intervals[j].end;
            next[i] = next[j];
            // mark as dead
            cell.intervals[j] = Interval { start: 1, end: 0 };
            next[j] = None;
            if let Some(k) = next[i] {
                let gap = cell.intervals[k].start - cell.intervals[i].end - 1;
                gaps.push(Reverse((gap, sequence, cell_index, i)));
                sequence += 1;
            }
            self.number_intervals -= 1;
            largest_gap = Some(gap);
            size -= 1;
        }

        for cell in self.cells.values_mut() {
            cell.intervals
                .retain(|interval| interval.start <= interval.end);
            cell.recompute_total();
        }
        largest_gap
    }

    /// The merged intervals of the given cells, `None` if none of them exist.
    pub fn merge(&self, cell_indices: &[u32]) -> Option<IntervalCell> {
        let mut found = cell_indices
            .iter()
            .filter_map(|index| self.cells.get(index))
            .peekable();
        found.peek()?;
        Some(IntervalCell::merged(found, self.threshold).0)
    }

    pub fn read_from<R: Read>(src: &mut R) -> crate::Result<Self> {
        let mut signature = [0u8; 4];
        src.read_exact(&mut signature)?;
        if &signature != b"LASV" {
            return Err(LazError::InvalidIndexFile(
                "wrong interval signature".to_string(),
            ));
        }
        let _version = src.read_u32::<LittleEndian>()?;
        let number_cells = src.read_u32::<LittleEndian>()?;

        let mut interval = LasInterval::new(DEFAULT_THRESHOLD);
        for _ in 0..number_cells {
            let cell_index = src.read_i32::<LittleEndian>()?;
            let number_intervals = src.read_u32::<LittleEndian>()?;
            let number_points = src.read_u32::<LittleEndian>()?;
            let mut cell = IntervalCell {
                intervals: Vec::with_capacity(number_intervals.min(1 << 16) as usize),
                full: number_points,
                total: 0,
            };
            for _ in 0..number_intervals {
                let start = src.read_u32::<LittleEndian>()?;
                let end = src.read_u32::<LittleEndian>()?;
                if end < start {
                    return Err(LazError::InvalidIndexFile(format!(
                        "interval [{}, {}] of cell {} is reversed",
                        start, end, cell_index
                    )));
                }
                cell.intervals.push(Interval { start, end });
            }
            cell.recompute_total();
            interval.number_intervals += number_intervals;
            interval.cells.insert(cell_index as u32, cell);
        }
        Ok(interval)
    }

    pub fn write_to<W: Write>(&self, dst: &mut W) -> std::io::Result<()> {
        dst.write_all(b"LASV")?;
        dst.write_u32::<LittleEndian>(0)?;
        dst.write_u32::<LittleEndian>(self.number_cells())?;
        for (cell_index, cell) in &self.cells {
            dst.write_i32::<LittleEndian>(*cell_index as i32)?;
            dst.write_u32::<LittleEndian>(cell.intervals.len() as u32)?;
            dst.write_u32::<LittleEndian>(cell.full)?;
            for interval in &cell.intervals {
                dst.write_u32::<LittleEndian>(interval.start)?;
                dst.write_u32::<LittleEndian>(interval.end)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn spans(cell: &IntervalCell) -> Vec<(u32, u32)> {
        cell.intervals.iter().map(|i| (i.start, i.end)).collect()
    }

    #[test]
    fn test_add_splits_on_large_gaps() {
        let mut interval = LasInterval::new(10);
        for index in &[0, 1, 5, 30, 31, 100] {
            interval.add(*index, 7);
        }
        interval.add(2, 3);

        assert_eq!(interval.number_cells(), 2);
        assert_eq!(interval.number_intervals(), 4);
        let cell = interval.cell(7).unwrap();
        assert_eq!(spans(cell), vec![(0, 5), (30, 31), (100, 100)]);
        assert_eq!(cell.full, 6);
        assert_eq!(cell.total, 9);
    }

    #[test]
    fn test_merge_cells() {
        let mut interval = LasInterval::new(10);
        for index in 0..5 {
            interval.add(index, 1);
        }
        for index in 8..12 {
            interval.add(index, 2);
        }
        interval.add(500, 3);

        assert!(interval.merge_cells(&[1, 2, 3, 4], 0));
        assert!(!interval.merge_cells(&[42], 43));
        assert_eq!(interval.number_cells(), 1);
        assert_eq!(interval.number_intervals(), 2);
        let cell = interval.cell(0).unwrap();
        assert_eq!(spans(cell), vec![(0, 11), (500, 500)]);
        assert_eq!(cell.full, 10);
        assert_eq!(cell.total, 13);
    }

    #[test]
    fn test_merge_intervals_closes_smallest_gaps() {
        let mut interval = LasInterval::new(1);
        for index in &[0, 10, 12, 50, 51, 200] {
            interval.add(*index, 1);
        }
        interval.add(5, 2);
        interval.add(400, 2);
        assert_eq!(interval.number_intervals(), 7);

        // one interval per cell, plus two
        let largest = interval.merge_intervals(4);
        assert_eq!(interval.number_intervals(), 4);
        assert_eq!(largest, Some(37));
        assert_eq!(spans(interval.cell(1).unwrap()), vec![(0, 51), (200, 200)]);
        assert_eq!(spans(interval.cell(2).unwrap()), vec![(5, 5), (400, 400)]);
        assert_eq!(interval.cell(1).unwrap().total, 53);
    }

    #[test]
    fn test_query_merge() {
        let mut interval = LasInterval::new(3);
        for index in &[0, 1, 20] {
            interval.add(*index, 1);
        }
        for index in &[4, 5, 40] {
            interval.add(*index, 2);
        }
        assert!(interval.merge(&[9]).is_none());
        let merged = interval.merge(&[1, 2, 9]).unwrap();
        assert_eq!(spans(&merged), vec![(0, 5), (20, 20), (40, 40)]);
        assert_eq!(merged.full, 6);
        // the cells are untouched
        assert_eq!(interval.number_cells(), 2);
    }

    #[test]
    fn test_lax_layout_round_trip() {
        let mut interval = LasInterval::new(2);
        for index in &[3, 4, 9, 10] {
            interval.add(*index, 21);
        }
        interval.add(0, 5);
        let mut data = vec![];
        interval.write_to(&mut data).unwrap();
        assert_eq!(&data[0..4], b"LASV");
        assert_eq!(data.len(), 12 + 2 * 12 + 3 * 8);

        let read = LasInterval::read_from(&mut data.as_slice()).unwrap();
        assert_eq!(read.number_intervals(), 3);
        assert_eq!(read.cell(21), interval.cell(21));
        assert_eq!(read.cell(5), interval.cell(5));
    }
}
