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


//! Quadtree subdivision of the plane used by the spatial index.
//!
//! A cell is identified by its level and its index in that level,
//! both packed in a single cell index: `level_offset[level] + level_index`.

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::errors::LazError;

pub const QUADTREE_TYPE: u32 = 0;

/// Number of levels whose cell indices fit in a `u32`.
pub const MAX_LEVELS: u32 = 15;

const LEVEL_OFFSET_COUNT: usize = 24;

#[inline]
fn quantize_u32(n: f32) -> u32 {
    if n >= 0.0 {
        (n + 0.5) as u32
    } else {
        0
    }
}

/// Snaps `value` on the `cell_size` grid, towards -infinity when `up` is false.
fn snap(value: f64, cell_size: f32, up: bool) -> f32 {
    let cells = (value / f64::from(cell_size)) as i32;
    let cells = match (value >= 0.0, up) {
        (true, true) => cells + 1,
        (false, false) => cells - 1,
        _ => cells,
    };
    cell_size * cells as f32
}

#[derive(Debug, Copy, Clone, PartialEq)]
struct CellBounds {
    min_x: f32,
    max_x: f32,
    min_y: f32,
    max_y: f32,
}

impl CellBounds {
    fn mid(&self) -> (f32, f32) {
        ((self.min_x + self.max_x) / 2.0, (self.min_y + self.max_y) / 2.0)
    }

    /// Bounds of the child `quadrant` (bit 1: upper x half, bit 2: upper y half).
    fn child(&self, quadrant: u32) -> Self {
        let (mid_x, mid_y) = self.mid();
        let mut child = *self;
        if quadrant & 1 != 0 {
            child.min_x = mid_x;
        } else {
            child.max_x = mid_x;
        }
        if quadrant & 2 != 0 {
            child.min_y = mid_y;
        } else {
            child.max_y = mid_y;
        }
        child
    }
}

/// Query area, with its bounding box.
#[derive(Copy, Clone)]
enum Area {
    Rectangle {
        min_x: f64,
        min_y: f64,
        max_x: f64,
        max_y: f64,
    },
    Circle {
        center_x: f64,
        center_y: f64,
        radius: f64,
    },
}

impl Area {
    fn bounds(&self) -> (f64, f64, f64, f64) {
        match *self {
            Area::Rectangle {
                min_x,
                min_y,
                max_x,
                max_y,
            } => (min_x, min_y, max_x, max_y),
            Area::Circle {
                center_x,
                center_y,
                radius,
            } => (
                center_x - radius,
                center_y - radius,
                center_x + radius,
                center_y + radius,
            ),
        }
    }

    /// Final test of a leaf cell, the bounding box test was already passed.
    fn touches(&self, cell: &CellBounds) -> bool {
        match *self {
            Area::Rectangle { .. } => true,
            Area::Circle {
                center_x,
                center_y,
                radius,
            } => circle_intersects_rectangle(center_x, center_y, radius, cell),
        }
    }
}

fn circle_intersects_rectangle(center_x: f64, center_y: f64, radius: f64, r: &CellBounds) -> bool {
    let (min_x, max_x) = (f64::from(r.min_x), f64::from(r.max_x));
    let (min_y, max_y) = (f64::from(r.min_y), f64::from(r.max_y));
    let radius_squared = radius * radius;

    let diff_x = if max_x < center_x {
        Some(center_x - max_x)
    } else if min_x > center_x {
        Some(min_x - center_x)
    } else {
        None
    };
    let diff_y = if max_y < center_y {
        Some(center_y - max_y)
    } else if min_y > center_y {
        Some(min_y - center_y)
    } else {
        None
    };

    match (diff_x, diff_y) {
        (Some(dx), Some(dy)) => dx * dx + dy * dy < radius_squared,
        (Some(d), None) | (None, Some(d)) => d < radius,
        // the rectangle contains the center
        (None, None) => true,
    }
}

/// The quadtree, its bounding box is a square of `2^levels` cells per side.
#[derive(Debug, Clone, PartialEq)]
pub struct LasQuadtree {
    pub levels: u32,
    pub cell_size: f32,
    pub min_x: f32,
    pub max_x: f32,
    pub min_y: f32,
    pub max_y: f32,
    pub cells_x: u32,
    pub cells_y: u32,

    level_offset: [u32; LEVEL_OFFSET_COUNT],
    /// One bit per cell index, set when the cell is subdivided
    adaptive: Vec<u32>,
    current_cells: Vec<u32>,
}

impl LasQuadtree {
    /// Creates the quadtree covering the bounding box with cells of `cell_size`.
    pub fn setup(
        bb_min_x: f64,
        bb_max_x: f64,
        bb_min_y: f64,
        bb_max_y: f64,
        cell_size: f32,
    ) -> crate::Result<Self> {
        let mut min_x = snap(bb_min_x, cell_size, false);
        let mut max_x = snap(bb_max_x, cell_size, true);
        let mut min_y = snap(bb_min_y, cell_size, false);
        let mut max_y = snap(bb_max_y, cell_size, true);

        let cells_x = quantize_u32((max_x - min_x) / cell_size);
        let cells_y = quantize_u32((max_y - min_y) / cell_size);
        if cells_x == 0 || cells_y == 0 {
            return Err(LazError::InvalidQuadtree);
        }

        let mut c = cells_x.max(cells_y) - 1;
        let mut levels = 0;
        while c != 0 {
            c >>= 1;
            levels += 1;
        }
        if levels > MAX_LEVELS {
            return Err(LazError::InvalidQuadtree);
        }

        // pad to the size of the quadtree
        let pad = |cells: u32| {
            let c = (1u32 << levels) - cells;
            let above = c / 2;
            (c - above, above)
        };
        let (below, above) = pad(cells_x);
        min_x -= below as f32 * cell_size;
        max_x += above as f32 * cell_size;
        let (below, above) = pad(cells_y);
        min_y -= below as f32 * cell_size;
        max_y += above as f32 * cell_size;

        Ok(Self {
            levels,
            cell_size,
            min_x,
            max_x,
            min_y,
            max_y,
            cells_x,
            cells_y,
            level_offset: Self::level_offsets(),
            adaptive: vec![],
            current_cells: vec![],
        })
    }

    fn level_offsets() -> [u32; LEVEL_OFFSET_COUNT] {
        let mut level_offset = [0u32; LEVEL_OFFSET_COUNT];
        for l in 0..LEVEL_OFFSET_COUNT - 1 {
            // only the first MAX_LEVELS + 1 entries are ever used, the others wrap
            let cells = 1u32.checked_shl(2 * l as u32).unwrap_or(0);
            level_offset[l + 1] = level_offset[l].wrapping_add(cells);
        }
        level_offset
    }

    fn root(&self) -> CellBounds {
        CellBounds {
            min_x: self.min_x,
            max_x: self.max_x,
            min_y: self.min_y,
            max_y: self.max_y,
        }
    }

    pub fn inside(&self, x: f64, y: f64) -> bool {
        f64::from(self.min_x) <= x
            && x < f64::from(self.max_x)
            && f64::from(self.min_y) <= y
            && y < f64::from(self.max_y)
    }

    /// Index, within its level, of the cell containing the point.
    pub fn get_level_index(&self, x: f64, y: f64, level: u32) -> u32 {
        let mut cell = self.root();
        let mut level_index = 0;
        for _ in 0..level {
            level_index <<= 2;
            let (mid_x, mid_y) = cell.mid();
            let mut quadrant = 0;
            if x >= f64::from(mid_x) {
                quadrant |= 1;
            }
            if y >= f64::from(mid_y) {
                quadrant |= 2;
            }
            cell = cell.child(quadrant);
            level_index |= quadrant;
        }
        level_index
    }

    /// Cell index of the finest cell containing the point.
    pub fn get_cell_index(&self, x: f64, y: f64) -> u32 {
        self.get_cell_index_at(x, y, self.levels)
    }

    pub fn get_cell_index_at(&self, x: f64, y: f64, level: u32) -> u32 {
        self.cell_index_of(self.get_level_index(x, y, level), level)
    }

    pub fn get_level(&self, cell_index: u32) -> u32 {
        let mut level = 0;
        while level + 1 < LEVEL_OFFSET_COUNT && cell_index >= self.level_offset[level + 1] {
            level += 1;
        }
        level as u32
    }

    pub fn get_level_index_of(&self, cell_index: u32, level: u32) -> u32 {
        cell_index - self.level_offset[level as usize]
    }

    pub fn cell_index_of(&self, level_index: u32, level: u32) -> u32 {
        self.level_offset[level as usize] + level_index
    }

    /// Bounding box `(min_x, min_y, max_x, max_y)` of a cell given by level.
    pub fn get_cell_bounding_box(&self, level_index: u32, level: u32) -> (f32, f32, f32, f32) {
        let mut cell = self.root();
        for l in (0..level).rev() {
            cell = cell.child((level_index >> (2 * l)) & 3);
        }
        (cell.min_x, cell.min_y, cell.max_x, cell.max_y)
    }

    pub fn cell_bounding_box(&self, cell_index: u32) -> (f32, f32, f32, f32) {
        let level = self.get_level(cell_index);
        self.get_cell_bounding_box(self.get_level_index_of(cell_index, level), level)
    }

    /// The parent of the cell, and the four children of that parent
    /// (the cell and its siblings). `None` for the root.
    pub fn coarsen(&self, cell_index: u32) -> Option<(u32, [u32; 4])> {
        let level = self.get_level(cell_index);
        if level == 0 {
            return None;
        }
        let parent_level_index = self.get_level_index_of(cell_index, level) >> 2;
        let first_child = parent_level_index << 2;
        Some((
            self.cell_index_of(parent_level_index, level - 1),
            [
                self.cell_index_of(first_child, level),
                self.cell_index_of(first_child + 1, level),
                self.cell_index_of(first_child + 2, level),
                self.cell_index_of(first_child + 3, level),
            ],
        ))
    }

    fn is_subdivided(&self, cell_index: u32) -> bool {
        let pos = (cell_index / 32) as usize;
        let bit = 1u32 << (cell_index % 32);
        self.adaptive.get(pos).map_or(false, |word| word & bit != 0)
    }

    /// Declares the cell as a leaf that exists, its ancestors become subdivided.
    ///
    /// Once a cell is managed, queries only return managed cells.
    pub fn manage_cell(&mut self, cell_index: u32) {
        let pos = (cell_index / 32) as usize;
        if pos >= self.adaptive.len() {
            self.adaptive.resize((pos + 1).max(self.adaptive.len() * 2), 0);
        }
        self.adaptive[pos] &= !(1u32 << (cell_index % 32));

        let mut level = self.get_level(cell_index);
        let mut level_index = self.get_level_index_of(cell_index, level);
        while level > 0 {
            level -= 1;
            level_index >>= 2;
            let index = self.cell_index_of(level_index, level);
            let pos = (index / 32) as usize;
            let bit = 1u32 << (index % 32);
            if self.adaptive[pos] & bit != 0 {
                break;
            }
            self.adaptive[pos] |= bit;
        }
    }

    pub fn is_adaptive(&self) -> bool {
        !self.adaptive.is_empty()
    }

    /// Cells intersecting the rectangle, returns how many there are.
    pub fn intersect_rectangle(&mut self, r_min_x: f64, r_min_y: f64, r_max_x: f64, r_max_y: f64) -> usize {
        self.intersect(Area::Rectangle {
            min_x: r_min_x,
            min_y: r_min_y,
            max_x: r_max_x,
            max_y: r_max_y,
        })
    }

    /// Cells intersecting the square tile of lower left corner `(ll_x, ll_y)`.
    pub fn intersect_tile(&mut self, ll_x: f32, ll_y: f32, size: f32) -> usize {
        self.intersect(Area::Rectangle {
            min_x: f64::from(ll_x),
            min_y: f64::from(ll_y),
            max_x: f64::from(ll_x + size),
            max_y: f64::from(ll_y + size),
        })
    }

    pub fn intersect_circle(&mut self, center_x: f64, center_y: f64, radius: f64) -> usize {
        self.intersect(Area::Circle {
            center_x,
            center_y,
            radius,
        })
    }

    /// Cell indices found by the last intersection.
    pub fn intersected_cells(&self) -> &[u32] {
        &self.current_cells
    }

    fn intersect(&mut self, area: Area) -> usize {
        let mut cells = std::mem::take(&mut self.current_cells);
        cells.clear();
        let (r_min_x, r_min_y, r_max_x, r_max_y) = area.bounds();
        let rejected = r_max_x <= f64::from(self.min_x)
            || !(r_min_x <= f64::from(self.max_x))
            || r_max_y <= f64::from(self.min_y)
            || !(r_min_y <= f64::from(self.max_y));
        if !rejected {
            self.intersect_with_cells(&area, self.root(), 0, 0, &mut cells);
        }
        self.current_cells = cells;
        self.current_cells.len()
    }

    fn intersect_with_cells(
        &self,
        area: &Area,
        cell: CellBounds,
        level: u32,
        level_index: u32,
        found: &mut Vec<u32>,
    ) {
        let cell_index = self.cell_index_of(level_index, level);
        let descend = if self.is_adaptive() {
            level < self.levels && self.is_subdivided(cell_index)
        } else {
            level < self.levels
        };
        if !descend {
            if area.touches(&cell) {
                found.push(cell_index);
            }
            return;
        }

        let (r_min_x, r_min_y, r_max_x, r_max_y) = area.bounds();
        let (mid_x, mid_y) = cell.mid();
        let (mid_x, mid_y) = (f64::from(mid_x), f64::from(mid_y));
        let x_halves: &[u32] = if r_max_x <= mid_x {
            &[0]
        } else if !(r_min_x < mid_x) {
            &[1]
        } else {
            &[0, 1]
        };
        let y_halves: &[u32] = if r_max_y <= mid_y {
            &[0]
        } else if !(r_min_y < mid_y) {
            &[2]
        } else {
            &[0, 2]
        };
        for y in y_halves {
            for x in x_halves {
                let quadrant = x | y;
                self.intersect_with_cells(
                    area,
                    cell.child(quadrant),
                    level + 1,
                    (level_index << 2) | quadrant,
                    found,
                );
            }
        }
    }

    pub fn read_from<R: Read>(src: &mut R) -> crate::Result<Self> {
        let mut signature = [0u8; 4];
        src.read_exact(&mut signature)?;
        if &signature != b"LASS" {
            return Err(LazError::InvalidIndexFile(
                "wrong spatial signature".to_string(),
            ));
        }
        let spatial_type = src.read_u32::<LittleEndian>()?;
        if spatial_type != QUADTREE_TYPE {
            return Err(LazError::InvalidIndexFile(format!(
                "unknown spatial type {}",
                spatial_type
            )));
        }
        src.read_exact(&mut signature)?;
        if &signature != b"LASQ" {
            return Err(LazError::InvalidIndexFile(
                "wrong quadtree signature".to_string(),
            ));
        }
        let _version = src.read_u32::<LittleEndian>()?;
        let levels = src.read_u32::<LittleEndian>()?;
        let _level_index = src.read_u32::<LittleEndian>()?;
        let _implicit_levels = src.read_u32::<LittleEndian>()?;
        let min_x = src.read_f32::<LittleEndian>()?;
        let max_x = src.read_f32::<LittleEndian>()?;
        let min_y = src.read_f32::<LittleEndian>()?;
        let max_y = src.read_f32::<LittleEndian>()?;
        if levels > MAX_LEVELS {
            return Err(LazError::InvalidQuadtree);
        }

        let cells = (1u32 << levels) as f32;
        Ok(Self {
            levels,
            cell_size: (max_x - min_x) / cells,
            min_x,
            max_x,
            min_y,
            max_y,
            cells_x: 1 << levels,
            cells_y: 1 << levels,
            level_offset: Self::level_offsets(),
            adaptive: vec![],
            current_cells: vec![],
        })
    }

    pub fn write_to<W: Write>(&self, dst: &mut W) -> std::io::Result<()> {
        dst.write_all(b"LASS")?;
        dst.write_u32::<LittleEndian>(QUADTREE_TYPE)?;
        dst.write_all(b"LASQ")?;
        dst.write_u32::<LittleEndian>(0)?;
        dst.write_u32::<LittleEndian>(self.levels)?;
        dst.write_u32::<LittleEndian>(0)?;
        dst.write_u32::<LittleEndian>(0)?;
        dst.write_f32::<LittleEndian>(self.min_x)?;
        dst.write_f32::<LittleEndian>(self.max_x)?;
        dst.write_f32::<LittleEndian>(self.min_y)?;
        dst.write_f32::<LittleEndian>(self.max_y)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_setup_pads_to_power_of_two() {
        let quadtree = LasQuadtree::setup(10.0, 2500.0, -30.0, 900.0, 1000.0).unwrap();
        // x: [0, 3000] -> 3 cells, y: [-1000, 1000] -> 2 cells
        assert_eq!(quadtree.cells_x, 3);
        assert_eq!(quadtree.cells_y, 2);
        assert_eq!(quadtree.levels, 2);
        assert_eq!(quadtree.min_x, -1000.0);
        assert_eq!(quadtree.max_x, 3000.0);
        assert_eq!(quadtree.min_y, -2000.0);
        assert_eq!(quadtree.max_y, 2000.0);
    }

    #[test]
    fn test_setup_rejects_empty_box() {
        assert!(matches!(
            LasQuadtree::setup(100.0, -100.0, 0.0, 10.0, 1000.0),
            Err(LazError::InvalidQuadtree)
        ));
    }

    #[test]
    fn test_level_offsets_and_conversions() {
        let quadtree = LasQuadtree::setup(0.0, 3999.0, 0.0, 3999.0, 1000.0).unwrap();
        assert_eq!(quadtree.level_offset[..5], [0, 1, 5, 21, 85]);
        assert_eq!(quadtree.get_level(0), 0);
        assert_eq!(quadtree.get_level(4), 1);
        assert_eq!(quadtree.get_level(5), 2);
        assert_eq!(quadtree.get_level_index_of(7, 2), 2);
        assert_eq!(quadtree.cell_index_of(2, 2), 7);

        let (parent, children) = quadtree.coarsen(7).unwrap();
        assert_eq!(parent, 1);
        assert_eq!(children, [5, 6, 7, 8]);
        assert!(quadtree.coarsen(0).is_none());
    }

    #[test]
    fn test_circle_and_rectangle_queries() {
        let mut quadtree = LasQuadtree::setup(0.0, 3999.0, 0.0, 3999.0, 1000.0).unwrap();
        assert_eq!(quadtree.levels, 2);
        assert_eq!(quadtree.intersect_rectangle(-10.0, -10.0, -5.0, -5.0), 0);
        assert_eq!(quadtree.intersect_rectangle(0.0, 0.0, 999.0, 999.0), 1);
        assert_eq!(quadtree.intersect_rectangle(100.0, 100.0, 1100.0, 1100.0), 4);

        // the circle does not reach the diagonal cell
        let n = quadtree.intersect_circle(985.0, 985.0, 20.0);
        assert_eq!(n, 3);
        let n = quadtree.intersect_circle(990.0, 990.0, 20.0);
        assert_eq!(n, 4);
        let n = quadtree.intersect_circle(500.0, 500.0, 100.0);
        assert_eq!(n, 1);
        let cell = quadtree.intersected_cells()[0];
        assert_eq!(cell, quadtree.get_cell_index(500.0, 500.0));
    }

    #[test]
    fn test_adaptive_queries_stop_at_managed_cells() {
        let mut quadtree = LasQuadtree::setup(0.0, 3999.0, 0.0, 3999.0, 1000.0).unwrap();
        let coarse = quadtree.get_cell_index_at(100.0, 100.0, 1);
        let fine = quadtree.get_cell_index(3900.0, 3900.0);
        quadtree.manage_cell(coarse);
        quadtree.manage_cell(fine);
        assert!(quadtree.is_adaptive());

        assert_eq!(quadtree.intersect_rectangle(10.0, 10.0, 20.0, 20.0), 1);
        assert_eq!(quadtree.intersected_cells(), &[coarse]);
        assert_eq!(quadtree.intersect_rectangle(3850.0, 3850.0, 3950.0, 3950.0), 1);
        assert_eq!(quadtree.intersected_cells(), &[fine]);
    }

    #[test]
    fn test_lax_layout_round_trip() {
        let quadtree = LasQuadtree::setup(-5.0, 7000.0, 20.0, 500.0, 100.0).unwrap();
        let mut data = vec![];
        quadtree.write_to(&mut data).unwrap();
        assert_eq!(data.len(), 44);
        assert_eq!(&data[0..4], b"LASS");
        assert_eq!(&data[8..12], b"LASQ");
        let read = LasQuadtree::read_from(&mut data.as_slice()).unwrap();
        assert_eq!(read.levels, quadtree.levels);
        assert_eq!(read.min_x, quadtree.min_x);
        assert_eq!(read.max_y, quadtree.max_y);
        assert_eq!(read.get_cell_index(12.0, 40.0), quadtree.get_cell_index(12.0, 40.0));
    }

    proptest! {
        #[test]
        fn cell_contains_its_points(x in -5000.0f64..5000.0, y in -5000.0f64..5000.0) {
            let quadtree = LasQuadtree::setup(-5000.0, 5000.0, -5000.0, 5000.0, 100.0).unwrap();
            prop_assert!(quadtree.inside(x, y));
            let cell = quadtree.get_cell_index(x, y);
            prop_assert_eq!(cell, quadtree.get_cell_index(x, y));
            let (min_x, min_y, max_x, max_y) = quadtree.cell_bounding_box(cell);
            prop_assert!(f64::from(min_x) <= x && x < f64::from(max_x));
            prop_assert!(f64::from(min_y) <= y && y < f64::from(max_y));
        }
    }
}
