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


//! Spatial indexing of point files (`.lax`).

mod interval;
mod lasindex;
mod quadtree;

pub use interval::{Interval, IntervalCell, LasInterval, DEFAULT_THRESHOLD};
pub use lasindex::{LasIndex, DEFAULT_MAXIMUM_INTERVALS, DEFAULT_MINIMUM_POINTS};
pub use quadtree::{LasQuadtree, MAX_LEVELS, QUADTREE_TYPE};
