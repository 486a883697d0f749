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


//! Injected verbosity of the messages emitted through the `log` facade.

use log::{Level, LevelFilter};

pub(crate) const LOG_TARGET: &str = "lazcodec";

/// Decides which of the messages of a reader or an index get logged.
///
/// Nothing is logged by default.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Diagnostics {
    pub level: LevelFilter,
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self {
            level: LevelFilter::Off,
        }
    }
}

impl Diagnostics {
    pub fn new(level: LevelFilter) -> Self {
        Self { level }
    }

    pub fn enabled(&self, level: Level) -> bool {
        level <= self.level
    }
}

/// Logs with the crate target, only when the diagnostics allow the level.
macro_rules! diag {
    ($diag:expr, $lvl:expr, $($arg:tt)+) => {
        if $diag.enabled($lvl) {
            log::log!(target: $crate::diagnostics::LOG_TARGET, $lvl, $($arg)+);
        }
    };
}

pub(crate) use diag;

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_default_is_silent() {
        let diagnostics = Diagnostics::default();
        assert!(!diagnostics.enabled(Level::Error));

        let diagnostics = Diagnostics::new(LevelFilter::Warn);
        assert!(diagnostics.enabled(Level::Error));
        assert!(diagnostics.enabled(Level::Warn));
        assert!(!diagnostics.enabled(Level::Debug));
    }
}
