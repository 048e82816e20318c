/*!
 # Default and user data banks

 Both the schedule store and the season calendar carry a read-only default
 bank and a user bank. This module holds the built-in rate plan and the tag
 that says which bank is in effect.
*/

use std::fmt;

use crate::period::{ChangePoint, PeriodKind};
use crate::season::Season;

/// Which bank a store currently reads from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Source {
    /// Built-in rate plan
    #[default]
    Default,
    /// User-defined data
    User,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Default => write!(f, "default"),
            Source::User => write!(f, "user"),
        }
    }
}

/// PG&E time-of-use plan, weekday schedule
const PGE_WORKDAY: &[ChangePoint] = &[
    ChangePoint::new(0, PeriodKind::OffPeak),
    ChangePoint::new(14, PeriodKind::PartialPeak),
    ChangePoint::new(28, PeriodKind::OnPeak),
    ChangePoint::new(42, PeriodKind::PartialPeak),
    ChangePoint::new(44, PeriodKind::OffPeak),
];

/// PG&E time-of-use plan, weekend and holiday schedule
const PGE_HOLIDAY: &[ChangePoint] = &[
    ChangePoint::new(0, PeriodKind::OffPeak),
    ChangePoint::new(30, PeriodKind::OnPeak),
    ChangePoint::new(38, PeriodKind::OffPeak),
];

/// Schedules of the built-in plan, indexed by schedule id
pub const DEFAULT_SCHEDULES: &[&[ChangePoint]] = &[PGE_WORKDAY, PGE_HOLIDAY];

/// Seasons of the built-in plan, in chronological order
pub const DEFAULT_SEASONS: &[Season] = &[
    Season {
        month: 5,
        day: 1,
        workday: 0,
        holiday: 1,
    },
    Season {
        month: 11,
        day: 1,
        workday: 0,
        holiday: 1,
    },
];
