/*!
 # Seasonal calendars

 A season starts on a given month/day and lasts until the next season in
 the list starts. The list is circular: dates before the first start date
 belong to the last season of the year.

 To define a holiday, insert a one-day season whose workday schedule is the
 holiday schedule.
*/

use std::fmt;

use tracing::{debug, info, instrument, trace};

use crate::bank::{Source, DEFAULT_SEASONS};
use crate::{Error, Result};

/// Capacity of the user season bank
pub const USER_SEASONS: usize = 64;

/// Days in months, non-leap
pub const DAYS_IN_MONTH: [u8; 12] = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];

/// Length of `month` (1-12) in the fixed calendar
pub fn days_in_month(month: u8) -> Option<u8> {
    DAYS_IN_MONTH.get(usize::from(month).checked_sub(1)?).copied()
}

/// Whether a 1-7 day of week (1 == Monday) is a weekend/holiday day
pub fn is_holiday(day_of_week: u8) -> bool {
    day_of_week > 5
}

/// A season specification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Season {
    /// Start month (1-12)
    pub month: u8,
    /// Start day (1-31)
    pub day: u8,
    /// Schedule id for workdays (Monday to Friday)
    pub workday: u8,
    /// Schedule id for weekends and holidays
    pub holiday: u8,
}

impl Season {
    /// Creates a season, validating the start date against the fixed month table
    pub fn new(month: u8, day: u8, workday: u8, holiday: u8) -> Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(Error::ValueOutOfRange("month", month.into(), 1, 12));
        }
        match days_in_month(month) {
            Some(len) if (1..=len).contains(&day) => Ok(Self {
                month,
                day,
                workday,
                holiday,
            }),
            _ => Err(Error::InvalidDate(month, day)),
        }
    }

    /// Whether the start date is a real date in the fixed calendar
    pub fn has_valid_date(&self) -> bool {
        days_in_month(self.month).is_some_and(|len| (1..=len).contains(&self.day))
    }

    /// Whether this season starts after `month`/`day`
    pub fn starts_after(&self, month: u8, day: u8) -> bool {
        (self.month, self.day) > (month, day)
    }

    /// Schedule id to use on `day_of_week`
    pub fn schedule_for(&self, day_of_week: u8) -> u8 {
        if is_holiday(day_of_week) {
            self.holiday
        } else {
            self.workday
        }
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}/{:02}", self.month, self.day)
    }
}

/// Ordered, circular list of seasons from either the default or the user bank
#[derive(Debug, Clone)]
pub struct SeasonCalendar {
    user: [Option<Season>; USER_SEASONS],
    source: Source,
}

impl Default for SeasonCalendar {
    fn default() -> Self {
        Self::new()
    }
}

impl SeasonCalendar {
    /// Creates a calendar with an empty user bank, so the built-in seasons are used
    pub fn new() -> Self {
        Self {
            user: [None; USER_SEASONS],
            source: Source::Default,
        }
    }

    /// Creates a calendar from restored user data
    pub fn with_user(user: [Option<Season>; USER_SEASONS]) -> Self {
        let mut calendar = Self::new();
        calendar.user = user;
        calendar.refresh_source();
        calendar
    }

    /// Bank currently in effect
    pub fn source(&self) -> Source {
        self.source
    }

    /// The raw user bank, including undefined slots
    pub fn user_bank(&self) -> &[Option<Season>; USER_SEASONS] {
        &self.user
    }

    /// Seasons of the bank in effect, up to the first undefined user slot
    pub fn seasons(&self) -> Vec<Season> {
        self.seasons_in(self.source)
    }

    /// Seasons of the given bank, whether or not it is in effect
    pub fn seasons_in(&self, bank: Source) -> Vec<Season> {
        match bank {
            Source::Default => DEFAULT_SEASONS.to_vec(),
            Source::User => self.user.iter().map_while(|season| *season).collect(),
        }
    }

    /// Writes user season `id`.
    ///
    /// Seasons must use consecutive ids and be given in chronological order.
    /// Defining season #0 switches the calendar to the user bank.
    #[instrument(skip(self))]
    pub fn define_season(
        &mut self,
        id: u8,
        month: u8,
        day: u8,
        workday: u8,
        holiday: u8,
    ) -> Result<()> {
        let index = usize::from(id);
        if index >= USER_SEASONS {
            return Err(Error::IdOutOfRange("Season", id, (USER_SEASONS - 1) as u8));
        }

        let season = Season::new(month, day, workday, holiday)?;
        self.user[index] = Some(season);
        debug!("Defined season #{} starting {}", id, season);

        self.refresh_source();
        Ok(())
    }

    /// Discards all user seasons; the built-in ones are used from now on
    #[instrument(skip(self))]
    pub fn reset_to_defaults(&mut self) {
        self.user = [None; USER_SEASONS];
        self.refresh_source();
    }

    /// Finds the season in effect on `month`/`day`: the last one starting on
    /// or before that date, or the last one of the list when the date is
    /// before every start date.
    pub fn find_season(&self, month: u8, day: u8) -> Option<Season> {
        let mut active = None;
        let mut last = None;

        for season in self.active_iter() {
            last = Some(season);
            if !season.starts_after(month, day) {
                active = Some(season);
            } else if active.is_some() {
                break;
            }
        }

        active.or(last)
    }

    /// Finds the id of the schedule in effect on the given date
    pub fn find_schedule_index(&self, month: u8, day: u8, day_of_week: u8) -> Result<u8> {
        let season = self.find_season(month, day).ok_or(Error::EmptyCalendar)?;
        let id = season.schedule_for(day_of_week);
        trace!(
            "{:02}/{:02} day {} falls in season {}, schedule #{}",
            month,
            day,
            day_of_week,
            season,
            id
        );
        Ok(id)
    }

    fn active_iter(&self) -> Box<dyn Iterator<Item = Season> + '_> {
        match self.source {
            Source::Default => Box::new(DEFAULT_SEASONS.iter().copied()),
            Source::User => Box::new(self.user.iter().map_while(|season| *season)),
        }
    }

    fn refresh_source(&mut self) {
        let source = match self.user[0] {
            Some(season) if (1..=12).contains(&season.month) => Source::User,
            _ => Source::Default,
        };

        if source != self.source {
            info!("Season bank switched to {}", source);
            self.source = source;
        }
    }
}
