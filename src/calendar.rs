/*!
 # Rate calendar

 The context object that owns both the schedule store and the season
 calendar. Everything the resolver reads lives here, so independent
 configurations can coexist. [`SharedCalendar`] wraps it in a single
 reader/writer lock for hosts where configuration and resolution run on
 different threads.
*/

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use tracing::{error, instrument, warn};

use crate::bank::Source;
use crate::clock::ClockReading;
use crate::period::{PeriodKind, SLOTS_PER_DAY};
use crate::persist::UserImage;
use crate::resolver::{PeriodResolver, Resolution};
use crate::schedule::{Schedule, ScheduleStore};
use crate::season::SeasonCalendar;
use crate::{Error, Result};

/// How serious a calendar finding is
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Warning,
    Error,
}

/// A finding of [`RateCalendar::check`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Issue {
    /// Season start date does not exist
    SeasonDate { season: usize, month: u8, day: u8 },
    /// Season starts before the one listed ahead of it
    SeasonOrder { season: usize },
    /// Season refers to a schedule that is not defined
    UndefinedSchedule {
        season: usize,
        schedule: u8,
        holiday: bool,
    },
    /// Change point time past 23:30
    SlotOutOfRange { schedule: u8, change: usize, time: u8 },
    /// Change point not later than the one before it
    ChangeOrder { schedule: u8, change: usize },
    /// User season defined after an undefined id; never consulted
    IgnoredSeason { season: usize },
    /// Schedule that no season uses
    UnusedSchedule { schedule: u8 },
}

impl Issue {
    pub fn severity(&self) -> Severity {
        match self {
            Issue::IgnoredSeason { .. } | Issue::UnusedSchedule { .. } => Severity::Warning,
            _ => Severity::Error,
        }
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Issue::SeasonDate { season, month, day } => write!(
                f,
                "Season #{} has an invalid date (mm/dd): {:02}/{:02}",
                season, month, day
            ),
            Issue::SeasonOrder { season } => write!(
                f,
                "Seasons #{} & #{} are not in chronological order",
                season,
                season + 1
            ),
            Issue::UndefinedSchedule {
                season,
                schedule,
                holiday,
            } => write!(
                f,
                "Season #{} has an invalid {} schedule ID: {}",
                season,
                if *holiday { "holiday" } else { "workday" },
                schedule
            ),
            Issue::SlotOutOfRange {
                schedule,
                change,
                time,
            } => write!(
                f,
                "Period change #{} in schedule #{} is past the end of the day: slot {}",
                change + 1,
                schedule,
                time
            ),
            Issue::ChangeOrder { schedule, change } => write!(
                f,
                "Period changes #{} & #{} in schedule #{} are not in chronological order",
                change + 1,
                change + 2,
                schedule
            ),
            Issue::IgnoredSeason { season } => write!(
                f,
                "Season #{} follows an undefined season and is ignored",
                season
            ),
            Issue::UnusedSchedule { schedule } => {
                write!(f, "Schedule #{} is not used", schedule)
            }
        }
    }
}

/// Schedules and seasons that together define a rate plan
#[derive(Debug, Clone, Default)]
pub struct RateCalendar {
    schedules: ScheduleStore,
    seasons: SeasonCalendar,
}

impl RateCalendar {
    /// Creates a calendar using the built-in rate plan
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a calendar from restored user banks; each bank falls back to
    /// the built-in one if its entry #0 is undefined
    pub fn from_image(image: UserImage) -> Self {
        Self {
            schedules: ScheduleStore::with_user(image.schedules),
            seasons: SeasonCalendar::with_user(image.seasons),
        }
    }

    /// Snapshot of both user banks, for persisting
    pub fn user_image(&self) -> UserImage {
        UserImage {
            schedules: self.schedules.user_bank().clone(),
            seasons: *self.seasons.user_bank(),
        }
    }

    pub fn schedules(&self) -> &ScheduleStore {
        &self.schedules
    }

    pub fn seasons(&self) -> &SeasonCalendar {
        &self.seasons
    }

    /// See [`ScheduleStore::define_schedule`]
    pub fn define_schedule(&mut self, id: u8, initial: PeriodKind) -> Result<()> {
        self.schedules.define_schedule(id, initial)
    }

    /// See [`ScheduleStore::add_period_change`]
    pub fn add_period_change(
        &mut self,
        id: u8,
        hour: u8,
        minute: u8,
        period: PeriodKind,
    ) -> Result<()> {
        self.schedules.add_period_change(id, hour, minute, period)
    }

    /// Deletes all user schedules. The default ones will be used.
    pub fn delete_schedules(&mut self) {
        self.schedules.reset_to_defaults();
    }

    /// See [`SeasonCalendar::define_season`]
    pub fn define_season(
        &mut self,
        id: u8,
        month: u8,
        day: u8,
        workday: u8,
        holiday: u8,
    ) -> Result<()> {
        self.seasons.define_season(id, month, day, workday, holiday)
    }

    /// Deletes all user seasons. The default ones will be used.
    pub fn delete_seasons(&mut self) {
        self.seasons.reset_to_defaults();
    }

    /// Schedule in effect on the date of `at`
    pub fn schedule_for(&self, at: ClockReading) -> Result<&Schedule> {
        let id = self
            .seasons
            .find_schedule_index(at.month, at.day, at.day_of_week)?;
        self.schedules.get(id).ok_or(Error::UndefinedSchedule(id))
    }

    /// Checks the calendar in effect for correctness. Errors make lookups
    /// fail or give wrong answers; warnings point at unused data.
    pub fn check(&self) -> Vec<Issue> {
        self.check_banks(self.seasons.source(), self.schedules.source())
    }

    /// Checks the user banks, including data staged before schedule #0 or
    /// season #0 is defined
    pub fn check_user(&self) -> Vec<Issue> {
        self.check_banks(Source::User, Source::User)
    }

    /// Checks the given season bank against the given schedule bank
    #[instrument(skip(self))]
    pub fn check_banks(&self, season_bank: Source, schedule_bank: Source) -> Vec<Issue> {
        let mut issues = Vec::new();
        let seasons = self.seasons.seasons_in(season_bank);

        for (i, pair) in seasons.windows(2).enumerate() {
            if pair[0].starts_after(pair[1].month, pair[1].day) {
                issues.push(Issue::SeasonOrder { season: i });
            }
        }

        let mut used = BTreeSet::new();
        for (i, season) in seasons.iter().enumerate() {
            if !season.has_valid_date() {
                issues.push(Issue::SeasonDate {
                    season: i,
                    month: season.month,
                    day: season.day,
                });
            }

            for (schedule, holiday) in [(season.workday, false), (season.holiday, true)] {
                if self.schedules.get_in(schedule_bank, schedule).is_some() {
                    used.insert(schedule);
                } else {
                    issues.push(Issue::UndefinedSchedule {
                        season: i,
                        schedule,
                        holiday,
                    });
                }
            }
        }

        if season_bank == Source::User {
            let ignored = self
                .seasons
                .user_bank()
                .iter()
                .enumerate()
                .skip(seasons.len())
                .filter(|(_, season)| season.is_some());
            for (season, _) in ignored {
                issues.push(Issue::IgnoredSeason { season });
            }
        }

        for (id, schedule) in self.schedules.defined_in(schedule_bank) {
            for (change, point) in schedule.points().iter().enumerate() {
                if point.time >= SLOTS_PER_DAY {
                    issues.push(Issue::SlotOutOfRange {
                        schedule: id,
                        change,
                        time: point.time,
                    });
                }
            }
            for (change, pair) in schedule.points().windows(2).enumerate() {
                if pair[0].time >= pair[1].time {
                    issues.push(Issue::ChangeOrder {
                        schedule: id,
                        change,
                    });
                }
            }
            if !used.contains(&id) {
                issues.push(Issue::UnusedSchedule { schedule: id });
            }
        }

        for issue in &issues {
            match issue.severity() {
                Severity::Error => error!("{}", issue),
                Severity::Warning => warn!("{}", issue),
            }
        }
        issues
    }
}

impl fmt::Display for RateCalendar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let listing = self.listing(self.seasons.source(), self.schedules.source());
        fmt::Display::fmt(&listing, f)
    }
}

impl RateCalendar {
    /// Listing of the given season bank with schedules from the given bank
    pub fn listing(&self, seasons: Source, schedules: Source) -> Listing<'_> {
        Listing {
            calendar: self,
            seasons,
            schedules,
        }
    }

    /// Listing of the user banks, whether or not they are in effect
    pub fn user_listing(&self) -> Listing<'_> {
        self.listing(Source::User, Source::User)
    }
}

/// Printable view of one season bank and one schedule bank
#[derive(Debug, Clone, Copy)]
pub struct Listing<'a> {
    calendar: &'a RateCalendar,
    seasons: Source,
    schedules: Source,
}

impl fmt::Display for Listing<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Calendar ({} seasons, {} schedules):",
            self.seasons, self.schedules
        )?;

        let store = &self.calendar.schedules;
        for season in self.calendar.seasons.seasons_in(self.seasons) {
            writeln!(f, "  {}", season)?;
            for (label, id) in [("Workday", season.workday), ("Weekend", season.holiday)] {
                writeln!(f, "    {} Schedule #{}:", label, id)?;
                match store.get_in(self.schedules, id) {
                    Some(schedule) => {
                        for point in schedule.points() {
                            writeln!(f, "      {}", point)?;
                        }
                    }
                    None => writeln!(f, "      (undefined)")?,
                }
            }
        }
        Ok(())
    }
}

/// A [`RateCalendar`] behind a single reader/writer lock.
///
/// Lookups take the read lock, configuration takes the write lock. A bank
/// switch happens inside the write-locked mutation that causes it.
#[derive(Debug, Clone, Default)]
pub struct SharedCalendar {
    inner: Arc<RwLock<RateCalendar>>,
}

impl SharedCalendar {
    pub fn new(calendar: RateCalendar) -> Self {
        Self {
            inner: Arc::new(RwLock::new(calendar)),
        }
    }

    pub fn read(&self) -> RwLockReadGuard<'_, RateCalendar> {
        self.inner.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, RateCalendar> {
        self.inner.write()
    }

    /// Publishes a whole new calendar at once
    pub fn replace(&self, calendar: RateCalendar) {
        *self.inner.write() = calendar;
    }

    /// Runs `resolver` against the calendar under the read lock
    pub fn find_period(
        &self,
        resolver: &mut PeriodResolver,
        at: ClockReading,
    ) -> Result<Resolution> {
        resolver.find_period(&self.read(), at)
    }
}
