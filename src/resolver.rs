/*!
 # Rate period resolution

 Maps a clock reading to the period in effect, the next different period
 and the number of minutes until it starts. When the active schedule has no
 further change that day, the lookahead steps through the following days,
 re-resolving the season for each, until a different period shows up.
*/

use tracing::{debug, error, instrument, trace};

use crate::calendar::RateCalendar;
use crate::clock::ClockReading;
use crate::period::{PeriodKind, MINUTES_PER_SLOT, SLOTS_PER_DAY};
use crate::{Error, Result};

/// Upper bound on the number of days the lookahead steps through
pub const MAX_LOOKAHEAD_DAYS: u16 = 366;

/// Outcome of a period lookup
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Resolution {
    /// Period in effect
    pub current: PeriodKind,
    /// Next period different from `current`
    pub next: PeriodKind,
    /// Minutes until `next` starts, saturated at `u16::MAX`
    pub minutes_to_next: u16,
}

/// Resolves the active period and keeps the last answer
#[derive(Debug, Default)]
pub struct PeriodResolver {
    last: Resolution,
}

impl PeriodResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Finds the period information for `at` and caches it for the accessors.
    ///
    /// If no different period starts within [`MAX_LOOKAHEAD_DAYS`], the
    /// calendar is broken: the cache holds the current period as both current
    /// and next, with a saturated time, and an error is returned.
    #[instrument(skip(self, calendar, at), fields(at = %at))]
    pub fn find_period(&mut self, calendar: &RateCalendar, at: ClockReading) -> Result<Resolution> {
        match resolve(calendar, at) {
            Ok(resolution) => {
                self.last = resolution;
                Ok(resolution)
            }
            Err(Error::NoPeriodChange(days)) => {
                let current = calendar.schedule_for(at)?.period_at(at.slot());
                self.last = Resolution {
                    current,
                    next: current,
                    minutes_to_next: u16::MAX,
                };
                Err(Error::NoPeriodChange(days))
            }
            Err(e) => Err(e),
        }
    }

    /// Current period, as found by the last call to `find_period`.
    /// Undefined until the first resolution.
    pub fn current_cost(&self) -> PeriodKind {
        self.last.current
    }

    /// Next period, as found by the last call to `find_period`.
    /// Undefined until the first resolution.
    pub fn next_cost(&self) -> PeriodKind {
        self.last.next
    }

    /// Minutes until the next period (at most 65535), as found by the last
    /// call to `find_period`. Undefined until the first resolution.
    pub fn time_to_next_cost(&self) -> u16 {
        self.last.minutes_to_next
    }

    /// The whole last answer
    pub fn last(&self) -> Resolution {
        self.last
    }
}

/// Finds the period information for `at` without caching it
pub fn resolve(calendar: &RateCalendar, at: ClockReading) -> Result<Resolution> {
    let slot = at.slot();
    let schedule = calendar.schedule_for(at)?;

    let index = schedule.current_index(slot);
    let current = schedule.period_at(slot);
    trace!("Slot {} is in change point #{} ({})", slot, index, current);

    // Slots between `at` and the next change; days skipped add a full day each
    let (next, units) = match schedule.first_change_from(index + 1, current) {
        Some(change) => (change.period, u32::from(change.time) - u32::from(slot)),
        None => lookahead(calendar, at, current)?,
    };

    let minutes = u16::try_from(units * MINUTES_PER_SLOT).unwrap_or(u16::MAX);
    debug!(
        "At {}: {} now, {} in {} minutes",
        at, current, next, minutes
    );

    Ok(Resolution {
        current,
        next,
        minutes_to_next: minutes,
    })
}

fn lookahead(
    calendar: &RateCalendar,
    at: ClockReading,
    current: PeriodKind,
) -> Result<(PeriodKind, u32)> {
    let mut date = at;

    for days in 1..=MAX_LOOKAHEAD_DAYS {
        date = date.next_day();
        let schedule = calendar.schedule_for(date)?;

        if let Some(change) = schedule.first_change_from(0, current) {
            trace!("Next change found {} day(s) ahead, on {}", days, date);
            let units = u32::from(days) * u32::from(SLOTS_PER_DAY) + u32::from(change.time)
                - u32::from(at.slot());
            return Ok((change.period, units));
        }
    }

    error!(
        "No period other than {} within {} days of {}; check the calendar",
        current, MAX_LOOKAHEAD_DAYS, at
    );
    Err(Error::NoPeriodChange(MAX_LOOKAHEAD_DAYS))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(month: u8, day: u8, day_of_week: u8, hour: u8, minute: u8) -> ClockReading {
        ClockReading::new(month, day, day_of_week, hour, minute).unwrap()
    }

    #[test]
    fn default_weekday_periods() {
        let calendar = RateCalendar::new();
        assert_eq!(resolve(&calendar, at(6, 2, 1, 14, 0)).unwrap().current, PeriodKind::OnPeak);
        assert_eq!(resolve(&calendar, at(6, 2, 1, 7, 0)).unwrap().current, PeriodKind::PartialPeak);
        assert_eq!(resolve(&calendar, at(6, 2, 1, 0, 0)).unwrap().current, PeriodKind::OffPeak);
        assert_eq!(resolve(&calendar, at(6, 2, 1, 6, 59)).unwrap().current, PeriodKind::OffPeak);
    }

    #[test]
    fn on_peak_afternoon_in_june() {
        let calendar = RateCalendar::new();
        let mut resolver = PeriodResolver::new();
        let resolution = resolver.find_period(&calendar, at(6, 2, 1, 14, 30)).unwrap();

        assert_eq!(resolution.current, PeriodKind::OnPeak);
        assert_eq!(resolution.next, PeriodKind::PartialPeak);
        assert_eq!(resolution.minutes_to_next, 390);
        assert_eq!(resolver.current_cost(), PeriodKind::OnPeak);
        assert_eq!(resolver.next_cost(), PeriodKind::PartialPeak);
        assert_eq!(resolver.time_to_next_cost(), 390);
    }

    #[test]
    fn minutes_count_from_start_of_slot() {
        let calendar = RateCalendar::new();
        // 13:59 is in slot 27, one slot before on-peak
        let resolution = resolve(&calendar, at(6, 2, 1, 13, 59)).unwrap();
        assert_eq!(resolution.current, PeriodKind::PartialPeak);
        assert_eq!(resolution.next, PeriodKind::OnPeak);
        assert_eq!(resolution.minutes_to_next, 30);
    }

    #[test]
    fn late_evening_looks_into_next_workday() {
        let calendar = RateCalendar::new();
        // Tuesday 22:30, slot 45: off-peak until Wednesday 07:00
        let resolution = resolve(&calendar, at(6, 3, 2, 22, 30)).unwrap();
        assert_eq!(resolution.current, PeriodKind::OffPeak);
        assert_eq!(resolution.next, PeriodKind::PartialPeak);
        assert_eq!(resolution.minutes_to_next, (48 + 14 - 45) * 30);
    }

    #[test]
    fn friday_evening_looks_into_weekend_schedule() {
        let calendar = RateCalendar::new();
        // Friday 22:30: Saturday goes on-peak at 15:00
        let resolution = resolve(&calendar, at(6, 6, 5, 22, 30)).unwrap();
        assert_eq!(resolution.next, PeriodKind::OnPeak);
        assert_eq!(resolution.minutes_to_next, (48 + 30 - 45) * 30);
    }

    #[test]
    fn weekend_afternoon() {
        let calendar = RateCalendar::new();
        let resolution = resolve(&calendar, at(6, 7, 6, 14, 0)).unwrap();
        assert_eq!(resolution.current, PeriodKind::OffPeak);
        assert_eq!(resolution.next, PeriodKind::OnPeak);
        assert_eq!(resolution.minutes_to_next, 60);
    }

    #[test]
    fn repeated_lookups_agree() {
        let calendar = RateCalendar::new();
        let mut resolver = PeriodResolver::new();
        let first = resolver.find_period(&calendar, at(11, 30, 7, 23, 45)).unwrap();
        let second = resolver.find_period(&calendar, at(11, 30, 7, 23, 45)).unwrap();
        assert_eq!(first, second);
        assert_eq!(resolver.last(), first);
    }

    #[test]
    fn flat_calendar_hits_lookahead_bound() {
        let mut calendar = RateCalendar::new();
        calendar.define_schedule(0, PeriodKind::OffPeak).unwrap();
        calendar.define_season(0, 1, 1, 0, 0).unwrap();

        let mut resolver = PeriodResolver::new();
        let result = resolver.find_period(&calendar, at(4, 10, 3, 12, 0));
        assert!(matches!(result, Err(Error::NoPeriodChange(MAX_LOOKAHEAD_DAYS))));
        assert_eq!(resolver.current_cost(), PeriodKind::OffPeak);
        assert_eq!(resolver.next_cost(), PeriodKind::OffPeak);
        assert_eq!(resolver.time_to_next_cost(), u16::MAX);
    }
}
