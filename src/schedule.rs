/*!
 # Daily price schedules

 A schedule is an ordered list of up to five price changes over one day.
 The first change is always at midnight. The store keeps the built-in
 schedules next to a user bank of 32 slots that becomes active as soon as
 user schedule #0 is defined.
*/

use tracing::{debug, info, instrument, trace};

use crate::bank::{Source, DEFAULT_SCHEDULES};
use crate::period::{nearest_slot, ChangePoint, PeriodKind, SLOTS_PER_DAY};
use crate::{Error, Result};

/// The maximum number of period change points in a daily schedule
pub const MAX_CHANGE_POINTS: usize = 5;

/// Capacity of the user schedule bank
pub const USER_SCHEDULES: usize = 32;

/// A daily schedule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    points: heapless::Vec<ChangePoint, MAX_CHANGE_POINTS>,
}

impl Schedule {
    /// Creates a schedule with a single period starting at midnight
    pub fn new(initial: PeriodKind) -> Self {
        let mut points = heapless::Vec::new();
        let _ = points.push(ChangePoint::new(0, initial));
        Self { points }
    }

    /// Builds a schedule from already-ordered change points, keeping at most
    /// [`MAX_CHANGE_POINTS`] of them. No ordering checks are made.
    pub(crate) fn from_raw(points: &[ChangePoint]) -> Self {
        Self {
            points: points.iter().take(MAX_CHANGE_POINTS).copied().collect(),
        }
    }

    /// All change points, midnight first
    pub fn points(&self) -> &[ChangePoint] {
        &self.points
    }

    /// Index of the change point in effect at `slot`: the last one whose
    /// time is not after `slot`.
    pub fn current_index(&self, slot: u8) -> usize {
        let mut current = 0;
        for (i, point) in self.points.iter().enumerate().skip(1) {
            if point.time <= slot {
                current = i;
            }
        }
        current
    }

    /// Period in effect at `slot`
    pub fn period_at(&self, slot: u8) -> PeriodKind {
        self.points
            .get(self.current_index(slot))
            .map(|point| point.period)
            .unwrap_or_default()
    }

    /// First change point at or after index `start` whose period differs from `from`
    pub fn first_change_from(&self, start: usize, from: PeriodKind) -> Option<ChangePoint> {
        self.points
            .get(start..)
            .unwrap_or_default()
            .iter()
            .find(|point| point.period != from)
            .copied()
    }

    /// Records a change at `slot`, reusing a slot with the same time or
    /// appending after the last one.
    fn insert(&mut self, id: u8, slot: u8, period: PeriodKind) -> Result<()> {
        for point in self.points.iter_mut().skip(1) {
            if point.time == slot {
                point.period = period;
                return Ok(());
            }
            if point.time > slot {
                return Err(Error::OutOfOrder(id, slot, point.time));
            }
        }

        self.points
            .push(ChangePoint::new(slot, period))
            .map_err(|_| Error::ScheduleFull(id))
    }
}

/// Catalog of the default and user-defined daily schedules
#[derive(Debug, Clone)]
pub struct ScheduleStore {
    defaults: Vec<Schedule>,
    user: [Option<Schedule>; USER_SCHEDULES],
    source: Source,
}

impl Default for ScheduleStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ScheduleStore {
    /// Creates a store with an empty user bank, so the built-in schedules are used
    pub fn new() -> Self {
        Self {
            defaults: DEFAULT_SCHEDULES
                .iter()
                .map(|points| Schedule::from_raw(points))
                .collect(),
            user: std::array::from_fn(|_| None),
            source: Source::Default,
        }
    }

    /// Creates a store from restored user data
    pub fn with_user(user: [Option<Schedule>; USER_SCHEDULES]) -> Self {
        let mut store = Self::new();
        store.user = user;
        store.refresh_source();
        store
    }

    /// Bank currently in effect
    pub fn source(&self) -> Source {
        self.source
    }

    /// Schedule `id` from the bank in effect
    pub fn get(&self, id: u8) -> Option<&Schedule> {
        self.get_in(self.source, id)
    }

    /// Schedule `id` from the given bank, whether or not it is in effect
    pub fn get_in(&self, bank: Source, id: u8) -> Option<&Schedule> {
        match bank {
            Source::Default => self.defaults.get(usize::from(id)),
            Source::User => self.user.get(usize::from(id)).and_then(Option::as_ref),
        }
    }

    /// The raw user bank, including undefined slots
    pub fn user_bank(&self) -> &[Option<Schedule>; USER_SCHEDULES] {
        &self.user
    }

    /// Defined schedules of the bank in effect, with their ids
    pub fn active(&self) -> Vec<(u8, &Schedule)> {
        self.defined_in(self.source)
    }

    /// Defined schedules of the given bank, with their ids
    pub fn defined_in(&self, bank: Source) -> Vec<(u8, &Schedule)> {
        let ids = 0..=u8::MAX;
        match bank {
            Source::Default => ids.zip(self.defaults.iter()).collect(),
            Source::User => ids
                .zip(self.user.iter())
                .filter_map(|(id, schedule)| schedule.as_ref().map(|s| (id, s)))
                .collect(),
        }
    }

    /// Resets user schedule `id` to a single period starting at 00:00.
    ///
    /// Defining schedule #0 switches the store to the user bank.
    #[instrument(skip(self))]
    pub fn define_schedule(&mut self, id: u8, initial: PeriodKind) -> Result<()> {
        let index = user_index(id)?;
        self.user[index] = Some(Schedule::new(initial));
        debug!("Defined schedule #{} starting {}", id, initial);

        self.refresh_source();
        Ok(())
    }

    /// Adds a period change to a previously defined user schedule.
    ///
    /// The time is rounded to the nearest half hour. Changes must be added in
    /// chronological order; adding one at an already recorded time replaces
    /// its period.
    #[instrument(skip(self))]
    pub fn add_period_change(
        &mut self,
        id: u8,
        hour: u8,
        minute: u8,
        period: PeriodKind,
    ) -> Result<()> {
        let index = user_index(id)?;
        if hour > 23 {
            return Err(Error::ValueOutOfRange("hour", hour.into(), 0, 23));
        }
        if minute > 59 {
            return Err(Error::ValueOutOfRange("minute", minute.into(), 0, 59));
        }

        // Slot 0 belongs to the midnight entry and 48 would be the next day
        let slot = nearest_slot(hour, minute);
        let last = u16::from(SLOTS_PER_DAY - 1);
        if slot == 0 || slot > last {
            return Err(Error::ValueOutOfRange("slot", slot.into(), 1, last.into()));
        }

        let schedule = self.user[index]
            .as_mut()
            .ok_or(Error::UndefinedSchedule(id))?;
        schedule.insert(id, slot as u8, period)?;

        trace!("Schedule #{} now has {} changes", id, schedule.points().len());
        Ok(())
    }

    /// Discards all user schedules; the built-in ones are used from now on
    #[instrument(skip(self))]
    pub fn reset_to_defaults(&mut self) {
        self.user = std::array::from_fn(|_| None);
        self.refresh_source();
    }

    fn refresh_source(&mut self) {
        let source = if self.user[0].is_some() {
            Source::User
        } else {
            Source::Default
        };

        if source != self.source {
            info!("Schedule bank switched to {}", source);
            self.source = source;
        }
    }
}

fn user_index(id: u8) -> Result<usize> {
    let index = usize::from(id);
    if index >= USER_SCHEDULES {
        return Err(Error::IdOutOfRange(
            "Schedule",
            id,
            (USER_SCHEDULES - 1) as u8,
        ));
    }
    Ok(index)
}
