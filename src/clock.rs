/*!
 # Clock readings

 The resolver consumes a plain month/day/day-of-week/hour/minute reading,
 as delivered by a real-time clock chip. Days of the week run from
 1 (Monday) to 7 (Sunday).
*/

use chrono::{Datelike, Timelike};
use std::fmt;

use crate::period::slot_of;
use crate::season::days_in_month;
use crate::{Error, Result};

/// Abbreviated day names, Monday first
const DAY_NAMES: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

/// A date and time of day, without a year
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockReading {
    /// Month (1-12)
    pub month: u8,
    /// Day of month (1-31)
    pub day: u8,
    /// Day of week (1-7, where 1 is Monday)
    pub day_of_week: u8,
    /// Hour (0-23)
    pub hour: u8,
    /// Minute (0-59)
    pub minute: u8,
}

impl ClockReading {
    /// Creates a reading, checking every field against its range
    ///
    /// # Arguments
    ///
    /// * `month` - Month (1-12)
    /// * `day` - Day of month, within the fixed non-leap month length;
    ///   February 29th is read as February 28th
    /// * `day_of_week` - Day of week (1-7, where 1 is Monday)
    /// * `hour` - Hour (0-23)
    /// * `minute` - Minute (0-59)
    pub fn new(month: u8, day: u8, day_of_week: u8, hour: u8, minute: u8) -> Result<Self> {
        let len = days_in_month(month)
            .ok_or(Error::ValueOutOfRange("month", month.into(), 1, 12))?;
        let day = fold_leap_day(month, day);
        if !(1..=len).contains(&day) {
            return Err(Error::InvalidDate(month, day));
        }
        if !(1..=7).contains(&day_of_week) {
            return Err(Error::ValueOutOfRange("day of week", day_of_week.into(), 1, 7));
        }
        if hour > 23 {
            return Err(Error::ValueOutOfRange("hour", hour.into(), 0, 23));
        }
        if minute > 59 {
            return Err(Error::ValueOutOfRange("minute", minute.into(), 0, 59));
        }

        Ok(Self {
            month,
            day,
            day_of_week,
            hour,
            minute,
        })
    }

    /// Takes the reading from a chrono date-time.
    ///
    /// February 29th is read as February 28th, the fixed calendar having no
    /// leap day.
    pub fn from_datetime<T: Datelike + Timelike>(datetime: &T) -> Self {
        let month = datetime.month() as u8;
        let day = fold_leap_day(month, datetime.day() as u8);

        Self {
            month,
            day,
            day_of_week: datetime.weekday().number_from_monday() as u8,
            hour: datetime.hour() as u8,
            minute: datetime.minute() as u8,
        }
    }

    /// Reading of the local system clock
    pub fn now() -> Self {
        Self::from_datetime(&chrono::Local::now())
    }

    /// Half-hour slot of the time of day
    pub fn slot(&self) -> u8 {
        slot_of(self.hour, self.minute)
    }

    /// Same time of day on the following calendar day
    pub fn next_day(&self) -> Self {
        let len = days_in_month(self.month).unwrap_or(31);
        let (month, day) = if self.day >= len {
            (self.month % 12 + 1, 1)
        } else {
            (self.month, self.day + 1)
        };

        Self {
            month,
            day,
            day_of_week: self.day_of_week % 7 + 1,
            ..*self
        }
    }
}

/// The fixed calendar has no leap day; February 29th counts as the 28th
fn fold_leap_day(month: u8, day: u8) -> u8 {
    if month == 2 && day == 29 {
        28
    } else {
        day
    }
}

impl fmt::Display for ClockReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = DAY_NAMES
            .get(usize::from(self.day_of_week).wrapping_sub(1))
            .unwrap_or(&"???");
        write!(
            f,
            "{:02}/{:02} {} {:02}:{:02}",
            self.month, self.day, name, self.hour, self.minute
        )
    }
}
