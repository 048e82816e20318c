/*!
 # Price periods and change points

 Time of day is tracked at half-hour resolution: slot 0 is midnight,
 slot 28 is 14:00 and slot 47 is 23:30.
*/

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// Number of half-hour slots in a day
pub const SLOTS_PER_DAY: u8 = 48;

/// Length of a slot in minutes
pub const MINUTES_PER_SLOT: u32 = 30;

const TIME_MASK: u8 = 0x3f;
const PERIOD_SHIFT: u8 = 6;

/// Price tier in effect
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[repr(u8)]
pub enum PeriodKind {
    /// Cheapest rate
    #[default]
    OffPeak = 0,
    /// Shoulder rate
    PartialPeak = 1,
    /// Most expensive rate
    OnPeak = 2,
}

impl PeriodKind {
    /// Decodes the 2-bit period field of a packed change point
    pub fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            0 => Some(PeriodKind::OffPeak),
            1 => Some(PeriodKind::PartialPeak),
            2 => Some(PeriodKind::OnPeak),
            _ => None,
        }
    }

    /// Upper-case label used in calendar listings
    pub fn label(&self) -> &'static str {
        match self {
            PeriodKind::OffPeak => "OFF-PEAK",
            PeriodKind::PartialPeak => "PARTIAL-PEAK",
            PeriodKind::OnPeak => "ON-PEAK",
        }
    }
}

impl fmt::Display for PeriodKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeriodKind::OffPeak => write!(f, "off-peak"),
            PeriodKind::PartialPeak => write!(f, "partial-peak"),
            PeriodKind::OnPeak => write!(f, "on-peak"),
        }
    }
}

impl FromStr for PeriodKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "off-peak" | "offpeak" | "off" => Ok(PeriodKind::OffPeak),
            "partial-peak" | "partialpeak" | "partial" | "mid-peak" => {
                Ok(PeriodKind::PartialPeak)
            }
            "on-peak" | "onpeak" | "on" => Ok(PeriodKind::OnPeak),
            other => Err(Error::Config(format!("Unknown period kind: {other}"))),
        }
    }
}

/// A price change at a given half-hour slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangePoint {
    /// Half-hour slot of the change (0-47)
    pub time: u8,
    /// Period that starts at `time`
    pub period: PeriodKind,
}

impl ChangePoint {
    pub const fn new(time: u8, period: PeriodKind) -> Self {
        Self { time, period }
    }

    /// Packs into a single byte: bits 0-5 hold the time, bits 6-7 the period
    pub fn pack(&self) -> u8 {
        (self.time & TIME_MASK) | ((self.period as u8) << PERIOD_SHIFT)
    }

    /// Reverse of [`ChangePoint::pack`]
    pub fn unpack(byte: u8) -> Result<Self> {
        let time = byte & TIME_MASK;
        let bits = byte >> PERIOD_SHIFT;
        let period = PeriodKind::from_bits(bits)
            .ok_or_else(|| Error::InvalidImage(format!("period bits {bits:#04b} in {byte:#04x}")))?;
        Ok(Self { time, period })
    }

    pub fn hour(&self) -> u8 {
        self.time / 2
    }

    pub fn minute(&self) -> u8 {
        self.time % 2 * 30
    }
}

impl fmt::Display for ChangePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}:{:02} {}",
            self.hour(),
            self.minute(),
            self.period.label()
        )
    }
}

/// Slot containing the given time of day (rounds down)
pub fn slot_of(hour: u8, minute: u8) -> u8 {
    2 * hour + minute / 30
}

/// Slot nearest to the given time of day (rounds to the closest half hour).
///
/// May return [`SLOTS_PER_DAY`] for times from 23:45 onwards.
pub fn nearest_slot(hour: u8, minute: u8) -> u16 {
    (u16::from(hour) * 60 + u16::from(minute) + 15) / 30
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_puts_time_in_low_bits() {
        let point = ChangePoint::new(28, PeriodKind::OnPeak);
        assert_eq!(point.pack(), 0b10_011100);
        assert_eq!(ChangePoint::new(0, PeriodKind::OffPeak).pack(), 0);
        assert_eq!(ChangePoint::new(47, PeriodKind::PartialPeak).pack(), 0x6f);
    }

    #[test]
    fn unpack_reads_what_pack_wrote() {
        let point = ChangePoint::new(42, PeriodKind::PartialPeak);
        assert_eq!(ChangePoint::unpack(point.pack()).unwrap(), point);
    }

    #[test]
    fn unpack_rejects_unknown_period() {
        assert!(ChangePoint::unpack(0xff).is_err());
        assert!(ChangePoint::unpack(0xc0).is_err());
    }

    #[test]
    fn slot_of_rounds_down() {
        assert_eq!(slot_of(0, 0), 0);
        assert_eq!(slot_of(7, 0), 14);
        assert_eq!(slot_of(14, 29), 28);
        assert_eq!(slot_of(14, 30), 29);
        assert_eq!(slot_of(23, 59), 47);
    }

    #[test]
    fn nearest_slot_rounds_to_closest_half_hour() {
        assert_eq!(nearest_slot(6, 44), 13);
        assert_eq!(nearest_slot(6, 45), 14);
        assert_eq!(nearest_slot(14, 10), 28);
        assert_eq!(nearest_slot(0, 14), 0);
        assert_eq!(nearest_slot(23, 45), 48);
    }

    #[test]
    fn change_point_display() {
        let point = ChangePoint::new(43, PeriodKind::OffPeak);
        assert_eq!(point.to_string(), "21:30 OFF-PEAK");
    }

    #[test]
    fn period_kind_parses_common_spellings() {
        assert_eq!("off_peak".parse::<PeriodKind>().unwrap(), PeriodKind::OffPeak);
        assert_eq!("Partial-Peak".parse::<PeriodKind>().unwrap(), PeriodKind::PartialPeak);
        assert_eq!("on".parse::<PeriodKind>().unwrap(), PeriodKind::OnPeak);
        assert!("peak".parse::<PeriodKind>().is_err());
    }
}
