/*!
 # Rate plan configuration

 A TOML file describing user schedules and seasons, applied through the
 same operations a device would use for field reconfiguration:

 ```toml
 image = "rate-minder.img"

 [[schedule]]
 id = 0
 start = "off-peak"
 changes = [
     { at = "14:00", period = "on-peak" },
     { at = "21:00", period = "off-peak" },
 ]

 [[season]]
 id = 0
 start = "05-01"
 workday = 0
 holiday = 0
 ```
*/

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info, instrument};

use crate::calendar::RateCalendar;
use crate::period::PeriodKind;
use crate::{Error, Result};

/// Top-level configuration file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RateConfig {
    /// Where the persisted user image lives
    #[serde(default)]
    pub image: Option<PathBuf>,
    #[serde(default, rename = "schedule")]
    pub schedules: Vec<ScheduleConfig>,
    #[serde(default, rename = "season")]
    pub seasons: Vec<SeasonConfig>,
}

/// One user schedule
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScheduleConfig {
    pub id: u8,
    /// Period at 00:00
    pub start: PeriodKind,
    #[serde(default)]
    pub changes: Vec<ChangeConfig>,
}

/// One period change, at `HH:MM`
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChangeConfig {
    pub at: String,
    pub period: PeriodKind,
}

/// One user season, starting on `MM-DD`
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeasonConfig {
    pub id: u8,
    pub start: String,
    pub workday: u8,
    pub holiday: u8,
}

impl FromStr for RateConfig {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }
}

impl RateConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let config: Self = content.parse()?;
        debug!(
            "Read {} schedules and {} seasons from {}",
            config.schedules.len(),
            config.seasons.len(),
            path.display()
        );
        Ok(config)
    }

    /// Writes the configured schedules, then seasons, into `calendar`.
    ///
    /// Stops at the first rejected entry.
    #[instrument(skip_all)]
    pub fn apply(&self, calendar: &mut RateCalendar) -> Result<()> {
        for schedule in &self.schedules {
            calendar.define_schedule(schedule.id, schedule.start)?;
            for change in &schedule.changes {
                let (hour, minute) = parse_time(&change.at)?;
                calendar
                    .add_period_change(schedule.id, hour, minute, change.period)
                    .map_err(|e| {
                        Error::Config(format!("schedule #{} at {}: {}", schedule.id, change.at, e))
                    })?;
            }
        }

        for season in &self.seasons {
            let (month, day) = parse_date(&season.start)?;
            calendar
                .define_season(season.id, month, day, season.workday, season.holiday)
                .map_err(|e| Error::Config(format!("season #{}: {}", season.id, e)))?;
        }

        info!(
            "Applied {} schedules and {} seasons",
            self.schedules.len(),
            self.seasons.len()
        );
        Ok(())
    }
}

/// Parses `HH:MM`
pub fn parse_time(s: &str) -> Result<(u8, u8)> {
    parse_pair(s, ':').ok_or_else(|| Error::Config(format!("Invalid time (HH:MM): {s}")))
}

/// Parses `MM-DD`
pub fn parse_date(s: &str) -> Result<(u8, u8)> {
    parse_pair(s, '-').ok_or_else(|| Error::Config(format!("Invalid date (MM-DD): {s}")))
}

fn parse_pair(s: &str, separator: char) -> Option<(u8, u8)> {
    let (first, second) = s.trim().split_once(separator)?;
    Some((first.parse().ok()?, second.parse().ok()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bank::Source;

    const SAMPLE: &str = r#"
        image = "rates.img"

        [[schedule]]
        id = 0
        start = "off-peak"
        changes = [
            { at = "14:00", period = "on-peak" },
            { at = "21:00", period = "off-peak" },
        ]

        [[schedule]]
        id = 1
        start = "partial-peak"

        [[season]]
        id = 0
        start = "05-01"
        workday = 0
        holiday = 1
    "#;

    #[test]
    fn parses_sample() {
        let config: RateConfig = SAMPLE.parse().unwrap();
        assert_eq!(config.image, Some(PathBuf::from("rates.img")));
        assert_eq!(config.schedules.len(), 2);
        assert_eq!(config.schedules[0].changes[1].period, PeriodKind::OffPeak);
        assert_eq!(config.seasons[0].start, "05-01");
    }

    #[test]
    fn apply_switches_both_banks() {
        let config: RateConfig = SAMPLE.parse().unwrap();
        let mut calendar = RateCalendar::new();
        config.apply(&mut calendar).unwrap();

        assert_eq!(calendar.schedules().source(), Source::User);
        assert_eq!(calendar.seasons().source(), Source::User);
        assert_eq!(calendar.schedules().get(0).unwrap().points().len(), 3);
        assert!(calendar.check().is_empty());
    }

    #[test]
    fn empty_config_keeps_defaults() {
        let config: RateConfig = "".parse().unwrap();
        let mut calendar = RateCalendar::new();
        config.apply(&mut calendar).unwrap();
        assert_eq!(calendar.schedules().source(), Source::Default);
    }

    #[test]
    fn apply_rejects_out_of_order_changes() {
        let config: RateConfig = r#"
            [[schedule]]
            id = 0
            start = "off-peak"
            changes = [
                { at = "21:00", period = "on-peak" },
                { at = "14:00", period = "off-peak" },
            ]
        "#
        .parse()
        .unwrap();
        assert!(matches!(
            config.apply(&mut RateCalendar::new()),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn unknown_keys_and_periods_are_rejected() {
        assert!("colour = 1".parse::<RateConfig>().is_err());
        assert!(r#"
            [[schedule]]
            id = 0
            start = "super-peak"
        "#
        .parse::<RateConfig>()
        .is_err());
    }

    #[test]
    fn time_and_date_parsing() {
        assert_eq!(parse_time("07:30").unwrap(), (7, 30));
        assert_eq!(parse_date("11-01").unwrap(), (11, 1));
        assert!(parse_time("0730").is_err());
        assert!(parse_date("11/01").is_err());
        assert!(parse_time("ab:cd").is_err());
    }
}
