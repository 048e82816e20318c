/*!
 # Time-of-use rate period resolver

 A Rust library that tells a power-aware device which electricity price
 period (off-peak, partial-peak, on-peak) is in effect right now, which one
 comes next, and how many minutes remain until the change. It runs fully
 offline from a built-in rate plan or a user-defined one.

 ## Features

 * Daily schedules of up to five half-hour price changes
 * Circular seasonal calendars with workday and weekend/holiday schedules
 * Built-in default plan with field-overridable user banks
 * Cross-day and cross-season lookahead for the next price change
 * Packed 416-byte persisted image of the user banks
 * TOML configuration and calendar integrity checks

 ## Example

 ```rust
 use rate_minder::*;

 fn main() -> Result<()> {
     let calendar = RateCalendar::new();
     let mut resolver = PeriodResolver::new();

     // A Monday in June, 14:30
     let now = ClockReading::new(6, 2, 1, 14, 30)?;
     resolver.find_period(&calendar, now)?;

     assert_eq!(resolver.current_cost(), PeriodKind::OnPeak);
     assert_eq!(resolver.next_cost(), PeriodKind::PartialPeak);
     assert_eq!(resolver.time_to_next_cost(), 390);
     Ok(())
 }
 ```
*/

use thiserror::Error;

/// Custom error types for the rate period resolver
#[derive(Error, Debug)]
pub enum Error {
    /// Schedule or season id beyond the user bank capacity
    #[error("{0} id {1} out of range (0..={2})")]
    IdOutOfRange(&'static str, u8, u8),

    /// Value out of range
    #[error("{0} value {1} out of range ({2}..={3})")]
    ValueOutOfRange(&'static str, u32, u32, u32),

    /// Calendar date that does not exist in the fixed 365-day year
    #[error("Invalid calendar date (mm/dd): {0:02}/{1:02}")]
    InvalidDate(u8, u8),

    /// Schedule referenced before being defined
    #[error("Schedule #{0} is not defined")]
    UndefinedSchedule(u8),

    /// No free change point slot left in a schedule
    #[error("Schedule #{0} has no free period change slot")]
    ScheduleFull(u8),

    /// Period change earlier than one already recorded
    #[error("Period change at slot {1} in schedule #{0} is before the one at slot {2}")]
    OutOfOrder(u8, u8, u8),

    /// The active season list is empty
    #[error("Calendar has no seasons")]
    EmptyCalendar,

    /// Lookahead for the next period change gave up
    #[error("No period change found within {0} days")]
    NoPeriodChange(u16),

    /// Malformed persisted image
    #[error("Invalid persisted image: {0}")]
    InvalidImage(String),

    /// Malformed configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Error parsing the TOML configuration
    #[error(transparent)]
    Toml(#[from] toml::de::Error),

    /// I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

pub mod bank;
pub mod calendar;
pub mod clock;
pub mod config;
pub mod period;
pub mod persist;
pub mod resolver;
pub mod schedule;
pub mod season;

// Re-export key types
pub use bank::Source;
pub use calendar::{Issue, Listing, RateCalendar, Severity, SharedCalendar};
pub use clock::ClockReading;
pub use config::RateConfig;
pub use period::{ChangePoint, PeriodKind};
pub use persist::{ImageStore, UserImage};
pub use resolver::{PeriodResolver, Resolution, MAX_LOOKAHEAD_DAYS};
pub use schedule::{Schedule, ScheduleStore};
pub use season::{Season, SeasonCalendar};
