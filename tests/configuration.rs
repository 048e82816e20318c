use rate_minder::persist::IMAGE_LEN;
use rate_minder::*;
use std::fs;
use tempfile::tempdir;

const TIERED_PLAN: &str = r#"
[[schedule]]
id = 0
start = "off-peak"
changes = [
    { at = "08:00", period = "partial-peak" },
    { at = "16:00", period = "on-peak" },
    { at = "21:00", period = "partial-peak" },
    { at = "23:00", period = "off-peak" },
]

[[schedule]]
id = 1
start = "off-peak"
changes = [{ at = "17:00", period = "partial-peak" }, { at = "20:00", period = "off-peak" }]

[[season]]
id = 0
start = "06-01"
workday = 0
holiday = 1

[[season]]
id = 1
start = "10-01"
workday = 1
holiday = 1
"#;

#[test]
fn config_file_defines_plan() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("plan.toml");
    fs::write(&path, TIERED_PLAN).unwrap();

    let config = RateConfig::from_file(&path).unwrap();
    let mut calendar = RateCalendar::new();
    config.apply(&mut calendar).unwrap();
    assert!(calendar.check().is_empty());

    let mut resolver = PeriodResolver::new();
    resolver
        .find_period(&calendar, ClockReading::new(7, 15, 2, 17, 45).unwrap())
        .unwrap();
    assert_eq!(resolver.current_cost(), PeriodKind::OnPeak);
    assert_eq!(resolver.next_cost(), PeriodKind::PartialPeak);
    assert_eq!(resolver.time_to_next_cost(), (42 - 35) * 30);

    // Winter uses schedule #1 every day, and wraps around to January
    resolver
        .find_period(&calendar, ClockReading::new(1, 20, 1, 18, 0).unwrap())
        .unwrap();
    assert_eq!(resolver.current_cost(), PeriodKind::PartialPeak);
}

#[test]
fn image_survives_restart() {
    let dir = tempdir().unwrap();
    let store = ImageStore::new(dir.path().join("rates.img"));

    let config: RateConfig = TIERED_PLAN.parse().unwrap();
    let mut calendar = RateCalendar::new();
    config.apply(&mut calendar).unwrap();
    store.save(&calendar.user_image()).unwrap();
    assert_eq!(fs::read(store.path()).unwrap().len(), IMAGE_LEN);

    let restored = RateCalendar::from_image(store.load().unwrap());
    assert_eq!(restored.schedules().source(), Source::User);
    assert_eq!(restored.seasons().source(), Source::User);
    assert_eq!(restored.to_string(), calendar.to_string());

    let reading = ClockReading::new(8, 8, 5, 22, 15).unwrap();
    let mut resolver = PeriodResolver::new();
    assert_eq!(
        resolver.find_period(&restored, reading).unwrap(),
        resolver.find_period(&calendar, reading).unwrap()
    );
}

#[test]
fn erased_image_falls_back_to_defaults() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("erased.img");
    fs::write(&path, [0xff; IMAGE_LEN]).unwrap();

    let calendar = RateCalendar::from_image(ImageStore::new(&path).load().unwrap());
    assert_eq!(calendar.schedules().source(), Source::Default);
    assert_eq!(calendar.seasons().source(), Source::Default);
}

#[test]
fn truncated_image_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("short.img");
    fs::write(&path, [0u8; 100]).unwrap();

    assert!(matches!(
        ImageStore::new(&path).load(),
        Err(Error::InvalidImage(_))
    ));
}

#[test]
fn bad_season_in_config_is_reported() {
    let config: RateConfig = r#"
        [[season]]
        id = 0
        start = "02-29"
        workday = 0
        holiday = 0
    "#
    .parse()
    .unwrap();

    let mut calendar = RateCalendar::new();
    assert!(matches!(config.apply(&mut calendar), Err(Error::Config(_))));
    assert_eq!(calendar.seasons().source(), Source::Default);
}
