use color_eyre::eyre::Result;
use rate_minder::*;
use std::io::{self, BufRead};
use std::{env, process};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "Usage: rated [image file]";

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("RUST_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .compact()
        .init();
    color_eyre::install()?;

    // Optional image file to restore from and save to
    let args: Vec<_> = env::args().collect();
    if args.len() > 2 {
        eprintln!("{USAGE}");
        process::exit(1);
    }
    if args.get(1).is_some_and(|arg| arg == "-h" || arg == "--help") {
        eprintln!("{USAGE}");
        process::exit(0);
    }

    let store = args.get(1).map(ImageStore::new);
    let image = match &store {
        Some(store) => store.load()?,
        None => UserImage::default(),
    };
    let mut calendar = RateCalendar::from_image(image);
    let mut resolver = PeriodResolver::new();

    // Inform about successful initialization
    println!("OK");

    // Mainloop: one command per line until end of input
    for line in io::stdin().lock().lines() {
        let line = line?;
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        match execute(input, &mut calendar, &mut resolver, store.as_ref()) {
            Ok(reply) if reply.is_empty() => println!("OK"),
            Ok(reply) => println!("OK {reply}"),
            Err(e) => {
                warn!("Command '{}' failed: {}", input, e);
                println!("ERR {e}");
            }
        }
    }

    debug!("End of input");
    Ok(())
}

/// Runs one `name:arg,arg,...` command and returns the reply payload
fn execute(
    input: &str,
    calendar: &mut RateCalendar,
    resolver: &mut PeriodResolver,
    store: Option<&ImageStore>,
) -> rate_minder::Result<String> {
    let (name, args) = input.split_once(':').unwrap_or((input, ""));
    let args: Vec<&str> = args
        .split(',')
        .map(str::trim)
        .filter(|arg| !arg.is_empty())
        .collect();

    match (name.trim(), args.as_slice()) {
        ("define_schedule", [id, period]) => {
            calendar.define_schedule(number(id)?, period.parse()?)?;
        }
        ("add_period", [id, hour, minute, period]) => {
            calendar.add_period_change(number(id)?, number(hour)?, number(minute)?, period.parse()?)?;
        }
        ("delete_schedules", []) => calendar.delete_schedules(),
        ("define_season", [id, month, day, workday, holiday]) => {
            calendar.define_season(
                number(id)?,
                number(month)?,
                number(day)?,
                number(workday)?,
                number(holiday)?,
            )?;
        }
        ("delete_seasons", []) => calendar.delete_seasons(),
        ("find", [month, day, day_of_week, hour, minute]) => {
            let at = ClockReading::new(
                number(month)?,
                number(day)?,
                number(day_of_week)?,
                number(hour)?,
                number(minute)?,
            )?;
            return find(calendar, resolver, at);
        }
        ("now", []) => return find(calendar, resolver, ClockReading::now()),
        ("check", []) => return Ok(summary(&calendar.check())),
        ("check_user", []) => return Ok(summary(&calendar.check_user())),
        ("save", []) => match store {
            Some(store) => store.save(&calendar.user_image())?,
            None => return Err(Error::Config("no image file given".to_owned())),
        },
        (other, _) => {
            return Err(Error::Config(format!(
                "unknown command or wrong argument count: {other}"
            )))
        }
    }

    Ok(String::new())
}

fn find(
    calendar: &RateCalendar,
    resolver: &mut PeriodResolver,
    at: ClockReading,
) -> rate_minder::Result<String> {
    resolver.find_period(calendar, at)?;
    Ok(format!(
        "{} {} {}",
        resolver.current_cost(),
        resolver.next_cost(),
        resolver.time_to_next_cost()
    ))
}

fn summary(issues: &[Issue]) -> String {
    let errors = issues
        .iter()
        .filter(|issue| issue.severity() == Severity::Error)
        .count();
    format!("{} errors, {} warnings", errors, issues.len() - errors)
}

fn number(arg: &str) -> rate_minder::Result<u8> {
    arg.parse()
        .map_err(|_| Error::Config(format!("not a number: {arg}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(calendar: &mut RateCalendar, input: &str) -> rate_minder::Result<String> {
        execute(input, calendar, &mut PeriodResolver::new(), None)
    }

    #[test]
    fn find_on_default_plan() {
        let mut calendar = RateCalendar::new();
        assert_eq!(
            run(&mut calendar, "find:6,2,1,14,30").unwrap(),
            "on-peak partial-peak 390"
        );
    }

    #[test]
    fn find_on_leap_day() {
        let mut calendar = RateCalendar::new();
        assert_eq!(
            run(&mut calendar, "find:2,29,4,14,30").unwrap(),
            run(&mut calendar, "find:2,28,4,14,30").unwrap()
        );
        assert_eq!(
            run(&mut calendar, "find:2,29,4,14,30").unwrap(),
            "on-peak partial-peak 390"
        );
        assert!(run(&mut calendar, "find:4,31,4,14,30").is_err());
    }

    #[test]
    fn configure_then_find() {
        let mut calendar = RateCalendar::new();
        run(&mut calendar, "define_schedule:0,off_peak").unwrap();
        run(&mut calendar, "add_period:0,16,0,on_peak").unwrap();
        run(&mut calendar, "add_period:0,21,0,off_peak").unwrap();
        run(&mut calendar, "define_season:0,1,1,0,0").unwrap();
        assert_eq!(
            run(&mut calendar, "find:3,4,2,12,0").unwrap(),
            "off-peak on-peak 240"
        );
        assert_eq!(run(&mut calendar, "check").unwrap(), "0 errors, 0 warnings");

        run(&mut calendar, "define_schedule:3,on_peak").unwrap();
        assert_eq!(run(&mut calendar, "check_user").unwrap(), "0 errors, 1 warnings");

        run(&mut calendar, "delete_seasons").unwrap();
        run(&mut calendar, "delete_schedules").unwrap();
        assert_eq!(calendar.schedules().source(), Source::Default);
    }

    #[test]
    fn bad_commands_are_rejected() {
        let mut calendar = RateCalendar::new();
        assert!(run(&mut calendar, "define_season:0,2,30,0,0").is_err());
        assert!(run(&mut calendar, "define_schedule:0").is_err());
        assert!(run(&mut calendar, "add_period:0,7,0,on_peak").is_err());
        assert!(run(&mut calendar, "find:6,2,1,x,0").is_err());
        assert!(run(&mut calendar, "save").is_err());
        assert!(run(&mut calendar, "blink").is_err());
    }
}
