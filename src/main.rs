use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{bail, Result, WrapErr};
use rate_minder::*;
use std::path::PathBuf;
use tokio::time::{self, Duration};
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Rate plan configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    /// Persisted user image, overriding the one named in the configuration
    #[arg(short, long, global = true)]
    image: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Clone, Copy, ValueEnum, Debug)]
enum Weekday {
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
    Sat,
    Sun,
}

impl Weekday {
    /// Day of week as the resolver counts it (1 == Monday)
    fn number(self) -> u8 {
        self as u8 + 1
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Show the rate period in effect now
    Now,
    /// Show the rate period in effect at a given date and time
    At {
        /// Month (1-12)
        #[arg(long)]
        month: u8,
        /// Day of month (1-31)
        #[arg(long)]
        day: u8,
        /// Day of week
        #[arg(short, long, value_enum)]
        weekday: Weekday,
        /// Hour (0-23)
        #[arg(long, default_value_t = 0)]
        hour: u8,
        /// Minute (0-59)
        #[arg(short, long, default_value_t = 0)]
        minute: u8,
    },
    /// Check the calendar for errors
    Check {
        /// Check the user banks even if they are not in effect yet
        #[arg(short, long)]
        user: bool,
    },
    /// List seasons and their schedules
    Show {
        /// List the user banks even if they are not in effect yet
        #[arg(short, long)]
        user: bool,
    },
    /// Write the user banks to the image file
    Export {
        /// Output file (defaults to the image path)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Re-resolve periodically and log every period change
    Watch {
        /// Seconds between lookups
        #[arg(long, default_value_t = 60)]
        interval: u64,
    },
}

/// Where the rate plan comes from
#[derive(Clone, Debug)]
struct PlanSources {
    config: Option<PathBuf>,
    image: Option<PathBuf>,
}

impl PlanSources {
    /// Builds the calendar: user image first, then configuration on top
    #[instrument]
    fn load(&self) -> Result<(RateCalendar, Option<ImageStore>)> {
        let config = match &self.config {
            Some(path) => Some(
                RateConfig::from_file(path)
                    .wrap_err_with(|| format!("Failed to read config {}", path.display()))?,
            ),
            None => None,
        };

        let store = self
            .image
            .clone()
            .or_else(|| config.as_ref().and_then(|c| c.image.clone()))
            .map(ImageStore::new);
        let image = match &store {
            Some(store) => store
                .load()
                .wrap_err_with(|| format!("Failed to load image {}", store.path().display()))?,
            None => UserImage::default(),
        };

        let mut calendar = RateCalendar::from_image(image);
        if let Some(config) = &config {
            config.apply(&mut calendar)?;
        }

        debug!(
            "Calendar uses {} seasons and {} schedules",
            calendar.seasons().source(),
            calendar.schedules().source()
        );
        Ok((calendar, store))
    }
}

#[tokio::main]
#[instrument]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("RUST_LOG")
                .unwrap_or_else(|_| EnvFilter::new("rate_minder=info,ratec=info")),
        )
        .compact()
        .init();

    color_eyre::install()?;

    let cli = Cli::parse();
    debug!("Parsed command line arguments");

    let sources = PlanSources {
        config: cli.config,
        image: cli.image,
    };
    let (calendar, store) = sources.load()?;
    let mut resolver = PeriodResolver::new();

    match cli.command.unwrap_or(Commands::Now) {
        Commands::Now => {
            let at = ClockReading::now();
            let resolution = resolver.find_period(&calendar, at)?;
            print_resolution(at, &resolution);
        }
        Commands::At {
            month,
            day,
            weekday,
            hour,
            minute,
        } => {
            let at = ClockReading::new(month, day, weekday.number(), hour, minute)?;
            let resolution = resolver.find_period(&calendar, at)?;
            print_resolution(at, &resolution);
        }
        Commands::Check { user } => {
            let issues = if user {
                calendar.check_user()
            } else {
                calendar.check()
            };
            for issue in &issues {
                println!("{:?}: {}", issue.severity(), issue);
            }
            let errors = issues
                .iter()
                .filter(|issue| issue.severity() == Severity::Error)
                .count();
            if errors > 0 {
                bail!("Calendar has {} error(s)", errors);
            }
            println!("Calendar OK");
        }
        Commands::Show { user: false } => print!("{}", calendar),
        Commands::Show { user: true } => print!("{}", calendar.user_listing()),
        Commands::Export { out } => {
            let store = match (out, store) {
                (Some(out), _) => ImageStore::new(out),
                (None, Some(store)) => store,
                (None, None) => bail!("No image path given; use --out or --image"),
            };
            store.save(&calendar.user_image())?;
        }
        Commands::Watch { interval } => {
            let shared = SharedCalendar::new(calendar);
            #[cfg(unix)]
            spawn_reload_on_hangup(shared.clone(), sources);
            watch(shared, interval).await?;
        }
    }

    Ok(())
}

/// Print a lookup result on one line
fn print_resolution(at: ClockReading, resolution: &Resolution) {
    println!(
        "{}: {} now, {} in {}",
        at,
        resolution.current,
        resolution.next,
        format_minutes(resolution.minutes_to_next)
    );
}

fn format_minutes(minutes: u16) -> String {
    if minutes == u16::MAX {
        return format!("{}+ min", minutes);
    }
    format!("{}h{:02}", minutes / 60, minutes % 60)
}

/// Look up the period once per wake-up until interrupted
#[instrument(skip(shared))]
async fn watch(shared: SharedCalendar, interval: u64) -> Result<()> {
    info!("Watching rate periods every {}s", interval);
    let mut ticker = time::interval(Duration::from_secs(interval.max(1)));
    let mut resolver = PeriodResolver::new();
    let mut current: Option<PeriodKind> = None;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let at = ClockReading::now();
                match shared.find_period(&mut resolver, at) {
                    Ok(resolution) if current != Some(resolution.current) => {
                        info!(
                            "{} period started; {} in {}",
                            resolution.current,
                            resolution.next,
                            format_minutes(resolution.minutes_to_next)
                        );
                        current = Some(resolution.current);
                    }
                    Ok(resolution) => {
                        debug!("Still {}", resolution.current);
                    }
                    Err(e) => {
                        error!("Lookup failed at {}: {}", at, e);
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Stopping watch");
                break;
            }
        }
    }

    Ok(())
}

/// Reload the rate plan into `shared` on every SIGHUP
#[cfg(unix)]
fn spawn_reload_on_hangup(shared: SharedCalendar, sources: PlanSources) {
    use tokio::signal::unix::{signal, SignalKind};

    tokio::spawn(async move {
        let mut hangup = match signal(SignalKind::hangup()) {
            Ok(hangup) => hangup,
            Err(e) => {
                warn!("Cannot listen for SIGHUP: {}", e);
                return;
            }
        };

        while hangup.recv().await.is_some() {
            match sources.load() {
                Ok((calendar, _)) => {
                    shared.replace(calendar);
                    info!("Rate plan reloaded");
                }
                Err(e) => error!("Reload failed, keeping current plan: {:?}", e),
            }
        }
    });
}
