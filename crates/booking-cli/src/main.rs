//! `booking` CLI — check availability and manage calendar events over a JSON
//! calendar snapshot.
//!
//! ## Usage
//!
//! ```sh
//! # Is 09:00-09:30 bookable?
//! booking --data calendar.json check --provider <id> --start 2025-06-02T09:00:00Z
//!
//! # Free 30-minute slots over a week
//! booking --data calendar.json slots --provider <id> --from 2025-06-02 --to 2025-06-08
//!
//! # Calendar view with recurring blocks expanded
//! booking --data calendar.json --timezone Europe/Paris events --provider <id> --from 2025-06-01 --to 2025-06-30
//!
//! # Occurrences of one template, or its RRULE text
//! booking --data calendar.json expand --event <id> --from 2025-06-01 --to 2025-06-30
//! booking --data calendar.json expand --event <id> --from 2025-06-01 --to 2025-06-30 --rrule
//!
//! # Mutations write the snapshot back
//! booking --data calendar.json create --provider <id> --input event.json
//! booking --data calendar.json update --event <id> --input patch.json
//! booking --data calendar.json delete --event <id> --all
//! booking --data calendar.json migrate
//! ```
//!
//! Logs go to stderr; set `RUST_LOG` to raise the level above `warn`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use booking_engine::model::CreateEventRequest;
use booking_engine::{
    BookingEngine, CalendarSnapshot, EngineConfig, EngineError, EventId, EventPatch,
    InMemoryCalendar, ProviderId, Stores,
};

#[derive(Parser)]
#[command(
    name = "booking",
    version,
    about = "Availability checks and calendar events over a calendar snapshot"
)]
struct Cli {
    /// Calendar snapshot (JSON) to read, and to write back after mutations
    #[arg(long)]
    data: PathBuf,

    /// Engine configuration (JSON); every field is optional
    #[arg(long)]
    config: Option<PathBuf>,

    /// IANA zone of the provider calendar, overriding the config file
    #[arg(long)]
    timezone: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check whether one candidate interval is bookable
    Check {
        #[arg(long)]
        provider: String,
        /// Candidate start (RFC 3339)
        #[arg(long)]
        start: String,
        /// Candidate length in minutes
        #[arg(long, default_value_t = 30)]
        duration: i64,
    },
    /// List conflict-free windows between two dates (both inclusive)
    Slots {
        #[arg(long)]
        provider: String,
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        #[arg(long, default_value_t = 30)]
        duration: i64,
        /// Maximum number of windows considered
        #[arg(long, default_value_t = 10)]
        limit: i64,
    },
    /// List a provider's calendar with recurring blocks expanded
    Events {
        #[arg(long)]
        provider: String,
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
    },
    /// Expand one recurring template
    Expand {
        #[arg(long)]
        event: String,
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        /// Print the DTSTART/RRULE text instead of the occurrences
        #[arg(long)]
        rrule: bool,
    },
    /// Create an event from a JSON request
    Create {
        #[arg(long)]
        provider: String,
        /// Request file (JSON)
        #[arg(short, long)]
        input: PathBuf,
    },
    /// Apply a JSON patch to an event
    Update {
        #[arg(long)]
        event: String,
        /// Patch file (JSON)
        #[arg(short, long)]
        input: PathBuf,
    },
    /// Delete an event
    Delete {
        #[arg(long)]
        event: String,
        /// Also delete rows materialized from it
        #[arg(long)]
        all: bool,
    },
    /// Fold legacy time-off rows into blocked events
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    let mut config = match cli.config.as_deref() {
        Some(path) => read_json::<EngineConfig>(path)?,
        None => EngineConfig::default(),
    };
    if let Some(timezone) = cli.timezone {
        config.timezone = timezone;
    }

    let snapshot: CalendarSnapshot = read_json(&cli.data)?;
    let calendar = Arc::new(InMemoryCalendar::new(snapshot));
    let engine = BookingEngine::new(Stores::from_memory(calendar.clone()), config)
        .context("Invalid configuration")?;

    match cli.command {
        Commands::Check {
            provider,
            start,
            duration,
        } => {
            let result = engine
                .check_availability(parse_provider(&provider)?, parse_instant(&start)?, duration)
                .await?;
            print_json(&result)?;
        }
        Commands::Slots {
            provider,
            from,
            to,
            duration,
            limit,
        } => {
            let slots = engine
                .find_available_slots(
                    parse_provider(&provider)?,
                    parse_date(&from)?,
                    parse_date(&to)?,
                    duration,
                    limit,
                )
                .await?;
            print_json(&slots)?;
        }
        Commands::Events { provider, from, to } => {
            let entries = engine
                .get_calendar_events(parse_provider(&provider)?, parse_date(&from)?, parse_date(&to)?)
                .await?;
            print_json(&entries)?;
        }
        Commands::Expand {
            event,
            from,
            to,
            rrule,
        } => {
            let template = engine.get_calendar_event(parse_event(&event)?).await?;
            if rrule {
                let text = engine
                    .expander()
                    .rule_text(&template)
                    .with_context(|| format!("Event {} has no RRULE form", template.event_id))?;
                println!("{}", text);
            } else {
                let start = engine.day_start(parse_date(&from)?);
                let end = engine.day_start(next_day(parse_date(&to)?)?);
                let occurrences = engine
                    .expander()
                    .expand(&template, start, end)
                    .with_context(|| format!("Failed to expand event {}", template.event_id))?;
                print_json(&occurrences)?;
            }
        }
        Commands::Create { provider, input } => {
            let request: CreateEventRequest = read_json(&input)?;
            let event = engine
                .create_calendar_event(parse_provider(&provider)?, request)
                .await?;
            save_snapshot(&cli.data, &calendar)?;
            print_json(&event)?;
        }
        Commands::Update { event, input } => {
            let patch: EventPatch = read_json(&input)?;
            let event = engine
                .update_calendar_event(parse_event(&event)?, patch)
                .await?;
            save_snapshot(&cli.data, &calendar)?;
            print_json(&event)?;
        }
        Commands::Delete { event, all } => {
            let removed = engine.delete_calendar_event(parse_event(&event)?, all).await?;
            save_snapshot(&cli.data, &calendar)?;
            print_json(&serde_json::json!({ "removed": removed }))?;
        }
        Commands::Migrate => {
            let report = engine.migrate_legacy_time_off().await?;
            save_snapshot(&cli.data, &calendar)?;
            print_json(&report)?;
        }
    }

    Ok(())
}

fn init_tracing(json_logs: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let registry = tracing_subscriber::registry().with(filter);
    if json_logs {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn parse_provider(raw: &str) -> Result<ProviderId> {
    Ok(raw.parse::<ProviderId>()?)
}

fn parse_event(raw: &str) -> Result<EventId> {
    Ok(raw.parse::<EventId>()?)
}

fn parse_instant(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| EngineError::Validation(format!("invalid timestamp {:?}: {}", raw, e)).into())
}

fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|e| EngineError::Validation(format!("invalid date {:?}: {}", raw, e)).into())
}

fn next_day(date: NaiveDate) -> Result<NaiveDate> {
    date.succ_opt()
        .ok_or_else(|| EngineError::Validation(format!("date {} has no successor", date)).into())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Failed to parse JSON: {}", path.display()))
}

fn save_snapshot(path: &Path, calendar: &InMemoryCalendar) -> Result<()> {
    let snapshot = calendar.snapshot().context("Failed to read calendar")?;
    let json = serde_json::to_string_pretty(&snapshot)?;
    std::fs::write(path, json).with_context(|| format!("Failed to write file: {}", path.display()))?;
    debug!(path = %path.display(), "snapshot saved");
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
