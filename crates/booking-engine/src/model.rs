//! Data model shared by the expander, the conflict checker and the stores.
//!
//! Stored rows (`CalendarEvent`, `AvailabilityWindow`, ...) and ephemeral values
//! (`Occurrence`, `Conflict`) are distinct types: an occurrence carries an
//! `OccurrenceId`, which no store method accepts, so it cannot be persisted by
//! accident.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Days, Duration, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::error::EngineError;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// A fresh random identifier.
            pub fn generate() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = EngineError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s.trim())
                    .map(Self)
                    .map_err(|_| EngineError::Validation(format!("invalid {}: {:?}", $label, s)))
            }
        }
    };
}

uuid_id!(
    /// The practitioner whose calendar is scheduled against.
    ProviderId,
    "provider ID"
);
uuid_id!(
    /// Primary key of a stored calendar event row.
    EventId,
    "event ID"
);
uuid_id!(
    /// Per-response identifier of an expanded occurrence. Never persisted.
    OccurrenceId,
    "occurrence ID"
);

/// Half-open interval overlap, `[a_start, a_end)` against `[b_start, b_end)`.
///
/// Adjacent intervals do not overlap. A zero-length `a` starting inside `b`
/// still counts, so instantaneous rows are not silently ignored.
pub fn overlaps(
    a_start: DateTime<Utc>,
    a_end: DateTime<Utc>,
    b_start: DateTime<Utc>,
    b_end: DateTime<Utc>,
) -> bool {
    (a_start < b_end && a_end > b_start) || (a_start >= b_start && a_start < b_end)
}

// ---------------------------------------------------------------------------
// Calendar events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Personal,
    Blocked,
    RecurringBlock,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventType::Personal => "personal",
            EventType::Blocked => "blocked",
            EventType::RecurringBlock => "recurring_block",
        };
        f.write_str(name)
    }
}

/// How a template repeats.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frequency {
    Daily,
    /// Weekdays the series lands on. Empty means "the template's own weekday".
    Weekly(Vec<Weekday>),
    Monthly,
    /// A stored pattern name this engine does not know. Templates carrying it
    /// are returned unexpanded.
    Unrecognized(String),
}

/// Recurrence attached to a template event.
///
/// Serialized in the legacy map shape:
/// `{"pattern": "weekly", "daysOfWeek": [1, 3], "endDate": "2025-03-31"}`
/// with weekdays numbered 1 = Monday through 7 = Sunday.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawRecurrencePattern", into = "RawRecurrencePattern")]
pub struct RecurrencePattern {
    pub frequency: Frequency,
    /// Last date (inclusive, provider zone) on which the series may start.
    pub end_date: Option<NaiveDate>,
    /// Carried through storage; expansion does not consult it.
    pub occurrence_count: Option<u32>,
}

impl RecurrencePattern {
    pub fn daily() -> Self {
        Self::new(Frequency::Daily)
    }

    pub fn weekly(days: Vec<Weekday>) -> Self {
        Self::new(Frequency::Weekly(days))
    }

    pub fn monthly() -> Self {
        Self::new(Frequency::Monthly)
    }

    pub fn with_end_date(mut self, end_date: NaiveDate) -> Self {
        self.end_date = Some(end_date);
        self
    }

    fn new(frequency: Frequency) -> Self {
        Self {
            frequency,
            end_date: None,
            occurrence_count: None,
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRecurrencePattern {
    pattern: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    days_of_week: Vec<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    end_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    occurrence_count: Option<u32>,
}

/// 1 = Monday ... 7 = Sunday.
pub fn weekday_from_number(n: i64) -> Option<Weekday> {
    match n {
        1 => Some(Weekday::Mon),
        2 => Some(Weekday::Tue),
        3 => Some(Weekday::Wed),
        4 => Some(Weekday::Thu),
        5 => Some(Weekday::Fri),
        6 => Some(Weekday::Sat),
        7 => Some(Weekday::Sun),
        _ => None,
    }
}

impl From<RawRecurrencePattern> for RecurrencePattern {
    fn from(raw: RawRecurrencePattern) -> Self {
        let frequency = match raw.pattern.trim().to_ascii_lowercase().as_str() {
            "daily" => Frequency::Daily,
            "weekly" => {
                let mut days: Vec<Weekday> = Vec::new();
                for day in raw.days_of_week.iter().filter_map(|n| weekday_from_number(*n)) {
                    if !days.contains(&day) {
                        days.push(day);
                    }
                }
                Frequency::Weekly(days)
            }
            "monthly" => Frequency::Monthly,
            _ => Frequency::Unrecognized(raw.pattern.clone()),
        };

        let end_date = raw.end_date.as_deref().and_then(|s| {
            // Accept a full timestamp too; only the date part matters.
            let date_part = s.get(..10).unwrap_or(s);
            match NaiveDate::parse_from_str(date_part, "%Y-%m-%d") {
                Ok(date) => Some(date),
                Err(e) => {
                    warn!(end_date = s, error = %e, "ignoring unparseable recurrence endDate");
                    None
                }
            }
        });

        Self {
            frequency,
            end_date,
            occurrence_count: raw.occurrence_count,
        }
    }
}

impl From<RecurrencePattern> for RawRecurrencePattern {
    fn from(pattern: RecurrencePattern) -> Self {
        let (name, days) = match pattern.frequency {
            Frequency::Daily => ("daily".to_string(), Vec::new()),
            Frequency::Weekly(days) => (
                "weekly".to_string(),
                days.iter().map(|d| i64::from(d.number_from_monday())).collect(),
            ),
            Frequency::Monthly => ("monthly".to_string(), Vec::new()),
            Frequency::Unrecognized(name) => (name, Vec::new()),
        };
        Self {
            pattern: name,
            days_of_week: days,
            end_date: pattern.end_date.map(|d| d.format("%Y-%m-%d").to_string()),
            occurrence_count: pattern.occurrence_count,
        }
    }
}

/// A stored calendar event row. Rows with a recurrence pattern are templates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    pub event_id: EventId,
    pub provider_id: ProviderId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub event_type: EventType,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub all_day: bool,
    #[serde(default)]
    pub blocks_appointments: bool,
    #[serde(
        default,
        alias = "recurringPattern",
        skip_serializing_if = "Option::is_none"
    )]
    pub recurrence_pattern: Option<RecurrencePattern>,
    /// Only set on legacy rows that materialized an occurrence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_event_id: Option<EventId>,
    pub color: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CalendarEvent {
    pub fn is_template(&self) -> bool {
        self.recurrence_pattern.is_some()
    }

    pub fn duration(&self) -> Duration {
        self.end_time - self.start_time
    }

    /// The blocked event a legacy time-off row migrates into.
    pub fn from_time_off(row: &LegacyTimeOff, color: &str, now: DateTime<Utc>) -> Self {
        Self {
            event_id: EventId::generate(),
            provider_id: row.provider_id,
            title: "Time off".to_string(),
            description: None,
            event_type: EventType::Blocked,
            start_time: row.start_time,
            end_time: row.end_time,
            all_day: false,
            blocks_appointments: true,
            recurrence_pattern: None,
            parent_event_id: None,
            color: color.to_string(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// One concrete, ephemeral instance of a template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Occurrence {
    pub occurrence_id: OccurrenceId,
    pub parent_event_id: EventId,
    pub provider_id: ProviderId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub event_type: EventType,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub all_day: bool,
    pub blocks_appointments: bool,
    pub color: String,
}

impl Occurrence {
    pub fn from_template(template: &CalendarEvent, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            occurrence_id: OccurrenceId::generate(),
            parent_event_id: template.event_id,
            provider_id: template.provider_id,
            title: template.title.clone(),
            description: template.description.clone(),
            event_type: template.event_type,
            start_time: start,
            end_time: end,
            all_day: template.all_day,
            blocks_appointments: template.blocks_appointments,
            color: template.color.clone(),
        }
    }
}

/// An item of a provider's calendar view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CalendarEntry {
    Event(CalendarEvent),
    Occurrence(Occurrence),
}

impl CalendarEntry {
    pub fn start_time(&self) -> DateTime<Utc> {
        match self {
            CalendarEntry::Event(e) => e.start_time,
            CalendarEntry::Occurrence(o) => o.start_time,
        }
    }

    pub fn end_time(&self) -> DateTime<Utc> {
        match self {
            CalendarEntry::Event(e) => e.end_time,
            CalendarEntry::Occurrence(o) => o.end_time,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            CalendarEntry::Event(e) => &e.title,
            CalendarEntry::Occurrence(o) => &o.title,
        }
    }
}

/// Input of `create_calendar_event`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEventRequest {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub event_type: EventType,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub all_day: bool,
    #[serde(default)]
    pub blocks_appointments: bool,
    #[serde(default, alias = "recurringPattern")]
    pub recurrence_pattern: Option<RecurrencePattern>,
    #[serde(default)]
    pub color: Option<String>,
}

/// Partial update: every `Some` field replaces the stored value, `None` keeps it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EventPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub event_type: Option<EventType>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub all_day: Option<bool>,
    pub blocks_appointments: Option<bool>,
    #[serde(alias = "recurringPattern")]
    pub recurrence_pattern: Option<RecurrencePattern>,
    pub color: Option<String>,
}

impl EventPatch {
    pub fn apply(&self, event: &mut CalendarEvent, now: DateTime<Utc>) {
        if let Some(title) = &self.title {
            event.title = title.clone();
        }
        if let Some(description) = &self.description {
            event.description = Some(description.clone());
        }
        if let Some(event_type) = self.event_type {
            event.event_type = event_type;
        }
        if let Some(start) = self.start_time {
            event.start_time = start;
        }
        if let Some(end) = self.end_time {
            event.end_time = end;
        }
        if let Some(all_day) = self.all_day {
            event.all_day = all_day;
        }
        if let Some(blocks) = self.blocks_appointments {
            event.blocks_appointments = blocks;
        }
        if let Some(pattern) = &self.recurrence_pattern {
            event.recurrence_pattern = Some(pattern.clone());
        }
        if let Some(color) = &self.color {
            event.color = color.clone();
        }
        event.updated_at = now;
    }
}

// ---------------------------------------------------------------------------
// Read-only sources
// ---------------------------------------------------------------------------

/// A precomputed, discrete bookable interval. Candidates match it only on
/// exact `[start, end)` equality.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityWindow {
    pub provider_id: ProviderId,
    /// 1 = Monday ... 7 = Sunday, in the provider zone.
    pub weekday: u8,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub slot_duration: i64,
}

impl AvailabilityWindow {
    pub fn new(
        provider_id: ProviderId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        timezone: chrono_tz::Tz,
    ) -> Self {
        use chrono::Datelike;
        Self {
            provider_id,
            weekday: start.with_timezone(&timezone).weekday().number_from_monday() as u8,
            start,
            end,
            slot_duration: (end - start).num_minutes(),
        }
    }

    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    pub appointment_id: Uuid,
    pub provider_id: ProviderId,
    pub title: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub canceled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicHoliday {
    pub holiday_id: Uuid,
    pub name: String,
    pub date: NaiveDate,
    #[serde(default = "one_day")]
    pub duration_days: u32,
    #[serde(default)]
    pub affects_booking: bool,
}

fn one_day() -> u32 {
    1
}

impl PublicHoliday {
    /// First date no longer covered by the holiday.
    pub fn end_date_exclusive(&self) -> NaiveDate {
        self.date
            .checked_add_days(Days::new(u64::from(self.duration_days.max(1))))
            .unwrap_or(NaiveDate::MAX)
    }

    /// Whether `[date, end)` touches any day of `[from, to]` (both inclusive).
    pub fn covers_any(&self, from: NaiveDate, to: NaiveDate) -> bool {
        self.date <= to && self.end_date_exclusive() > from
    }
}

/// A row of the legacy per-provider time-off table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyTimeOff {
    pub id: Uuid,
    pub provider_id: ProviderId,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Check results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictType {
    Appointment,
    Event,
    Holiday,
    Exception,
    OutsideSchedule,
}

/// One reason a candidate is not bookable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conflict {
    #[serde(rename = "type")]
    pub conflict_type: ConflictType,
    pub title: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub details: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityCheckResult {
    pub available: bool,
    #[serde(default)]
    pub conflicts: Vec<Conflict>,
    /// Advisory text only; the suggested time is not itself re-checked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_start: Option<DateTime<Utc>>,
}

impl AvailabilityCheckResult {
    pub fn conflicts_of(&self, conflict_type: ConflictType) -> impl Iterator<Item = &Conflict> {
        self.conflicts
            .iter()
            .filter(move |c| c.conflict_type == conflict_type)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailableSlot {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub available: bool,
}

impl From<&AvailabilityWindow> for AvailableSlot {
    fn from(window: &AvailabilityWindow) -> Self {
        Self {
            start_time: window.start,
            end_time: window.end,
            available: true,
        }
    }
}
