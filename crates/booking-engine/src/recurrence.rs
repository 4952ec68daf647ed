//! Recurrence expansion -- converts a template event into concrete, ephemeral occurrences.
//!
//! Daily and weekly series are expanded through the `rrule` crate from a zoned
//! DTSTART, so the local wall-clock time survives DST changes. Monthly series are
//! stepped by calendar arithmetic instead: RFC 5545 `BYMONTHDAY=31` skips short
//! months, whereas a series pinned to the 31st here lands on the last day of
//! every shorter month (Jan 31 → Feb 29 → Mar 31 → Apr 30).

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc, Weekday};
use chrono_tz::Tz;
use rrule::RRuleSet;
use tracing::debug;

use crate::error::RecurrenceError;
use crate::model::{overlaps, CalendarEvent, Frequency, Occurrence, RecurrencePattern};

/// Default bound on the number of series occurrences generated per template.
pub const DEFAULT_MAX_OCCURRENCES: usize = 365;

/// Expands template events in one provider zone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Expander {
    timezone: Tz,
    max_occurrences: usize,
}

impl Default for Expander {
    fn default() -> Self {
        Self::new(Tz::UTC)
    }
}

impl Expander {
    pub fn new(timezone: Tz) -> Self {
        Self {
            timezone,
            max_occurrences: DEFAULT_MAX_OCCURRENCES,
        }
    }

    /// Override the series cap. The cap counts occurrences from the template's
    /// own start, including those that fall before the requested range.
    pub fn with_max_occurrences(mut self, max_occurrences: usize) -> Self {
        self.max_occurrences = max_occurrences;
        self
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    pub fn max_occurrences(&self) -> usize {
        self.max_occurrences
    }

    /// Expand `template` into the occurrences that intersect `[range_start, range_end)`.
    ///
    /// Every occurrence keeps the template's duration, title, color and blocking
    /// flag, gets a fresh `OccurrenceId`, and points back at the template through
    /// `parent_event_id`. Output is chronological.
    ///
    /// # Errors
    /// Returns `RecurrenceError::NotRecurring` if the template has no pattern,
    /// `RecurrenceError::Unrecognized` for an unknown pattern name, and
    /// `RecurrenceError::InvalidRule` if the generated RRULE cannot be parsed.
    /// Callers fall back to the unexpanded template in the last two cases.
    pub fn expand(
        &self,
        template: &CalendarEvent,
        range_start: DateTime<Utc>,
        range_end: DateTime<Utc>,
    ) -> Result<Vec<Occurrence>, RecurrenceError> {
        let pattern = template
            .recurrence_pattern
            .as_ref()
            .ok_or(RecurrenceError::NotRecurring)?;

        if range_start > range_end {
            return Ok(Vec::new());
        }

        let effective_end = self.effective_end(pattern, range_end);
        let starts = self.series_starts(template, pattern, effective_end)?;
        let duration = template.duration();

        let occurrences: Vec<Occurrence> = starts
            .into_iter()
            .map(|start| (start, start + duration))
            .filter(|&(start, end)| overlaps(start, end, range_start, range_end))
            .map(|(start, end)| Occurrence::from_template(template, start, end))
            .collect();

        debug!(
            event_id = %template.event_id,
            title = %template.title,
            occurrences = occurrences.len(),
            "expanded recurring event"
        );

        Ok(occurrences)
    }

    /// The iCalendar text (DTSTART + RRULE) that drives a daily or weekly series.
    ///
    /// Returns `None` for monthly and unrecognized patterns, which are not
    /// expanded through RRULE, and for events without a pattern.
    pub fn rule_text(&self, template: &CalendarEvent) -> Option<String> {
        let pattern = template.recurrence_pattern.as_ref()?;
        let local_start = template.start_time.with_timezone(&self.timezone);

        let rule = match &pattern.frequency {
            Frequency::Daily => "FREQ=DAILY".to_string(),
            Frequency::Weekly(days) => {
                let days = effective_weekdays(days, local_start.weekday());
                let byday: Vec<&str> = days.iter().map(|d| byday_code(*d)).collect();
                format!("FREQ=WEEKLY;BYDAY={}", byday.join(","))
            }
            Frequency::Monthly | Frequency::Unrecognized(_) => return None,
        };

        Some(format!(
            "DTSTART;TZID={}:{}\nRRULE:{}",
            self.timezone.name(),
            local_start.naive_local().format("%Y%m%dT%H%M%S"),
            rule
        ))
    }

    /// `min(range_end, end_date at 23:59:59 local)`.
    fn effective_end(&self, pattern: &RecurrencePattern, range_end: DateTime<Utc>) -> DateTime<Utc> {
        pattern
            .end_date
            .and_then(|date| date.and_hms_opt(23, 59, 59))
            .and_then(|naive| resolve_local(self.timezone, naive))
            .map_or(range_end, |end| end.min(range_end))
    }

    /// Series start instants `< effective_end`, counted from the template start
    /// and bounded by the cap.
    fn series_starts(
        &self,
        template: &CalendarEvent,
        pattern: &RecurrencePattern,
        effective_end: DateTime<Utc>,
    ) -> Result<Vec<DateTime<Utc>>, RecurrenceError> {
        let starts = match &pattern.frequency {
            Frequency::Unrecognized(name) => {
                return Err(RecurrenceError::Unrecognized(name.clone()));
            }
            _ if self.max_occurrences == 0 || template.start_time >= effective_end => Vec::new(),
            Frequency::Daily => self.rule_starts(template)?,
            Frequency::Weekly(days) => {
                let local_weekday = template.start_time.with_timezone(&self.timezone).weekday();
                let days = effective_weekdays(days, local_weekday);
                self.rule_starts(template)?
                    .into_iter()
                    .filter(|s| days.contains(&s.with_timezone(&self.timezone).weekday()))
                    .collect()
            }
            Frequency::Monthly => self.monthly_starts(template.start_time, effective_end),
        };

        Ok(starts
            .into_iter()
            .take_while(|start| *start < effective_end)
            .collect())
    }

    fn rule_starts(&self, template: &CalendarEvent) -> Result<Vec<DateTime<Utc>>, RecurrenceError> {
        let text = self
            .rule_text(template)
            .ok_or_else(|| RecurrenceError::InvalidRule("pattern has no RRULE form".to_string()))?;

        let rrule_set: RRuleSet = text
            .parse()
            .map_err(|e| RecurrenceError::InvalidRule(format!("{}", e)))?;

        let limit = u16::try_from(self.max_occurrences).unwrap_or(u16::MAX);
        Ok(rrule_set
            .all(limit)
            .dates
            .into_iter()
            .map(|dt| dt.with_timezone(&Utc))
            .collect())
    }

    fn monthly_starts(&self, start: DateTime<Utc>, effective_end: DateTime<Utc>) -> Vec<DateTime<Utc>> {
        let local = start.with_timezone(&self.timezone);
        let pinned_day = local.day();
        let time_of_day = local.time();
        let (mut year, mut month) = (local.year(), local.month());

        let mut starts = Vec::new();
        while starts.len() < self.max_occurrences {
            let day = pinned_day.min(last_day_of_month(year, month));
            let instant = NaiveDate::from_ymd_opt(year, month, day)
                .map(|date| date.and_time(time_of_day))
                .and_then(|naive| resolve_local(self.timezone, naive));

            match instant {
                Some(instant) if instant >= effective_end => break,
                Some(instant) => starts.push(instant),
                None => break,
            }

            if month == 12 {
                year += 1;
                month = 1;
            } else {
                month += 1;
            }
        }
        starts
    }
}

/// The day set of a weekly series; an empty set means the template's own weekday.
fn effective_weekdays(days: &[Weekday], template_weekday: Weekday) -> Vec<Weekday> {
    if days.is_empty() {
        vec![template_weekday]
    } else {
        days.to_vec()
    }
}

fn byday_code(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "MO",
        Weekday::Tue => "TU",
        Weekday::Wed => "WE",
        Weekday::Thu => "TH",
        Weekday::Fri => "FR",
        Weekday::Sat => "SA",
        Weekday::Sun => "SU",
    }
}

/// Last valid day-of-month, 28..=31.
pub fn last_day_of_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|first| first.pred_opt())
        .map_or(28, |last| last.day())
}

/// Map a local wall-clock time to an instant. Ambiguous times take the earlier
/// instant; times inside a DST gap shift forward by the gap (one hour).
pub(crate) fn resolve_local(timezone: Tz, naive: NaiveDateTime) -> Option<DateTime<Utc>> {
    timezone
        .from_local_datetime(&naive)
        .earliest()
        .or_else(|| timezone.from_local_datetime(&(naive + Duration::hours(1))).earliest())
        .map(|dt| dt.with_timezone(&Utc))
}
