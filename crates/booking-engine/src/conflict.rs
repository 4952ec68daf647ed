//! Availability checking for one candidate interval.
//!
//! Four sources are reconciled in a fixed order. Schedule membership fails fast;
//! appointments, blocking events and holidays accumulate conflicts. Appointments
//! and the schedule are mandatory signals whose store failures propagate;
//! events and holidays degrade to "no conflict" when their store is down.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use crate::config::ScheduleLookupPolicy;
use crate::engine::BookingEngine;
use crate::error::{EngineError, Result, StoreSource};
use crate::model::{
    overlaps, AvailabilityCheckResult, CalendarEvent, Conflict, ConflictType, ProviderId,
};

impl BookingEngine {
    /// Decide whether `[candidate_start, candidate_start + duration_minutes)` is bookable.
    ///
    /// # Errors
    /// Returns `EngineError::Validation` for a non-positive or unrepresentable duration and
    /// `EngineError::StoreUnavailable` when the appointment store (or, under the
    /// `propagate` policy, the window store) cannot answer.
    pub async fn check_availability(
        &self,
        provider_id: ProviderId,
        candidate_start: DateTime<Utc>,
        duration_minutes: i64,
    ) -> Result<AvailabilityCheckResult> {
        if duration_minutes <= 0 {
            return Err(EngineError::Validation(format!(
                "duration must be positive, got {} minutes",
                duration_minutes
            )));
        }
        let candidate_end = Duration::try_minutes(duration_minutes)
            .and_then(|length| candidate_start.checked_add_signed(length))
            .ok_or_else(|| {
                EngineError::Validation(format!(
                    "duration of {} minutes is out of range",
                    duration_minutes
                ))
            })?;

        if !self.in_schedule(provider_id, candidate_start, candidate_end).await? {
            debug!(provider_id = %provider_id, start = %candidate_start, "candidate outside schedule");
            return Ok(AvailabilityCheckResult {
                available: false,
                conflicts: vec![Conflict {
                    conflict_type: ConflictType::OutsideSchedule,
                    title: "Outside schedule".to_string(),
                    start_time: candidate_start,
                    end_time: candidate_end,
                    details: "Outside provider's working hours".to_string(),
                }],
                suggestion: None,
                suggested_start: None,
            });
        }

        let mut conflicts = self
            .appointment_conflicts(provider_id, candidate_start, candidate_end)
            .await?;
        conflicts.extend(
            self.event_conflicts(provider_id, candidate_start, candidate_end)
                .await,
        );
        conflicts.extend(self.holiday_conflicts(candidate_start, candidate_end).await);

        debug!(
            provider_id = %provider_id,
            start = %candidate_start,
            conflicts = conflicts.len(),
            "availability checked"
        );

        if conflicts.is_empty() {
            return Ok(AvailabilityCheckResult {
                available: true,
                conflicts,
                suggestion: None,
                suggested_start: None,
            });
        }

        let next = self.next_window_start(provider_id, candidate_end).await;
        Ok(AvailabilityCheckResult {
            available: false,
            conflicts,
            suggestion: Some(self.format_suggestion(next)),
            suggested_start: Some(next),
        })
    }

    async fn in_schedule(
        &self,
        provider_id: ProviderId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<bool> {
        let lookup = self
            .bounded(self.stores.windows.exists_exact(provider_id, start, end))
            .await;

        match lookup {
            Ok(found) => Ok(found),
            Err(error) => match self.config.schedule_lookup_failure {
                ScheduleLookupPolicy::Propagate => Err(EngineError::StoreUnavailable {
                    store: StoreSource::Windows,
                    error,
                }),
                ScheduleLookupPolicy::Deny => {
                    warn!(provider_id = %provider_id, error = %error, "schedule lookup failed; denying candidate");
                    Ok(false)
                }
                ScheduleLookupPolicy::Allow => {
                    warn!(provider_id = %provider_id, error = %error, "schedule lookup failed; assuming in schedule");
                    Ok(true)
                }
            },
        }
    }

    async fn appointment_conflicts(
        &self,
        provider_id: ProviderId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Conflict>> {
        let appointments = self
            .required(
                StoreSource::Appointments,
                self.stores.appointments.list_overlapping(provider_id, start, end),
            )
            .await?;

        Ok(appointments
            .into_iter()
            .filter(|a| !a.canceled && overlaps(a.start_time, a.end_time, start, end))
            .map(|a| Conflict {
                conflict_type: ConflictType::Appointment,
                title: a.title,
                start_time: a.start_time,
                end_time: a.end_time,
                details: "Existing appointment".to_string(),
            })
            .collect())
    }

    async fn event_conflicts(
        &self,
        provider_id: ProviderId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Vec<Conflict> {
        let events: Vec<CalendarEvent> = self
            .optional(
                StoreSource::Events,
                self.stores
                    .events
                    .list_templates_and_simple_events(provider_id, start, end),
            )
            .await;

        let mut conflicts = Vec::new();
        for event in events.iter().filter(|e| e.blocks_appointments) {
            if event.is_template() {
                match self.expander.expand(event, start, end) {
                    Ok(occurrences) => conflicts.extend(
                        occurrences
                            .into_iter()
                            .filter(|o| overlaps(o.start_time, o.end_time, start, end))
                            .map(|o| event_conflict(event, o.start_time, o.end_time)),
                    ),
                    Err(error) => {
                        // Unexpandable templates still block their own interval.
                        warn!(event_id = %event.event_id, error = %error, "checking template unexpanded");
                        if overlaps(event.start_time, event.end_time, start, end) {
                            conflicts.push(event_conflict(event, event.start_time, event.end_time));
                        }
                    }
                }
            } else if overlaps(event.start_time, event.end_time, start, end) {
                conflicts.push(event_conflict(event, event.start_time, event.end_time));
            }
        }
        conflicts
    }

    async fn holiday_conflicts(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<Conflict> {
        let first_day = self.local_date(start);
        let last_day = self.local_date((end - Duration::nanoseconds(1)).max(start));

        let holidays = self
            .optional(
                StoreSource::Holidays,
                self.stores.holidays.list_affecting(first_day, last_day),
            )
            .await;

        holidays
            .into_iter()
            .filter(|h| h.affects_booking && h.covers_any(first_day, last_day))
            .map(|h| Conflict {
                conflict_type: ConflictType::Holiday,
                start_time: self.day_start(h.date),
                end_time: self.day_start(h.end_date_exclusive()),
                title: h.name,
                details: "Public holiday".to_string(),
            })
            .collect()
    }

    /// Earliest window start at or after `after`, else `after` plus the fallback offset.
    async fn next_window_start(&self, provider_id: ProviderId, after: DateTime<Utc>) -> DateTime<Utc> {
        let fallback = Duration::try_minutes(self.config.suggestion_fallback_minutes)
            .and_then(|offset| after.checked_add_signed(offset))
            .unwrap_or(after);
        match self
            .bounded(self.stores.windows.find_next_start(provider_id, after))
            .await
        {
            Ok(Some(next)) => next,
            Ok(None) => fallback,
            Err(error) => {
                warn!(provider_id = %provider_id, error = %error, "next-window lookup failed; using fallback");
                fallback
            }
        }
    }

    fn format_suggestion(&self, at: DateTime<Utc>) -> String {
        format!(
            "Next available slot at {}",
            at.with_timezone(&self.timezone).format("%-I:%M %p")
        )
    }
}

fn event_conflict(event: &CalendarEvent, start: DateTime<Utc>, end: DateTime<Utc>) -> Conflict {
    Conflict {
        conflict_type: ConflictType::Event,
        title: event.title.clone(),
        start_time: start,
        end_time: end,
        details: format!("Personal event ({})", event.event_type),
    }
}
