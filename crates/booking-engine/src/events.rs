//! Provider-facing calendar event management.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use tracing::{debug, info, warn};

use crate::engine::BookingEngine;
use crate::error::{EngineError, Result, StoreSource};
use crate::model::{
    CalendarEntry, CalendarEvent, CreateEventRequest, EventId, EventPatch, ProviderId,
};

impl BookingEngine {
    /// Store a new event (or recurring template) for `provider_id`.
    ///
    /// # Errors
    /// Returns `EngineError::Validation` for an empty title or `end <= start`.
    pub async fn create_calendar_event(
        &self,
        provider_id: ProviderId,
        request: CreateEventRequest,
    ) -> Result<CalendarEvent> {
        if request.title.trim().is_empty() {
            return Err(EngineError::Validation("title is required".to_string()));
        }
        validate_interval(&request.start_time, &request.end_time)?;

        let now = Utc::now();
        let color = request
            .color
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(|| self.config.default_event_color.clone());

        let event = CalendarEvent {
            event_id: EventId::generate(),
            provider_id,
            title: request.title,
            description: request.description,
            event_type: request.event_type,
            start_time: request.start_time,
            end_time: request.end_time,
            all_day: request.all_day,
            blocks_appointments: request.blocks_appointments,
            recurrence_pattern: request.recurrence_pattern,
            parent_event_id: None,
            color,
            created_at: now,
            updated_at: now,
        };

        self.required(StoreSource::Events, self.stores.events.insert(event.clone()))
            .await?;
        info!(event_id = %event.event_id, provider_id = %provider_id, "calendar event created");
        Ok(event)
    }

    /// The provider's calendar between two local dates (both inclusive), with
    /// recurring templates expanded into occurrences. Chronological.
    pub async fn get_calendar_events(
        &self,
        provider_id: ProviderId,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<CalendarEntry>> {
        let range_start = self.day_start(start_date);
        let range_end = self.day_start(end_date + Duration::days(1));

        let events = self
            .required(
                StoreSource::Events,
                self.stores
                    .events
                    .list_templates_and_simple_events(provider_id, range_start, range_end),
            )
            .await?;

        let mut entries = Vec::new();
        for event in events {
            if event.is_template() {
                match self.expander.expand(&event, range_start, range_end) {
                    Ok(occurrences) => {
                        entries.extend(occurrences.into_iter().map(CalendarEntry::Occurrence))
                    }
                    Err(error) => {
                        warn!(event_id = %event.event_id, error = %error, "returning template unexpanded");
                        entries.push(CalendarEntry::Event(event));
                    }
                }
            } else if event.start_time < range_end && event.end_time > range_start {
                entries.push(CalendarEntry::Event(event));
            }
        }

        entries.sort_by_key(|e| e.start_time());
        debug!(provider_id = %provider_id, entries = entries.len(), "calendar listed");
        Ok(entries)
    }

    pub async fn get_calendar_event(&self, event_id: EventId) -> Result<CalendarEvent> {
        self.required(StoreSource::Events, self.stores.events.get(event_id))
            .await?
            .ok_or(EngineError::NotFound(event_id))
    }

    /// Replace the fields set in `patch`, keeping the rest.
    ///
    /// # Errors
    /// Returns `EngineError::NotFound` for an unknown ID and
    /// `EngineError::Validation` if the patched event would end at or before its start.
    pub async fn update_calendar_event(
        &self,
        event_id: EventId,
        patch: EventPatch,
    ) -> Result<CalendarEvent> {
        let now = Utc::now();

        let mut preview = self.get_calendar_event(event_id).await?;
        patch.apply(&mut preview, now);
        validate_interval(&preview.start_time, &preview.end_time)?;
        if preview.title.trim().is_empty() {
            return Err(EngineError::Validation("title is required".to_string()));
        }

        let updated = self
            .required(
                StoreSource::Events,
                self.stores.events.update(event_id, patch, now),
            )
            .await?
            .ok_or(EngineError::NotFound(event_id))?;
        info!(event_id = %event_id, "calendar event updated");
        Ok(updated)
    }

    /// Delete one event; with `delete_all`, also every row materialized from it.
    /// Returns the number of rows removed.
    pub async fn delete_calendar_event(&self, event_id: EventId, delete_all: bool) -> Result<usize> {
        let removed = self
            .required(
                StoreSource::Events,
                self.stores.events.delete(event_id, delete_all),
            )
            .await?;
        if removed == 0 {
            return Err(EngineError::NotFound(event_id));
        }
        info!(event_id = %event_id, removed, delete_all, "calendar event deleted");
        Ok(removed)
    }
}

fn validate_interval(start: &DateTime<Utc>, end: &DateTime<Utc>) -> Result<()> {
    if end <= start {
        return Err(EngineError::Validation(format!(
            "end time {} must be after start time {}",
            end.to_rfc3339(),
            start.to_rfc3339()
        )));
    }
    Ok(())
}
