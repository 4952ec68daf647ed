//! In-memory implementation of every store port.
//!
//! Backed by a serializable [`CalendarSnapshot`], so a whole provider calendar
//! can be loaded from and saved to a single JSON document.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::model::{
    overlaps, Appointment, AvailabilityWindow, CalendarEvent, EventId, EventPatch, EventType,
    LegacyTimeOff, ProviderId, PublicHoliday,
};
use crate::ports::{
    AppointmentReader, AvailabilityWindowReader, CalendarEventStore, HolidayReader,
    LegacyTimeOffStore,
};

/// Everything the engine reads, as one document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CalendarSnapshot {
    pub windows: Vec<AvailabilityWindow>,
    pub appointments: Vec<Appointment>,
    pub events: Vec<CalendarEvent>,
    pub holidays: Vec<PublicHoliday>,
    pub legacy_time_off: Vec<LegacyTimeOff>,
}

#[derive(Debug, Default)]
pub struct InMemoryCalendar {
    state: RwLock<CalendarSnapshot>,
}

impl InMemoryCalendar {
    pub fn new(snapshot: CalendarSnapshot) -> Self {
        Self {
            state: RwLock::new(snapshot),
        }
    }

    /// A copy of the current contents.
    pub fn snapshot(&self) -> StoreResult<CalendarSnapshot> {
        Ok(self.read()?.clone())
    }

    pub fn add_window(&self, window: AvailabilityWindow) -> StoreResult<()> {
        self.write()?.windows.push(window);
        Ok(())
    }

    pub fn add_appointment(&self, appointment: Appointment) -> StoreResult<()> {
        self.write()?.appointments.push(appointment);
        Ok(())
    }

    /// Mark an appointment canceled; `false` if it does not exist.
    pub fn cancel_appointment(&self, appointment_id: Uuid) -> StoreResult<bool> {
        let mut state = self.write()?;
        match state
            .appointments
            .iter_mut()
            .find(|a| a.appointment_id == appointment_id)
        {
            Some(appointment) => {
                appointment.canceled = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn add_event(&self, event: CalendarEvent) -> StoreResult<()> {
        self.write()?.events.push(event);
        Ok(())
    }

    pub fn add_holiday(&self, holiday: PublicHoliday) -> StoreResult<()> {
        self.write()?.holidays.push(holiday);
        Ok(())
    }

    pub fn add_legacy_time_off(&self, row: LegacyTimeOff) -> StoreResult<()> {
        self.write()?.legacy_time_off.push(row);
        Ok(())
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, CalendarSnapshot>> {
        self.state
            .read()
            .map_err(|_| StoreError::Unavailable("calendar lock poisoned".to_string()))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, CalendarSnapshot>> {
        self.state
            .write()
            .map_err(|_| StoreError::Unavailable("calendar lock poisoned".to_string()))
    }
}

#[async_trait]
impl AvailabilityWindowReader for InMemoryCalendar {
    async fn list_windows(
        &self,
        provider_id: ProviderId,
        range_start: DateTime<Utc>,
        range_end: DateTime<Utc>,
        limit: usize,
    ) -> StoreResult<Vec<AvailabilityWindow>> {
        let state = self.read()?;
        let mut windows: Vec<AvailabilityWindow> = state
            .windows
            .iter()
            .filter(|w| w.provider_id == provider_id && w.start >= range_start && w.end <= range_end)
            .cloned()
            .collect();
        windows.sort_by_key(|w| (w.start, w.end));
        windows.truncate(limit);
        Ok(windows)
    }

    async fn exists_exact(
        &self,
        provider_id: ProviderId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<bool> {
        Ok(self
            .read()?
            .windows
            .iter()
            .any(|w| w.provider_id == provider_id && w.start == start && w.end == end))
    }

    async fn find_next_start(
        &self,
        provider_id: ProviderId,
        after: DateTime<Utc>,
    ) -> StoreResult<Option<DateTime<Utc>>> {
        Ok(self
            .read()?
            .windows
            .iter()
            .filter(|w| w.provider_id == provider_id && w.start >= after)
            .map(|w| w.start)
            .min())
    }
}

#[async_trait]
impl AppointmentReader for InMemoryCalendar {
    async fn list_overlapping(
        &self,
        provider_id: ProviderId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<Vec<Appointment>> {
        Ok(self
            .read()?
            .appointments
            .iter()
            .filter(|a| {
                a.provider_id == provider_id
                    && !a.canceled
                    && overlaps(a.start_time, a.end_time, start, end)
            })
            .cloned()
            .collect())
    }
}

#[async_trait]
impl CalendarEventStore for InMemoryCalendar {
    async fn list_templates_and_simple_events(
        &self,
        provider_id: ProviderId,
        range_start: DateTime<Utc>,
        range_end: DateTime<Utc>,
    ) -> StoreResult<Vec<CalendarEvent>> {
        let state = self.read()?;
        let mut events: Vec<CalendarEvent> = state
            .events
            .iter()
            .filter(|e| {
                e.provider_id == provider_id
                    && e.parent_event_id.is_none()
                    && (e.is_template()
                        || (e.start_time < range_end && e.end_time > range_start))
            })
            .cloned()
            .collect();
        events.sort_by_key(|e| e.start_time);
        Ok(events)
    }

    async fn get(&self, event_id: EventId) -> StoreResult<Option<CalendarEvent>> {
        Ok(self
            .read()?
            .events
            .iter()
            .find(|e| e.event_id == event_id)
            .cloned())
    }

    async fn insert(&self, event: CalendarEvent) -> StoreResult<()> {
        let mut state = self.write()?;
        if state.events.iter().any(|e| e.event_id == event.event_id) {
            return Err(StoreError::Unavailable(format!(
                "duplicate event ID {}",
                event.event_id
            )));
        }
        state.events.push(event);
        Ok(())
    }

    async fn update(
        &self,
        event_id: EventId,
        patch: EventPatch,
        updated_at: DateTime<Utc>,
    ) -> StoreResult<Option<CalendarEvent>> {
        let mut state = self.write()?;
        Ok(state
            .events
            .iter_mut()
            .find(|e| e.event_id == event_id)
            .map(|event| {
                patch.apply(event, updated_at);
                event.clone()
            }))
    }

    async fn delete(&self, event_id: EventId, delete_all: bool) -> StoreResult<usize> {
        let mut state = self.write()?;
        let before = state.events.len();
        state.events.retain(|e| {
            let is_target = e.event_id == event_id;
            let is_child = delete_all && e.parent_event_id == Some(event_id);
            !(is_target || is_child)
        });
        Ok(before - state.events.len())
    }

    async fn find_blocking_match(
        &self,
        provider_id: ProviderId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<bool> {
        Ok(self.read()?.events.iter().any(|e| {
            e.provider_id == provider_id
                && e.event_type == EventType::Blocked
                && e.blocks_appointments
                && e.parent_event_id.is_none()
                && e.start_time == start
                && e.end_time == end
        }))
    }
}

#[async_trait]
impl HolidayReader for InMemoryCalendar {
    async fn list_affecting(&self, from: NaiveDate, to: NaiveDate) -> StoreResult<Vec<PublicHoliday>> {
        let mut holidays: Vec<PublicHoliday> = self
            .read()?
            .holidays
            .iter()
            .filter(|h| h.affects_booking && h.covers_any(from, to))
            .cloned()
            .collect();
        holidays.sort_by_key(|h| h.date);
        Ok(holidays)
    }
}

#[async_trait]
impl LegacyTimeOffStore for InMemoryCalendar {
    async fn list_time_off(&self) -> StoreResult<Vec<LegacyTimeOff>> {
        Ok(self.read()?.legacy_time_off.clone())
    }

    async fn delete_time_off(&self, ids: &[Uuid]) -> StoreResult<usize> {
        let mut state = self.write()?;
        let before = state.legacy_time_off.len();
        state.legacy_time_off.retain(|row| !ids.contains(&row.id));
        Ok(before - state.legacy_time_off.len())
    }
}
