//! Shared builders for the booking-engine integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use uuid::Uuid;

use booking_engine::error::{StoreError, StoreResult};
use booking_engine::model::{Appointment, LegacyTimeOff, PublicHoliday};
use booking_engine::ports::{
    AppointmentReader, AvailabilityWindowReader, CalendarEventStore, HolidayReader,
};
use booking_engine::{
    AvailabilityWindow, BookingEngine, CalendarEvent, EngineConfig, EventId, EventPatch,
    EventType, InMemoryCalendar, ProviderId, RecurrencePattern, Stores,
};

pub fn provider() -> ProviderId {
    ProviderId(Uuid::from_u128(0x0000_0001_0000_0000_0000_0000_0000_0001))
}

pub fn other_provider() -> ProviderId {
    ProviderId(Uuid::from_u128(0x0000_0002_0000_0000_0000_0000_0000_0002))
}

pub fn utc(year: i32, month: u32, day: u32, hour: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, min, 0).unwrap()
}

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

pub fn window(provider_id: ProviderId, start: DateTime<Utc>, minutes: i64) -> AvailabilityWindow {
    AvailabilityWindow::new(
        provider_id,
        start,
        start + Duration::minutes(minutes),
        chrono_tz::UTC,
    )
}

pub fn appointment(provider_id: ProviderId, start: DateTime<Utc>, minutes: i64) -> Appointment {
    Appointment {
        appointment_id: Uuid::new_v4(),
        provider_id,
        title: "Consultation".to_string(),
        start_time: start,
        end_time: start + Duration::minutes(minutes),
        canceled: false,
    }
}

pub fn holiday(name: &str, on: NaiveDate, duration_days: u32, affects_booking: bool) -> PublicHoliday {
    PublicHoliday {
        holiday_id: Uuid::new_v4(),
        name: name.to_string(),
        date: on,
        duration_days,
        affects_booking,
    }
}

pub fn event(
    provider_id: ProviderId,
    title: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    blocks_appointments: bool,
) -> CalendarEvent {
    CalendarEvent {
        event_id: EventId::generate(),
        provider_id,
        title: title.to_string(),
        description: None,
        event_type: if blocks_appointments {
            EventType::Blocked
        } else {
            EventType::Personal
        },
        start_time: start,
        end_time: end,
        all_day: false,
        blocks_appointments,
        recurrence_pattern: None,
        parent_event_id: None,
        color: "#FFB84D".to_string(),
        created_at: start,
        updated_at: start,
    }
}

pub fn template(
    provider_id: ProviderId,
    title: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    pattern: RecurrencePattern,
) -> CalendarEvent {
    CalendarEvent {
        event_type: EventType::RecurringBlock,
        recurrence_pattern: Some(pattern),
        ..event(provider_id, title, start, end, true)
    }
}

pub fn time_off(provider_id: ProviderId, start: DateTime<Utc>, end: DateTime<Utc>) -> LegacyTimeOff {
    LegacyTimeOff {
        id: Uuid::new_v4(),
        provider_id,
        start_time: start,
        end_time: end,
    }
}

pub fn engine(calendar: &Arc<InMemoryCalendar>) -> BookingEngine {
    engine_with(calendar, EngineConfig::default())
}

pub fn engine_with(calendar: &Arc<InMemoryCalendar>, config: EngineConfig) -> BookingEngine {
    BookingEngine::new(Stores::from_memory(calendar.clone()), config).unwrap()
}

/// A store whose every call fails, or hangs past any sensible deadline.
#[derive(Debug, Clone, Copy)]
pub enum Broken {
    Failing,
    Hanging,
}

impl Broken {
    async fn fail<T>(self) -> StoreResult<T> {
        if let Broken::Hanging = self {
            tokio::time::sleep(std::time::Duration::from_secs(5)).await;
        }
        Err(StoreError::Unavailable("connection refused".to_string()))
    }
}

#[async_trait]
impl AvailabilityWindowReader for Broken {
    async fn list_windows(
        &self,
        _: ProviderId,
        _: DateTime<Utc>,
        _: DateTime<Utc>,
        _: usize,
    ) -> StoreResult<Vec<AvailabilityWindow>> {
        self.fail().await
    }

    async fn exists_exact(&self, _: ProviderId, _: DateTime<Utc>, _: DateTime<Utc>) -> StoreResult<bool> {
        self.fail().await
    }

    async fn find_next_start(&self, _: ProviderId, _: DateTime<Utc>) -> StoreResult<Option<DateTime<Utc>>> {
        self.fail().await
    }
}

#[async_trait]
impl AppointmentReader for Broken {
    async fn list_overlapping(
        &self,
        _: ProviderId,
        _: DateTime<Utc>,
        _: DateTime<Utc>,
    ) -> StoreResult<Vec<Appointment>> {
        self.fail().await
    }
}

#[async_trait]
impl CalendarEventStore for Broken {
    async fn list_templates_and_simple_events(
        &self,
        _: ProviderId,
        _: DateTime<Utc>,
        _: DateTime<Utc>,
    ) -> StoreResult<Vec<CalendarEvent>> {
        self.fail().await
    }

    async fn get(&self, _: EventId) -> StoreResult<Option<CalendarEvent>> {
        self.fail().await
    }

    async fn insert(&self, _: CalendarEvent) -> StoreResult<()> {
        self.fail().await
    }

    async fn update(&self, _: EventId, _: EventPatch, _: DateTime<Utc>) -> StoreResult<Option<CalendarEvent>> {
        self.fail().await
    }

    async fn delete(&self, _: EventId, _: bool) -> StoreResult<usize> {
        self.fail().await
    }

    async fn find_blocking_match(&self, _: ProviderId, _: DateTime<Utc>, _: DateTime<Utc>) -> StoreResult<bool> {
        self.fail().await
    }
}

#[async_trait]
impl HolidayReader for Broken {
    async fn list_affecting(&self, _: NaiveDate, _: NaiveDate) -> StoreResult<Vec<PublicHoliday>> {
        self.fail().await
    }
}
