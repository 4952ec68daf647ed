//! Narrow store interfaces the engine reads and writes through.
//!
//! Implementations own their I/O. The engine wraps every call in a deadline,
//! and callers cancel an operation by dropping its future.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::error::StoreResult;
use crate::model::{
    Appointment, AvailabilityWindow, CalendarEvent, EventId, EventPatch, LegacyTimeOff,
    ProviderId, PublicHoliday,
};

/// Read access to precomputed bookable windows.
#[async_trait]
pub trait AvailabilityWindowReader: Send + Sync {
    /// Windows lying fully inside `[range_start, range_end]`, ordered by start,
    /// at most `limit` of them.
    async fn list_windows(
        &self,
        provider_id: ProviderId,
        range_start: DateTime<Utc>,
        range_end: DateTime<Utc>,
        limit: usize,
    ) -> StoreResult<Vec<AvailabilityWindow>>;

    /// Whether a window with exactly this start and end exists.
    async fn exists_exact(
        &self,
        provider_id: ProviderId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<bool>;

    /// Earliest window start at or after `after`.
    async fn find_next_start(
        &self,
        provider_id: ProviderId,
        after: DateTime<Utc>,
    ) -> StoreResult<Option<DateTime<Utc>>>;
}

#[async_trait]
pub trait AppointmentReader: Send + Sync {
    /// Non-canceled appointments overlapping `[start, end)`.
    async fn list_overlapping(
        &self,
        provider_id: ProviderId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<Vec<Appointment>>;
}

#[async_trait]
pub trait CalendarEventStore: Send + Sync {
    /// Top-level rows (no parent) that either overlap `[range_start, range_end)`
    /// or carry a recurrence pattern. Templates must be returned even when their
    /// stored interval lies outside the range, since their expansions may not.
    async fn list_templates_and_simple_events(
        &self,
        provider_id: ProviderId,
        range_start: DateTime<Utc>,
        range_end: DateTime<Utc>,
    ) -> StoreResult<Vec<CalendarEvent>>;

    async fn get(&self, event_id: EventId) -> StoreResult<Option<CalendarEvent>>;

    async fn insert(&self, event: CalendarEvent) -> StoreResult<()>;

    /// Apply `patch` to the row; `None` when the row does not exist.
    async fn update(
        &self,
        event_id: EventId,
        patch: EventPatch,
        updated_at: DateTime<Utc>,
    ) -> StoreResult<Option<CalendarEvent>>;

    /// Remove the row, and with `delete_all` every row whose parent is it.
    /// Returns the number of rows removed.
    async fn delete(&self, event_id: EventId, delete_all: bool) -> StoreResult<usize>;

    /// Whether a top-level blocked, blocking event with exactly this interval exists.
    async fn find_blocking_match(
        &self,
        provider_id: ProviderId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<bool>;
}

#[async_trait]
pub trait HolidayReader: Send + Sync {
    /// Booking-affecting holidays covering any day of `[from, to]`.
    async fn list_affecting(&self, from: NaiveDate, to: NaiveDate) -> StoreResult<Vec<PublicHoliday>>;
}

/// The legacy time-off table, read and drained by the one-time migration.
#[async_trait]
pub trait LegacyTimeOffStore: Send + Sync {
    async fn list_time_off(&self) -> StoreResult<Vec<LegacyTimeOff>>;

    async fn delete_time_off(&self, ids: &[Uuid]) -> StoreResult<usize>;
}
