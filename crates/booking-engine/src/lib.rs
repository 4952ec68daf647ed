//! # booking-engine
//!
//! Availability and conflict resolution for per-provider scheduling.
//!
//! Given a candidate interval, the engine decides whether it is bookable by
//! reconciling precomputed availability windows, existing appointments, ad hoc
//! and recurring block events, and public holidays into one decision with
//! auditable reasons. Recurring blocks are expanded into ephemeral occurrences
//! just in time; nothing expanded is ever written back.
//!
//! ## Modules
//!
//! - [`recurrence`] — template event + date window → concrete occurrences
//! - [`conflict`] — `check_availability` for one candidate interval
//! - [`slots`] — `find_available_slots` across a date range
//! - [`events`] — calendar event create/list/update/delete
//! - [`migration`] — legacy time-off table → blocked events
//! - [`ports`] — store interfaces the engine consumes
//! - [`memory`] — in-memory implementation of every port
//! - [`engine`] — the `BookingEngine` facade
//! - [`config`] — engine configuration
//! - [`model`] — data model
//! - [`error`] — error types

pub mod config;
pub mod conflict;
pub mod engine;
pub mod error;
pub mod events;
pub mod memory;
pub mod migration;
pub mod model;
pub mod ports;
pub mod recurrence;
pub mod slots;

pub use config::{EngineConfig, ScheduleLookupPolicy};
pub use engine::{BookingEngine, Stores};
pub use error::{EngineError, RecurrenceError, StoreError, StoreSource};
pub use memory::{CalendarSnapshot, InMemoryCalendar};
pub use migration::MigrationReport;
pub use model::{
    AvailabilityCheckResult, AvailabilityWindow, AvailableSlot, CalendarEntry, CalendarEvent,
    Conflict, ConflictType, EventId, EventPatch, EventType, Frequency, Occurrence, OccurrenceId,
    ProviderId, RecurrencePattern,
};
pub use recurrence::Expander;
