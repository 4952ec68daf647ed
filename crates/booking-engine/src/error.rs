//! Error types for booking-engine operations.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::model::EventId;

/// The store a lookup or write was aimed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreSource {
    Windows,
    Appointments,
    Events,
    Holidays,
    LegacyTimeOff,
}

impl fmt::Display for StoreSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StoreSource::Windows => "availability window",
            StoreSource::Appointments => "appointment",
            StoreSource::Events => "calendar event",
            StoreSource::Holidays => "holiday",
            StoreSource::LegacyTimeOff => "legacy time-off",
        };
        f.write_str(name)
    }
}

/// Failure reported by a store implementation (or by the engine's deadline around it).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store call timed out after {0:?}")]
    Timeout(Duration),
}

/// Reasons a template could not be expanded into occurrences.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecurrenceError {
    #[error("event has no recurrence pattern")]
    NotRecurring,

    #[error("unrecognized recurrence pattern: {0}")]
    Unrecognized(String),

    #[error("Invalid RRULE: {0}")]
    InvalidRule(String),
}

#[derive(Error, Debug)]
pub enum EngineError {
    /// Malformed input: bad IDs, non-positive durations, inverted intervals.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Calendar event not found: {0}")]
    NotFound(EventId),

    /// A mandatory store could not answer. Never swallowed: treating a booked
    /// slot as free is the unsafe direction.
    #[error("{store} store unavailable: {error}")]
    StoreUnavailable {
        store: StoreSource,
        #[source]
        error: StoreError,
    },

    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;

/// Result alias used by the store ports.
pub type StoreResult<T> = std::result::Result<T, StoreError>;
