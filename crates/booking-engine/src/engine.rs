//! The `BookingEngine` facade the upstream operations hang off.
//!
//! The engine holds only shared store handles and immutable configuration, so
//! one instance can serve concurrent calls for any number of providers. The
//! operations themselves live next to their logic: [`crate::conflict`],
//! [`crate::slots`], [`crate::events`] and [`crate::migration`].

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use tracing::warn;

use crate::config::EngineConfig;
use crate::error::{EngineError, Result, StoreError, StoreResult, StoreSource};
use crate::memory::InMemoryCalendar;
use crate::ports::{
    AppointmentReader, AvailabilityWindowReader, CalendarEventStore, HolidayReader,
    LegacyTimeOffStore,
};
use crate::recurrence::{resolve_local, Expander};

/// The store handles an engine is built from.
#[derive(Clone)]
pub struct Stores {
    pub windows: Arc<dyn AvailabilityWindowReader>,
    pub appointments: Arc<dyn AppointmentReader>,
    pub events: Arc<dyn CalendarEventStore>,
    pub holidays: Arc<dyn HolidayReader>,
    /// Absent once the legacy table has been dropped.
    pub legacy_time_off: Option<Arc<dyn LegacyTimeOffStore>>,
}

impl Stores {
    /// Every port backed by one in-memory calendar.
    pub fn from_memory(calendar: Arc<InMemoryCalendar>) -> Self {
        Self {
            windows: calendar.clone(),
            appointments: calendar.clone(),
            events: calendar.clone(),
            holidays: calendar.clone(),
            legacy_time_off: Some(calendar),
        }
    }
}

pub struct BookingEngine {
    pub(crate) stores: Stores,
    pub(crate) config: EngineConfig,
    pub(crate) timezone: Tz,
    pub(crate) expander: Expander,
    store_timeout: Duration,
}

impl BookingEngine {
    /// Build an engine over `stores`.
    ///
    /// # Errors
    /// Returns `EngineError::InvalidTimezone` if the configured zone is unknown.
    pub fn new(stores: Stores, config: EngineConfig) -> Result<Self> {
        let timezone = config.tz()?;
        let expander = Expander::new(timezone).with_max_occurrences(config.max_occurrences);
        Ok(Self {
            stores,
            store_timeout: config.store_timeout(),
            config,
            timezone,
            expander,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn expander(&self) -> &Expander {
        &self.expander
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// Run a store call under the configured deadline.
    pub(crate) async fn bounded<T, F>(&self, call: F) -> StoreResult<T>
    where
        F: Future<Output = StoreResult<T>>,
    {
        match tokio::time::timeout(self.store_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout(self.store_timeout)),
        }
    }

    /// A store call whose failure must reach the caller.
    pub(crate) async fn required<T, F>(&self, store: StoreSource, call: F) -> Result<T>
    where
        F: Future<Output = StoreResult<T>>,
    {
        self.bounded(call)
            .await
            .map_err(|error| EngineError::StoreUnavailable { store, error })
    }

    /// A store call whose failure degrades to "nothing from this source".
    pub(crate) async fn optional<T, F>(&self, store: StoreSource, call: F) -> T
    where
        T: Default,
        F: Future<Output = StoreResult<T>>,
    {
        match self.bounded(call).await {
            Ok(value) => value,
            Err(error) => {
                warn!(store = %store, error = %error, "store lookup failed; treating as no conflict");
                T::default()
            }
        }
    }

    /// Local midnight at the start of `date`, or the first instant after a
    /// midnight DST gap.
    pub fn day_start(&self, date: NaiveDate) -> DateTime<Utc> {
        date.and_hms_opt(0, 0, 0)
            .and_then(|naive| resolve_local(self.timezone, naive))
            .unwrap_or_else(|| date.and_time(chrono::NaiveTime::MIN).and_utc())
    }

    /// Local 23:59:59 on `date`.
    pub(crate) fn day_end(&self, date: NaiveDate) -> DateTime<Utc> {
        date.and_hms_opt(23, 59, 59)
            .and_then(|naive| resolve_local(self.timezone, naive))
            .unwrap_or_else(|| self.day_start(date) + chrono::Duration::seconds(86_399))
    }

    pub(crate) fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.timezone).date_naive()
    }
}
