//! Engine configuration.
//!
//! Every field has a default, so an empty JSON object is a valid config.

use std::time::Duration;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::recurrence::DEFAULT_MAX_OCCURRENCES;

/// What the conflict checker does when the schedule-membership lookup itself fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleLookupPolicy {
    /// Surface the store failure to the caller.
    #[default]
    Propagate,
    /// Fail closed: report the candidate as outside the schedule.
    Deny,
    /// Fail open: treat the candidate as inside the schedule and keep checking.
    Allow,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// IANA zone in which the provider's calendar days are laid out.
    pub timezone: String,
    /// Upper bound on series occurrences generated per template.
    pub max_occurrences: usize,
    pub schedule_lookup_failure: ScheduleLookupPolicy,
    pub default_duration_minutes: i64,
    pub default_slot_limit: usize,
    pub default_event_color: String,
    pub time_off_color: String,
    /// Offset from the candidate end used when no later window exists.
    pub suggestion_fallback_minutes: i64,
    pub store_timeout_ms: u64,
    /// In-flight availability checks while scanning windows for free slots.
    pub slot_check_concurrency: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timezone: "UTC".to_string(),
            max_occurrences: DEFAULT_MAX_OCCURRENCES,
            schedule_lookup_failure: ScheduleLookupPolicy::default(),
            default_duration_minutes: 30,
            default_slot_limit: 50,
            default_event_color: "#FFB84D".to_string(),
            time_off_color: "#F56565".to_string(),
            suggestion_fallback_minutes: 60,
            store_timeout_ms: 5_000,
            slot_check_concurrency: 4,
        }
    }
}

impl EngineConfig {
    pub fn with_timezone(mut self, timezone: impl Into<String>) -> Self {
        self.timezone = timezone.into();
        self
    }

    pub fn with_schedule_lookup_failure(mut self, policy: ScheduleLookupPolicy) -> Self {
        self.schedule_lookup_failure = policy;
        self
    }

    /// Resolve the configured zone.
    ///
    /// # Errors
    /// Returns `EngineError::InvalidTimezone` if the name is not an IANA identifier.
    pub fn tz(&self) -> Result<Tz> {
        self.timezone
            .parse()
            .map_err(|_| EngineError::InvalidTimezone(self.timezone.clone()))
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }
}

