//! Free-slot enumeration over precomputed windows.

use chrono::NaiveDate;
use futures::stream::{self, StreamExt};
use tracing::{debug, warn};

use crate::engine::BookingEngine;
use crate::error::{Result, StoreSource};
use crate::model::{AvailableSlot, ProviderId};

impl BookingEngine {
    /// List the conflict-free windows between two local dates (both inclusive).
    ///
    /// `duration_minutes <= 0` and `limit <= 0` fall back to the configured
    /// defaults. `limit` bounds the windows *considered*: at most `limit` windows
    /// are fetched, those of a different length are skipped (longer windows are
    /// not subdivided), and only the available remainder is returned. No extra
    /// fetch tops the result up to `limit`.
    ///
    /// Checks run concurrently; output stays chronological.
    ///
    /// # Errors
    /// Returns `EngineError::StoreUnavailable` if the windows cannot be listed.
    /// A window whose individual check fails is logged and left out.
    pub async fn find_available_slots(
        &self,
        provider_id: ProviderId,
        range_start_date: NaiveDate,
        range_end_date: NaiveDate,
        duration_minutes: i64,
        limit: i64,
    ) -> Result<Vec<AvailableSlot>> {
        let duration = if duration_minutes <= 0 {
            self.config.default_duration_minutes
        } else {
            duration_minutes
        };
        let limit = usize::try_from(limit)
            .ok()
            .filter(|l| *l > 0)
            .unwrap_or(self.config.default_slot_limit);

        let range_start = self.day_start(range_start_date);
        let range_end = self.day_end(range_end_date);

        let windows = self
            .required(
                StoreSource::Windows,
                self.stores
                    .windows
                    .list_windows(provider_id, range_start, range_end, limit),
            )
            .await?;
        let fetched = windows.len();

        let checked: Vec<_> = stream::iter(
            windows
                .into_iter()
                .filter(|w| w.duration_minutes() == duration),
        )
        .map(|window| async move {
            let outcome = self.check_availability(provider_id, window.start, duration).await;
            (window, outcome)
        })
        .buffered(self.config.slot_check_concurrency.max(1))
        .collect()
        .await;

        let mut slots = Vec::new();
        for (window, outcome) in checked {
            match outcome {
                Ok(result) if result.available => slots.push(AvailableSlot::from(&window)),
                Ok(_) => {}
                Err(error) => {
                    warn!(provider_id = %provider_id, start = %window.start, error = %error, "skipping window");
                }
            }
        }

        debug!(
            provider_id = %provider_id,
            fetched,
            available = slots.len(),
            "free slots computed"
        );
        Ok(slots)
    }
}
