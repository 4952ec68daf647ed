//! One-time fold of the legacy time-off table into blocked calendar events.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::engine::BookingEngine;
use crate::error::{Result, StoreSource};
use crate::model::CalendarEvent;

/// Counts from one migration run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationReport {
    /// Legacy rows found.
    pub examined: usize,
    /// Blocked events created.
    pub inserted: usize,
    /// Legacy rows removed after being matched by an event.
    pub removed: usize,
}

impl BookingEngine {
    /// Turn every legacy time-off row into a blocked, blocking "Time off" event,
    /// unless an identical top-level blocked event already exists, then drain the
    /// migrated rows. Running it again is a no-op.
    pub async fn migrate_legacy_time_off(&self) -> Result<MigrationReport> {
        let Some(legacy) = self.stores.legacy_time_off.as_ref() else {
            return Ok(MigrationReport::default());
        };

        let rows = self
            .required(StoreSource::LegacyTimeOff, legacy.list_time_off())
            .await?;
        let mut report = MigrationReport {
            examined: rows.len(),
            ..MigrationReport::default()
        };
        if rows.is_empty() {
            return Ok(report);
        }

        let now = Utc::now();
        let mut migrated = Vec::with_capacity(rows.len());
        for row in &rows {
            let exists = self
                .required(
                    StoreSource::Events,
                    self.stores
                        .events
                        .find_blocking_match(row.provider_id, row.start_time, row.end_time),
                )
                .await?;
            if !exists {
                let event = CalendarEvent::from_time_off(row, &self.config.time_off_color, now);
                self.required(StoreSource::Events, self.stores.events.insert(event))
                    .await?;
                report.inserted += 1;
            }
            migrated.push(row.id);
        }

        report.removed = self
            .required(StoreSource::LegacyTimeOff, legacy.delete_time_off(&migrated))
            .await?;

        info!(
            examined = report.examined,
            inserted = report.inserted,
            removed = report.removed,
            "legacy time-off migrated"
        );
        Ok(report)
    }
}
