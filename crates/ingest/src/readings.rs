use crate::error::SyncError;
use crate::report::SyncReadingsResult;
use crate::window::{dedup_last_wins, fetch_window, is_fresh};
use crate::SyncJob;
use api_client::error::ApiError;
use api_client::ReadingsQuery;
use chrono::{DateTime, Utc};
use core_types::MeteringPoint;
use database::DbError;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Parameters of one reading sync run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadingSyncOptions {
    /// Points synced less than this many days ago are skipped. 0 refreshes everything.
    pub stale_days: u32,
    /// Wall-clock instant after which no further point is started.
    pub deadline: Option<DateTime<Utc>>,
}

/// Why a single point could not be synced.
#[derive(Error, Debug)]
enum PointFailure {
    #[error("Rate limited while fetching consumption for {point}: {source}")]
    RateLimited { point: String, source: ApiError },

    #[error("Error fetching consumption for {point}: {source}")]
    Fetch { point: String, source: ApiError },

    #[error("Error inserting consumption for {point}: {source}")]
    Write { point: String, source: DbError },

    #[error("Error updating last sync for {point}: {source}")]
    Advance { point: String, source: DbError },
}

impl PointFailure {
    fn fetch(point: &str, source: ApiError) -> Self {
        let point = point.to_string();
        if source.is_rate_limited() {
            PointFailure::RateLimited { point, source }
        } else {
            PointFailure::Fetch { point, source }
        }
    }
}

impl SyncJob {
    /// Brings the readings of every stored metering point up to date.
    pub async fn sync_readings(
        &self,
        options: ReadingSyncOptions,
    ) -> Result<SyncReadingsResult, SyncError> {
        self.sync_readings_at(options, Utc::now()).await
    }

    /// Same as [`SyncJob::sync_readings`], with `now` used for staleness, fetch
    /// windows and the new `last_sync_at`. The deadline is always checked
    /// against the wall clock.
    pub async fn sync_readings_at(
        &self,
        options: ReadingSyncOptions,
        now: DateTime<Utc>,
    ) -> Result<SyncReadingsResult, SyncError> {
        let points = self
            .store
            .list_metering_points()
            .await
            .map_err(SyncError::StoreRead)?;

        let mut result = SyncReadingsResult {
            supplies_found: points.len(),
            ..Default::default()
        };
        info!(points = points.len(), stale_days = options.stale_days, "starting reading sync");

        for point in &points {
            if options.deadline.is_some_and(|deadline| Utc::now() >= deadline) {
                warn!(point = %point.id, "deadline reached, leaving remaining points for the next run");
                result.deadline_reached = true;
                break;
            }

            if is_fresh(point.last_sync_at, options.stale_days, now) {
                debug!(point = %point.id, "recently synced, skipping");
                result.supplies_skipped_fresh += 1;
                continue;
            }

            match self.sync_point(point, now).await {
                Ok(written) => {
                    result.supplies_processed += 1;
                    result.total_records_inserted += written;
                }
                Err(failure) => {
                    warn!(error = %failure, "metering point sync failed");
                    if matches!(failure, PointFailure::RateLimited { .. }) {
                        result.rate_limited_points += 1;
                    }
                    result.errors.push(failure.to_string());
                }
            }
        }

        info!(
            processed = result.supplies_processed,
            skipped = result.supplies_skipped_fresh,
            records = result.total_records_inserted,
            errors = result.errors.len(),
            "reading sync finished"
        );
        Ok(result)
    }

    /// Fetch, dedup, write, then advance. Returns the number of readings written.
    async fn sync_point(&self, point: &MeteringPoint, now: DateTime<Utc>) -> Result<usize, PointFailure> {
        let (start, end) = fetch_window(point.last_sync_at, self.settings.lookback_months, now);

        let query = ReadingsQuery {
            metering_point_id: point.id.clone(),
            distributor_code: point.distributor_code.clone(),
            point_type: point.point_type,
            start_period: start,
            end_period: end,
            granularity: self.settings.granularity,
            client_id: (!self.is_owner(&point.client_id)).then(|| point.client_id.clone()),
        };

        let entries = self
            .source
            .fetch_readings(&query)
            .await
            .map_err(|e| PointFailure::fetch(&point.id, e))?;
        let fetched = entries.len();

        let readings = dedup_last_wins(
            entries
                .into_iter()
                .map(|entry| entry.into_reading(&point.id))
                .collect(),
        );

        let written = if readings.is_empty() {
            0
        } else {
            self.store
                .upsert_readings(&readings)
                .await
                .map_err(|source| PointFailure::Write {
                    point: point.id.clone(),
                    source,
                })?
        };

        self.store
            .set_last_sync(&point.id, now)
            .await
            .map_err(|source| PointFailure::Advance {
                point: point.id.clone(),
                source,
            })?;

        debug!(point = %point.id, %start, %end, fetched, written, "metering point synced");
        Ok(written)
    }
}
