use crate::error::DbError;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use core_types::{Authorization, MeteringPoint, Reading};

/// The persistence contract of the sync job and the analysis query layer.
///
/// Every write is keyed: authorizations by client id, metering points by CUPS,
/// readings by `(metering_point_id, date, time)`.
#[async_trait]
pub trait MeteringStore: Send + Sync {
    async fn upsert_authorization(&self, authorization: &Authorization) -> Result<(), DbError>;

    /// Inserts or refreshes a metering point. The stored `last_sync_at` is never
    /// touched here; only `set_last_sync` moves it.
    async fn upsert_metering_point(&self, point: &MeteringPoint) -> Result<(), DbError>;

    /// Writes a batch atomically and returns the number of rows written.
    ///
    /// The batch must not contain the same key twice.
    async fn upsert_readings(&self, readings: &[Reading]) -> Result<usize, DbError>;

    async fn list_metering_points(&self) -> Result<Vec<MeteringPoint>, DbError>;

    /// Stored clients, newest first. `search` matches client id or display name,
    /// case-insensitively.
    async fn list_authorizations(&self, search: Option<&str>) -> Result<Vec<Authorization>, DbError>;

    /// Stored points ordered by CUPS, optionally restricted to one client. `search`
    /// matches the CUPS or the address, case-insensitively.
    async fn search_metering_points(
        &self,
        client_id: Option<&str>,
        search: Option<&str>,
    ) -> Result<Vec<MeteringPoint>, DbError>;

    async fn set_last_sync(&self, metering_point_id: &str, at: DateTime<Utc>) -> Result<(), DbError>;

    /// Readings of one point with `from <= date <= to`, ordered by date and time.
    async fn readings_for_point(
        &self,
        metering_point_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Reading>, DbError>;
}
