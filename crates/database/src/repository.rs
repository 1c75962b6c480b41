use crate::error::DbError;
use crate::store::MeteringStore;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use core_types::{Authorization, AuthorizationStatus, MeteringPoint, Reading};
use sqlx::postgres::{PgPool, PgRow};
use sqlx::{Postgres, QueryBuilder, Row};

// Five binds per row keeps each statement far below the 65535 parameter limit.
const READINGS_CHUNK: usize = 1_000;

/// The `DbRepository` provides the PostgreSQL implementation of `MeteringStore`.
/// It encapsulates all SQL queries and row mapping.
#[derive(Debug, Clone)]
pub struct DbRepository {
    pool: PgPool,
}

impl DbRepository {
    /// Creates a new `DbRepository` with a shared database connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MeteringStore for DbRepository {
    async fn upsert_authorization(&self, authorization: &Authorization) -> Result<(), DbError> {
        // created_at is only written on first insert.
        sqlx::query(
            r#"
            INSERT INTO authorizations (client_id, display_name, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (client_id) DO UPDATE
            SET display_name = EXCLUDED.display_name,
                status = EXCLUDED.status,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(&authorization.client_id)
        .bind(&authorization.display_name)
        .bind(authorization.status.as_str())
        .bind(authorization.created_at)
        .bind(authorization.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn upsert_metering_point(&self, point: &MeteringPoint) -> Result<(), DbError> {
        sqlx::query(
            r#"
            INSERT INTO metering_points (
                id, client_id, address, postal_code, province, municipality,
                distributor_code, point_type, valid_from, valid_to
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (id) DO UPDATE
            SET client_id = EXCLUDED.client_id,
                address = EXCLUDED.address,
                postal_code = EXCLUDED.postal_code,
                province = EXCLUDED.province,
                municipality = EXCLUDED.municipality,
                distributor_code = EXCLUDED.distributor_code,
                point_type = EXCLUDED.point_type,
                valid_from = EXCLUDED.valid_from,
                valid_to = EXCLUDED.valid_to
            "#,
        )
        .bind(&point.id)
        .bind(&point.client_id)
        .bind(&point.address)
        .bind(&point.postal_code)
        .bind(&point.province)
        .bind(&point.municipality)
        .bind(&point.distributor_code)
        .bind(point.point_type)
        .bind(point.valid_from)
        .bind(point.valid_to)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Saves a batch of readings within a single transaction for atomicity.
    async fn upsert_readings(&self, readings: &[Reading]) -> Result<usize, DbError> {
        if readings.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut written: u64 = 0;

        for chunk in readings.chunks(READINGS_CHUNK) {
            let mut builder = QueryBuilder::<Postgres>::new(
                "INSERT INTO readings (metering_point_id, date, time, consumption_kwh, obtain_method) ",
            );
            builder.push_values(chunk, |mut b, r| {
                b.push_bind(&r.metering_point_id)
                    .push_bind(r.date)
                    .push_bind(&r.time)
                    .push_bind(r.consumption_kwh)
                    .push_bind(&r.obtain_method);
            });
            builder.push(
                " ON CONFLICT (metering_point_id, date, time) DO UPDATE \
                 SET consumption_kwh = EXCLUDED.consumption_kwh, \
                     obtain_method = EXCLUDED.obtain_method",
            );

            let result = builder.build().execute(&mut *tx).await?;
            written += result.rows_affected();
        }

        tx.commit().await?;
        Ok(written as usize)
    }

    async fn list_metering_points(&self) -> Result<Vec<MeteringPoint>, DbError> {
        let rows = sqlx::query(
            r#"
            SELECT id, client_id, address, postal_code, province, municipality,
                   distributor_code, point_type, valid_from, valid_to, last_sync_at
            FROM metering_points
            ORDER BY id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(metering_point_from_row).collect()
    }

    async fn list_authorizations(&self, search: Option<&str>) -> Result<Vec<Authorization>, DbError> {
        let rows = sqlx::query(
            r#"
            SELECT client_id, display_name, status, created_at, updated_at
            FROM authorizations
            WHERE $1::TEXT IS NULL OR client_id ILIKE $1 OR display_name ILIKE $1
            ORDER BY created_at DESC, client_id ASC
            "#,
        )
        .bind(search.map(like_pattern))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(authorization_from_row).collect()
    }

    async fn search_metering_points(
        &self,
        client_id: Option<&str>,
        search: Option<&str>,
    ) -> Result<Vec<MeteringPoint>, DbError> {
        let rows = sqlx::query(
            r#"
            SELECT id, client_id, address, postal_code, province, municipality,
                   distributor_code, point_type, valid_from, valid_to, last_sync_at
            FROM metering_points
            WHERE ($1::TEXT IS NULL OR client_id = $1)
              AND ($2::TEXT IS NULL OR id ILIKE $2 OR address ILIKE $2)
            ORDER BY id ASC
            "#,
        )
        .bind(client_id)
        .bind(search.map(like_pattern))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(metering_point_from_row).collect()
    }

    async fn set_last_sync(&self, metering_point_id: &str, at: DateTime<Utc>) -> Result<(), DbError> {
        let result = sqlx::query("UPDATE metering_points SET last_sync_at = $1 WHERE id = $2")
            .bind(at)
            .bind(metering_point_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound(format!("metering point {metering_point_id}")));
        }
        Ok(())
    }

    async fn readings_for_point(
        &self,
        metering_point_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Reading>, DbError> {
        let rows = sqlx::query(
            r#"
            SELECT metering_point_id, date, time, consumption_kwh, obtain_method
            FROM readings
            WHERE metering_point_id = $1 AND date >= $2 AND date <= $3
            ORDER BY date ASC, time ASC
            "#,
        )
        .bind(metering_point_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(reading_from_row).collect()
    }
}

/// `%term%` with LIKE wildcards in the term escaped, so they match literally.
fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

fn authorization_from_row(row: &PgRow) -> Result<Authorization, DbError> {
    let status: String = row.try_get("status")?;
    let status = status
        .parse::<AuthorizationStatus>()
        .map_err(|e| DbError::InvalidRow(e.to_string()))?;

    Ok(Authorization {
        client_id: row.try_get("client_id")?,
        display_name: row.try_get("display_name")?,
        status,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn reading_from_row(row: &PgRow) -> Result<Reading, DbError> {
    Ok(Reading {
        metering_point_id: row.try_get("metering_point_id")?,
        date: row.try_get("date")?,
        time: row.try_get("time")?,
        consumption_kwh: row.try_get("consumption_kwh")?,
        obtain_method: row.try_get("obtain_method")?,
    })
}

fn metering_point_from_row(row: &PgRow) -> Result<MeteringPoint, DbError> {
    Ok(MeteringPoint {
        id: row.try_get("id")?,
        client_id: row.try_get("client_id")?,
        address: row.try_get("address")?,
        postal_code: row.try_get("postal_code")?,
        province: row.try_get("province")?,
        municipality: row.try_get("municipality")?,
        distributor_code: row.try_get("distributor_code")?,
        point_type: row.try_get("point_type")?,
        valid_from: row.try_get("valid_from")?,
        valid_to: row.try_get("valid_to")?,
        last_sync_at: row.try_get("last_sync_at")?,
    })
}
