use crate::error::DbError;
use crate::store::MeteringStore;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use core_types::{Authorization, MeteringPoint, Reading, ReadingKey};
use std::collections::BTreeMap;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct Tables {
    authorizations: BTreeMap<String, Authorization>,
    points: BTreeMap<String, MeteringPoint>,
    readings: BTreeMap<ReadingKey, Reading>,
}

/// A process-local `MeteringStore`.
///
/// Follows the same keyed-upsert and reference rules as the PostgreSQL schema:
/// a point needs its authorization, a reading needs its point.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn authorization(&self, client_id: &str) -> Option<Authorization> {
        self.tables.read().await.authorizations.get(client_id).cloned()
    }

    pub async fn authorization_count(&self) -> usize {
        self.tables.read().await.authorizations.len()
    }

    pub async fn metering_point(&self, id: &str) -> Option<MeteringPoint> {
        self.tables.read().await.points.get(id).cloned()
    }

    pub async fn reading_count(&self) -> usize {
        self.tables.read().await.readings.len()
    }

    /// Every stored reading, in key order.
    pub async fn readings(&self) -> Vec<Reading> {
        self.tables.read().await.readings.values().cloned().collect()
    }
}

#[async_trait]
impl MeteringStore for InMemoryStore {
    async fn upsert_authorization(&self, authorization: &Authorization) -> Result<(), DbError> {
        let mut tables = self.tables.write().await;
        match tables.authorizations.get_mut(&authorization.client_id) {
            Some(existing) => {
                existing.display_name = authorization.display_name.clone();
                existing.status = authorization.status;
                existing.updated_at = authorization.updated_at;
            }
            None => {
                tables
                    .authorizations
                    .insert(authorization.client_id.clone(), authorization.clone());
            }
        }
        Ok(())
    }

    async fn upsert_metering_point(&self, point: &MeteringPoint) -> Result<(), DbError> {
        let mut tables = self.tables.write().await;
        if !tables.authorizations.contains_key(&point.client_id) {
            return Err(DbError::NotFound(format!("authorization {}", point.client_id)));
        }

        let last_sync_at = tables.points.get(&point.id).and_then(|p| p.last_sync_at);
        let mut stored = point.clone();
        stored.last_sync_at = last_sync_at;
        tables.points.insert(point.id.clone(), stored);
        Ok(())
    }

    async fn upsert_readings(&self, readings: &[Reading]) -> Result<usize, DbError> {
        let mut tables = self.tables.write().await;

        // Validate the whole batch first so a failure leaves nothing behind.
        if let Some(orphan) = readings
            .iter()
            .find(|r| !tables.points.contains_key(&r.metering_point_id))
        {
            return Err(DbError::NotFound(format!(
                "metering point {}",
                orphan.metering_point_id
            )));
        }

        for reading in readings {
            tables.readings.insert(reading.key(), reading.clone());
        }
        Ok(readings.len())
    }

    async fn list_metering_points(&self) -> Result<Vec<MeteringPoint>, DbError> {
        Ok(self.tables.read().await.points.values().cloned().collect())
    }

    async fn list_authorizations(&self, search: Option<&str>) -> Result<Vec<Authorization>, DbError> {
        let tables = self.tables.read().await;
        let mut found: Vec<Authorization> = tables
            .authorizations
            .values()
            .filter(|a| {
                search.is_none_or(|term| {
                    contains_ci(&a.client_id, term) || contains_ci(&a.display_name, term)
                })
            })
            .cloned()
            .collect();
        // BTreeMap order already breaks ties by client id; the sort is stable.
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }

    async fn search_metering_points(
        &self,
        client_id: Option<&str>,
        search: Option<&str>,
    ) -> Result<Vec<MeteringPoint>, DbError> {
        let tables = self.tables.read().await;
        Ok(tables
            .points
            .values()
            .filter(|p| client_id.is_none_or(|id| p.client_id == id))
            .filter(|p| {
                search.is_none_or(|term| {
                    contains_ci(&p.id, term) || p.address.as_deref().is_some_and(|a| contains_ci(a, term))
                })
            })
            .cloned()
            .collect())
    }

    async fn set_last_sync(&self, metering_point_id: &str, at: DateTime<Utc>) -> Result<(), DbError> {
        let mut tables = self.tables.write().await;
        let point = tables
            .points
            .get_mut(metering_point_id)
            .ok_or_else(|| DbError::NotFound(format!("metering point {metering_point_id}")))?;
        point.last_sync_at = Some(at);
        Ok(())
    }

    async fn readings_for_point(
        &self,
        metering_point_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Reading>, DbError> {
        let tables = self.tables.read().await;
        Ok(tables
            .readings
            .values()
            .filter(|r| r.metering_point_id == metering_point_id && r.date >= from && r.date <= to)
            .cloned()
            .collect())
    }
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}
