use crate::enums::AuthorizationStatus;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// One meter sample as stored locally.
///
/// `(metering_point_id, date, time)` is the natural key. A later ingestion that
/// reports the same key supersedes the stored row instead of adding a new one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reading {
    pub metering_point_id: String,
    pub date: NaiveDate,
    /// Hour or quarter-hour label, `HH:MM`.
    pub time: String,
    #[serde(rename = "consumptionKWh")]
    pub consumption_kwh: f64,
    /// Provenance tag reported by the distributor ("Real", "Estimada", ...).
    pub obtain_method: String,
}

/// The natural key of a [`Reading`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReadingKey {
    pub metering_point_id: String,
    pub date: NaiveDate,
    pub time: String,
}

impl Reading {
    pub fn key(&self) -> ReadingKey {
        ReadingKey {
            metering_point_id: self.metering_point_id.clone(),
            date: self.date,
            time: self.time.clone(),
        }
    }

    /// Hour of day (0-23) taken from the `HH:MM` label.
    ///
    /// Labels that fail to parse count as hour 0; values past 23 (distributors
    /// report the last slot of the day as `24:00`) are clamped to 23.
    pub fn hour(&self) -> u32 {
        self.time
            .split(':')
            .next()
            .and_then(|h| h.trim().parse::<u32>().ok())
            .map(|h| h.min(23))
            .unwrap_or(0)
    }
}

/// A physical supply point (CUPS) readings are collected for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeteringPoint {
    /// The CUPS code; globally unique.
    pub id: String,
    pub client_id: String,
    pub address: Option<String>,
    pub postal_code: Option<String>,
    pub province: Option<String>,
    pub municipality: Option<String>,
    pub distributor_code: String,
    pub point_type: i32,
    pub valid_from: Option<NaiveDate>,
    pub valid_to: Option<NaiveDate>,
    /// Advanced only after a successful readings fetch for this point.
    pub last_sync_at: Option<DateTime<Utc>>,
}

/// Grant allowing the operator to read a client's metering data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Authorization {
    pub client_id: String,
    pub display_name: String,
    pub status: AuthorizationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
