use crate::error::ApiError;
use chrono::NaiveDate;
use core_types::{MeteringPoint, Reading};
use serde::{Deserialize, Deserializer};

// Using `#[serde(rename_all = "camelCase")]` to automatically map from JSON camelCase to Rust snake_case.

/// One entry of `GET /list-authorization`.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthorizationEntry {
    /// The client's NIF. Entries without one cannot be attributed and are skipped.
    #[serde(rename = "nif")]
    pub client_id: Option<String>,
    #[serde(rename = "name")]
    pub display_name: Option<String>,
    #[serde(default)]
    pub authorized: bool,
}

/// A supply point as reported by `GET /get-supplies-v2`, with dates already
/// translated from the provider's `YYYY/MM/DD` format.
#[derive(Debug, Clone, PartialEq)]
pub struct SupplyEntry {
    pub id: String,
    pub address: Option<String>,
    pub postal_code: Option<String>,
    pub province: Option<String>,
    pub municipality: Option<String>,
    pub distributor_code: String,
    pub point_type: i32,
    pub valid_from: Option<NaiveDate>,
    pub valid_to: Option<NaiveDate>,
}

impl SupplyEntry {
    /// The store representation, owned by `client_id`. `last_sync_at` is left
    /// unset; the store keeps whatever value it already has.
    pub fn into_metering_point(self, client_id: &str) -> MeteringPoint {
        MeteringPoint {
            id: self.id,
            client_id: client_id.to_string(),
            address: self.address,
            postal_code: self.postal_code,
            province: self.province,
            municipality: self.municipality,
            distributor_code: self.distributor_code,
            point_type: self.point_type,
            valid_from: self.valid_from,
            valid_to: self.valid_to,
            last_sync_at: None,
        }
    }
}

/// One sample of `GET /get-consumption-data-v2`.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadingEntry {
    pub date: NaiveDate,
    pub time: String,
    pub consumption_kwh: f64,
    pub obtain_method: String,
}

impl ReadingEntry {
    pub fn into_reading(self, metering_point_id: &str) -> Reading {
        Reading {
            metering_point_id: metering_point_id.to_string(),
            date: self.date,
            time: self.time,
            consumption_kwh: self.consumption_kwh,
            obtain_method: self.obtain_method,
        }
    }
}

// --- Wire formats ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SuppliesResponse {
    #[serde(default)]
    pub supplies: Vec<RawSupply>,
    #[serde(default)]
    pub distributor_error: Vec<DistributorError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawSupply {
    cups: String,
    address: Option<String>,
    postal_code: Option<String>,
    province: Option<String>,
    municipality: Option<String>,
    // Sent as a number by some distributors and as a string by others.
    #[serde(deserialize_with = "string_or_number")]
    distributor_code: String,
    #[serde(default)]
    point_type: i32,
    valid_date_from: Option<String>,
    valid_date_to: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ConsumptionResponse {
    #[serde(default)]
    pub time_curve: Vec<RawConsumption>,
    #[serde(default)]
    pub distributor_error: Vec<DistributorError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawConsumption {
    date: String,
    time: String,
    #[serde(rename = "consumptionKWh", default)]
    consumption_kwh: f64,
    #[serde(default)]
    obtain_method: String,
}

/// A per-distributor failure reported alongside an otherwise successful response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributorError {
    pub distributor_name: Option<String>,
    pub error_code: Option<String>,
    pub error_description: Option<String>,
}

impl TryFrom<RawSupply> for SupplyEntry {
    type Error = ApiError;

    fn try_from(raw: RawSupply) -> Result<Self, Self::Error> {
        Ok(SupplyEntry {
            id: raw.cups,
            address: raw.address,
            postal_code: raw.postal_code,
            province: raw.province,
            municipality: raw.municipality,
            distributor_code: raw.distributor_code,
            point_type: raw.point_type,
            valid_from: optional_date(raw.valid_date_from.as_deref())?,
            valid_to: optional_date(raw.valid_date_to.as_deref())?,
        })
    }
}

impl TryFrom<RawConsumption> for ReadingEntry {
    type Error = ApiError;

    fn try_from(raw: RawConsumption) -> Result<Self, Self::Error> {
        Ok(ReadingEntry {
            date: parse_provider_date(&raw.date)?,
            time: raw.time,
            consumption_kwh: raw.consumption_kwh,
            obtain_method: raw.obtain_method,
        })
    }
}

/// Parses a provider date, which arrives as `YYYY/MM/DD` (or occasionally `YYYY-MM-DD`).
pub fn parse_provider_date(value: &str) -> Result<NaiveDate, ApiError> {
    let normalized = value.trim().replace('/', "-");
    NaiveDate::parse_from_str(&normalized, "%Y-%m-%d")
        .map_err(|e| ApiError::InvalidData(format!("Invalid date '{value}': {e}")))
}

/// Formats the `YYYY/MM` month period the provider's range parameters expect.
pub fn format_month_period(date: NaiveDate) -> String {
    date.format("%Y/%m").to_string()
}

fn optional_date(value: Option<&str>) -> Result<Option<NaiveDate>, ApiError> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => parse_provider_date(v).map(Some),
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrNumber {
        String(String),
        Number(i64),
    }

    Ok(match StringOrNumber::deserialize(deserializer)? {
        StringOrNumber::String(s) => s,
        StringOrNumber::Number(n) => n.to_string(),
    })
}
