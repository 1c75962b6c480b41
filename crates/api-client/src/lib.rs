use crate::error::ApiError;
use crate::responses::{ConsumptionResponse, DistributorError, SuppliesResponse};
use async_trait::async_trait;
use chrono::NaiveDate;
use configuration::{DatadisConfig, MeasurementGranularity};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

pub mod error;
pub mod responses;
pub mod session;
// --- Public API ---
pub use responses::{
    format_month_period, parse_provider_date, AuthorizationEntry, ReadingEntry, SupplyEntry,
};
pub use session::Session;

/// Parameters of a readings fetch for one metering point.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadingsQuery {
    pub metering_point_id: String,
    pub distributor_code: String,
    pub point_type: i32,
    /// Only the month of `start_period` and `end_period` is sent to the provider.
    pub start_period: NaiveDate,
    pub end_period: NaiveDate,
    pub granularity: MeasurementGranularity,
    /// The authorizing client, or `None` for the operator's own supplies.
    pub client_id: Option<String>,
}

/// The abstract interface to an external metering data provider.
/// This trait is the contract the sync job uses, allowing the underlying
/// implementation (live or scripted) to be swapped out.
#[async_trait]
pub trait MeteringSource: Send + Sync {
    /// Lists the clients that granted the operator access to their data.
    async fn list_authorizations(&self) -> Result<Vec<AuthorizationEntry>, ApiError>;

    /// Lists the supply points of `client_id`, or the operator's own when `None`.
    async fn list_metering_points(&self, client_id: Option<&str>) -> Result<Vec<SupplyEntry>, ApiError>;

    /// Fetches the consumption curve of one supply point over a month range.
    async fn fetch_readings(&self, query: &ReadingsQuery) -> Result<Vec<ReadingEntry>, ApiError>;
}

/// A concrete implementation of `MeteringSource` for the Datadis private API.
#[derive(Clone)]
pub struct DatadisClient {
    client: reqwest::Client,
    base_url: String,
    auth_url: String,
    username: String,
    password: String,
    session: Arc<Session>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SuppliesParams<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    authorized_nif: Option<&'a str>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ConsumptionParams<'a> {
    cups: &'a str,
    distributor_code: &'a str,
    start_date: String,
    end_date: String,
    measurement_type: u8,
    point_type: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    authorized_nif: Option<&'a str>,
}

#[derive(Serialize)]
struct NoParams {}

impl DatadisClient {
    pub fn new(config: &DatadisConfig, session: Arc<Session>) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            auth_url: config.auth_url.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
            session,
        })
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Returns the cached token, logging in first when there is none.
    async fn token(&self) -> Result<String, ApiError> {
        if let Some(token) = self.session.current().await {
            return Ok(token);
        }

        tracing::info!(auth_url = %self.auth_url, "logging in to Datadis");
        let response = self
            .client
            .post(&self.auth_url)
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&[("username", self.username.as_str()), ("password", self.password.as_str())])
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(ApiError::Auth(format!("login returned {status}: {body}")));
        }

        let token = body.trim().to_string();
        if token.is_empty() {
            return Err(ApiError::Auth("login returned an empty token".to_string()));
        }
        self.session.store(token.clone()).await;
        Ok(token)
    }

    /// Performs an authenticated GET. A rejected token triggers exactly one
    /// re-login and retry; a second rejection is reported as `ApiError::Auth`.
    async fn get<P, T>(&self, endpoint: &str, params: &P) -> Result<T, ApiError>
    where
        P: Serialize,
        T: DeserializeOwned,
    {
        let query_string = serde_qs::to_string(params)
            .map_err(|e| ApiError::InvalidData(format!("Failed to encode query for {endpoint}: {e}")))?;
        let url = if query_string.is_empty() {
            format!("{}{}", self.base_url, endpoint)
        } else {
            format!("{}{}?{}", self.base_url, endpoint, query_string)
        };

        let mut reauthenticated = false;
        loop {
            let token = self.token().await?;
            let response = self
                .client
                .get(&url)
                .bearer_auth(&token)
                .header(reqwest::header::ACCEPT, "application/json")
                .send()
                .await?;
            let status = response.status();

            if status == StatusCode::UNAUTHORIZED {
                self.session.invalidate(&token).await;
                if reauthenticated {
                    return Err(ApiError::Auth(format!("token rejected by {endpoint} after re-authentication")));
                }
                tracing::warn!(endpoint, "Datadis rejected the session token, re-authenticating");
                reauthenticated = true;
                continue;
            }

            let text = response.text().await?;
            return match status {
                StatusCode::FORBIDDEN => Err(ApiError::PermissionDenied(endpoint.to_string())),
                StatusCode::TOO_MANY_REQUESTS => Err(ApiError::RateLimited(endpoint.to_string())),
                s if s.is_success() => serde_json::from_str::<T>(&text)
                    .map_err(|e| ApiError::Deserialization(format!("{endpoint}: {e}"))),
                s => Err(ApiError::Http {
                    endpoint: endpoint.to_string(),
                    status: s.as_u16(),
                    body: text,
                }),
            };
        }
    }
}

fn log_distributor_errors(endpoint: &str, errors: &[DistributorError]) {
    for e in errors {
        tracing::warn!(
            endpoint,
            distributor = e.distributor_name.as_deref().unwrap_or("unknown"),
            code = e.error_code.as_deref().unwrap_or(""),
            description = e.error_description.as_deref().unwrap_or(""),
            "distributor reported an error"
        );
    }
}

#[async_trait]
impl MeteringSource for DatadisClient {
    async fn list_authorizations(&self) -> Result<Vec<AuthorizationEntry>, ApiError> {
        self.get("/list-authorization", &NoParams {}).await
    }

    async fn list_metering_points(&self, client_id: Option<&str>) -> Result<Vec<SupplyEntry>, ApiError> {
        let endpoint = "/get-supplies-v2";
        let response: SuppliesResponse = self
            .get(endpoint, &SuppliesParams { authorized_nif: client_id })
            .await?;
        log_distributor_errors(endpoint, &response.distributor_error);

        response.supplies.into_iter().map(SupplyEntry::try_from).collect()
    }

    async fn fetch_readings(&self, query: &ReadingsQuery) -> Result<Vec<ReadingEntry>, ApiError> {
        let endpoint = "/get-consumption-data-v2";
        let params = ConsumptionParams {
            cups: &query.metering_point_id,
            distributor_code: &query.distributor_code,
            start_date: format_month_period(query.start_period),
            end_date: format_month_period(query.end_period),
            measurement_type: query.granularity.code(),
            point_type: query.point_type,
            authorized_nif: query.client_id.as_deref(),
        };

        let response: ConsumptionResponse = self.get(endpoint, &params).await?;
        log_distributor_errors(endpoint, &response.distributor_error);

        response.time_curve.into_iter().map(ReadingEntry::try_from).collect()
    }
}
