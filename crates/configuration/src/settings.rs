use serde::Deserialize;
use std::path::PathBuf;

/// The root configuration structure for the entire application.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub datadis: DatadisConfig,
    #[serde(default)]
    pub sync: SyncSettings,
    #[serde(default)]
    pub analysis: AnalysisThresholds,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Credentials and endpoints for the Datadis private API.
#[derive(Debug, Clone, Deserialize)]
pub struct DatadisConfig {
    /// The operator's login (a NIF). Also identifies the operator's own account.
    pub username: String,
    pub password: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_auth_url")]
    pub auth_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://datadis.es/api-private/api".to_string()
}

fn default_auth_url() -> String {
    "https://datadis.es/nikola-auth/tokens/login".to_string()
}

fn default_request_timeout_secs() -> u64 {
    60
}

/// Sampling resolution requested from the distributor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeasurementGranularity {
    #[default]
    Hourly,
    QuarterHourly,
}

impl MeasurementGranularity {
    /// The `measurementType` code the provider expects.
    pub fn code(&self) -> u8 {
        match self {
            MeasurementGranularity::Hourly => 0,
            MeasurementGranularity::QuarterHourly => 1,
        }
    }
}

/// Parameters for the incremental synchronization job.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    /// Client id used for the operator's own supplies. Falls back to
    /// `datadis.username` when unset.
    pub owner_client_id: Option<String>,
    /// How far back the first fetch of a never-synced point reaches.
    pub lookback_months: u32,
    pub granularity: MeasurementGranularity,
    /// Staleness window used by `sync-readings` when none is given on the command line.
    pub default_stale_days: u32,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            owner_client_id: None,
            lookback_months: 12,
            granularity: MeasurementGranularity::Hourly,
            default_stale_days: 1,
        }
    }
}

/// Policy thresholds of the consumption analysis.
///
/// These encode business judgment rather than anything derived from the data,
/// so every one of them can be overridden from the `[analysis]` table.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AnalysisThresholds {
    /// Load factor below which the curve is flagged as irregular.
    pub irregular_load_factor: f64,
    /// Night share (percent) above which night-time base load is flagged.
    pub night_share_alert_pct: f64,
    /// Month-over-month growth (percent) above which the trend is flagged.
    pub monthly_growth_alert_pct: f64,
    /// Days above `mean + anomaly_sigma * stddev` count as anomalous.
    pub anomaly_sigma: f64,
    /// Night share (percent) above which night-load optimisation is suggested.
    pub night_share_opportunity_pct: f64,
    /// Load factor below which peak flattening is suggested.
    pub flatten_peaks_load_factor: f64,
    /// Quantile of individual readings reported as base load.
    pub base_load_quantile: f64,
    pub evening_peak_start_hour: u32,
    pub evening_peak_end_hour: u32,
}

impl Default for AnalysisThresholds {
    fn default() -> Self {
        Self {
            irregular_load_factor: 0.30,
            night_share_alert_pct: 35.0,
            monthly_growth_alert_pct: 10.0,
            anomaly_sigma: 1.8,
            night_share_opportunity_pct: 30.0,
            flatten_peaks_load_factor: 0.35,
            base_load_quantile: 0.10,
            evening_peak_start_hour: 18,
            evening_peak_end_hour: 22,
        }
    }
}

/// Where and how verbosely to log.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence.
    pub level: String,
    /// When set, logs are also written to a daily-rolling file in this directory.
    pub directory: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
        }
    }
}
