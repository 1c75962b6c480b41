use serde::{Deserialize, Serialize};

/// Severity of an [`Alert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    High,
    Medium,
    Low,
}

/// Priority of an [`Opportunity`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub level: AlertLevel,
    pub title: String,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Opportunity {
    pub priority: Priority,
    pub title: String,
    pub detail: String,
    pub estimated_savings_pct: u32,
}

/// A descriptive profile of a customer's consumption.
///
/// This struct is the final output of the `AnalyticsEngine`. It is recomputed on
/// every request and carries no identity beyond the readings it was built from.
/// Magnitudes are rounded for presentation: kWh totals to 2 decimals, per-reading
/// figures and the load factor to 3, percentages to 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    // I. Volume
    pub total_consumption: f64,
    pub average_daily: f64,
    pub average_hourly: f64,
    pub max_consumption: f64,
    pub base_load: f64,
    pub active_days: usize,

    // II. Shape
    pub peak_hour: u32,
    pub peak_hour_average: f64,
    pub load_factor: f64,

    // III. Time-of-day shares (percent of total)
    pub weekend_share: f64,
    pub night_share: f64,
    pub daytime_share: f64,
    pub evening_share: f64,

    // IV. Evolution
    pub monthly_trend_pct: Option<f64>, // None with fewer than two months or an empty previous month
    pub anomalies_count: usize,

    // V. Advice
    pub recommendation: String,
    pub alerts: Vec<Alert>,
    pub opportunities: Vec<Opportunity>,
}

impl AnalysisReport {
    /// The report for an empty reading set: every figure zeroed and a single
    /// low-severity alert explaining why.
    pub fn insufficient_data() -> Self {
        Self {
            total_consumption: 0.0,
            average_daily: 0.0,
            average_hourly: 0.0,
            max_consumption: 0.0,
            base_load: 0.0,
            active_days: 0,
            peak_hour: 0,
            peak_hour_average: 0.0,
            load_factor: 0.0,
            weekend_share: 0.0,
            night_share: 0.0,
            daytime_share: 0.0,
            evening_share: 0.0,
            monthly_trend_pct: None,
            anomalies_count: 0,
            recommendation: "Not enough data to build a consumption study.".to_string(),
            alerts: vec![Alert {
                level: AlertLevel::Low,
                title: "Insufficient data".to_string(),
                detail: "No readings are available for the selected period.".to_string(),
            }],
            opportunities: Vec::new(),
        }
    }

    /// True when at least one alert is of high severity.
    pub fn has_high_alert(&self) -> bool {
        self.alerts.iter().any(|a| a.level == AlertLevel::High)
    }
}

impl Default for AnalysisReport {
    fn default() -> Self {
        Self::insufficient_data()
    }
}
