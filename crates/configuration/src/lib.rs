use crate::error::ConfigError;
use config::builder::DefaultState;
use config::ConfigBuilder;

// Declare the modules that make up this crate.
pub mod error;
pub mod settings;

// Re-export the core types to provide a clean public API.
pub use settings::{
    AnalysisThresholds, Config, DatadisConfig, LoggingConfig, MeasurementGranularity,
    SyncSettings,
};

/// Environment variable naming an alternative configuration file.
pub const CONFIG_PATH_ENV: &str = "METERWISE_CONFIG";

/// Loads the application configuration.
///
/// Reads `config.toml` (or the file named by `METERWISE_CONFIG`), then layers
/// `METERWISE__SECTION__KEY` environment variables on top, so secrets such as
/// `METERWISE__DATADIS__PASSWORD` can stay out of the file.
pub fn load_config() -> Result<Config, ConfigError> {
    let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| "config.toml".to_string());

    let builder = config::Config::builder()
        .add_source(config::File::with_name(&path).required(false))
        .add_source(
            config::Environment::with_prefix("METERWISE")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

    let config = build(builder)?;
    tracing::debug!(path = %path, "configuration loaded");
    Ok(config)
}

fn build(builder: ConfigBuilder<DefaultState>) -> Result<Config, ConfigError> {
    // Attempt to deserialize the entire configuration into our `Config` struct
    let config = builder.build()?.try_deserialize::<Config>()?;
    config.validate()?;
    Ok(config)
}

impl Config {
    /// Rejects settings the sync job or the analysis cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.datadis.username.trim().is_empty() || self.datadis.password.is_empty() {
            return Err(ConfigError::ValidationError(
                "datadis.username and datadis.password must be set".to_string(),
            ));
        }
        if self.sync.lookback_months == 0 {
            return Err(ConfigError::ValidationError(
                "sync.lookback_months must be at least 1".to_string(),
            ));
        }

        let a = &self.analysis;
        if !(0.0..=1.0).contains(&a.base_load_quantile) {
            return Err(ConfigError::ValidationError(format!(
                "analysis.base_load_quantile must be within [0, 1], got {}",
                a.base_load_quantile
            )));
        }
        if a.anomaly_sigma < 0.0 {
            return Err(ConfigError::ValidationError(
                "analysis.anomaly_sigma must not be negative".to_string(),
            ));
        }
        if a.evening_peak_start_hour > a.evening_peak_end_hour || a.evening_peak_end_hour > 23 {
            return Err(ConfigError::ValidationError(format!(
                "analysis evening peak window {}..={} is not a valid hour range",
                a.evening_peak_start_hour, a.evening_peak_end_hour
            )));
        }
        Ok(())
    }

    /// The client id the operator's own supplies are stored under.
    pub fn owner_client_id(&self) -> String {
        self.sync
            .owner_client_id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| self.datadis.username.clone())
    }
}
