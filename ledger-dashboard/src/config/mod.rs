use secrecy::Secret;
use serde::Deserialize;
use service_core::error::AppError;
use service_core::retry::RetryConfig;
use std::time::Duration;

#[derive(Deserialize, Clone, Debug)]
pub struct Settings {
    pub server: ServerSettings,
    pub backend: BackendSettings,
    #[serde(default)]
    pub telemetry: TelemetrySettings,
}

#[derive(Deserialize, Clone, Debug)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Deserialize, Clone, Debug)]
pub struct BackendSettings {
    /// Base URL of the business API (e.g., http://erp-api:8080).
    pub base_url: String,
    /// Bearer token sent on every upstream call.
    pub api_token: Secret<String>,
    /// Size of the single payment page the index is built from.
    #[serde(default = "default_payment_page_size")]
    pub payment_page_size: u32,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    /// PDF rendering is slow server-side; it gets its own budget.
    #[serde(default = "default_pdf_timeout_seconds")]
    pub pdf_timeout_seconds: u64,
    /// Retries for idempotent reads. Payment receipts are never retried.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_payment_page_size() -> u32 {
    500
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_pdf_timeout_seconds() -> u64 {
    120
}

fn default_max_retries() -> u32 {
    2
}

impl BackendSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn pdf_timeout(&self) -> Duration {
        Duration::from_secs(self.pdf_timeout_seconds)
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::with_max_retries(self.max_retries)
    }
}

#[derive(Deserialize, Clone, Debug)]
pub struct TelemetrySettings {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// OTLP gRPC endpoint (e.g., http://tempo:4317). Unset disables export.
    #[serde(default)]
    pub otlp_endpoint: Option<String>,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            otlp_endpoint: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

pub fn get_configuration() -> Result<Settings, AppError> {
    service_core::config::load_configuration("ledger-dashboard")
}
