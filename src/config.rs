use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use rust_decimal::Decimal;

use crate::ingest::IngestionSettings;

/// Runtime configuration. Every value is read from the environment (or `.env`);
/// flags only override it.
#[derive(Args, Debug, Clone)]
pub struct Config {
    #[arg(long, env = "TELEGRAM_BOT_TOKEN", hide_env_values = true)]
    pub telegram_token: String,

    /// Chat receiving every reply and report.
    #[arg(long, env = "TELEGRAM_CHAT_ID")]
    pub telegram_chat_id: String,

    #[arg(long, env = "FINNHUB_API_KEY", hide_env_values = true)]
    pub finnhub_api_key: String,

    #[arg(long, env = "PORTFOLIO_FILE", default_value = "portfolio.json")]
    pub portfolio_file: PathBuf,

    #[arg(long, env = "TARGET_CURRENCY", default_value = "EUR")]
    pub currency: String,

    /// USD conversion rate used when the rate service is unavailable.
    #[arg(long, env = "FALLBACK_RATE", default_value = "0.85")]
    pub fallback_rate: Decimal,

    #[arg(long, env = "POLL_TIMEOUT_SECS", default_value = "30")]
    pub poll_timeout_secs: u64,

    #[arg(long, env = "POLL_INTERVAL_MS", default_value = "1000")]
    pub poll_interval_ms: u64,

    #[arg(long, env = "ERROR_BACKOFF_SECS", default_value = "5")]
    pub error_backoff_secs: u64,

    #[arg(long, env = "MAX_BACKOFF_SECS", default_value = "60")]
    pub max_backoff_secs: u64,
}

impl Config {
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.poll_timeout_secs)
    }

    pub fn ingestion(&self) -> IngestionSettings {
        IngestionSettings {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            error_backoff: Duration::from_secs(self.error_backoff_secs),
            max_backoff: Duration::from_secs(self.max_backoff_secs.max(self.error_backoff_secs)),
        }
    }
}
