use std::sync::LazyLock;

use chrono::Duration;
use serde::Deserialize;

use crate::env::get_app_config;

#[derive(Deserialize)]
pub struct AppConfig {
    pub telegram_api_key: String,
    /// Primary chat that receives alerts and summaries.
    pub telegram_chat_id: String,
    /// Optional broadcast group, notified alongside the primary chat.
    #[serde(default)]
    pub telegram_group_id: Option<String>,
    pub etherscan_api_key: String,
    pub wallet_address: String,
    #[serde(default = "default_token_contract")]
    pub token_contract: String,
    #[serde(default = "default_token_symbol")]
    pub token_symbol: String,
    /// Balance below this fires an alert on every sample while it holds.
    pub balance_threshold: f64,
    #[serde(default = "default_balance_api_url")]
    pub balance_api_url: String,
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,
    /// Liveness route port. No route is mounted when unset.
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default = "default_sampling_interval_seconds")]
    pub sampling_interval_seconds: i64,
    #[serde(default = "default_summary_interval_minutes")]
    pub summary_interval_minutes: i64,
}

// USDT on Polygon.
fn default_token_contract() -> String {
    "0x3813e82e6f7098b9583FC0F33a962D02018B6803".to_string()
}

fn default_token_symbol() -> String {
    "USDT".to_string()
}

fn default_balance_api_url() -> String {
    "https://api.etherscan.io/v2/api".to_string()
}

fn default_chain_id() -> u64 {
    137
}

fn default_sampling_interval_seconds() -> i64 {
    60
}

fn default_summary_interval_minutes() -> i64 {
    15
}

impl AppConfig {
    pub fn sampling_interval(&self) -> Duration {
        Duration::seconds(self.sampling_interval_seconds)
    }

    pub fn summary_interval(&self) -> Duration {
        Duration::minutes(self.summary_interval_minutes)
    }
}

pub static APP_CONFIG: LazyLock<AppConfig> = LazyLock::new(get_app_config);
