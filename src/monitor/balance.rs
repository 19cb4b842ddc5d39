use std::fmt;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::{env::APP_CONFIG, REQUEST_TIMEOUT};

/// Token amount in raw on-chain units, six implied fractional digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TokenBalance {
    raw: u128,
}

const UNITS_PER_TOKEN: u128 = 1_000_000;

impl TokenBalance {
    pub fn from_raw(raw: u128) -> Self {
        Self { raw }
    }

    pub fn to_f64(self) -> f64 {
        self.raw as f64 / UNITS_PER_TOKEN as f64
    }

    /// Strict comparison, a balance exactly at the threshold is not low.
    pub fn is_below(self, threshold: f64) -> bool {
        self.to_f64() < threshold
    }
}

impl fmt::Display for TokenBalance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.to_f64())
    }
}

/// Explorer `tokenbalance` response. A failure is reported in-band as
/// status != "1" with the detail in `message`/`result`.
#[derive(Deserialize)]
pub struct TokenBalanceResponse {
    status: String,
    message: Option<String>,
    result: Option<String>,
}

impl TokenBalanceResponse {
    fn into_balance(self) -> Result<TokenBalance> {
        if self.status != "1" {
            return Err(anyhow!(
                "explorer returned error status {}: {} {}",
                self.status,
                self.message.as_deref().unwrap_or("unknown"),
                self.result.as_deref().unwrap_or(""),
            ));
        }
        let raw = self
            .result
            .ok_or_else(|| anyhow!("explorer response missing result field"))?
            .parse::<u128>()
            .map_err(|err| anyhow!("explorer returned non-integer balance: {}", err))?;
        Ok(TokenBalance::from_raw(raw))
    }
}

#[async_trait]
pub trait BalanceSource {
    async fn sample(&self) -> Result<TokenBalance>;
}

pub struct BalanceClient {
    client: reqwest::Client,
}

impl BalanceClient {
    pub fn new() -> Result<Self> {
        Ok(Self {
            client: reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?,
        })
    }
}

#[async_trait]
impl BalanceSource for BalanceClient {
    async fn sample(&self) -> Result<TokenBalance> {
        let chain_id = APP_CONFIG.chain_id.to_string();
        let response = self
            .client
            .get(&APP_CONFIG.balance_api_url)
            .query(&[
                ("chainid", chain_id.as_str()),
                ("module", "account"),
                ("action", "tokenbalance"),
                ("contractaddress", &APP_CONFIG.token_contract),
                ("address", &APP_CONFIG.wallet_address),
                ("tag", "latest"),
                ("apikey", &APP_CONFIG.etherscan_api_key),
            ])
            .send()
            .await?
            .error_for_status()?
            .json::<TokenBalanceResponse>()
            .await?;

        let balance = response.into_balance()?;
        debug!(%balance, wallet = %APP_CONFIG.wallet_address, "sampled token balance");
        Ok(balance)
    }
}
