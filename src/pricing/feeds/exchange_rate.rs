use std::collections::HashMap;

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::debug;

use super::{HttpFeeds, EXCHANGE_RATE_ENDPOINT};

#[derive(Deserialize, Debug, Clone)]
pub struct LatestRates {
    pub base: String,
    pub rates: HashMap<String, Decimal>,
}

impl HttpFeeds {
    pub async fn get_latest_rate(&self, from: &str, to: &str) -> Result<Decimal> {
        let url = format!("{EXCHANGE_RATE_ENDPOINT}/latest/{}", from.to_uppercase());

        let res = self.client.get(url).send().await?.error_for_status()?;
        let body = res.text().await?;
        let latest: LatestRates = serde_json::de::from_str(body.as_str())?;
        debug!("Got {} rates for base {}", latest.rates.len(), latest.base);

        latest
            .rates
            .get(&to.to_uppercase())
            .copied()
            .with_context(|| format!("No {from}/{to} rate"))
    }
}
