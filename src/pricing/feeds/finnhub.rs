use anyhow::{Context, Result};
use reqwest::Url;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::debug;

use super::{HttpFeeds, FINNHUB_ENDPOINT};

#[derive(Deserialize, Debug, Clone)]
pub struct Quote {
    #[serde(rename = "c")]
    pub current_price: Option<Decimal>,
    #[serde(rename = "pc")]
    pub previous_close: Option<Decimal>,
}

impl Quote {
    // unknown symbols come back with every field set to 0
    pub fn price(&self) -> Option<Decimal> {
        self.current_price.filter(|price| !price.is_zero())
    }
}

impl HttpFeeds {
    pub async fn get_quote(&self, symbol: &str) -> Result<Decimal> {
        let params = [("symbol", symbol), ("token", self.finnhub_token.as_str())];
        let url = Url::parse_with_params(format!("{FINNHUB_ENDPOINT}/quote").as_str(), &params)?;

        // keep the token out of error messages
        let res = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|res| res.error_for_status())
            .map_err(reqwest::Error::without_url)?;
        let body = res.text().await.map_err(reqwest::Error::without_url)?;
        debug!("Finnhub quote {} : {}", symbol, body);

        let quote: Quote = serde_json::de::from_str(body.as_str())?;
        quote
            .price()
            .with_context(|| format!("No current price for {symbol}"))
    }
}
