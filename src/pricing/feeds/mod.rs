use std::time::Duration;

use anyhow::Result;
use reqwest::Client;
use rust_decimal::Decimal;

use super::MarketData;

mod coingecko;
mod exchange_rate;
mod finnhub;

const FINNHUB_ENDPOINT: &str = "https://finnhub.io/api/v1";
const COINGECKO_ENDPOINT: &str = "https://api.coingecko.com/api/v3";
const EXCHANGE_RATE_ENDPOINT: &str = "https://api.exchangerate-api.com/v4";

/// Finnhub equity quotes, CoinGecko crypto quotes and exchangerate-api conversion rates.
#[derive(Debug, Clone)]
pub struct HttpFeeds {
    client: Client,
    finnhub_token: String,
}

impl HttpFeeds {
    pub fn new(finnhub_token: &str) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self {
            client,
            finnhub_token: finnhub_token.to_owned(),
        })
    }
}

impl MarketData for HttpFeeds {
    async fn equity_quote(&self, symbol: &str) -> Result<Decimal> {
        self.get_quote(symbol).await
    }

    async fn crypto_quote(&self, coin_id: &str, currency: &str) -> Result<Decimal> {
        self.get_simple_price(coin_id, currency).await
    }

    async fn conversion_rate(&self, from: &str, to: &str) -> Result<Decimal> {
        self.get_latest_rate(from, to).await
    }
}
