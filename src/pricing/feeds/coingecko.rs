use std::collections::HashMap;

use anyhow::{Context, Result};
use reqwest::Url;
use rust_decimal::Decimal;
use tracing::debug;

use super::{HttpFeeds, COINGECKO_ENDPOINT};

/// `{"bitcoin": {"eur": 57000.1}}`
pub type SimplePrice = HashMap<String, HashMap<String, Decimal>>;

pub fn extract_price(prices: &SimplePrice, coin_id: &str, currency: &str) -> Option<Decimal> {
    prices
        .get(coin_id)
        .and_then(|by_currency| by_currency.get(&currency.to_lowercase()))
        .copied()
}

impl HttpFeeds {
    pub async fn get_simple_price(&self, coin_id: &str, currency: &str) -> Result<Decimal> {
        let vs_currency = currency.to_lowercase();
        let params = [("ids", coin_id), ("vs_currencies", vs_currency.as_str())];
        let url = Url::parse_with_params(
            format!("{COINGECKO_ENDPOINT}/simple/price").as_str(),
            &params,
        )?;

        let res = self.client.get(url).send().await?.error_for_status()?;
        let body = res.text().await?;
        debug!("CoinGecko price {} : {}", coin_id, body);

        let prices: SimplePrice = serde_json::de::from_str(body.as_str())?;
        extract_price(&prices, coin_id, currency)
            .with_context(|| format!("No {currency} price for {coin_id}"))
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_simple_price_from_json() {
        let json = json!({"cardano": {"eur": 0.3521}});
        let prices: SimplePrice = serde_json::from_value(json).unwrap();

        assert_eq!(extract_price(&prices, "cardano", "EUR"), Some(dec!(0.3521)));
        assert_eq!(extract_price(&prices, "cardano", "usd"), None);
        assert_eq!(extract_price(&prices, "bitcoin", "eur"), None);
    }
}
