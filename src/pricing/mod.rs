use anyhow::Result;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::holdings::normalize_symbol;

pub mod feeds;

pub const DEFAULT_FALLBACK_RATE: Decimal = dec!(0.85);

/// Equity quotes are denominated in this currency.
pub const EQUITY_QUOTE_CURRENCY: &str = "USD";

const CRYPTO_IDS: [(&str, &str); 8] = [
    ("BTC", "bitcoin"),
    ("ETH", "ethereum"),
    ("ADA", "cardano"),
    ("SOL", "solana"),
    ("DOT", "polkadot"),
    ("XRP", "ripple"),
    ("DOGE", "dogecoin"),
    ("LTC", "litecoin"),
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssetClass {
    Equity,
    /// Carries the price provider's coin id.
    Crypto(&'static str),
}

pub fn classify(symbol: &str) -> AssetClass {
    let symbol = normalize_symbol(symbol);
    CRYPTO_IDS
        .iter()
        .find(|(crypto, _)| *crypto == symbol)
        .map(|(_, coin_id)| AssetClass::Crypto(*coin_id))
        .unwrap_or(AssetClass::Equity)
}

/// Remote price sources. Errors cover both transport failures and unusable payloads.
pub trait MarketData {
    async fn equity_quote(&self, symbol: &str) -> Result<Decimal>;
    async fn crypto_quote(&self, coin_id: &str, currency: &str) -> Result<Decimal>;
    async fn conversion_rate(&self, from: &str, to: &str) -> Result<Decimal>;
}

#[derive(Clone, Debug)]
pub struct PriceResolver<F> {
    feed: F,
    currency: String,
    fallback_rate: Decimal,
}

impl<F: MarketData> PriceResolver<F> {
    pub fn new(feed: F, currency: &str, fallback_rate: Decimal) -> Self {
        Self {
            feed,
            currency: currency.to_uppercase(),
            fallback_rate,
        }
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    /// Starts a valuation cycle. The conversion rate is fetched at most once per session.
    pub fn session(&self) -> PriceSession<'_, F> {
        PriceSession {
            resolver: self,
            rate: OnceCell::new(),
        }
    }
}

pub struct PriceSession<'a, F> {
    resolver: &'a PriceResolver<F>,
    rate: OnceCell<Decimal>,
}

impl<F: MarketData> PriceSession<'_, F> {
    pub fn currency(&self) -> &str {
        self.resolver.currency()
    }

    /// Price of one unit of `symbol` in the target currency, or `None` when unavailable.
    pub async fn fetch_price(&self, symbol: &str) -> Option<Decimal> {
        let symbol = normalize_symbol(symbol);
        let feed = &self.resolver.feed;

        match classify(&symbol) {
            AssetClass::Crypto(coin_id) => {
                let price = feed.crypto_quote(coin_id, self.currency()).await;
                usable_price(&symbol, price)
            }
            AssetClass::Equity => {
                let quote = usable_price(&symbol, feed.equity_quote(&symbol).await)?;
                let rate = self.conversion_rate().await;
                let price = quote.checked_mul(rate);
                if price.is_none() {
                    warn!("Converting {} quote {} at {} overflows", symbol, quote, rate);
                }
                price
            }
        }
    }

    pub async fn conversion_rate(&self) -> Decimal {
        *self
            .rate
            .get_or_init(|| async {
                let to = self.currency();
                if to == EQUITY_QUOTE_CURRENCY {
                    return Decimal::ONE;
                }
                match self
                    .resolver
                    .feed
                    .conversion_rate(EQUITY_QUOTE_CURRENCY, to)
                    .await
                {
                    Ok(rate) if rate > Decimal::ZERO => {
                        debug!("{}/{} rate : {}", EQUITY_QUOTE_CURRENCY, to, rate);
                        rate
                    }
                    Ok(rate) => {
                        warn!(
                            "Unusable {}/{} rate {}, using fallback {}",
                            EQUITY_QUOTE_CURRENCY, to, rate, self.resolver.fallback_rate
                        );
                        self.resolver.fallback_rate
                    }
                    Err(err) => {
                        warn!(
                            "Failed fetching {}/{} rate, using fallback {} : {}",
                            EQUITY_QUOTE_CURRENCY, to, self.resolver.fallback_rate, err
                        );
                        self.resolver.fallback_rate
                    }
                }
            })
            .await
    }
}

fn usable_price(symbol: &str, price: Result<Decimal>) -> Option<Decimal> {
    match price {
        Ok(price) if price > Decimal::ZERO => Some(price),
        Ok(price) => {
            warn!("Unusable price {} for {}", price, symbol);
            None
        }
        Err(err) => {
            warn!("Failed fetching price for {} : {}", symbol, err);
            None
        }
    }
}


#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::mock::MockFeed;
    use super::*;

    fn feed() -> MockFeed {
        MockFeed {
            equities: [("AAPL".to_string(), dec!(200)), ("NVDA".to_string(), dec!(100))].into(),
            cryptos: [("bitcoin".to_string(), dec!(50000))].into(),
            rate: Some(dec!(0.9)),
            ..Default::default()
        }
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify("btc"), AssetClass::Crypto("bitcoin"));
        assert_eq!(classify("ADA"), AssetClass::Crypto("cardano"));
        assert_eq!(classify("AAPL"), AssetClass::Equity);
        assert_eq!(classify("XXXX"), AssetClass::Equity);
    }

    #[tokio::test]
    async fn test_equity_price_is_converted() {
        let resolver = PriceResolver::new(feed(), "EUR", DEFAULT_FALLBACK_RATE);
        let session = resolver.session();

        assert_eq!(session.fetch_price("AAPL").await, Some(dec!(180)));
        assert_eq!(session.fetch_price("BTC").await, Some(dec!(50000)));
        assert_eq!(session.fetch_price("XXXX").await, None);
    }

    #[tokio::test]
    async fn test_rate_memoized_per_session() {
        let resolver = PriceResolver::new(feed(), "EUR", DEFAULT_FALLBACK_RATE);

        let session = resolver.session();
        session.fetch_price("AAPL").await;
        session.fetch_price("NVDA").await;
        session.fetch_price("BTC").await;
        assert_eq!(resolver.feed.rate_calls(), 1);

        let session = resolver.session();
        session.fetch_price("AAPL").await;
        assert_eq!(resolver.feed.rate_calls(), 2);
    }

    #[tokio::test]
    async fn test_rate_fallback() {
        let mut feed = feed();
        feed.rate = None;
        let resolver = PriceResolver::new(feed, "EUR", dec!(0.85));

        let session = resolver.session();
        assert_eq!(session.fetch_price("AAPL").await, Some(dec!(170)));
    }

    #[tokio::test]
    async fn test_same_currency_skips_rate() {
        let resolver = PriceResolver::new(feed(), "usd", DEFAULT_FALLBACK_RATE);

        let session = resolver.session();
        assert_eq!(session.fetch_price("AAPL").await, Some(dec!(200)));
        assert_eq!(resolver.feed.rate_calls(), 0);
    }

    #[tokio::test]
    async fn test_overflowing_conversion_is_unavailable() {
        let mut feed = feed();
        feed.equities.insert("HUGE".to_string(), Decimal::MAX);
        feed.rate = Some(dec!(2));
        let resolver = PriceResolver::new(feed, "EUR", DEFAULT_FALLBACK_RATE);

        let session = resolver.session();
        assert_eq!(session.fetch_price("HUGE").await, None);
        assert_eq!(session.fetch_price("AAPL").await, Some(dec!(400)));
    }

    #[tokio::test]
    async fn test_zero_quote_is_unavailable() {
        let mut feed = feed();
        feed.equities.insert("WBD".to_string(), dec!(0));
        let resolver = PriceResolver::new(feed, "EUR", DEFAULT_FALLBACK_RATE);

        assert_eq!(resolver.session().fetch_price("WBD").await, None);
    }
}
