use std::fmt::{self, Display};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info, warn};

use crate::error::StoreError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Holding {
    pub symbol: String,
    pub quantity: Decimal,
}

/// Symbol to quantity mapping, kept in insertion order.
///
/// Every stored holding has a strictly positive quantity.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Portfolio {
    holdings: Vec<Holding>,
}

pub fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_uppercase()
}

impl Portfolio {
    pub fn new() -> Self {
        Self { holdings: vec![] }
    }

    pub fn holdings(&self) -> &[Holding] {
        &self.holdings
    }

    pub fn len(&self) -> usize {
        self.holdings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.holdings.is_empty()
    }

    pub fn get(&self, symbol: &str) -> Option<&Holding> {
        let symbol = normalize_symbol(symbol);
        self.holdings.iter().find(|holding| holding.symbol == symbol)
    }

    /// Sets the quantity of `symbol`, replacing any previous one in place.
    /// A non-positive quantity removes the symbol instead. Returns whether a holding is stored.
    pub fn upsert(&mut self, symbol: &str, quantity: Decimal) -> bool {
        let symbol = normalize_symbol(symbol);
        if quantity <= Decimal::ZERO {
            self.remove(&symbol);
            return false;
        }

        let quantity = quantity.normalize();
        match self.holdings.iter_mut().find(|holding| holding.symbol == symbol) {
            Some(holding) => holding.quantity = quantity,
            None => self.holdings.push(Holding { symbol, quantity }),
        }
        true
    }

    pub fn remove(&mut self, symbol: &str) -> bool {
        let symbol = normalize_symbol(symbol);
        let len = self.holdings.len();
        self.holdings.retain(|holding| holding.symbol != symbol);
        self.holdings.len() != len
    }

    pub fn clear(&mut self) {
        self.holdings.clear();
    }
}

impl Display for Portfolio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s: Vec<String> = self
            .holdings
            .iter()
            .map(|holding| format!("{}: {}", holding.symbol, holding.quantity))
            .collect();
        write!(f, "{}", s.join(" / "))
    }
}

impl Serialize for Portfolio {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.holdings.len()))?;
        for holding in &self.holdings {
            map.serialize_entry(&holding.symbol, &holding.quantity)?;
        }
        map.end()
    }
}

struct PortfolioVisitor;

impl<'de> Visitor<'de> for PortfolioVisitor {
    type Value = Portfolio;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a map of symbol to quantity")
    }

    fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut portfolio = Portfolio::new();
        while let Some((symbol, value)) = access.next_entry::<String, Value>()? {
            let Some(quantity) = quantity_from_json(&value) else {
                warn!("Dropping holding {} with unusable quantity {}", symbol, value);
                continue;
            };
            if !portfolio.upsert(&symbol, quantity) {
                debug!("Dropping non-positive holding {} : {}", symbol, quantity);
            }
        }
        Ok(portfolio)
    }
}

// numbers come from older files, strings from ours
fn quantity_from_json(value: &Value) -> Option<Decimal> {
    let text = match value {
        Value::String(text) => text.clone(),
        Value::Number(number) => number.to_string(),
        _ => return None,
    };
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
}

impl<'de> Deserialize<'de> for Portfolio {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(PortfolioVisitor)
    }
}

/// JSON file holding the portfolio. Every mutation is a full load-modify-save.
#[derive(Clone, Debug)]
pub struct HoldingsStore {
    path: PathBuf,
}

impl HoldingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Never fails: a missing file is created empty, an unreadable one is treated as empty
    /// and left untouched until the next successful save.
    pub async fn load(&self) -> Portfolio {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => match serde_json::from_str::<Portfolio>(&content) {
                Ok(portfolio) => portfolio,
                Err(err) => {
                    error!("Failed parsing {} : {}", self.path.display(), err);
                    Portfolio::new()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!("No portfolio at {}, starting empty", self.path.display());
                let portfolio = Portfolio::new();
                if let Err(err) = self.save(&portfolio).await {
                    warn!("Could not create portfolio file : {}", err);
                }
                portfolio
            }
            Err(err) => {
                error!("Failed reading {} : {}", self.path.display(), err);
                Portfolio::new()
            }
        }
    }

    pub async fn save(&self, portfolio: &Portfolio) -> Result<(), StoreError> {
        let mut json = serde_json::to_string_pretty(portfolio)?;
        json.push('\n');

        self.write_atomic(json.as_bytes())
            .await
            .map_err(|source| StoreError::Write {
                path: self.path.clone(),
                source,
            })?;

        debug!("Saved portfolio ({} holdings)", portfolio.len());
        Ok(())
    }

    /// Returns the updated portfolio. A non-positive quantity removes the symbol.
    pub async fn upsert(&self, symbol: &str, quantity: Decimal) -> Result<Portfolio, StoreError> {
        let mut portfolio = self.load().await;
        portfolio.upsert(symbol, quantity);
        self.save(&portfolio).await?;
        Ok(portfolio)
    }

    pub async fn remove(&self, symbol: &str) -> Result<bool, StoreError> {
        let mut portfolio = self.load().await;
        if !portfolio.remove(symbol) {
            return Ok(false);
        }
        self.save(&portfolio).await?;
        Ok(true)
    }

    pub async fn clear(&self) -> Result<(), StoreError> {
        self.save(&Portfolio::new()).await
    }

    // readers only ever see the old file or the new one
    async fn write_atomic(&self, contents: &[u8]) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let tmp_path = self.temp_path();
        let mut file = tokio::fs::File::create(&tmp_path).await?;
        file.write_all(contents).await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&tmp_path, &self.path).await
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_else(|| "portfolio".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn test_upsert_replaces_in_place() {
        let mut portfolio = Portfolio::new();
        portfolio.upsert("btc", dec!(0.1));
        portfolio.upsert("AAPL", dec!(2));
        portfolio.upsert("BTC", dec!(0.2));

        assert_eq!(portfolio.len(), 2);
        assert_eq!(portfolio.holdings()[0].symbol, "BTC");
        assert_eq!(portfolio.holdings()[0].quantity, dec!(0.2));
        assert_eq!(portfolio.holdings()[1].symbol, "AAPL");
    }

    #[test]
    fn test_upsert_non_positive_removes() {
        let mut portfolio = Portfolio::new();
        portfolio.upsert("AAPL", dec!(3));

        assert!(!portfolio.upsert("aapl", dec!(0)));
        assert!(portfolio.get("AAPL").is_none());

        assert!(!portfolio.upsert("TSLA", dec!(-1)));
        assert!(portfolio.is_empty());
    }

    #[test]
    fn test_serialize_keeps_order() {
        let mut portfolio = Portfolio::new();
        portfolio.upsert("NVDA", dec!(4));
        portfolio.upsert("ADA", dec!(1000));
        portfolio.upsert("AAPL", dec!(2.50));

        let json = serde_json::to_string(&portfolio).unwrap();
        assert_eq!(json, r#"{"NVDA":"4","ADA":"1000","AAPL":"2.5"}"#);
    }

    #[test]
    fn test_deserialize_legacy_numbers() {
        let portfolio: Portfolio =
            serde_json::from_str(r#"{"GOOGL": 3, "btc": 0.1, "WBD": 0, "ADA": "1000"}"#).unwrap();

        assert_eq!(portfolio.len(), 3);
        assert_eq!(portfolio.get("BTC").unwrap().quantity, dec!(0.1));
        assert_eq!(portfolio.get("ADA").unwrap().quantity, dec!(1000));
        assert!(portfolio.get("WBD").is_none());
        assert_eq!(portfolio.holdings()[0].symbol, "GOOGL");
    }

    #[test]
    fn test_deserialize_skips_unusable_quantities() {
        let portfolio: Portfolio = serde_json::from_str(
            r#"{"AAPL": 2, "HUGE": 1e30, "ADA": "1000", "BAD": "abc", "ODD": [1]}"#,
        )
        .unwrap();

        assert_eq!(portfolio.len(), 2);
        assert_eq!(portfolio.get("AAPL").unwrap().quantity, dec!(2));
        assert_eq!(portfolio.get("ADA").unwrap().quantity, dec!(1000));
        assert!(portfolio.get("HUGE").is_none());
    }

    #[tokio::test]
    async fn test_load_keeps_holdings_next_to_out_of_range_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("portfolio.json");
        std::fs::write(&path, r#"{"GOOGL": 3, "HUGE": 1e30, "BTC": 0.5}"#).unwrap();
        let store = HoldingsStore::new(&path);

        let portfolio = store.upsert("ETH", dec!(1)).await.unwrap();
        let symbols: Vec<&str> = portfolio
            .holdings()
            .iter()
            .map(|holding| holding.symbol.as_str())
            .collect();
        assert_eq!(symbols, ["GOOGL", "BTC", "ETH"]);
    }

    #[tokio::test]
    async fn test_load_creates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = HoldingsStore::new(dir.path().join("data").join("portfolio.json"));

        let portfolio = store.load().await;
        assert!(portfolio.is_empty());

        let content = std::fs::read_to_string(store.path()).unwrap();
        assert_eq!(content.trim(), "{}");
    }

    #[tokio::test]
    async fn test_load_malformed_file_is_left_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("portfolio.json");
        std::fs::write(&path, "{ not json").unwrap();
        let store = HoldingsStore::new(&path);

        assert!(store.load().await.is_empty());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{ not json");
    }

    #[tokio::test]
    async fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = HoldingsStore::new(dir.path().join("portfolio.json"));

        let mut portfolio = Portfolio::new();
        for i in 1..=100_i64 {
            portfolio.upsert(&format!("SYM{i}"), Decimal::new(i * 7919, 3));
        }
        store.save(&portfolio).await.unwrap();

        assert_eq!(store.load().await, portfolio);
        assert!(!dir.path().join("portfolio.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_store_mutations() {
        let dir = tempfile::tempdir().unwrap();
        let store = HoldingsStore::new(dir.path().join("portfolio.json"));

        store.upsert("btc", dec!(0.1)).await.unwrap();
        let portfolio = store.upsert("BTC", dec!(0.2)).await.unwrap();
        assert_eq!(portfolio.len(), 1);
        assert_eq!(store.load().await.get("BTC").unwrap().quantity, dec!(0.2));

        assert!(store.remove("btc").await.unwrap());
        assert!(!store.remove("BTC").await.unwrap());

        store.upsert("AAPL", dec!(1)).await.unwrap();
        store.clear().await.unwrap();
        assert!(store.load().await.is_empty());
    }

    #[tokio::test]
    async fn test_save_to_unwritable_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "").unwrap();
        let store = HoldingsStore::new(blocker.join("portfolio.json"));

        let res = store.save(&Portfolio::new()).await;
        assert!(matches!(res, Err(StoreError::Write { .. })));
    }
}
