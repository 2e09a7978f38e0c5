use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::holdings::Portfolio;
use crate::pricing::{MarketData, PriceSession};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PricedPosition {
    pub symbol: String,
    pub quantity: Decimal,
    /// `None` when no feed could price the symbol.
    pub price: Option<Decimal>,
}

impl PricedPosition {
    pub fn value(&self) -> Decimal {
        self.price
            .and_then(|price| price.checked_mul(self.quantity))
            .unwrap_or(Decimal::ZERO)
    }

    pub fn is_available(&self) -> bool {
        self.price.is_some()
    }
}

#[derive(Clone, Debug)]
pub struct Valuation {
    pub time: DateTime<Utc>,
    pub currency: String,
    pub positions: Vec<PricedPosition>,
    pub total: Decimal,
}

impl Valuation {
    pub fn unavailable(&self) -> impl Iterator<Item = &PricedPosition> {
        self.positions.iter().filter(|position| !position.is_available())
    }
}

/// Prices every holding in portfolio order. Unpriced holdings are kept and count as zero.
/// A holding whose value does not fit in a `Decimal` is reported as unpriced.
pub async fn value<F: MarketData>(portfolio: &Portfolio, session: &PriceSession<'_, F>) -> Valuation {
    let mut positions = Vec::with_capacity(portfolio.len());
    let mut total = Decimal::ZERO;

    for holding in portfolio.holdings() {
        let mut position = PricedPosition {
            symbol: holding.symbol.clone(),
            quantity: holding.quantity,
            price: session.fetch_price(&holding.symbol).await,
        };
        if let Some(price) = position.price {
            match price
                .checked_mul(holding.quantity)
                .and_then(|value| total.checked_add(value))
            {
                Some(sum) => total = sum,
                None => {
                    warn!(
                        "Value of {} {} at {} overflows, leaving it unpriced",
                        holding.quantity, holding.symbol, price
                    );
                    position.price = None;
                }
            }
        }
        positions.push(position);
    }

    let valuation = Valuation {
        time: Utc::now(),
        currency: session.currency().to_owned(),
        positions,
        total,
    };
    info!(
        "Valued {} holdings at {} {} ({} unavailable)",
        valuation.positions.len(),
        valuation.total.round_dp(2),
        valuation.currency,
        valuation.unavailable().count()
    );
    valuation
}
