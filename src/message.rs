use itertools::Itertools;
use rust_decimal::{Decimal, RoundingStrategy};
use strum::IntoEnumIterator;

use crate::command::CommandKind;
use crate::holdings::Portfolio;
use crate::valuation::Valuation;

pub const EMPTY_PORTFOLIO: &str = "📋 Portfolio is empty";
pub const FETCHING_PRICES: &str = "🔄 Fetching latest prices...";
pub const CLEARED: &str = "🗑️ Portfolio cleared";
pub const UNKNOWN_COMMAND: &str = "❌ Unknown command. Use /help for available commands";
pub const NOT_A_COMMAND: &str = "❓ Use /help to see available commands";

// Telegram HTML mode rejects messages with unescaped markup characters
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

pub fn currency_sign(currency: &str) -> &str {
    match currency {
        "EUR" => "€",
        "USD" => "$",
        "GBP" => "£",
        "JPY" => "¥",
        other => other,
    }
}

/// Half-up to cents, the way amounts are usually read.
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

pub fn help() -> String {
    let commands = CommandKind::iter().map(|kind| kind.usage()).join("\n");

    format!(
        "🤖 <b>Portfolio Tracker Bot</b>\n\n\
         <b>Commands:</b>\n{commands}\n\n\
         <b>Examples:</b>\n\
         /add AAPL 2.5\n/add BTC 0.1\n/add ADA 1000\n/remove AAPL\n/list\n/update"
    )
}

pub fn added(symbol: &str, quantity: Decimal) -> String {
    format!(
        "✅ Added {}: {} to portfolio",
        escape_html(symbol),
        quantity.normalize()
    )
}

pub fn removed(symbol: &str) -> String {
    format!("✅ Removed {} from portfolio", escape_html(symbol))
}

pub fn not_found(symbol: &str) -> String {
    format!("❌ {} not found in portfolio", escape_html(symbol))
}

pub fn save_failed(reason: &str) -> String {
    format!("❌ Could not save portfolio: {}", escape_html(reason))
}

pub fn portfolio_list(portfolio: &Portfolio) -> String {
    if portfolio.is_empty() {
        return EMPTY_PORTFOLIO.to_string();
    }
    let lines = portfolio
        .holdings()
        .iter()
        .map(|holding| {
            format!(
                "• {}: {}",
                escape_html(&holding.symbol),
                holding.quantity.normalize()
            )
        })
        .join("\n");
    format!("📋 <b>Current Portfolio:</b>\n\n{lines}")
}

pub fn valuation_report(valuation: &Valuation) -> String {
    let sign = currency_sign(&valuation.currency);
    let lines = valuation
        .positions
        .iter()
        .map(|position| {
            let symbol = escape_html(&position.symbol);
            let quantity = position.quantity.normalize();
            match position.price {
                Some(price) => format!(
                    "• {symbol}: {sign}{:.2} × {quantity} = <b>{sign}{:.2}</b>",
                    round_money(price),
                    round_money(position.value())
                ),
                None => format!("• {symbol}: <i>Price unavailable</i> × {quantity}"),
            }
        })
        .join("\n");

    format!(
        "📊 <b>Portfolio Update</b>\n\n\
         🕐 <i>{}</i>\n\n\
         📈 <b>Holdings:</b>\n{lines}\n\n\
         💰 <b>Total Portfolio Value: {sign}{:.2}</b>",
        valuation.time.format("%Y-%m-%d %H:%M:%S UTC"),
        round_money(valuation.total)
    )
}
