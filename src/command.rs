use std::str::FromStr;

use rust_decimal::Decimal;
use strum_macros::{Display, EnumIter, EnumString};
use thiserror::Error;

use crate::holdings::normalize_symbol;

pub const COMMAND_MARKER: char = '/';

#[derive(Clone, Copy, Debug, PartialEq, Eq, Display, EnumString, EnumIter)]
pub enum CommandKind {
    #[strum(serialize = "/start")]
    Start,
    #[strum(serialize = "/add")]
    Add,
    #[strum(serialize = "/remove")]
    Remove,
    #[strum(serialize = "/list")]
    List,
    #[strum(serialize = "/update")]
    Update,
    #[strum(serialize = "/clear")]
    Clear,
    #[strum(serialize = "/help")]
    Help,
}

impl CommandKind {
    pub fn usage(&self) -> &'static str {
        match self {
            CommandKind::Start => "/start - Show this help",
            CommandKind::Add => "/add [SYMBOL] [QUANTITY] - Add or replace an asset",
            CommandKind::Remove => "/remove [SYMBOL] - Remove asset from portfolio",
            CommandKind::List => "/list - Show current portfolio",
            CommandKind::Update => "/update - Get portfolio update with current prices",
            CommandKind::Clear => "/clear - Clear all assets",
            CommandKind::Help => "/help - Show this help",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Start,
    Add { symbol: String, quantity: Decimal },
    Remove(String),
    List,
    Update,
    Clear,
    Help,
    Unknown(String),
}

/// Malformed arguments. The message is sent back as is.
#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum CommandError {
    #[error("❌ Usage: /add SYMBOL QUANTITY")]
    AddUsage,
    #[error("❌ Invalid quantity. Use: /add SYMBOL QUANTITY")]
    InvalidQuantity,
    #[error("❌ Usage: /remove SYMBOL")]
    RemoveUsage,
}

/// Splits `/cmd rest of text` into the command token and the trimmed remainder.
/// Returns `None` for text that is not a command.
pub fn split_command(text: &str) -> Option<(&str, &str)> {
    let text = text.trim_start();
    if !text.starts_with(COMMAND_MARKER) {
        return None;
    }
    match text.split_once(char::is_whitespace) {
        Some((token, rest)) => Some((token, rest.trim())),
        None => Some((text.trim_end(), "")),
    }
}

impl Command {
    pub fn parse(token: &str, args: &str) -> Result<Command, CommandError> {
        // clients append the bot name in group chats: /list@my_bot
        let name = token.split('@').next().unwrap_or(token);

        let kind = match CommandKind::from_str(name) {
            Ok(kind) => kind,
            Err(_) => return Ok(Command::Unknown(token.to_owned())),
        };

        let command = match kind {
            CommandKind::Start => Command::Start,
            CommandKind::Help => Command::Help,
            CommandKind::List => Command::List,
            CommandKind::Update => Command::Update,
            CommandKind::Clear => Command::Clear,
            CommandKind::Add => {
                let mut parts = args.split_whitespace();
                let (Some(symbol), Some(quantity)) = (parts.next(), parts.next()) else {
                    return Err(CommandError::AddUsage);
                };
                Command::Add {
                    symbol: normalize_symbol(symbol),
                    quantity: parse_quantity(quantity)?,
                }
            }
            CommandKind::Remove => match args.split_whitespace().next() {
                Some(symbol) => Command::Remove(normalize_symbol(symbol)),
                None => return Err(CommandError::RemoveUsage),
            },
        };
        Ok(command)
    }
}

fn parse_quantity(value: &str) -> Result<Decimal, CommandError> {
    let quantity = Decimal::from_str(value)
        .or_else(|_| Decimal::from_scientific(value))
        .map_err(|_| CommandError::InvalidQuantity)?;
    if quantity.is_sign_negative() && !quantity.is_zero() {
        return Err(CommandError::InvalidQuantity);
    }
    Ok(quantity)
}
