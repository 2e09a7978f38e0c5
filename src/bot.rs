use tracing::{debug, error, info, warn};

use crate::chat::ChatApi;
use crate::command::{split_command, Command};
use crate::holdings::HoldingsStore;
use crate::message;
use crate::pricing::{MarketData, PriceResolver};
use crate::valuation;

/// Interprets chat commands against the holdings and answers through the chat.
pub struct Bot<C, F> {
    chat: C,
    store: HoldingsStore,
    resolver: PriceResolver<F>,
}

impl<C: ChatApi, F: MarketData> Bot<C, F> {
    pub fn new(chat: C, store: HoldingsStore, resolver: PriceResolver<F>) -> Self {
        Self {
            chat,
            store,
            resolver,
        }
    }

    pub fn chat(&self) -> &C {
        &self.chat
    }

    pub fn store(&self) -> &HoldingsStore {
        &self.store
    }

    /// Handles one inbound text. Every text gets a reply, malformed input included.
    pub async fn dispatch(&self, text: &str) {
        let Some((token, args)) = split_command(text) else {
            self.reply(message::NOT_A_COMMAND).await;
            return;
        };

        info!("Received command: {} {}", token, args);
        match Command::parse(token, args) {
            Ok(command) => self.execute(command).await,
            Err(err) => {
                debug!("Rejected {} {} : {:?}", token, args, err);
                self.reply(&err.to_string()).await;
            }
        }
    }

    pub async fn execute(&self, command: Command) {
        let reply = match command {
            Command::Start | Command::Help => message::help(),
            // a zero quantity closes the position
            Command::Add { symbol, quantity } if quantity.is_zero() => {
                self.remove_holding(&symbol).await
            }
            Command::Add { symbol, quantity } => match self.store.upsert(&symbol, quantity).await {
                Ok(_) => {
                    info!("Set {} to {}", symbol, quantity);
                    message::added(&symbol, quantity)
                }
                Err(err) => {
                    error!("Failed adding {} : {}", symbol, err);
                    message::save_failed(&err.to_string())
                }
            },
            Command::Remove(symbol) => self.remove_holding(&symbol).await,
            Command::List => message::portfolio_list(&self.store.load().await),
            Command::Update => {
                self.reply(message::FETCHING_PRICES).await;
                self.report().await;
                return;
            }
            Command::Clear => match self.store.clear().await {
                Ok(()) => {
                    info!("Cleared portfolio");
                    message::CLEARED.to_string()
                }
                Err(err) => {
                    error!("Failed clearing portfolio : {}", err);
                    message::save_failed(&err.to_string())
                }
            },
            Command::Unknown(token) => {
                debug!("Unknown command {}", token);
                message::UNKNOWN_COMMAND.to_string()
            }
        };
        self.reply(&reply).await;
    }

    async fn remove_holding(&self, symbol: &str) -> String {
        match self.store.remove(symbol).await {
            Ok(true) => {
                info!("Removed {}", symbol);
                message::removed(symbol)
            }
            Ok(false) => message::not_found(symbol),
            Err(err) => {
                error!("Failed removing {} : {}", symbol, err);
                message::save_failed(&err.to_string())
            }
        }
    }

    /// Values the stored holdings and sends the report. Returns whether it was delivered.
    pub async fn report(&self) -> bool {
        let portfolio = self.store.load().await;
        if portfolio.is_empty() {
            return self.reply(message::EMPTY_PORTFOLIO).await;
        }

        let session = self.resolver.session();
        let valuation = valuation::value(&portfolio, &session).await;
        self.reply(&message::valuation_report(&valuation)).await
    }

    async fn reply(&self, text: &str) -> bool {
        let sent = self.chat.send_message(text).await;
        if !sent {
            warn!("Reply not delivered");
        }
        sent
    }
}
