use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use anyhow::{bail, Result};
use futures::FutureExt;
use tokio::select;
use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::bot::Bot;
use crate::chat::{ChatApi, InboundEvent};
use crate::pricing::MarketData;

#[derive(Clone, Debug)]
pub struct IngestionSettings {
    /// Pause between two successful polls.
    pub poll_interval: Duration,
    /// First pause after a failed poll, doubled on each consecutive failure.
    pub error_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for IngestionSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            error_backoff: Duration::from_secs(5),
            max_backoff: Duration::from_secs(60),
        }
    }
}

/// Polls the chat with a strictly increasing cursor and dispatches each event once, in id order.
///
/// Delivery is at-least-once: the source only forgets events below the offset of the next
/// poll, so a crash while dispatching re-delivers that event on restart.
pub struct IngestionLoop<C, F> {
    bot: Bot<C, F>,
    cursor: u64,
    failures: u32,
    settings: IngestionSettings,
}

impl<C: ChatApi, F: MarketData> IngestionLoop<C, F> {
    pub fn new(bot: Bot<C, F>, settings: IngestionSettings) -> Self {
        Self {
            bot,
            cursor: 0,
            failures: 0,
            settings,
        }
    }

    /// Id of the last dispatched event, 0 before the first one.
    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    pub fn bot(&self) -> &Bot<C, F> {
        &self.bot
    }

    /// Fetches and dispatches one batch. Returns the number of text events handled.
    pub async fn poll_once(&mut self) -> Result<usize> {
        let events = self.fetch().await?;
        self.dispatch_all(events).await
    }

    async fn fetch(&self) -> Result<Vec<InboundEvent>> {
        self.bot.chat().get_updates(self.cursor + 1).await
    }

    /// Dispatches the whole batch even if some events panic, then fails if any did.
    async fn dispatch_all(&mut self, mut events: Vec<InboundEvent>) -> Result<usize> {
        events.sort_by_key(|event| event.id);

        let mut dispatched = 0;
        let mut crashed = vec![];
        for event in events {
            if event.id <= self.cursor {
                debug!("Skipping event {} at cursor {}", event.id, self.cursor);
                continue;
            }
            self.cursor = event.id;

            match event.text.as_deref() {
                Some(text) => {
                    debug!(
                        "Event {} from {:?} in chat {:?}",
                        event.id, event.sender, event.chat_id
                    );
                    match AssertUnwindSafe(self.bot.dispatch(text)).catch_unwind().await {
                        Ok(()) => dispatched += 1,
                        Err(panic) => {
                            error!(
                                "Dispatch of event {} panicked : {}",
                                event.id,
                                panic_message(panic.as_ref())
                            );
                            crashed.push(event.id);
                        }
                    }
                }
                None => debug!("Ignoring event {} without text", event.id),
            }
        }

        if !crashed.is_empty() {
            bail!("Dispatch panicked for events {:?}", crashed);
        }
        Ok(dispatched)
    }

    fn backoff(&self) -> Duration {
        let exponent = self.failures.saturating_sub(1).min(16);
        self.settings
            .error_backoff
            .saturating_mul(1 << exponent)
            .min(self.settings.max_backoff)
    }

    /// Runs until `shutdown` flips to true (or its sender is dropped).
    /// An event being dispatched is always handled to the end.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        info!("Polling for commands");

        loop {
            if *shutdown.borrow() {
                break;
            }

            let fetched = select! {
                fetched = self.fetch() => fetched,
                _ = shutdown.changed() => break,
            };

            let result = match fetched {
                Ok(events) => self.dispatch_all(events).await,
                Err(err) => Err(err),
            };

            let pause = match result {
                Ok(_) => {
                    self.failures = 0;
                    self.settings.poll_interval
                }
                Err(err) => {
                    self.failures += 1;
                    let pause = self.backoff();
                    error!(
                        "Iteration failed ({} in a row), retrying in {:?} : {}",
                        self.failures, pause, err
                    );
                    pause
                }
            };

            select! {
                _ = tokio::time::sleep(pause) => {}
                _ = shutdown.changed() => break,
            }
        }

        info!("Stopped polling at cursor {}", self.cursor);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}
