use anyhow::Result;

pub mod telegram;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundEvent {
    /// Strictly increasing across the event stream.
    pub id: u64,
    /// Missing for non-text messages (stickers, photos, joins...).
    pub text: Option<String>,
    pub chat_id: Option<i64>,
    pub sender: Option<String>,
}

/// Pull-based inbound source and outbound notification channel to the single chat destination.
pub trait ChatApi {
    /// Events with an id of at least `offset`. Requesting an offset acknowledges everything below it.
    async fn get_updates(&self, offset: u64) -> Result<Vec<InboundEvent>>;

    /// Returns whether the message was delivered. Failures are logged, never raised.
    async fn send_message(&self, text: &str) -> bool;
}
