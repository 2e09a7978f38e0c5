use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, error, trace};

use super::{ChatApi, InboundEvent};

const ENDPOINT: &str = "https://api.telegram.org";

#[derive(Deserialize, Debug, Clone)]
pub struct ApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub description: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn into_result(self) -> Result<T> {
        if !self.ok {
            return Err(anyhow!(
                "Telegram error: {}",
                self.description.unwrap_or_else(|| "unknown".to_string())
            ));
        }
        self.result.context("Telegram response without result")
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct Update {
    pub update_id: u64,
    pub message: Option<Message>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct Message {
    pub chat: Chat,
    pub from: Option<User>,
    pub text: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct Chat {
    pub id: i64,
}

#[derive(Deserialize, Debug, Clone)]
pub struct User {
    pub first_name: String,
    pub username: Option<String>,
}

impl From<Update> for InboundEvent {
    fn from(update: Update) -> Self {
        let message = update.message;
        InboundEvent {
            id: update.update_id,
            chat_id: message.as_ref().map(|message| message.chat.id),
            sender: message
                .as_ref()
                .and_then(|message| message.from.as_ref())
                .map(|user| user.username.clone().unwrap_or_else(|| user.first_name.clone())),
            text: message.and_then(|message| message.text),
        }
    }
}

/// Bot API client bound to one destination chat.
#[derive(Debug, Clone)]
pub struct Telegram {
    client: Client,
    token: String,
    chat_id: String,
    poll_timeout: Duration,
}

impl Telegram {
    pub fn new(token: &str, chat_id: &str, poll_timeout: Duration) -> Result<Self> {
        // must outlive the long poll
        let client = Client::builder()
            .timeout(poll_timeout + Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            token: token.to_owned(),
            chat_id: chat_id.to_owned(),
            poll_timeout,
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{ENDPOINT}/bot{}/{method}", self.token)
    }

    async fn post_message(&self, text: &str) -> Result<()> {
        let body = json!({
            "chat_id": self.chat_id,
            "text": text,
            "parse_mode": "HTML",
        });
        // errors carry the url, which embeds the token
        let res = self
            .client
            .post(self.method_url("sendMessage"))
            .json(&body)
            .send()
            .await
            .map_err(reqwest::Error::without_url)?;
        let body = res.text().await.map_err(reqwest::Error::without_url)?;
        trace!("sendMessage : {}", body);

        let response: ApiResponse<serde_json::Value> = serde_json::de::from_str(body.as_str())?;
        response.into_result().map(|_| ())
    }
}

impl ChatApi for Telegram {
    async fn get_updates(&self, offset: u64) -> Result<Vec<InboundEvent>> {
        let params = [
            ("offset", offset.to_string()),
            ("timeout", self.poll_timeout.as_secs().to_string()),
            ("allowed_updates", r#"["message"]"#.to_string()),
        ];
        let url = Url::parse_with_params(self.method_url("getUpdates").as_str(), &params)?;

        let res = self
            .client
            .get(url)
            .send()
            .await
            .map_err(reqwest::Error::without_url)?;
        let body = res.text().await.map_err(reqwest::Error::without_url)?;

        let response: ApiResponse<Vec<Update>> = serde_json::de::from_str(body.as_str())?;
        let updates = response.into_result()?;
        if !updates.is_empty() {
            debug!("Got {} updates from offset {}", updates.len(), offset);
        }

        Ok(updates.into_iter().map(InboundEvent::from).collect())
    }

    async fn send_message(&self, text: &str) -> bool {
        match self.post_message(text).await {
            Ok(()) => true,
            Err(err) => {
                error!("Failed sending message : {}", err);
                false
            }
        }
    }
}
