//! Discord REST adapter
//!
//! Speaks the v10 channel message endpoints with a bot token. The roster is
//! posted as a single embed.

use super::{MessagePublisher, PublishError};
use crate::roster::MessageContent;
use crate::target::{DestinationId, MessageId};
use crate::RosterError;
use async_trait::async_trait;
use chrono::SecondsFormat;
use reqwest::{header, Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

/// Discord REST base URL
pub const DEFAULT_DISCORD_API_URL: &str = "https://discord.com/api/v10";

/// Maximum length of an embed description, in characters
pub const EMBED_DESCRIPTION_LIMIT: usize = 4096;

/// Maximum length of an embed title, in characters
pub const EMBED_TITLE_LIMIT: usize = 256;

/// Embed colour matching the dark client theme
const EMBED_COLOUR: u32 = 0x36393F;

#[derive(Debug, Deserialize)]
struct CreatedMessage {
    id: String,
}

/// Publishes roster messages through the Discord REST API
pub struct DiscordPublisher {
    client: Client,
    base_url: String,
}

impl DiscordPublisher {
    /// Create a publisher authenticating as a bot
    ///
    /// `timeout` bounds every request; the engine applies its own deadline on
    /// top of this.
    pub fn new(
        base_url: impl Into<String>,
        token: &str,
        timeout: Duration,
    ) -> crate::Result<Self> {
        let mut auth = header::HeaderValue::from_str(&format!("Bot {}", token))
            .map_err(|_| RosterError::Config("Discord token contains invalid characters".into()))?;
        auth.set_sensitive(true);

        let client = Client::builder()
            .default_headers({
                let mut headers = header::HeaderMap::new();
                headers.insert(header::AUTHORIZATION, auth);
                headers.insert(
                    header::USER_AGENT,
                    header::HeaderValue::from_static(concat!(
                        "DiscordBot (rosterwatch, ",
                        env!("CARGO_PKG_VERSION"),
                        ")"
                    )),
                );
                headers
            })
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn messages_url(&self, destination: DestinationId) -> String {
        format!("{}/channels/{}/messages", self.base_url, destination)
    }

    fn message_url(&self, destination: DestinationId, message: MessageId) -> String {
        format!("{}/channels/{}/messages/{}", self.base_url, destination, message)
    }

    /// Message body carrying the roster embed
    fn payload(content: &MessageContent<'_>) -> serde_json::Value {
        let roster = content.roster;
        json!({
            "embeds": [{
                "title": truncate_title(content.title, EMBED_TITLE_LIMIT),
                "url": crate::roster::SERVERS_PAGE_URL,
                "description": truncate_description(roster.lines(), EMBED_DESCRIPTION_LIMIT),
                "color": EMBED_COLOUR,
                "footer": { "text": roster.footer() },
                "timestamp": roster.timestamp().to_rfc3339_opts(SecondsFormat::Secs, true),
            }]
        })
    }

    /// Map a non-success response to a publish error
    async fn classify(response: Response) -> PublishError {
        let status = response.status();
        match status {
            StatusCode::FORBIDDEN => PublishError::Forbidden,
            StatusCode::NOT_FOUND => PublishError::NotFound,
            _ => {
                let body = response.text().await.unwrap_or_default();
                PublishError::Transient(format!("HTTP {}: {}", status.as_u16(), body))
            }
        }
    }
}

fn transport(err: reqwest::Error) -> PublishError {
    PublishError::Transient(err.to_string())
}

/// Cut a title to at most `limit` characters
pub(crate) fn truncate_title(title: &str, limit: usize) -> &str {
    match title.char_indices().nth(limit) {
        Some((end, _)) => &title[..end],
        None => title,
    }
}

/// Join roster lines, dropping whole lines once `limit` characters would be
/// exceeded
pub(crate) fn truncate_description(lines: &[String], limit: usize) -> String {
    let mut out = String::new();
    let mut used = 0;
    for line in lines {
        let separator = usize::from(!out.is_empty());
        let len = line.chars().count();
        if used + separator + len > limit {
            break;
        }
        if separator == 1 {
            out.push('\n');
        }
        out.push_str(line);
        used += separator + len;
    }
    out
}

#[async_trait]
impl MessagePublisher for DiscordPublisher {
    async fn send(
        &self,
        destination: DestinationId,
        content: &MessageContent<'_>,
    ) -> Result<MessageId, PublishError> {
        let response = self
            .client
            .post(self.messages_url(destination))
            .json(&Self::payload(content))
            .send()
            .await
            .map_err(transport)?;

        if !response.status().is_success() {
            let err = Self::classify(response).await;
            warn!(destination = %destination, error = %err, "Discord rejected message send");
            return Err(err);
        }

        let created: CreatedMessage = response.json().await.map_err(transport)?;
        let id = created
            .id
            .parse::<MessageId>()
            .map_err(|_| PublishError::Transient(format!("invalid message id {:?}", created.id)))?;

        debug!(destination = %destination, message = %id, "Message sent");
        Ok(id)
    }

    async fn edit(
        &self,
        destination: DestinationId,
        message: MessageId,
        content: &MessageContent<'_>,
    ) -> Result<(), PublishError> {
        let response = self
            .client
            .patch(self.message_url(destination, message))
            .json(&Self::payload(content))
            .send()
            .await
            .map_err(transport)?;

        if !response.status().is_success() {
            return Err(Self::classify(response).await);
        }

        debug!(destination = %destination, message = %message, "Message edited");
        Ok(())
    }

    async fn delete(
        &self,
        destination: DestinationId,
        message: MessageId,
    ) -> Result<(), PublishError> {
        let response = self
            .client
            .delete(self.message_url(destination, message))
            .send()
            .await
            .map_err(transport)?;

        if !response.status().is_success() {
            return Err(Self::classify(response).await);
        }

        debug!(destination = %destination, message = %message, "Message deleted");
        Ok(())
    }
}
