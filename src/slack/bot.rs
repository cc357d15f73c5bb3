use async_trait::async_trait;
use tracing::info;

use super::client::SlackClient;
use crate::core::config::AppConfig;
use crate::core::models::{ChannelMembership, OutgoingMessage};
use crate::errors::BotError;
use crate::worker::{MembershipProvider, MessagePoster};

/// Slack side of the bot: membership discovery and thread replies.
#[derive(Clone)]
pub struct SlackBot {
    slack_client: SlackClient,
}

impl SlackBot {
    #[must_use]
    pub fn new(config: &AppConfig) -> Self {
        Self {
            slack_client: SlackClient::new(config.slack_bot_token.clone()),
        }
    }

    #[must_use]
    pub fn slack_client(&self) -> &SlackClient {
        &self.slack_client
    }

    /// Verifies the token with `auth.test` and returns the bot's user id.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is rejected or Slack is unreachable.
    pub async fn connect(&self) -> Result<String, BotError> {
        let bot_user_id = self.slack_client.get_bot_user_id().await?;
        info!("Connected to Slack as {}", bot_user_id);
        Ok(bot_user_id)
    }
}

#[async_trait]
impl MembershipProvider for SlackBot {
    async fn member_channels(&self) -> Result<ChannelMembership, BotError> {
        let channels = self.slack_client.list_member_channels().await?;
        info!(
            "I am member of {} channels: {}",
            channels.len(),
            channels
                .iter()
                .map(|c| c.name.as_str())
                .collect::<Vec<_>>()
                .join(",")
        );
        Ok(channels.into_iter().map(|c| c.id).collect())
    }
}

#[async_trait]
impl MessagePoster for SlackBot {
    async fn post(&self, message: &OutgoingMessage) -> Result<(), BotError> {
        self.slack_client
            .post_message_in_thread(
                &message.channel_id,
                message.thread_key.as_str(),
                &message.formatted_text,
            )
            .await
    }
}
