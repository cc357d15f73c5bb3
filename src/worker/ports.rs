//! Boundaries between the polling loop and the chat backend.

use async_trait::async_trait;

use crate::core::models::{ChannelMembership, InboundEvent, OutgoingMessage};
use crate::errors::BotError;

/// Supplies batches of raw events, one batch per poll cycle.
#[async_trait]
pub trait EventSource: Send {
    async fn next_batch(
        &mut self,
        membership: &ChannelMembership,
    ) -> Result<Vec<InboundEvent>, BotError>;
}

/// Lists the channels the bot belongs to.
#[async_trait]
pub trait MembershipProvider: Send + Sync {
    async fn member_channels(&self) -> Result<ChannelMembership, BotError>;
}

/// Delivers a reply into its thread.
#[async_trait]
pub trait MessagePoster: Send + Sync {
    async fn post(&self, message: &OutgoingMessage) -> Result<(), BotError>;
}
