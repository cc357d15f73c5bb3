//! Event filtering, pattern extraction and per-thread deduplication.
//!
//! The engine performs no I/O. For each poll cycle it is handed a batch of
//! events and the current channel membership, and answers with at most one
//! reply. The caller posts that reply and then calls [`LinkEngine::mark_sent`].

pub mod classifier;
pub mod composer;
pub mod context;
pub mod matcher;

use tracing::debug;

use crate::core::config::AppConfig;
use crate::core::models::{ChannelMembership, InboundEvent, OutgoingMessage};
use crate::errors::BotError;

pub use classifier::{Admission, RejectReason, classify};
pub use composer::{LinkTemplate, compose};
pub use context::ThreadContext;
pub use matcher::PatternMatcher;

pub struct LinkEngine {
    matcher: PatternMatcher,
    template: LinkTemplate,
    context: ThreadContext,
}

impl LinkEngine {
    #[must_use]
    pub fn new(matcher: PatternMatcher, template: LinkTemplate, context: ThreadContext) -> Self {
        Self {
            matcher,
            template,
            context,
        }
    }

    /// # Errors
    ///
    /// Fails when the configured pattern or link template is invalid.
    pub fn from_config(config: &AppConfig) -> Result<Self, BotError> {
        Ok(Self::new(
            PatternMatcher::new(&config.match_pattern)?,
            LinkTemplate::new(&config.link_url)?,
            ThreadContext::with_limit(config.thread_context_limit),
        ))
    }

    #[must_use]
    pub fn context(&self) -> &ThreadContext {
        &self.context
    }

    /// Runs one event through classification, extraction, deduplication and
    /// composition. Does not change any state.
    #[must_use]
    pub fn evaluate(
        &self,
        event: &InboundEvent,
        membership: &ChannelMembership,
    ) -> Option<OutgoingMessage> {
        if let Admission::Reject(reason) = classify(event, membership) {
            debug!(
                "Dropping event ts={} channel={}: {:?}",
                event.timestamp, event.channel_id, reason
            );
            return None;
        }

        let matches = self.matcher.extract(&event.text);
        if matches.is_empty() {
            return None;
        }

        let thread_key = event.thread_key();
        let unseen = self.context.filter_unseen(&thread_key, &matches);
        if unseen.is_empty() {
            debug!(
                "All {} match(es) already sent in thread {}",
                matches.len(),
                thread_key
            );
            return None;
        }

        compose(&event.channel_id, &thread_key, &unseen, &self.template)
    }

    /// Reply for the first event in `events` that warrants one.
    ///
    /// Later events of the same batch are not looked at, even when they would
    /// also produce a reply.
    #[must_use]
    pub fn process_batch(
        &self,
        events: &[InboundEvent],
        membership: &ChannelMembership,
    ) -> Option<OutgoingMessage> {
        events
            .iter()
            .find_map(|event| self.evaluate(event, membership))
    }

    /// Remembers the values of a reply that was delivered.
    pub fn mark_sent(&mut self, message: &OutgoingMessage) {
        self.context
            .record(&message.thread_key, message.match_values.iter().cloned());
    }
}
