use std::time::Duration;

use tokio::time::{Instant, sleep};
use tracing::{Instrument, error, info, info_span, warn};
use uuid::Uuid;

use super::ports::{EventSource, MembershipProvider, MessagePoster};
use crate::core::config::AppConfig;
use crate::core::models::{ChannelMembership, OutgoingMessage};
use crate::engine::LinkEngine;
use crate::errors::BotError;

/// What one poll cycle did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    Idle,
    Replied(OutgoingMessage),
}

/// Drives the engine: fetch a batch, reply at most once, record what was sent.
pub struct Poller<S, M, P> {
    engine: LinkEngine,
    source: S,
    membership_provider: M,
    poster: P,
    poll_interval: Duration,
    membership_refresh: Duration,
    membership: Option<ChannelMembership>,
    refreshed_at: Option<Instant>,
}

impl<S, M, P> Poller<S, M, P>
where
    S: EventSource,
    M: MembershipProvider,
    P: MessagePoster,
{
    pub fn new(engine: LinkEngine, source: S, membership_provider: M, poster: P) -> Self {
        Self {
            engine,
            source,
            membership_provider,
            poster,
            poll_interval: Duration::from_secs(2),
            membership_refresh: Duration::from_secs(300),
            membership: None,
            refreshed_at: None,
        }
    }

    #[must_use]
    pub fn with_intervals(mut self, poll_interval: Duration, membership_refresh: Duration) -> Self {
        self.poll_interval = poll_interval;
        self.membership_refresh = membership_refresh;
        self
    }

    #[must_use]
    pub fn configured(self, config: &AppConfig) -> Self {
        self.with_intervals(config.poll_interval, config.membership_refresh)
    }

    #[must_use]
    pub fn engine(&self) -> &LinkEngine {
        &self.engine
    }

    #[must_use]
    pub fn membership(&self) -> Option<&ChannelMembership> {
        self.membership.as_ref()
    }

    async fn refresh_membership_if_due(&mut self) {
        let due = self
            .refreshed_at
            .is_none_or(|at| at.elapsed() >= self.membership_refresh);
        if !due {
            return;
        }

        match self.membership_provider.member_channels().await {
            Ok(membership) => {
                info!("Channel membership refreshed: {} channel(s)", membership.len());
                self.membership = Some(membership);
                self.refreshed_at = Some(Instant::now());
            }
            Err(e) => {
                warn!("Failed to refresh channel membership: {}", e);
                // keep the previous view until the next attempt
                if self.membership.is_some() {
                    self.refreshed_at = Some(Instant::now());
                }
            }
        }
    }

    /// Runs a single poll cycle.
    ///
    /// # Errors
    ///
    /// Returns an error when the event source fails or the reply could not be
    /// posted. A failed post leaves the thread context untouched.
    pub async fn run_cycle(&mut self) -> Result<CycleOutcome, BotError> {
        self.refresh_membership_if_due().await;
        let Some(membership) = self.membership.as_ref() else {
            return Ok(CycleOutcome::Idle);
        };

        let batch = self.source.next_batch(membership).await?;
        let Some(reply) = self.engine.process_batch(&batch, membership) else {
            return Ok(CycleOutcome::Idle);
        };

        let correlation_id = Uuid::new_v4();
        let span = info_span!(
            "reply",
            %correlation_id,
            channel = %reply.channel_id,
            thread = %reply.thread_key
        );

        self.deliver(reply).instrument(span).await
    }

    async fn deliver(&mut self, reply: OutgoingMessage) -> Result<CycleOutcome, BotError> {
        match self.poster.post(&reply).await {
            Ok(()) => {
                self.engine.mark_sent(&reply);
                info!("Posted {} link(s) in thread", reply.match_values.len());
                Ok(CycleOutcome::Replied(reply))
            }
            Err(e) => {
                error!("Failed to post reply: {}", e);
                Err(e)
            }
        }
    }

    /// Polls until the process is terminated.
    pub async fn run(&mut self) {
        info!(
            "Polling every {:?}, refreshing membership every {:?}",
            self.poll_interval, self.membership_refresh
        );
        loop {
            if let Err(e) = self.run_cycle().await {
                error!("Poll cycle failed: {}", e);
            }
            sleep(self.poll_interval).await;
        }
    }
}
