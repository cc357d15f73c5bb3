//! Event source that polls channel history over the Web API.

use async_trait::async_trait;
use chrono::Utc;
use futures::future::join_all;
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::{debug, warn};

use super::client::{HistoryMessage, SlackClient};
use crate::core::models::{ChannelMembership, InboundEvent};
use crate::errors::BotError;
use crate::worker::EventSource;

/// Read access to channel history, split out so polling can be exercised offline.
#[async_trait]
pub trait ConversationReader: Send + Sync {
    async fn history(&self, channel_id: &str, limit: u16) -> Result<Vec<HistoryMessage>, BotError>;

    async fn replies(
        &self,
        channel_id: &str,
        thread_ts: &str,
        oldest: &str,
    ) -> Result<Vec<HistoryMessage>, BotError>;
}

#[async_trait]
impl ConversationReader for SlackClient {
    async fn history(
        &self,
        channel_id: &str,
        limit: u16,
    ) -> Result<Vec<HistoryMessage>, BotError> {
        self.fetch_history(channel_id, limit).await
    }

    async fn replies(
        &self,
        channel_id: &str,
        thread_ts: &str,
        oldest: &str,
    ) -> Result<Vec<HistoryMessage>, BotError> {
        self.fetch_replies(channel_id, thread_ts, oldest).await
    }
}

/// Splits a Slack timestamp (`"1700000000.000100"`) into seconds and microseconds.
fn parse_ts(ts: &str) -> Option<(u64, u32)> {
    let (secs, frac) = ts.split_once('.').unwrap_or((ts, ""));
    let secs = secs.parse().ok()?;
    if frac.len() > 6 || !frac.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let micros = if frac.is_empty() {
        0
    } else {
        format!("{:0<6}", frac).parse().ok()?
    };
    Some((secs, micros))
}

/// Orders Slack timestamps numerically. Unparseable values sort first.
#[must_use]
pub fn compare_ts(a: &str, b: &str) -> Ordering {
    parse_ts(a).cmp(&parse_ts(b))
}

#[must_use]
pub fn ts_after(candidate: &str, cursor: &str) -> bool {
    compare_ts(candidate, cursor) == Ordering::Greater
}

fn now_ts() -> String {
    let now = Utc::now();
    format!("{}.{:06}", now.timestamp(), now.timestamp_subsec_micros())
}

/// Turns channel history into event batches.
///
/// Each member channel has a cursor, the newest timestamp already handed out.
/// Channels known at the first batch start at the time the source was created
/// so older messages are never answered. A channel that joins later is read
/// once as a baseline: its cursor moves to the newest message found and
/// nothing from that read is emitted. A cycle reads the latest `window`
/// top-level messages and, for parents whose `latest_reply` is past the
/// cursor, the new thread replies.
pub struct HistoryEventSource<R> {
    reader: R,
    window: u16,
    started_at: String,
    cursors: HashMap<String, String>,
    primed: bool,
}

impl<R: ConversationReader> HistoryEventSource<R> {
    pub fn new(reader: R, window: u16) -> Self {
        Self::starting_at(reader, window, &now_ts())
    }

    /// Source whose channels are read from `started_at` onwards.
    pub fn starting_at(reader: R, window: u16, started_at: &str) -> Self {
        Self {
            reader,
            window: window.max(1),
            started_at: started_at.to_string(),
            cursors: HashMap::new(),
            primed: false,
        }
    }

    #[must_use]
    pub fn cursor(&self, channel_id: &str) -> &str {
        self.cursors
            .get(channel_id)
            .map_or(self.started_at.as_str(), String::as_str)
    }

    async fn poll_channel(
        &self,
        channel_id: &str,
        since: &str,
    ) -> Result<Vec<InboundEvent>, BotError> {
        let history = self.reader.history(channel_id, self.window).await?;
        let mut events = Vec::new();

        for message in history {
            let is_new = ts_after(&message.ts, since);
            let has_new_replies = message
                .latest_reply
                .as_deref()
                .is_some_and(|latest| ts_after(latest, since));
            let parent_ts = message.ts.clone();

            if is_new {
                events.push(message.into_event(channel_id));
            }
            if has_new_replies {
                let replies = self.reader.replies(channel_id, &parent_ts, since).await?;
                events.extend(
                    replies
                        .into_iter()
                        .filter(|reply| reply.ts != parent_ts && ts_after(&reply.ts, since))
                        .map(|reply| reply.into_event(channel_id)),
                );
            }
        }

        Ok(events)
    }
}

#[async_trait]
impl<R: ConversationReader> EventSource for HistoryEventSource<R> {
    async fn next_batch(
        &mut self,
        membership: &ChannelMembership,
    ) -> Result<Vec<InboundEvent>, BotError> {
        let channels = membership.channel_ids();
        if !self.primed {
            let started_at = self.started_at.clone();
            for channel in &channels {
                self.cursors
                    .entry((*channel).to_string())
                    .or_insert_with(|| started_at.clone());
            }
            self.primed = true;
        }
        if channels.is_empty() {
            return Ok(Vec::new());
        }

        let joined_late: Vec<bool> = channels
            .iter()
            .map(|channel| !self.cursors.contains_key(*channel))
            .collect();

        let results = join_all(
            channels
                .iter()
                .map(|channel| self.poll_channel(channel, self.cursor(channel))),
        )
        .await;

        let mut batch = Vec::new();
        let mut last_error = None;
        let mut failures = 0usize;

        for ((channel, result), late) in channels.iter().zip(results).zip(joined_late) {
            match result {
                Ok(events) => {
                    let newest = events
                        .iter()
                        .map(|e| e.timestamp.as_str())
                        .max_by(|a, b| compare_ts(a, b))
                        .filter(|newest| ts_after(newest, self.cursor(channel)))
                        .map(str::to_string);

                    if late {
                        debug!(
                            "Joined channel {}, skipping {} earlier event(s)",
                            channel,
                            events.len()
                        );
                        let baseline = newest.unwrap_or_else(|| self.started_at.clone());
                        self.cursors.insert((*channel).to_string(), baseline);
                        continue;
                    }

                    if let Some(newest) = newest {
                        self.cursors.insert((*channel).to_string(), newest);
                    }
                    batch.extend(events);
                }
                Err(e) => {
                    warn!("Failed to poll channel {}: {}", channel, e);
                    failures += 1;
                    last_error = Some(e);
                }
            }
        }

        if failures == channels.len()
            && let Some(e) = last_error
        {
            return Err(e);
        }

        batch.sort_by(|a, b| compare_ts(&a.timestamp, &b.timestamp));
        debug!(
            "Polled {} channel(s), {} new event(s)",
            channels.len(),
            batch.len()
        );
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compare_ts_is_numeric() {
        assert!(ts_after("1700000000.000100", "1700000000.000099"));
        assert!(ts_after("1700000001.0", "1700000000.999999"));
        assert!(ts_after("10.5", "9.999999"));
        assert!(!ts_after("1.000001", "1.000001"));
        assert_eq!(compare_ts("1.5", "1.500000"), Ordering::Equal);
    }

    #[test]
    fn test_unparseable_ts_never_after_cursor() {
        assert!(!ts_after("", "1.0"));
        assert!(!ts_after("abc", "1.0"));
        assert_eq!(parse_ts("1.1234567"), None);
    }

    #[test]
    fn test_now_ts_parses() {
        assert!(parse_ts(&now_ts()).is_some());
    }
}
