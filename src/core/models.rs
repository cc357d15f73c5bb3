use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Event type Slack uses for ordinary channel messages.
pub const MESSAGE_EVENT_TYPE: &str = "message";

/// One raw notification from the chat backend.
///
/// Missing fields deserialize to empty values; the classifier rejects those
/// events instead of treating them as errors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundEvent {
    #[serde(rename = "type", default)]
    pub event_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
    #[serde(rename = "channel", default)]
    pub channel_id: String,
    #[serde(default)]
    pub text: String,
    #[serde(rename = "ts", default)]
    pub timestamp: String,
    #[serde(rename = "thread_ts", default, skip_serializing_if = "Option::is_none")]
    pub thread_timestamp: Option<String>,
}

impl InboundEvent {
    /// Plain message with no subtype, posted at the top level of a channel.
    #[must_use]
    pub fn message(channel_id: &str, timestamp: &str, text: &str) -> Self {
        Self {
            event_type: MESSAGE_EVENT_TYPE.to_string(),
            subtype: None,
            channel_id: channel_id.to_string(),
            text: text.to_string(),
            timestamp: timestamp.to_string(),
            thread_timestamp: None,
        }
    }

    #[must_use]
    pub fn in_thread(mut self, thread_timestamp: &str) -> Self {
        self.thread_timestamp = Some(thread_timestamp.to_string());
        self
    }

    #[must_use]
    pub fn with_subtype(mut self, subtype: &str) -> Self {
        self.subtype = Some(subtype.to_string());
        self
    }

    /// The conversation this event belongs to: its thread parent, or itself.
    #[must_use]
    pub fn thread_key(&self) -> ThreadKey {
        match self.thread_timestamp.as_deref() {
            Some(parent) if !parent.is_empty() => ThreadKey::new(parent),
            _ => ThreadKey::new(&self.timestamp),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ThreadKey(String);

impl ThreadKey {
    #[must_use]
    pub fn new(ts: &str) -> Self {
        Self(ts.to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ThreadKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Channels the bot currently belongs to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelMembership {
    channels: HashSet<String>,
}

impl ChannelMembership {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn contains(&self, channel_id: &str) -> bool {
        self.channels.contains(channel_id)
    }

    pub fn insert(&mut self, channel_id: impl Into<String>) -> bool {
        self.channels.insert(channel_id.into())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Channel ids in a stable (sorted) order.
    #[must_use]
    pub fn channel_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.channels.iter().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

impl<S: Into<String>> FromIterator<S> for ChannelMembership {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            channels: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// Distinct values extracted from one message, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchSet {
    values: Vec<String>,
    seen: HashSet<String>,
}

impl MatchSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `value` unless it is already present. Returns whether it was added.
    pub fn insert(&mut self, value: impl Into<String>) -> bool {
        let value = value.into();
        if self.seen.contains(&value) {
            return false;
        }
        self.seen.insert(value.clone());
        self.values.push(value);
        true
    }

    #[must_use]
    pub fn contains(&self, value: &str) -> bool {
        self.seen.contains(value)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(String::as_str)
    }

    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        &self.values
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<String> {
        self.values
    }
}

impl<S: Into<String>> FromIterator<S> for MatchSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = MatchSet::new();
        for value in iter {
            set.insert(value);
        }
        set
    }
}

/// A reply ready for the message poster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutgoingMessage {
    pub channel_id: String,
    pub thread_key: ThreadKey,
    pub match_values: Vec<String>,
    pub formatted_text: String,
}
