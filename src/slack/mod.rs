//! All Slack-specific functionality

pub mod bot;
pub mod client;
pub mod events;

// Re-export main types for convenience
pub use bot::SlackBot;
pub use client::{HistoryMessage, MemberChannel, SlackClient};
pub use events::{ConversationReader, HistoryEventSource};
