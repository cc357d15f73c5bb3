//! linkbot - A Slack bot that replies in-thread with links for recognised references.
//!
//! The bot watches the channels it is a member of, extracts every value matching a
//! configured pattern (ticket ids, document numbers, ...) and answers in the
//! message's thread with one formatted link per value. A value already linked in a
//! thread is never linked there again.
//!
//! # Architecture
//!
//! - `engine`: pure decision logic (classification, extraction, per-thread
//!   deduplication, reply composition)
//! - `worker`: the polling loop and the traits it talks to the backend through
//! - `slack`: Web API implementations of those traits (slack-morphism + reqwest)
//!
//! # Example
//!
//! ```
//! use linkbot::core::models::{ChannelMembership, InboundEvent};
//! use linkbot::engine::{LinkEngine, LinkTemplate, PatternMatcher, ThreadContext};
//!
//! let mut engine = LinkEngine::new(
//!     PatternMatcher::new(r"\b([A-Z]+-\d+)\b").unwrap(),
//!     LinkTemplate::new("https://jira.example.com/browse/{}").unwrap(),
//!     ThreadContext::new(),
//! );
//! let membership: ChannelMembership = ["C1"].into_iter().collect();
//! let event = InboundEvent::message("C1", "1700000000.000100", "is OPS-12 done?");
//!
//! let reply = engine.evaluate(&event, &membership).unwrap();
//! assert_eq!(reply.formatted_text, "https://jira.example.com/browse/OPS-12");
//!
//! engine.mark_sent(&reply);
//! assert!(engine.evaluate(&event, &membership).is_none());
//! ```

pub mod core;
pub mod engine;
pub mod errors;
pub mod slack;
pub mod worker;

pub use errors::BotError;

/// Configure structured logging with JSON output.
///
/// The level comes from `RUST_LOG` and defaults to `info` (`debug` with the
/// `debug-logs` feature). Calling it again after a subscriber is installed is a
/// no-op.
///
/// # Example
///
/// ```
/// linkbot::setup_logging();
/// ```
pub fn setup_logging() {
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::prelude::*;

    let default_level = if cfg!(feature = "debug-logs") {
        "debug"
    } else {
        "info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let fmt_layer = tracing_subscriber::fmt::layer().json().with_target(true);

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();
}
