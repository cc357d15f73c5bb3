//! Polling loop and the traits it is driven through

pub mod poller;
pub mod ports;

// Re-export the main types for convenience
pub use poller::{CycleOutcome, Poller};
pub use ports::{EventSource, MembershipProvider, MessagePoster};
