use crate::core::models::{ChannelMembership, InboundEvent, MESSAGE_EVENT_TYPE};

/// Outcome of classifying one inbound event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admit,
    Reject(RejectReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    NotAMessage,
    HasSubtype,
    MissingFields,
    NotAMember,
}

/// Admits plain messages (no subtype) posted in a channel the bot belongs to.
///
/// Edits, joins and bot echoes all carry a subtype and are rejected. Events
/// lacking a channel or timestamp are rejected rather than reported.
#[must_use]
pub fn classify(event: &InboundEvent, membership: &ChannelMembership) -> Admission {
    if event.event_type != MESSAGE_EVENT_TYPE {
        return Admission::Reject(RejectReason::NotAMessage);
    }
    if event.subtype.is_some() {
        return Admission::Reject(RejectReason::HasSubtype);
    }
    if event.channel_id.is_empty() || event.timestamp.is_empty() {
        return Admission::Reject(RejectReason::MissingFields);
    }
    if !membership.contains(&event.channel_id) {
        return Admission::Reject(RejectReason::NotAMember);
    }
    Admission::Admit
}
