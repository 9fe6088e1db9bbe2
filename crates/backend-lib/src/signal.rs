// ============================
// crates/backend-lib/src/signal.rs
// ============================
//! WebRTC signaling relay.
//!
//! Offers, answers and ICE candidates are forwarded untouched from one
//! participant to another in the same meeting. Nothing is buffered: a
//! message for a peer that is gone, or that sits in another meeting, is
//! dropped.
use std::sync::Arc;

use huddle_common::ServerEvent;
use metrics::counter;
use serde_json::Value;

use crate::error::GatewayError;
use crate::hub::ConnectionHub;
use crate::metrics::{SIGNAL_DROPPED, SIGNAL_RELAYED};
use crate::registry::SessionRegistry;
use crate::validation::validate_signal_target;

/// Payload of a signaling message
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    Offer(Value),
    Answer(Value),
    IceCandidate(Value),
}

impl Signal {
    pub fn kind(&self) -> &'static str {
        match self {
            Signal::Offer(_) => "offer",
            Signal::Answer(_) => "answer",
            Signal::IceCandidate(_) => "ice-candidate",
        }
    }

    fn into_event(self, sender: String) -> ServerEvent {
        match self {
            Signal::Offer(offer) => ServerEvent::Offer { sender, offer },
            Signal::Answer(answer) => ServerEvent::Answer { sender, answer },
            Signal::IceCandidate(candidate) => ServerEvent::IceCandidate { sender, candidate },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    Delivered,
    /// Target is not a member of the sender's meeting
    NotInMeeting,
    /// Target has no open connection
    NotConnected,
}

#[derive(Clone)]
pub struct SignalRelay {
    registry: Arc<SessionRegistry>,
    hub: Arc<ConnectionHub>,
}

impl SignalRelay {
    pub fn new(registry: Arc<SessionRegistry>, hub: Arc<ConnectionHub>) -> Self {
        Self { registry, hub }
    }

    /// Forward `signal` from `sender` to `target`.
    ///
    /// Errors only when the request itself is bad (missing target, sender
    /// outside any meeting). Undeliverable messages are reported through
    /// the outcome.
    pub fn relay(
        &self,
        sender: &str,
        target: &str,
        signal: Signal,
    ) -> Result<RelayOutcome, GatewayError> {
        let target = validate_signal_target(target)?;
        let (meeting_id, _) = self.registry.meeting_for(sender)?;
        let kind = signal.kind();

        if self.registry.membership(target).as_deref() != Some(meeting_id.as_str()) {
            tracing::debug!(%sender, %target, kind, "dropping signal for peer outside the meeting");
            counter!(SIGNAL_DROPPED).increment(1);
            return Ok(RelayOutcome::NotInMeeting);
        }

        if !self.hub.send(target, signal.into_event(sender.to_string())) {
            tracing::debug!(%sender, %target, kind, "dropping signal for closed connection");
            counter!(SIGNAL_DROPPED).increment(1);
            return Ok(RelayOutcome::NotConnected);
        }

        counter!(SIGNAL_RELAYED).increment(1);
        Ok(RelayOutcome::Delivered)
    }
}
