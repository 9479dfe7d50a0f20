//! Inbound frame routing.
//!
//! A frame whose `echo` names a pending call settles that call, even if it
//! also looks like an event. Otherwise a classifiable event is published on
//! its channel. Anything else is dropped.

use crate::domain::{BridgeError, CorrelationId, PendingCallTable};
use shared_bus::{BusEvent, Channel, EventBus};
use shared_types::{parse_frame, GatewayEvent, ResponseFrame};
use tracing::{debug, trace, warn};

/// What happened to an inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Routed {
    Response(CorrelationId),
    Event(Channel),
    Ignored,
    Malformed,
}

pub(crate) fn route_frame(text: &str, pending: &PendingCallTable, bus: &EventBus) -> Routed {
    let frame = match parse_frame(text) {
        Ok(frame) => frame,
        Err(e) => {
            let err = BridgeError::MalformedFrame(e.to_string());
            warn!(error = %err, "Dropping gateway frame");
            return Routed::Malformed;
        }
    };
    trace!(%frame, "Gateway frame");

    if let Some(response) = ResponseFrame::from_frame(&frame) {
        if let Ok(id) = CorrelationId::parse(&response.echo) {
            if pending.contains(&id) {
                match response.into_outcome() {
                    Ok(data) => pending.resolve(id, data),
                    Err(message) => pending.reject(id, BridgeError::RemoteFailed(message)),
                };
                return Routed::Response(id);
            }
        }
    }

    match GatewayEvent::from_frame(&frame) {
        Some(Ok(event)) => {
            let channel = Channel::for_event(&event);
            if let Err(e) = bus.publish(&channel, BusEvent::Gateway(event)) {
                warn!(error = %e, "Gateway event not published");
            }
            Routed::Event(channel)
        }
        Some(Err(e)) => {
            let err = BridgeError::MalformedFrame(e.to_string());
            warn!(error = %err, "Dropping gateway event");
            Routed::Malformed
        }
        None => {
            debug!(echo = ?frame.get("echo"), "Ignoring unrecognised gateway frame");
            Routed::Ignored
        }
    }
}
