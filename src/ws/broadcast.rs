use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, warn};

use super::room::{ClientHandle, SendFailure, SessionLink};
use crate::models::SendMessage;

/// Outcome of one fan-out
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Serialize a message into a shareable frame
pub fn encode(message: &SendMessage) -> Option<Arc<str>> {
    match message.encode() {
        Ok(text) => Some(Arc::from(text)),
        Err(e) => {
            error!("Failed to serialize {} message: {}", message.kind(), e);
            None
        }
    }
}

/// Send a message to every client of a room except `exclude`.
///
/// The message is serialized once. A failing recipient is logged and
/// skipped; it stays in the room until the liveness monitor reclaims it.
pub fn broadcast(
    clients: &HashMap<String, ClientHandle>,
    message: &SendMessage,
    exclude: Option<&str>,
) -> BroadcastReport {
    let mut report = BroadcastReport::default();
    let Some(frame) = encode(message) else {
        return report;
    };

    for (session_id, client) in clients.iter() {
        if exclude == Some(session_id.as_str()) {
            continue;
        }
        match client.try_send(frame.clone()) {
            Ok(()) => report.delivered += 1,
            Err(failure) => {
                report.failed += 1;
                log_failure(session_id, message, failure);
            }
        }
    }

    debug!(
        "Broadcast {} to {} session(s), {} failed",
        message.kind(),
        report.delivered,
        report.failed
    );
    report
}

/// Send a message to one connection only
pub fn send_direct(session_id: &str, link: &SessionLink, message: &SendMessage) -> bool {
    let Some(frame) = encode(message) else {
        return false;
    };
    match link.try_send(frame) {
        Ok(()) => true,
        Err(failure) => {
            log_failure(session_id, message, failure);
            false
        }
    }
}

fn log_failure(session_id: &str, message: &SendMessage, failure: SendFailure) {
    match failure {
        SendFailure::QueueFull => {
            warn!("Dropped {} for session {}: {}", message.kind(), session_id, failure)
        }
        SendFailure::Disconnected => {
            debug!("Skipped {} for session {}: {}", message.kind(), session_id, failure)
        }
    }
}
