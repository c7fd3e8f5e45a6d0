//! Outbound relay: upstream responses to client messages.

use std::fmt::Display;

use futures::{Sink, SinkExt, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::codec::{OutboundMessage, encode_outbound};
use super::error::RelayError;
use super::turn::TurnAccumulator;
use crate::core::live::{ResponsePart, ResponseStream};

/// Counters kept by the outbound relay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutboundStats {
    /// Upstream responses received
    pub responses: u64,
    /// Server content with nothing to relay
    pub empty_responses: u64,
    /// Upstream messages other than server content
    pub unhandled_messages: u64,
    /// Parts that could not be interpreted
    pub malformed_parts: u64,
    /// `{"text"}` messages written to the client
    pub text_messages: u64,
    /// `{"audio"}` messages written to the client
    pub audio_messages: u64,
}

enum Emit {
    Sent,
    Cancelled,
}

async fn emit<K>(
    session_id: &str,
    sink: &mut K,
    message: OutboundMessage,
    cancel: &CancellationToken,
) -> Result<Emit, RelayError>
where
    K: Sink<String> + Unpin + Send,
    K::Error: Display,
{
    let encoded = encode_outbound(&message);
    debug!(session_id = %session_id, kind = message.kind(), size = encoded.len(), "Writing to client");

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Ok(Emit::Cancelled),
        sent = sink.send(encoded) => sent
            .map(|()| Emit::Sent)
            .map_err(|e| RelayError::ClientWrite(e.to_string())),
    }
}

/// Drain upstream responses into the client until the upstream ends, a
/// write fails, or `cancel` fires.
///
/// Audio is written as soon as it arrives. Text is buffered in a
/// [`TurnAccumulator`] and written as one message when the turn completes.
/// Returns `Ok(())` when cancelled.
pub async fn run_outbound<K>(
    session_id: &str,
    responses: &mut ResponseStream,
    sink: &mut K,
    cancel: &CancellationToken,
    stats: &mut OutboundStats,
) -> Result<(), RelayError>
where
    K: Sink<String> + Unpin + Send,
    K::Error: Display,
{
    let mut turn = TurnAccumulator::new();

    let result = loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => break Ok(()),
            next = responses.next() => next,
        };

        let response = match next {
            None => break Err(RelayError::UpstreamClosed),
            Some(Err(e)) => break Err(RelayError::UpstreamReceive(e)),
            Some(Ok(response)) => response,
        };
        stats.responses += 1;

        if !response.has_content() {
            if response.server_content {
                stats.empty_responses += 1;
                debug!(session_id = %session_id, "Server content without parts");
            } else {
                stats.unhandled_messages += 1;
                warn!(session_id = %session_id, "Unhandled server message without content");
            }
            continue;
        }

        let mut outcome = None;
        for part in response.parts {
            match part {
                ResponsePart::Text(text) => {
                    debug!(session_id = %session_id, len = text.len(), "Buffered text fragment");
                    turn.append(&text);
                }
                ResponsePart::InlineData { mime_type, data } => {
                    debug!(
                        session_id = %session_id,
                        mime_type = %mime_type,
                        size = data.len(),
                        "Relaying audio"
                    );
                    match emit(session_id, sink, OutboundMessage::Audio(data), cancel).await {
                        Ok(Emit::Sent) => stats.audio_messages += 1,
                        Ok(Emit::Cancelled) => {
                            outcome = Some(Ok(()));
                            break;
                        }
                        Err(e) => {
                            outcome = Some(Err(e));
                            break;
                        }
                    }
                }
                ResponsePart::Malformed(reason) => {
                    stats.malformed_parts += 1;
                    warn!(session_id = %session_id, reason = %reason, "Skipping malformed response part");
                }
            }
        }
        if let Some(result) = outcome {
            break result;
        }

        if response.turn_complete {
            if let Some(text) = turn.flush_if_non_empty() {
                debug!(session_id = %session_id, len = text.len(), "Turn complete, relaying text");
                match emit(session_id, sink, OutboundMessage::Text(text), cancel).await {
                    Ok(Emit::Sent) => stats.text_messages += 1,
                    Ok(Emit::Cancelled) => break Ok(()),
                    Err(e) => break Err(e),
                }
            } else {
                debug!(session_id = %session_id, "Turn complete");
            }
        }
    };

    if !turn.is_empty() {
        debug!(
            session_id = %session_id,
            pending = turn.len(),
            "Discarding text of unfinished turn"
        );
    }

    result
}
