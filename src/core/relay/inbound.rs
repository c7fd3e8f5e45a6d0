//! Inbound relay: client frames to upstream media chunks.

use std::fmt::Display;

use futures::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::codec::{ClientFrame, ClientMessage, decode_client_binary, decode_client_message};
use super::error::RelayError;
use crate::core::live::{LiveSender, MediaChunk};

/// Counters kept by the inbound relay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InboundStats {
    /// Data frames received after the handshake
    pub frames: u64,
    /// Chunks accepted by the upstream
    pub chunks_forwarded: u64,
    /// Chunks dropped for an unsupported mime type
    pub chunks_dropped: u64,
    /// Chunks the upstream refused
    pub chunks_failed: u64,
    /// Frames that failed to decode
    pub decode_errors: u64,
    /// Well-formed frames that carried no realtime input
    pub ignored_messages: u64,
}

/// Forward client media to the upstream until the client goes away or
/// `cancel` fires.
///
/// Returns `Ok(())` when cancelled. Decode and send failures are logged and
/// skipped; the relay ends with [`RelayError::ClientDisconnect`] on a close
/// frame or end of stream, and [`RelayError::ClientRead`] on a transport error.
pub async fn run_inbound<S, E>(
    session_id: &str,
    source: &mut S,
    sender: &mut dyn LiveSender,
    cancel: &CancellationToken,
    stats: &mut InboundStats,
) -> Result<(), RelayError>
where
    S: Stream<Item = Result<ClientFrame, E>> + Unpin + Send,
    E: Display + Send,
{
    loop {
        let frame = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(()),
            frame = source.next() => frame,
        };

        let decoded = match frame {
            None | Some(Ok(ClientFrame::Close)) => return Err(RelayError::ClientDisconnect),
            Some(Err(e)) => return Err(RelayError::ClientRead(e.to_string())),
            Some(Ok(ClientFrame::Ping)) => continue,
            Some(Ok(ClientFrame::Text(text))) => decode_client_message(&text),
            Some(Ok(ClientFrame::Binary(data))) => decode_client_binary(&data),
        };
        stats.frames += 1;

        let chunks = match decoded {
            Ok(ClientMessage::RealtimeInput(chunks)) => chunks,
            Ok(ClientMessage::Other(value)) => {
                stats.ignored_messages += 1;
                debug!(
                    session_id = %session_id,
                    keys = ?value.as_object().map(|o| o.keys().cloned().collect::<Vec<_>>()),
                    "Ignoring non-realtime client message"
                );
                continue;
            }
            Err(e) => {
                stats.decode_errors += 1;
                warn!(session_id = %session_id, error = %e, "Dropping undecodable client frame");
                continue;
            }
        };

        for raw in chunks {
            let chunk = match MediaChunk::try_from(raw) {
                Ok(chunk) => chunk,
                Err(e) => {
                    stats.chunks_dropped += 1;
                    warn!(session_id = %session_id, error = %e, "Dropping media chunk");
                    continue;
                }
            };

            let mime_type = chunk.mime_type();
            let size = chunk.data().len();

            let sent = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(()),
                sent = sender.send(chunk) => sent,
            };

            match sent {
                Ok(()) => {
                    stats.chunks_forwarded += 1;
                    debug!(session_id = %session_id, mime_type, size, "Forwarded media chunk");
                }
                Err(e) => {
                    stats.chunks_failed += 1;
                    let err = RelayError::Send(e);
                    warn!(
                        session_id = %session_id,
                        mime_type,
                        size,
                        recoverable = err.is_recoverable(),
                        error = %err,
                        "Upstream rejected media chunk"
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::relay::testing::{MockSender, SenderLog};

    fn audio_frame(data: &str) -> Result<ClientFrame, String> {
        Ok(ClientFrame::Text(format!(
            r#"{{"realtime_input": {{"media_chunks": [{{"mime_type": "audio/pcm", "data": "{data}"}}]}}}}"#
        )))
    }

    async fn run(
        frames: Vec<Result<ClientFrame, String>>,
        sender: &mut MockSender,
    ) -> (Result<(), RelayError>, InboundStats) {
        let mut source = futures::stream::iter(frames);
        let cancel = CancellationToken::new();
        let mut stats = InboundStats::default();
        let result = run_inbound("test", &mut source, sender, &cancel, &mut stats).await;
        (result, stats)
    }

    #[tokio::test]
    async fn test_preserves_order_across_mime_types() {
        let log = SenderLog::default();
        let mut sender = MockSender::new(log.clone());

        let frames = vec![
            Ok(ClientFrame::Text(
                r#"{"realtime_input": {"media_chunks": [
                    {"mime_type": "audio/pcm", "data": "AQ=="},
                    {"mime_type": "image/jpeg", "data": "Ag=="},
                    {"mime_type": "audio/pcm", "data": "Aw=="}
                ]}}"#
                    .to_string(),
            )),
            audio_frame("BA=="),
        ];

        let (result, stats) = run(frames, &mut sender).await;
        assert!(matches!(result, Err(RelayError::ClientDisconnect)));

        let sent = log.sent();
        assert_eq!(
            sent,
            vec![
                MediaChunk::audio(vec![1u8]),
                MediaChunk::image(vec![2u8]),
                MediaChunk::audio(vec![3u8]),
                MediaChunk::audio(vec![4u8]),
            ]
        );
        assert_eq!(stats.chunks_forwarded, 4);
    }

    #[tokio::test]
    async fn test_malformed_frame_does_not_stop_relay() {
        let log = SenderLog::default();
        let mut sender = MockSender::new(log.clone());

        let frames = vec![
            Ok(ClientFrame::Text("{broken".to_string())),
            Ok(ClientFrame::Binary(bytes::Bytes::from_static(&[0xff]))),
            audio_frame("AQ=="),
        ];

        let (_, stats) = run(frames, &mut sender).await;
        assert_eq!(stats.decode_errors, 2);
        assert_eq!(log.sent(), vec![MediaChunk::audio(vec![1u8])]);
    }

    #[tokio::test]
    async fn test_send_error_does_not_stop_relay() {
        let log = SenderLog::default();
        let mut sender = MockSender::new(log.clone()).failing_on(&[0, 2]);

        let frames = vec![
            Ok(ClientFrame::Text(
                r#"{"realtime_input": {"media_chunks": [
                    {"mime_type": "audio/pcm", "data": "AQ=="},
                    {"mime_type": "audio/pcm", "data": "Ag=="}
                ]}}"#
                    .to_string(),
            )),
            audio_frame("Aw=="),
            audio_frame("BA=="),
        ];

        let (_, stats) = run(frames, &mut sender).await;
        assert_eq!(stats.chunks_failed, 2);
        assert_eq!(stats.chunks_forwarded, 2);
        assert_eq!(
            log.sent(),
            vec![MediaChunk::audio(vec![2u8]), MediaChunk::audio(vec![4u8])]
        );
    }

    #[tokio::test]
    async fn test_unknown_mime_dropped_and_other_messages_ignored() {
        let log = SenderLog::default();
        let mut sender = MockSender::new(log.clone());

        let frames = vec![
            Ok(ClientFrame::Text(
                r#"{"realtime_input": {"media_chunks": [{"mime_type": "video/webm", "data": ""}]}}"#
                    .to_string(),
            )),
            Ok(ClientFrame::Text(r#"{"client_content": {}}"#.to_string())),
            Ok(ClientFrame::Ping),
        ];

        let (_, stats) = run(frames, &mut sender).await;
        assert_eq!(stats.chunks_dropped, 1);
        assert_eq!(stats.ignored_messages, 1);
        assert_eq!(stats.frames, 2);
        assert!(log.sent().is_empty());
    }

    #[tokio::test]
    async fn test_close_and_read_error_end_relay() {
        let mut sender = MockSender::new(SenderLog::default());

        let (result, _) = run(vec![Ok(ClientFrame::Close), audio_frame("AQ==")], &mut sender).await;
        assert!(matches!(result, Err(RelayError::ClientDisconnect)));

        let (result, _) = run(vec![Err("reset by peer".to_string())], &mut sender).await;
        assert!(matches!(result, Err(RelayError::ClientRead(msg)) if msg == "reset by peer"));
    }

    #[tokio::test]
    async fn test_cancelled_while_waiting() {
        let mut sender = MockSender::new(SenderLog::default());
        let mut source = futures::stream::pending::<Result<ClientFrame, String>>();
        let cancel = CancellationToken::new();
        let mut stats = InboundStats::default();

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let result = run_inbound("test", &mut source, &mut sender, &cancel, &mut stats).await;
        assert!(result.is_ok());
    }
}
