//! Gemini Live WebSocket client.
//!
//! Opens one `BidiGenerateContent` session per call to
//! [`LiveConnector::open`]: connect (with timeout and retry), send `setup`,
//! wait for `setupComplete`, then split the socket into a [`GeminiSender`]
//! and a lazy response stream.

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};
use url::Url;

use super::config::GeminiLiveConfig;
use super::messages::{ClientEvent, ServerMessage};
use crate::core::live::base::{
    LiveConnector, LiveError, LiveResponse, LiveResult, LiveSender, LiveSession,
    LiveSessionConfig, MediaChunk, ResponsePart, ResponseStream,
};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connector for the Gemini Live API.
#[derive(Debug, Clone)]
pub struct GeminiLive {
    config: GeminiLiveConfig,
}

impl GeminiLive {
    /// Create a connector. Fails without an API key or with a bad endpoint.
    pub fn new(config: GeminiLiveConfig) -> LiveResult<Self> {
        if config.api_key.trim().is_empty() {
            return Err(LiveError::InvalidConfiguration(
                "API key is required".to_string(),
            ));
        }

        // Surface endpoint problems at startup instead of on the first session
        config.build_ws_url()?;

        Ok(Self { config })
    }

    async fn connect_once(&self, url: &Url) -> LiveResult<WsStream> {
        let connect = connect_async(url.as_str());

        let (ws_stream, _response) = tokio::time::timeout(self.config.connect_timeout, connect)
            .await
            .map_err(|_| {
                LiveError::Timeout(format!(
                    "connect did not finish within {:?}",
                    self.config.connect_timeout
                ))
            })?
            .map_err(|e| LiveError::ConnectionFailed(e.to_string()))?;

        Ok(ws_stream)
    }

    async fn connect_with_retry(&self) -> LiveResult<WsStream> {
        let url = self.config.build_ws_url()?;
        let host = url.host_str().unwrap_or_default().to_string();
        let retry = &self.config.retry;
        let mut attempt = 0u32;

        loop {
            match self.connect_once(&url).await {
                Ok(ws) => {
                    info!(host = %host, attempt = attempt + 1, "Connected to Gemini Live");
                    return Ok(ws);
                }
                Err(e) if retry.should_retry(attempt) => {
                    attempt += 1;
                    let delay = retry.calculate_delay(attempt);
                    warn!(
                        host = %host,
                        attempt,
                        max_retries = retry.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Gemini Live connect failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Send `setup` and wait for the acknowledgement.
    async fn handshake(&self, ws: &mut WsStream, session: &LiveSessionConfig) -> LiveResult<()> {
        let setup = serde_json::to_string(&ClientEvent::setup(session))
            .map_err(|e| LiveError::SerializationError(e.to_string()))?;

        ws.send(Message::Text(setup.into()))
            .await
            .map_err(|e| LiveError::WebSocketError(e.to_string()))?;

        let wait = async {
            while let Some(frame) = ws.next().await {
                let raw = match frame {
                    Ok(Message::Text(text)) => text.as_str().to_owned(),
                    Ok(Message::Binary(data)) => String::from_utf8_lossy(&data).into_owned(),
                    Ok(Message::Close(frame)) => {
                        let reason = frame
                            .map(|f| format!("{} {}", f.code, f.reason))
                            .unwrap_or_else(|| "no close frame".to_string());
                        return Err(LiveError::SetupFailed(format!(
                            "upstream closed during setup: {reason}"
                        )));
                    }
                    Ok(_) => continue,
                    Err(e) => return Err(LiveError::WebSocketError(e.to_string())),
                };

                match ServerMessage::parse(&raw) {
                    Ok(msg) if msg.setup_complete.is_some() => return Ok(()),
                    Ok(msg) => debug!(kind = msg.kind(), "Ignoring message before setupComplete"),
                    Err(e) => debug!(error = %e, "Ignoring unparseable message before setupComplete"),
                }
            }

            Err(LiveError::SetupFailed(
                "upstream ended before setupComplete".to_string(),
            ))
        };

        tokio::time::timeout(self.config.setup_timeout, wait)
            .await
            .map_err(|_| {
                LiveError::Timeout(format!(
                    "setupComplete not received within {:?}",
                    self.config.setup_timeout
                ))
            })?
    }
}

#[async_trait]
impl LiveConnector for GeminiLive {
    async fn open(&self, config: &LiveSessionConfig) -> LiveResult<LiveSession> {
        let mut ws = self.connect_with_retry().await?;

        if let Err(e) = self.handshake(&mut ws, config).await {
            let _ = ws.close(None).await;
            return Err(e);
        }

        info!(
            model = %config.model,
            modalities = ?config.response_modalities,
            "Gemini Live session ready"
        );

        let (sink, stream) = ws.split();

        Ok(LiveSession {
            sender: Box::new(GeminiSender { sink, closed: false }),
            responses: response_stream(stream),
        })
    }

    fn provider_name(&self) -> &'static str {
        "gemini"
    }
}

/// Send half of a Gemini Live session.
pub struct GeminiSender {
    sink: SplitSink<WsStream, Message>,
    closed: bool,
}

#[async_trait]
impl LiveSender for GeminiSender {
    async fn send(&mut self, chunk: MediaChunk) -> LiveResult<()> {
        if self.closed {
            return Err(LiveError::Closed);
        }

        let json = serde_json::to_string(&ClientEvent::media(&chunk))
            .map_err(|e| LiveError::SerializationError(e.to_string()))?;

        self.sink
            .send(Message::Text(json.into()))
            .await
            .map_err(|e| LiveError::WebSocketError(e.to_string()))
    }

    async fn close(&mut self) -> LiveResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        match self.sink.close().await {
            Ok(()) => Ok(()),
            Err(tokio_tungstenite::tungstenite::Error::ConnectionClosed)
            | Err(tokio_tungstenite::tungstenite::Error::AlreadyClosed) => Ok(()),
            Err(e) => Err(LiveError::WebSocketError(e.to_string())),
        }
    }
}

fn response_stream(mut stream: SplitStream<WsStream>) -> ResponseStream {
    Box::pin(async_stream::stream! {
        while let Some(frame) = stream.next().await {
            match frame {
                Ok(Message::Text(text)) => yield Ok(parse_frame(text.as_str())),
                Ok(Message::Binary(data)) => match std::str::from_utf8(&data) {
                    Ok(raw) => yield Ok(parse_frame(raw)),
                    Err(_) => yield Ok(LiveResponse::parts(vec![ResponsePart::Malformed(
                        "binary frame is not UTF-8".to_string(),
                    )])),
                },
                Ok(Message::Close(frame)) => {
                    debug!(frame = ?frame, "Gemini Live closed the session");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    yield Err(LiveError::WebSocketError(e.to_string()));
                    break;
                }
            }
        }
    })
}

fn parse_frame(raw: &str) -> LiveResponse {
    match ServerMessage::parse(raw) {
        Ok(msg) => {
            if msg.go_away.is_some() {
                warn!("Gemini Live sent goAway");
            }
            debug!(kind = msg.kind(), "Gemini Live message");
            msg.into_response()
        }
        Err(e) => LiveResponse::parts(vec![ResponsePart::Malformed(format!(
            "invalid server message: {e}"
        ))]),
    }
}
