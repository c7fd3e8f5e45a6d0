//! Session coordinator.
//!
//! One call to [`SessionCoordinator::handle`] owns one client connection for
//! its whole life:
//!
//! 1. read the handshake frame and merge it with the server defaults
//! 2. open the upstream session
//! 3. run the inbound and outbound relays side by side
//! 4. when either relay stops, cancel the other and close the upstream once
//!
//! Teardown runs on every exit path; a [`SessionGuard`] logs sessions that
//! were dropped before teardown finished.

use std::fmt::{self, Display};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::codec::ClientFrame;
use super::error::{RelayError, SessionEnd};
use super::inbound::{InboundStats, run_inbound};
use super::outbound::{OutboundStats, run_outbound};
use super::setup::{DEFAULT_SYSTEM_INSTRUCTION, merge_setup, parse_handshake};
use crate::core::live::gemini::GEMINI_DEFAULT_MODEL;
use crate::core::live::{LiveConnector, LiveResult, LiveSender, LiveSession, LiveSessionConfig};

/// Default time a client has to send its setup frame.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(30);

/// Server-side session parameters.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Upstream model for every session
    pub model: String,
    /// System instruction for every session
    pub system_instruction: String,
    /// How long to wait for the handshake frame
    pub handshake_timeout: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            model: GEMINI_DEFAULT_MODEL.to_string(),
            system_instruction: DEFAULT_SYSTEM_INSTRUCTION.to_string(),
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
        }
    }
}

/// Lifecycle of one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Handshake,
    Connecting,
    Relaying,
    Closing,
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Handshake => write!(f, "handshake"),
            SessionState::Connecting => write!(f, "connecting"),
            SessionState::Relaying => write!(f, "relaying"),
            SessionState::Closing => write!(f, "closing"),
            SessionState::Closed => write!(f, "closed"),
        }
    }
}

/// Outcome of one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
    pub session_id: String,
    pub end: SessionEnd,
    pub inbound: InboundStats,
    pub outbound: OutboundStats,
}

/// Logs the end of a session on every exit path, including the handle
/// future being dropped mid-session.
struct SessionGuard {
    session_id: String,
    state: SessionState,
    started: Instant,
}

impl SessionGuard {
    fn new(session_id: &str) -> Self {
        Self {
            session_id: session_id.to_string(),
            state: SessionState::Handshake,
            started: Instant::now(),
        }
    }

    fn transition(&mut self, next: SessionState) {
        debug!(
            session_id = %self.session_id,
            from = %self.state,
            to = %next,
            "Session state change"
        );
        self.state = next;
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let elapsed_ms = self.started.elapsed().as_millis() as u64;
        if self.state == SessionState::Closed {
            info!(session_id = %self.session_id, elapsed_ms, "Session closed");
        } else {
            warn!(
                session_id = %self.session_id,
                state = %self.state,
                elapsed_ms,
                "Session dropped before teardown completed"
            );
        }
    }
}

/// Upstream send half that is closed at most once.
struct UpstreamHandle {
    sender: Box<dyn LiveSender>,
    closed: bool,
}

impl UpstreamHandle {
    fn new(sender: Box<dyn LiveSender>) -> Self {
        Self {
            sender,
            closed: false,
        }
    }

    async fn close(&mut self) -> LiveResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.sender.close().await
    }
}

/// Runs client sessions against an upstream connector.
pub struct SessionCoordinator {
    connector: Arc<dyn LiveConnector>,
    settings: SessionSettings,
}

impl fmt::Debug for SessionCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCoordinator")
            .field("provider", &self.connector.provider_name())
            .field("settings", &self.settings)
            .finish()
    }
}

impl SessionCoordinator {
    pub fn new(connector: Arc<dyn LiveConnector>, settings: SessionSettings) -> Self {
        Self {
            connector,
            settings,
        }
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Run one session until it ends on its own.
    pub async fn handle<S, E, K>(&self, source: S, sink: K) -> SessionReport
    where
        S: Stream<Item = Result<ClientFrame, E>> + Unpin + Send,
        E: Display + Send,
        K: Sink<String> + Unpin + Send,
        K::Error: Display,
    {
        self.handle_until(source, sink, CancellationToken::new())
            .await
    }

    /// Run one session; cancelling `shutdown` tears it down.
    pub async fn handle_until<S, E, K>(
        &self,
        mut source: S,
        mut sink: K,
        shutdown: CancellationToken,
    ) -> SessionReport
    where
        S: Stream<Item = Result<ClientFrame, E>> + Unpin + Send,
        E: Display + Send,
        K: Sink<String> + Unpin + Send,
        K::Error: Display,
    {
        let session_id = Uuid::new_v4().to_string();
        let mut guard = SessionGuard::new(&session_id);
        let mut report = SessionReport {
            session_id: session_id.clone(),
            end: SessionEnd::Cancelled,
            inbound: InboundStats::default(),
            outbound: OutboundStats::default(),
        };

        info!(
            session_id = %session_id,
            provider = self.connector.provider_name(),
            "Session started"
        );

        let end = self
            .run(
                &session_id,
                &mut guard,
                &mut source,
                &mut sink,
                &shutdown,
                &mut report.inbound,
                &mut report.outbound,
            )
            .await;
        report.end = end;

        guard.transition(SessionState::Closing);
        if let Err(e) = sink.close().await {
            debug!(session_id = %session_id, error = %e, "Client connection already closed");
        }
        guard.transition(SessionState::Closed);

        if report.end.is_clean() {
            info!(
                session_id = %session_id,
                end = %report.end,
                chunks_forwarded = report.inbound.chunks_forwarded,
                chunks_dropped = report.inbound.chunks_dropped,
                chunks_failed = report.inbound.chunks_failed,
                text_messages = report.outbound.text_messages,
                audio_messages = report.outbound.audio_messages,
                "Session finished"
            );
        } else {
            warn!(
                session_id = %session_id,
                end = %report.end,
                chunks_forwarded = report.inbound.chunks_forwarded,
                text_messages = report.outbound.text_messages,
                audio_messages = report.outbound.audio_messages,
                "Session finished abnormally"
            );
        }

        report
    }

    #[allow(clippy::too_many_arguments)]
    async fn run<S, E, K>(
        &self,
        session_id: &str,
        guard: &mut SessionGuard,
        source: &mut S,
        sink: &mut K,
        shutdown: &CancellationToken,
        inbound_stats: &mut InboundStats,
        outbound_stats: &mut OutboundStats,
    ) -> SessionEnd
    where
        S: Stream<Item = Result<ClientFrame, E>> + Unpin + Send,
        E: Display + Send,
        K: Sink<String> + Unpin + Send,
        K::Error: Display,
    {
        let config = match self.negotiate(session_id, source, shutdown).await {
            Ok(Some(config)) => config,
            Ok(None) => return SessionEnd::Cancelled,
            Err(e) => {
                error!(session_id = %session_id, error = %e, "Session handshake failed");
                return e.end_reason();
            }
        };

        guard.transition(SessionState::Connecting);
        let opened = tokio::select! {
            biased;
            _ = shutdown.cancelled() => return SessionEnd::Cancelled,
            opened = self.connector.open(&config) => opened,
        };

        let LiveSession {
            sender,
            mut responses,
        } = match opened {
            Ok(session) => session,
            Err(e) => {
                let e = RelayError::UpstreamConnect(e);
                error!(session_id = %session_id, error = %e, "Could not open upstream session");
                return e.end_reason();
            }
        };
        let mut upstream = UpstreamHandle::new(sender);

        guard.transition(SessionState::Relaying);
        let cancel = shutdown.child_token();
        let sender = upstream.sender.as_mut();

        let inbound = async {
            let result = run_inbound(session_id, source, sender, &cancel, inbound_stats).await;
            cancel.cancel();
            result
        };
        let outbound = async {
            let result =
                run_outbound(session_id, &mut responses, sink, &cancel, outbound_stats).await;
            cancel.cancel();
            result
        };

        let (inbound_result, outbound_result) = tokio::join!(inbound, outbound);
        let end = session_end(session_id, inbound_result, outbound_result);

        guard.transition(SessionState::Closing);
        if let Err(e) = upstream.close().await {
            warn!(session_id = %session_id, error = %e, "Failed to close upstream session");
        }

        end
    }

    /// Read the handshake frame and produce the upstream configuration.
    /// `Ok(None)` means the session was cancelled first.
    async fn negotiate<S, E>(
        &self,
        session_id: &str,
        source: &mut S,
        shutdown: &CancellationToken,
    ) -> Result<Option<LiveSessionConfig>, RelayError>
    where
        S: Stream<Item = Result<ClientFrame, E>> + Unpin + Send,
        E: Display + Send,
    {
        let timeout = self.settings.handshake_timeout;
        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);

        let raw = loop {
            let frame = tokio::select! {
                biased;
                _ = shutdown.cancelled() => return Ok(None),
                _ = &mut deadline => {
                    return Err(RelayError::Handshake(format!(
                        "no setup message within {timeout:?}"
                    )));
                }
                frame = source.next() => frame,
            };

            match frame {
                None | Some(Ok(ClientFrame::Close)) => {
                    return Err(RelayError::Handshake(
                        "client closed before sending setup".to_string(),
                    ));
                }
                Some(Err(e)) => {
                    return Err(RelayError::Handshake(format!("failed to read setup: {e}")));
                }
                Some(Ok(ClientFrame::Ping)) => continue,
                Some(Ok(ClientFrame::Text(text))) => break text,
                Some(Ok(ClientFrame::Binary(data))) => match String::from_utf8(data.to_vec()) {
                    Ok(text) => break text,
                    Err(_) => {
                        return Err(RelayError::Handshake(
                            "setup frame is not valid UTF-8".to_string(),
                        ));
                    }
                },
            }
        };

        let request = parse_handshake(&raw)?;
        if request.had_system_instruction {
            debug!(session_id = %session_id, "Discarding client-supplied system instruction");
        }

        let config = merge_setup(
            request,
            &self.settings.model,
            &self.settings.system_instruction,
        )?;

        info!(
            session_id = %session_id,
            model = %config.model,
            modalities = ?config.response_modalities,
            "Session configured"
        );

        Ok(Some(config))
    }
}

/// Pick the end reason from the relay results. The relay that stopped on its
/// own returned an error; the other one was cancelled and returned `Ok`.
fn session_end(
    session_id: &str,
    inbound: Result<(), RelayError>,
    outbound: Result<(), RelayError>,
) -> SessionEnd {
    for (relay, result) in [("inbound", &inbound), ("outbound", &outbound)] {
        if let Err(e) = result {
            match e {
                RelayError::ClientDisconnect | RelayError::UpstreamClosed => {
                    info!(session_id = %session_id, relay, reason = %e, "Relay finished")
                }
                _ => error!(session_id = %session_id, relay, error = %e, "Relay failed"),
            }
        }
    }

    match (inbound, outbound) {
        (Err(e), _) | (Ok(()), Err(e)) => e.end_reason(),
        (Ok(()), Ok(())) => SessionEnd::Cancelled,
    }
}
