//! In-memory upstream doubles for relay tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::channel::mpsc;

use crate::core::live::{
    LiveConnector, LiveError, LiveResponse, LiveResult, LiveSender, LiveSession,
    LiveSessionConfig, MediaChunk,
};

/// What the upstream saw.
#[derive(Debug, Clone, Default)]
pub struct SenderLog {
    sent: Arc<Mutex<Vec<MediaChunk>>>,
    closes: Arc<AtomicUsize>,
    opened: Arc<Mutex<Vec<LiveSessionConfig>>>,
}

impl SenderLog {
    pub fn sent(&self) -> Vec<MediaChunk> {
        self.sent.lock().unwrap().clone()
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn opened(&self) -> Vec<LiveSessionConfig> {
        self.opened.lock().unwrap().clone()
    }
}

pub struct MockSender {
    log: SenderLog,
    attempts: usize,
    fail_on: Vec<usize>,
}

impl MockSender {
    pub fn new(log: SenderLog) -> Self {
        Self {
            log,
            attempts: 0,
            fail_on: Vec::new(),
        }
    }

    /// Fail the send attempts at these zero-based positions.
    pub fn failing_on(mut self, attempts: &[usize]) -> Self {
        self.fail_on = attempts.to_vec();
        self
    }
}

#[async_trait]
impl LiveSender for MockSender {
    async fn send(&mut self, chunk: MediaChunk) -> LiveResult<()> {
        let attempt = self.attempts;
        self.attempts += 1;

        if self.fail_on.contains(&attempt) {
            return Err(LiveError::WebSocketError(format!("rejected attempt {attempt}")));
        }

        self.log.sent.lock().unwrap().push(chunk);
        Ok(())
    }

    async fn close(&mut self) -> LiveResult<()> {
        self.log.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Connector handing out one scripted session.
pub struct MockConnector {
    log: SenderLog,
    responses: Mutex<Option<mpsc::UnboundedReceiver<LiveResult<LiveResponse>>>>,
    fail_sends: Vec<usize>,
}

impl MockConnector {
    /// A connector plus the handle used to push upstream responses.
    pub fn new(log: SenderLog) -> (Self, mpsc::UnboundedSender<LiveResult<LiveResponse>>) {
        let (tx, rx) = mpsc::unbounded();
        let connector = Self {
            log,
            responses: Mutex::new(Some(rx)),
            fail_sends: Vec::new(),
        };
        (connector, tx)
    }

    /// A connector whose `open` always fails.
    pub fn unavailable(log: SenderLog) -> Self {
        Self {
            log,
            responses: Mutex::new(None),
            fail_sends: Vec::new(),
        }
    }

    pub fn failing_sends(mut self, attempts: &[usize]) -> Self {
        self.fail_sends = attempts.to_vec();
        self
    }
}

#[async_trait]
impl LiveConnector for MockConnector {
    async fn open(&self, config: &LiveSessionConfig) -> LiveResult<LiveSession> {
        self.log.opened.lock().unwrap().push(config.clone());

        let responses = self
            .responses
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| LiveError::ConnectionFailed("upstream unavailable".to_string()))?;

        Ok(LiveSession {
            sender: Box::new(MockSender::new(self.log.clone()).failing_on(&self.fail_sends)),
            responses: Box::pin(responses),
        })
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}
