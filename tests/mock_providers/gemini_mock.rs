//! WebSocket Mock Server for the Gemini Live API
//!
//! Speaks just enough of `BidiGenerateContent` to drive the gateway:
//! acknowledges `setup`, records `realtime_input`, and answers each media
//! chunk with a text turn followed by an audio part.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use base64::Engine;
use base64::prelude::BASE64_STANDARD;
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::{accept_hdr_async, tungstenite::Message};

/// Audio returned for every media chunk.
pub const MOCK_AUDIO: &[u8] = &[1, 2, 3, 4];

/// How the mock reacts after the WebSocket upgrade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockBehavior {
    /// Acknowledge setup and answer every media chunk
    Respond,
    /// Close the connection instead of acknowledging setup
    RejectSetup,
    /// Acknowledge setup, then close right away
    CloseAfterSetup,
}

/// What the mock observed.
#[derive(Default)]
pub struct MockGeminiState {
    pub request_uris: Mutex<Vec<String>>,
    pub setups: Mutex<Vec<Value>>,
    pub media_chunks: Mutex<Vec<Value>>,
    pub connection_count: AtomicU64,
    /// Close frames received from the gateway
    pub client_closes: AtomicU64,
}

pub struct MockGeminiServer {
    pub addr: SocketAddr,
    pub state: Arc<MockGeminiState>,
}

impl MockGeminiServer {
    pub async fn start(behavior: MockBehavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(MockGeminiState::default());

        let server_state = state.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let state = server_state.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, state, behavior).await {
                        eprintln!("Mock Gemini connection error: {}", e);
                    }
                });
            }
        });

        Self { addr, state }
    }

    /// Endpoint override pointing at this mock.
    pub fn endpoint(&self) -> String {
        format!("ws://{}/ws/live", self.addr)
    }

    pub fn setups(&self) -> Vec<Value> {
        self.state.setups.lock().unwrap().clone()
    }

    pub fn media_chunks(&self) -> Vec<Value> {
        self.state.media_chunks.lock().unwrap().clone()
    }

    pub fn request_uris(&self) -> Vec<String> {
        self.state.request_uris.lock().unwrap().clone()
    }

    pub fn connections(&self) -> u64 {
        self.state.connection_count.load(Ordering::SeqCst)
    }

    pub fn client_closes(&self) -> u64 {
        self.state.client_closes.load(Ordering::SeqCst)
    }
}

async fn handle_connection(
    stream: TcpStream,
    state: Arc<MockGeminiState>,
    behavior: MockBehavior,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let uris = state.clone();
    let record_uri = move |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
        uris.request_uris
            .lock()
            .unwrap()
            .push(request.uri().to_string());
        Ok(response)
    };
    let ws_stream = accept_hdr_async(stream, record_uri).await?;
    let (mut write, mut read) = ws_stream.split();

    state.connection_count.fetch_add(1, Ordering::SeqCst);

    while let Some(msg) = read.next().await {
        let text = match msg {
            Ok(Message::Text(text)) => text.as_str().to_owned(),
            Ok(Message::Close(_)) => {
                state.client_closes.fetch_add(1, Ordering::SeqCst);
                break;
            }
            Ok(Message::Ping(data)) => {
                write.send(Message::Pong(data)).await?;
                continue;
            }
            Ok(_) => continue,
            Err(e) => {
                eprintln!("WebSocket error: {}", e);
                break;
            }
        };

        let Ok(message) = serde_json::from_str::<Value>(&text) else {
            continue;
        };

        if let Some(setup) = message.get("setup") {
            state.setups.lock().unwrap().push(setup.clone());

            match behavior {
                MockBehavior::RejectSetup => {
                    write.send(Message::Close(None)).await?;
                    break;
                }
                MockBehavior::CloseAfterSetup => {
                    write
                        .send(Message::Text(json!({"setupComplete": {}}).to_string().into()))
                        .await?;
                    write.send(Message::Close(None)).await?;
                    break;
                }
                MockBehavior::Respond => {
                    write
                        .send(Message::Text(json!({"setupComplete": {}}).to_string().into()))
                        .await?;
                }
            }
            continue;
        }

        let Some(chunks) = message
            .pointer("/realtime_input/media_chunks")
            .and_then(Value::as_array)
        else {
            continue;
        };

        for chunk in chunks {
            state.media_chunks.lock().unwrap().push(chunk.clone());
            let n = state.media_chunks.lock().unwrap().len();

            // Gemini sends server content as binary JSON frames
            let text_part = json!({
                "serverContent": {
                    "modelTurn": {"parts": [{"text": format!("Seen chunk {n}")}]}
                }
            });
            write
                .send(Message::Binary(text_part.to_string().into_bytes().into()))
                .await?;

            let audio_part = json!({
                "serverContent": {
                    "modelTurn": {"parts": [{
                        "inlineData": {
                            "mimeType": "audio/pcm;rate=24000",
                            "data": BASE64_STANDARD.encode(MOCK_AUDIO),
                        }
                    }]},
                    "turnComplete": true
                }
            });
            write
                .send(Message::Binary(audio_part.to_string().into_bytes().into()))
                .await?;
        }
    }

    Ok(())
}
