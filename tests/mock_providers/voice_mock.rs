//! WebSocket Mock Server for the Voice Transport
//!
//! Records every client event and, when configured, answers each
//! `response.create` with `response.created`, one audio delta and
//! `response.done`.

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};

/// How long a test waits for the next recorded item
const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// Mock behaviour
#[derive(Debug, Clone, Default)]
pub struct MockVoiceOptions {
    /// Delay before completing the WebSocket handshake
    pub handshake_delay: Duration,
    /// Base64 audio sent back for every `response.create`; `None` stays silent
    pub reply_audio: Option<String>,
}

/// Headers and URI seen during the upgrade
#[derive(Debug, Clone)]
pub struct RecordedHandshake {
    pub uri: String,
    pub authorization: Option<String>,
    pub openai_beta: Option<String>,
}

pub struct MockVoiceServer {
    pub addr: SocketAddr,
    events: mpsc::UnboundedReceiver<Value>,
    handshakes: mpsc::UnboundedReceiver<RecordedHandshake>,
}

impl MockVoiceServer {
    pub async fn start(options: MockVoiceOptions) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (event_tx, events) = mpsc::unbounded_channel();
        let (handshake_tx, handshakes) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let options = options.clone();
                let event_tx = event_tx.clone();
                let handshake_tx = handshake_tx.clone();
                tokio::spawn(async move {
                    let _ = handle_connection(stream, options, event_tx, handshake_tx).await;
                });
            }
        });

        Self {
            addr,
            events,
            handshakes,
        }
    }

    /// Endpoint to configure as the bridge's voice URL
    pub fn url(&self) -> String {
        format!("ws://{}/v1/realtime", self.addr)
    }

    /// Next client event received by the mock
    pub async fn next_event(&mut self) -> Value {
        tokio::time::timeout(RECV_TIMEOUT, self.events.recv())
            .await
            .expect("timed out waiting for a voice event")
            .expect("mock voice server stopped")
    }

    /// Next client event whose type is not `input_audio_buffer.append`
    pub async fn next_control_event(&mut self) -> Value {
        loop {
            let event = self.next_event().await;
            if event["type"] != "input_audio_buffer.append" {
                return event;
            }
        }
    }

    pub async fn next_handshake(&mut self) -> RecordedHandshake {
        tokio::time::timeout(RECV_TIMEOUT, self.handshakes.recv())
            .await
            .expect("timed out waiting for a handshake")
            .expect("mock voice server stopped")
    }
}

async fn handle_connection(
    stream: TcpStream,
    options: MockVoiceOptions,
    event_tx: mpsc::UnboundedSender<Value>,
    handshake_tx: mpsc::UnboundedSender<RecordedHandshake>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tokio::time::sleep(options.handshake_delay).await;

    let callback = move |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
        let header = |name: &str| {
            request
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let _ = handshake_tx.send(RecordedHandshake {
            uri: request.uri().to_string(),
            authorization: header("authorization"),
            openai_beta: header("openai-beta"),
        });
        Ok(response)
    };
    let ws_stream = accept_hdr_async(stream, callback).await?;
    let (mut write, mut read) = ws_stream.split();

    write
        .send(Message::Text(
            json!({"type": "session.created", "session": {"id": "sess_mock"}})
                .to_string()
                .into(),
        ))
        .await?;

    let mut response_count = 0u32;
    while let Some(msg) = read.next().await {
        match msg? {
            Message::Text(text) => {
                let event: Value = serde_json::from_str(text.as_str())?;
                let is_response_create = event["type"] == "response.create";
                let _ = event_tx.send(event);

                if let (true, Some(audio)) = (is_response_create, options.reply_audio.as_ref()) {
                    response_count += 1;
                    let id = format!("resp_{response_count}");
                    let replies = [
                        json!({"type": "response.created", "response": {"id": id}}),
                        json!({"type": "response.audio.delta", "response_id": id, "delta": audio}),
                        json!({"type": "response.audio_transcript.delta", "delta": "Hello"}),
                        json!({"type": "response.done", "response": {"id": id, "status": "completed"}}),
                    ];
                    for reply in replies {
                        write.send(Message::Text(reply.to_string().into())).await?;
                    }
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }
    Ok(())
}
