//! Session Manager: pairs one Telephony socket with one Voice socket.
//!
//! Telephony messages that arrive while the Voice Transport is connecting are
//! held in a [`PendingQueue`] and replayed once the session has started. A
//! failed Voice connection closes the Telephony socket; the caller must redial.

use std::future;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant};
use tokio_tungstenite::tungstenite::Message as VoiceMessage;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::keepalive::Keepalive;
use super::pending::PendingQueue;
use super::session::{Session, TelephonyRoute, VoiceRoute};
use crate::config::ServerConfig;
use crate::core::realtime::{VoiceStream, connect_voice};
use crate::errors::{BridgeError, BridgeResult};

/// Route channel capacity per leg
const CHANNEL_BUFFER_SIZE: usize = 1024;

/// Writers get this long to flush their close frame at teardown
const WRITER_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

/// Which side ended the relay loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CloseReason {
    TelephonyClosed,
    VoiceClosed,
    SessionEnded,
}

/// Bridge one upgraded Telephony socket for its whole lifetime.
pub async fn run_call(socket: WebSocket, config: Arc<ServerConfig>) {
    let connection_id = Uuid::new_v4().to_string();
    info!(connection_id = %connection_id, "Telephony connection accepted");

    match bridge_call(socket, &config, &connection_id).await {
        Ok(()) => info!(connection_id = %connection_id, "Call finished"),
        Err(BridgeError::TelephonyClosed) => {
            info!(connection_id = %connection_id, "Caller left before the session started")
        }
        Err(e) => error!(connection_id = %connection_id, "Call aborted: {}", e),
    }
}

async fn bridge_call(
    mut socket: WebSocket,
    config: &ServerConfig,
    connection_id: &str,
) -> BridgeResult<()> {
    let api_key = match config.openai_api_key.as_deref() {
        Some(key) if !key.trim().is_empty() => key,
        _ => {
            let _ = socket.send(Message::Close(None)).await;
            return Err(BridgeError::MissingCredential);
        }
    };
    let bridge = &config.bridge;

    let (telephony_sink, mut telephony_stream) = socket.split();
    let (telephony_tx, telephony_rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);
    let telephony_task = tokio::spawn(telephony_writer(telephony_sink, telephony_rx));

    // Connecting: hold inbound telephony traffic until the voice leg is up
    let mut pending = PendingQueue::new(bridge.pending_queue_capacity);
    let connect = connect_voice(&bridge.voice_url, &bridge.model, api_key);
    tokio::pin!(connect);

    let connected = loop {
        tokio::select! {
            result = &mut connect => break result,
            msg = telephony_stream.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    if !pending.push(text.as_str().to_owned()) {
                        debug!(connection_id, "Pending queue full, dropping message");
                    }
                }
                Some(Ok(Message::Close(_))) | None => {
                    let _ = telephony_tx.send(TelephonyRoute::Close).await;
                    drop(telephony_tx);
                    shutdown_writer(telephony_task).await;
                    return Err(BridgeError::TelephonyClosed);
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(connection_id, "Telephony socket error while connecting: {}", e);
                    drop(telephony_tx);
                    shutdown_writer(telephony_task).await;
                    return Err(BridgeError::TelephonyClosed);
                }
            }
        }
    };

    let voice = match connected {
        Ok(voice) => voice,
        Err(e) => {
            let _ = telephony_tx.send(TelephonyRoute::Close).await;
            drop(telephony_tx);
            shutdown_writer(telephony_task).await;
            return Err(e.into());
        }
    };

    let (voice_sink, mut voice_stream) = voice.split();
    let (voice_tx, voice_rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);
    let voice_task = tokio::spawn(voice_writer(voice_sink, voice_rx));

    let mut session = Session::new(connection_id, bridge, voice_tx, telephony_tx);
    session.start().await;

    if !pending.is_empty() {
        debug!(
            connection_id,
            held = pending.len(),
            dropped = pending.dropped(),
            "Replaying telephony messages received while connecting"
        );
    }
    for message in pending.drain() {
        session.handle_telephony_text(&message).await;
    }

    let reason = relay(
        &mut session,
        &mut telephony_stream,
        &mut voice_stream,
        Keepalive::start(bridge.keepalive_interval()),
    )
    .await;
    debug!(connection_id, reason = ?reason, "Relay loop ended");

    session.close().await;
    drop(voice_stream);
    drop(telephony_stream);
    shutdown_writer(voice_task).await;
    shutdown_writer(telephony_task).await;
    session.mark_closed();

    Ok(())
}

/// Drive the session until either leg closes or the call ends.
///
/// The keepalive is owned by this scope and cancelled on every return.
async fn relay(
    session: &mut Session,
    telephony: &mut SplitStream<WebSocket>,
    voice: &mut SplitStream<VoiceStream>,
    mut keepalive: Keepalive,
) -> CloseReason {
    loop {
        if session.is_closing() {
            return CloseReason::SessionEnded;
        }
        let watchdog = session.watchdog_deadline();

        tokio::select! {
            msg = telephony.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    session.handle_telephony_text(text.as_str()).await;
                }
                Some(Ok(Message::Close(_))) | None => return CloseReason::TelephonyClosed,
                Some(Ok(Message::Binary(data))) => {
                    debug!(bytes = data.len(), "Ignoring binary telephony message");
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(connection_id = session.connection_id(), "Telephony socket error: {}", e);
                    return CloseReason::TelephonyClosed;
                }
            },
            msg = voice.next() => match msg {
                Some(Ok(VoiceMessage::Text(text))) => {
                    session.handle_voice_text(text.as_str()).await;
                }
                Some(Ok(VoiceMessage::Close(frame))) => {
                    info!(connection_id = session.connection_id(), "Voice transport closed: {:?}", frame);
                    return CloseReason::VoiceClosed;
                }
                None => return CloseReason::VoiceClosed,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(connection_id = session.connection_id(), "Voice socket error: {}", e);
                    return CloseReason::VoiceClosed;
                }
            },
            _ = keepalive.tick() => session.send_keepalive().await,
            _ = sleep_until_deadline(watchdog) => session.on_watchdog().await,
        }
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => future::pending().await,
    }
}

async fn telephony_writer(
    mut sink: SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<TelephonyRoute>,
) {
    while let Some(route) = rx.recv().await {
        let should_close = matches!(route, TelephonyRoute::Close);

        let result = match route {
            TelephonyRoute::Outgoing(message) => match serde_json::to_string(&message) {
                Ok(json) => sink.send(Message::Text(json.into())).await,
                Err(e) => {
                    error!("Failed to serialize telephony message: {}", e);
                    continue;
                }
            },
            TelephonyRoute::Ping(payload) => sink.send(Message::Ping(payload)).await,
            TelephonyRoute::Close => sink.send(Message::Close(None)).await,
        };

        if let Err(e) = result {
            debug!("Telephony send failed: {}", e);
            break;
        }
        if should_close {
            break;
        }
    }
}

async fn voice_writer(
    mut sink: SplitSink<VoiceStream, VoiceMessage>,
    mut rx: mpsc::Receiver<VoiceRoute>,
) {
    while let Some(route) = rx.recv().await {
        let should_close = matches!(route, VoiceRoute::Close);

        let result = match route {
            VoiceRoute::Event(event) => match serde_json::to_string(&event) {
                Ok(json) => sink.send(VoiceMessage::Text(json.into())).await,
                Err(e) => {
                    error!("Failed to serialize voice event: {}", e);
                    continue;
                }
            },
            VoiceRoute::Ping(payload) => sink.send(VoiceMessage::Ping(payload)).await,
            VoiceRoute::Close => sink.send(VoiceMessage::Close(None)).await,
        };

        if let Err(e) = result {
            debug!("Voice send failed: {}", e);
            break;
        }
        if should_close {
            break;
        }
    }
}

/// Wait for a writer to drain, aborting it if it stalls.
async fn shutdown_writer(mut task: JoinHandle<()>) {
    if tokio::time::timeout(WRITER_SHUTDOWN_TIMEOUT, &mut task)
        .await
        .is_err()
    {
        warn!("Writer did not finish in time, aborting");
        task.abort();
    }
}
