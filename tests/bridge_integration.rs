//! End-to-end bridge tests
//!
//! Runs the real server against a mock Voice Transport and drives the
//! Telephony side with a WebSocket client, the way a carrier would.

mod mock_providers;

use std::net::SocketAddr;
use std::time::Duration;

use base64::prelude::*;
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use mock_providers::{MockVoiceOptions, MockVoiceServer};
use waav_phone_bridge::{ServerConfig, routes, state::AppState};

type TelephonyClient = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

fn bridge_config(voice_url: String) -> ServerConfig {
    let mut config = ServerConfig::default();
    config.host = "127.0.0.1".to_string();
    config.port = 0;
    config.openai_api_key = Some("sk-test".to_string());
    config.bridge.voice_url = voice_url;
    config.bridge.model = "test-model".to_string();
    config.bridge.greeting = None;
    config.bridge.response_watchdog_ms = 0;
    config
}

async fn start_bridge(config: ServerConfig) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = routes::create_app(AppState::new(config));
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn connect_telephony(addr: SocketAddr) -> TelephonyClient {
    let (client, _response) = connect_async(format!("ws://{addr}/twilio")).await.unwrap();
    client
}

async fn send_event(client: &mut TelephonyClient, event: Value) {
    client
        .send(Message::Text(event.to_string().into()))
        .await
        .unwrap();
}

fn media_event(bytes: &[u8]) -> Value {
    json!({
        "event": "media",
        "streamSid": "MZ-test",
        "media": {"track": "inbound", "payload": BASE64_STANDARD.encode(bytes)}
    })
}

fn start_event() -> Value {
    json!({
        "event": "start",
        "start": {"streamSid": "MZ-test", "callSid": "CA-test", "tracks": ["inbound"]}
    })
}

/// Next text message from the bridge, skipping heartbeats.
async fn next_text(client: &mut TelephonyClient) -> Value {
    loop {
        let msg = tokio::time::timeout(RECV_TIMEOUT, client.next())
            .await
            .expect("timed out waiting for telephony message")
            .expect("telephony socket ended")
            .unwrap();
        if let Message::Text(text) = msg {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

/// Wait until the bridge closes the telephony socket.
async fn expect_closed(client: &mut TelephonyClient) {
    let closed = tokio::time::timeout(RECV_TIMEOUT, async {
        loop {
            match client.next().await {
                None | Some(Err(_)) | Some(Ok(Message::Close(_))) => return,
                Some(Ok(_)) => {}
            }
        }
    })
    .await;
    assert!(closed.is_ok(), "bridge did not close the telephony socket");
}

#[tokio::test]
async fn test_call_is_bridged_end_to_end() {
    let mut voice = MockVoiceServer::start(MockVoiceOptions {
        reply_audio: Some("//8=".to_string()),
        ..Default::default()
    })
    .await;
    let addr = start_bridge(bridge_config(voice.url())).await;
    let mut client = connect_telephony(addr).await;

    let handshake = voice.next_handshake().await;
    assert_eq!(handshake.authorization.as_deref(), Some("Bearer sk-test"));
    assert_eq!(handshake.openai_beta.as_deref(), Some("realtime=v1"));
    assert!(handshake.uri.ends_with("?model=test-model"));

    let update = voice.next_event().await;
    assert_eq!(update["type"], "session.update");
    assert_eq!(update["session"]["voice"], "marin");
    assert_eq!(update["session"]["input_audio_format"], "g711_ulaw");
    assert_eq!(update["session"]["output_audio_format"], "g711_ulaw");
    assert!(update["session"]["turn_detection"].is_null());

    send_event(&mut client, json!({"event": "connected", "protocol": "Call"})).await;
    send_event(&mut client, start_event()).await;
    // 6 x 20ms reaches the 120ms threshold
    for _ in 0..6 {
        send_event(&mut client, media_event(&[0x55; 160])).await;
    }

    let append = voice.next_event().await;
    assert_eq!(append["type"], "input_audio_buffer.append");
    let audio = BASE64_STANDARD
        .decode(append["audio"].as_str().unwrap())
        .unwrap();
    assert_eq!(audio, vec![0x55; 960]);
    assert_eq!(voice.next_event().await["type"], "input_audio_buffer.commit");
    let create = voice.next_event().await;
    assert_eq!(create["type"], "response.create");
    assert_eq!(create["response"]["modalities"], json!(["audio", "text"]));

    // The mock's audio reaches the caller untouched, tagged with the stream id
    let media = next_text(&mut client).await;
    assert_eq!(media["event"], "media");
    assert_eq!(media["streamSid"], "MZ-test");
    assert_eq!(media["media"]["payload"], "//8=");

    // Hang up: cancel, then both legs close
    send_event(&mut client, json!({"event": "stop", "stop": {"callSid": "CA-test"}})).await;
    assert_eq!(voice.next_event().await["type"], "response.cancel");
    expect_closed(&mut client).await;
}

#[tokio::test]
async fn test_early_telephony_messages_are_replayed() {
    let mut voice = MockVoiceServer::start(MockVoiceOptions {
        handshake_delay: Duration::from_millis(300),
        reply_audio: None,
    })
    .await;
    let addr = start_bridge(bridge_config(voice.url())).await;
    let mut client = connect_telephony(addr).await;

    // Sent while the voice leg is still connecting
    send_event(&mut client, start_event()).await;
    for _ in 0..6 {
        send_event(&mut client, media_event(&[0xFF; 160])).await;
    }

    assert_eq!(voice.next_event().await["type"], "session.update");
    let append = voice.next_event().await;
    assert_eq!(append["type"], "input_audio_buffer.append");
    let audio = BASE64_STANDARD
        .decode(append["audio"].as_str().unwrap())
        .unwrap();
    assert_eq!(audio.len(), 960);
    assert_eq!(voice.next_event().await["type"], "input_audio_buffer.commit");
    assert_eq!(voice.next_event().await["type"], "response.create");
}

#[tokio::test]
async fn test_greeting_is_requested_once_and_blocks_flushes() {
    let mut voice = MockVoiceServer::start(MockVoiceOptions::default()).await;
    let mut config = bridge_config(voice.url());
    config.bridge.greeting = Some("Welcome the caller.".to_string());
    let addr = start_bridge(config).await;
    let mut client = connect_telephony(addr).await;

    assert_eq!(voice.next_event().await["type"], "session.update");
    let greeting = voice.next_event().await;
    assert_eq!(greeting["type"], "response.create");
    assert_eq!(greeting["response"]["instructions"], "Welcome the caller.");
    assert_eq!(greeting["response"]["conversation"], "auto");

    // The mock never answers, so the greeting stays in flight and caller
    // audio accumulates instead of being flushed
    send_event(&mut client, start_event()).await;
    for _ in 0..12 {
        send_event(&mut client, media_event(&[0xFF; 160])).await;
    }
    send_event(&mut client, json!({"event": "stop"})).await;

    // On hangup the held audio is flushed once, then cancelled
    let append = voice.next_event().await;
    assert_eq!(append["type"], "input_audio_buffer.append");
    let audio = BASE64_STANDARD
        .decode(append["audio"].as_str().unwrap())
        .unwrap();
    assert_eq!(audio.len(), 12 * 160);
    assert_eq!(voice.next_event().await["type"], "input_audio_buffer.commit");
    assert_eq!(voice.next_event().await["type"], "response.cancel");
    expect_closed(&mut client).await;
}

#[tokio::test]
async fn test_server_vad_policy_streams_frames() {
    let mut voice = MockVoiceServer::start(MockVoiceOptions::default()).await;
    let mut config = bridge_config(voice.url());
    config.bridge.turn_policy = waav_phone_bridge::core::realtime::TurnPolicy::ServerVad;
    let addr = start_bridge(config).await;
    let mut client = connect_telephony(addr).await;

    let update = voice.next_event().await;
    assert_eq!(update["session"]["turn_detection"]["type"], "server_vad");

    send_event(&mut client, start_event()).await;
    let frame = media_event(&[0x12; 160]);
    let payload = frame["media"]["payload"].clone();
    send_event(&mut client, frame).await;

    let append = voice.next_event().await;
    assert_eq!(append["type"], "input_audio_buffer.append");
    assert_eq!(append["audio"], payload);

    send_event(&mut client, json!({"event": "stop"})).await;
    // No commit or response request from the bridge under server VAD
    assert_eq!(voice.next_control_event().await["type"], "response.cancel");
}

#[tokio::test]
async fn test_voice_connect_failure_closes_telephony() {
    // Reserve a port and release it so nothing is listening
    let unused = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let dead_addr = unused.local_addr().unwrap();
    drop(unused);

    let addr = start_bridge(bridge_config(format!("ws://{dead_addr}/v1/realtime"))).await;
    let mut client = connect_telephony(addr).await;

    send_event(&mut client, start_event()).await;
    expect_closed(&mut client).await;
}

#[tokio::test]
async fn test_voice_close_cascades_to_telephony() {
    let voice_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let voice_addr = voice_listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (stream, _) = voice_listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        // Wait for session.update, then hang up
        let _ = ws.next().await;
        let _ = ws.close(None).await;
    });

    let addr = start_bridge(bridge_config(format!("ws://{voice_addr}/v1/realtime"))).await;
    let mut client = connect_telephony(addr).await;
    expect_closed(&mut client).await;
}

#[tokio::test]
async fn test_missing_credential_refuses_upgrade() {
    let mut config = bridge_config("ws://127.0.0.1:9/v1/realtime".to_string());
    config.openai_api_key = None;
    let addr = start_bridge(config).await;

    let err = connect_async(format!("ws://{addr}/twilio"))
        .await
        .expect_err("upgrade should be refused");
    match err {
        tungstenite::Error::Http(response) => assert_eq!(response.status(), 503),
        other => panic!("Unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_only_telephony_path_upgrades() {
    let voice = MockVoiceServer::start(MockVoiceOptions::default()).await;
    let addr = start_bridge(bridge_config(voice.url())).await;

    let err = connect_async(format!("ws://{addr}/elsewhere"))
        .await
        .expect_err("unknown path should not upgrade");
    match err {
        tungstenite::Error::Http(response) => assert_eq!(response.status(), 404),
        other => panic!("Unexpected error: {other:?}"),
    }
}
