//! Voice Transport WebSocket connector.
//!
//! # API Reference
//!
//! - Endpoint: `wss://api.openai.com/v1/realtime?model=<model>`
//! - Protocol: WebSocket with JSON events
//! - Auth: `Authorization: Bearer <key>` plus `OpenAI-Beta: realtime=v1`
//!
//! One connection is opened per call. Failure is final for that call: the
//! bridge does not retry.

use std::time::Duration;

use http::{HeaderValue, Request, header};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use url::Url;

use super::base::{RealtimeError, RealtimeResult};

/// Handshake must complete within this window.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// A connected Voice Transport socket.
pub type VoiceStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Build the endpoint URL with the model as a query parameter.
pub fn build_voice_url(base: &str, model: &str) -> RealtimeResult<Url> {
    let mut url = Url::parse(base)
        .map_err(|e| RealtimeError::InvalidConfiguration(format!("voice url {base}: {e}")))?;
    match url.scheme() {
        "ws" | "wss" => {}
        other => {
            return Err(RealtimeError::InvalidConfiguration(format!(
                "voice url scheme must be ws or wss, got {other}"
            )));
        }
    }
    url.query_pairs_mut().append_pair("model", model);
    Ok(url)
}

/// Build the upgrade request with authentication headers.
pub fn build_voice_request(url: &Url, api_key: &str) -> RealtimeResult<Request<()>> {
    let mut request = url
        .as_str()
        .into_client_request()
        .map_err(|e| RealtimeError::ConnectionFailed(e.to_string()))?;

    let auth = HeaderValue::from_str(&format!("Bearer {api_key}"))
        .map_err(|e| RealtimeError::InvalidConfiguration(format!("api key: {e}")))?;
    let headers = request.headers_mut();
    headers.insert(header::AUTHORIZATION, auth);
    headers.insert("OpenAI-Beta", HeaderValue::from_static("realtime=v1"));

    Ok(request)
}

/// Open the Voice Transport connection for one call.
pub async fn connect_voice(base: &str, model: &str, api_key: &str) -> RealtimeResult<VoiceStream> {
    let url = build_voice_url(base, model)?;
    let request = build_voice_request(&url, api_key)?;

    tracing::debug!("Connecting to voice transport at {}", url);

    let connect = tokio_tungstenite::connect_async(request);
    let (ws_stream, _response) = tokio::time::timeout(CONNECT_TIMEOUT, connect)
        .await
        .map_err(|_| RealtimeError::Timeout(format!("connect to {}", url.host_str().unwrap_or(""))))?
        .map_err(|e| RealtimeError::ConnectionFailed(e.to_string()))?;

    tracing::info!("Connected to voice transport");
    Ok(ws_stream)
}
