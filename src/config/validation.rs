use super::BridgeConfig;
use crate::core::codec::AudioEncoding;
use crate::core::realtime::FormatSchema;

/// Validate bridge settings after all sources are merged.
pub(super) fn validate_bridge(bridge: &BridgeConfig) -> Result<(), String> {
    if bridge.min_buffer_ms == 0 {
        return Err("min_buffer_ms must be greater than 0".to_string());
    }
    if bridge.keepalive_interval_secs == 0 {
        return Err("keepalive_interval_secs must be greater than 0".to_string());
    }
    if bridge.pending_queue_capacity == 0 {
        return Err("pending_queue_capacity must be greater than 0".to_string());
    }
    validate_telephony_path(&bridge.telephony_path)?;
    // Legacy descriptors name PCM16 without a rate
    if bridge.format_schema == FormatSchema::Legacy
        && bridge.audio_format.encoding() == AudioEncoding::Pcm16
    {
        return Err(format!(
            "audio_format {} requires format_schema structured",
            bridge.audio_format
        ));
    }
    if bridge.model.trim().is_empty() {
        return Err("model must not be empty".to_string());
    }
    Ok(())
}

/// The telephony path must be a non-root absolute path.
pub(super) fn validate_telephony_path(path: &str) -> Result<(), String> {
    if !path.starts_with('/') {
        return Err(format!("telephony_path must start with '/': {path}"));
    }
    if path == "/" {
        return Err("telephony_path must not be '/', which serves the health check".to_string());
    }
    if path.chars().any(char::is_whitespace) {
        return Err(format!("telephony_path must not contain whitespace: {path:?}"));
    }
    Ok(())
}
