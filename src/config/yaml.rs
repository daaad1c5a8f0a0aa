use serde::Deserialize;
use std::path::PathBuf;

/// Complete YAML configuration structure
///
/// All fields are optional to allow partial configuration. Values present in
/// the file override environment variables.
///
/// # Example YAML structure
/// ```yaml
/// server:
///   host: "0.0.0.0"
///   port: 8080
///
/// providers:
///   openai_api_key: "sk-..."
///
/// bridge:
///   voice_url: "wss://api.openai.com/v1/realtime"
///   model: "gpt-4o-realtime-preview"
///   voice: "marin"
///   audio_format: "g711_ulaw"
///   format_schema: "legacy"
///   turn_policy: "buffered"
///   min_buffer_ms: 120
///   keepalive_interval_secs: 25
///   response_watchdog_ms: 1500
///   greeting: "Greet the caller."
///   instructions: "You are a helpful phone assistant."
///   telephony_path: "/twilio"
///   include_stream_sid: true
///   pending_queue_capacity: 500
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: Option<ServerYaml>,
    pub providers: Option<ProvidersYaml>,
    pub bridge: Option<BridgeYaml>,
}

/// Server configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServerYaml {
    pub host: Option<String>,
    pub port: Option<u16>,
}

/// Provider credentials from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ProvidersYaml {
    pub openai_api_key: Option<String>,
}

/// Bridge behaviour from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct BridgeYaml {
    pub voice_url: Option<String>,
    pub model: Option<String>,
    pub voice: Option<String>,
    pub audio_format: Option<String>,
    pub format_schema: Option<String>,
    pub turn_policy: Option<String>,
    pub min_buffer_ms: Option<u32>,
    pub keepalive_interval_secs: Option<u64>,
    pub response_watchdog_ms: Option<u64>,
    pub greeting: Option<String>,
    pub instructions: Option<String>,
    pub telephony_path: Option<String>,
    pub include_stream_sid: Option<bool>,
    pub pending_queue_capacity: Option<usize>,
}

impl YamlConfig {
    /// Load YAML configuration from a file
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {e}", path.display()))?;

        let config: YamlConfig = serde_yaml::from_str(&contents)
            .map_err(|e| format!("Failed to parse YAML config: {e}"))?;

        Ok(config)
    }
}
