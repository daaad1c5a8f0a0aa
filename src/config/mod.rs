//! Configuration module for the phone bridge
//!
//! Server configuration comes from .env files, environment variables and an
//! optional YAML file. Priority: YAML > ENV vars > .env values > defaults.
//!
//! # Modules
//! - `yaml`: YAML configuration file loading
//! - `env`: Environment variable readers
//! - `validation`: Configuration validation logic
//!
//! # Example
//! ```rust,no_run
//! use waav_phone_bridge::config::ServerConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ServerConfig::from_env()?;
//!
//! // Load from YAML file with environment variable overrides
//! let config_path = PathBuf::from("config.yaml");
//! let config = ServerConfig::from_file(&config_path)?;
//!
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::time::Duration;

mod env;
mod validation;
mod yaml;

pub use yaml::YamlConfig;

use crate::core::realtime::{
    DEFAULT_REALTIME_MODEL, FormatSchema, OPENAI_REALTIME_URL, OpenAIRealtimeVoice, TurnPolicy,
    VoiceAudioFormat,
};

/// Greeting requested as the first response of every call.
pub const DEFAULT_GREETING: &str =
    "Greet the caller warmly, say you are an AI assistant, and ask how you can help today.";

/// Default Telephony upgrade path.
pub const DEFAULT_TELEPHONY_PATH: &str = "/twilio";

/// Bridge behaviour for every call.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Voice Transport endpoint, without the model query
    pub voice_url: String,
    /// Model requested on connect
    pub model: String,
    pub voice: OpenAIRealtimeVoice,
    /// Audio format negotiated with the Voice Transport, both directions
    pub audio_format: VoiceAudioFormat,
    /// Shape of the format in `session.update`
    pub format_schema: FormatSchema,
    pub turn_policy: TurnPolicy,
    /// Buffered duration that triggers a flush
    pub min_buffer_ms: u32,
    pub keepalive_interval_secs: u64,
    /// Silence window before a response request is re-issued; 0 disables
    pub response_watchdog_ms: u64,
    /// Instructions for the first response; `None` skips the greeting
    pub greeting: Option<String>,
    /// Session-level instructions
    pub system_instructions: Option<String>,
    pub telephony_path: String,
    /// Add `streamSid` to outbound media events
    pub include_stream_sid: bool,
    /// Telephony messages held while the Voice Transport connects
    pub pending_queue_capacity: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            voice_url: OPENAI_REALTIME_URL.to_string(),
            model: DEFAULT_REALTIME_MODEL.to_string(),
            voice: OpenAIRealtimeVoice::default(),
            audio_format: VoiceAudioFormat::default(),
            format_schema: FormatSchema::default(),
            turn_policy: TurnPolicy::default(),
            min_buffer_ms: 120,
            keepalive_interval_secs: 25,
            response_watchdog_ms: 1500,
            greeting: Some(DEFAULT_GREETING.to_string()),
            system_instructions: None,
            telephony_path: DEFAULT_TELEPHONY_PATH.to_string(),
            include_stream_sid: true,
            pending_queue_capacity: 500,
        }
    }
}

impl BridgeConfig {
    /// Flush threshold in samples at the Voice Transport's working rate.
    pub fn flush_threshold_samples(&self) -> usize {
        self.audio_format
            .sample_rate()
            .samples_for_ms(self.min_buffer_ms)
    }

    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_secs(self.keepalive_interval_secs)
    }

    /// Response watchdog window, if enabled.
    pub fn response_watchdog(&self) -> Option<Duration> {
        match self.response_watchdog_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }
}

/// Server configuration
///
/// Contains everything needed to run the bridge:
/// - Server settings (host, port)
/// - Voice Transport credential
/// - Bridge behaviour (formats, turn policy, timers)
#[derive(Debug, Clone)]
pub struct ServerConfig {
    // Server settings
    pub host: String,
    pub port: u16,

    /// OpenAI API key for the Realtime API
    pub openai_api_key: Option<String>,

    pub bridge: BridgeConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            openai_api_key: None,
            bridge: BridgeConfig::default(),
        }
    }
}

/// Zeroize the credential when ServerConfig is dropped.
impl Drop for ServerConfig {
    fn drop(&mut self) {
        use zeroize::Zeroize;

        if let Some(ref mut key) = self.openai_api_key {
            key.zeroize();
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// The .env file is loaded in main.rs at startup, so its values are
    /// visible here as environment variables.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        Self::load(None)
    }

    /// Load configuration from a YAML file with environment variable base
    ///
    /// Priority order (highest to lowest):
    /// 1. YAML file values
    /// 2. Environment variables (actual ENV vars override .env values)
    /// 3. .env file values
    /// 4. Default values
    ///
    /// # Errors
    /// Returns an error if:
    /// - The YAML file cannot be read or is malformed
    /// - Environment variables have invalid formats
    /// - Configuration validation fails
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let yaml_config = YamlConfig::from_file(path)?;
        Self::load(Some(yaml_config))
    }

    fn load(yaml: Option<YamlConfig>) -> Result<Self, Box<dyn std::error::Error>> {
        let mut config = Self::default();
        config.apply_env()?;
        if let Some(yaml) = yaml {
            config.apply_yaml(yaml)?;
        }
        validation::validate_bridge(&config.bridge)?;
        Ok(config)
    }

    fn apply_env(&mut self) -> Result<(), String> {
        if let Some(host) = env::env_non_empty("HOST") {
            self.host = host;
        }
        if let Some(port) = env::env_parse::<u16>("PORT")? {
            self.port = port;
        }
        if let Some(key) = env::env_non_empty("OPENAI_API_KEY") {
            self.openai_api_key = Some(key);
        }

        let bridge = &mut self.bridge;
        if let Some(url) = env::env_non_empty("OPENAI_REALTIME_URL") {
            bridge.voice_url = url;
        }
        if let Some(model) = env::env_non_empty("REALTIME_MODEL") {
            bridge.model = model;
        }
        if let Some(voice) = env::env_non_empty("REALTIME_VOICE") {
            bridge.voice = OpenAIRealtimeVoice::from_str_or_default(&voice);
        }
        if let Some(format) = env::env_non_empty("REALTIME_AUDIO_FORMAT") {
            bridge.audio_format = parse_audio_format(&format)?;
        }
        if let Some(schema) = env::env_non_empty("REALTIME_FORMAT_SCHEMA") {
            bridge.format_schema = parse_format_schema(&schema)?;
        }
        if let Some(policy) = env::env_non_empty("TURN_POLICY") {
            bridge.turn_policy = parse_turn_policy(&policy)?;
        }
        if let Some(ms) = env::env_parse::<u32>("MIN_BUFFER_MS")? {
            bridge.min_buffer_ms = ms;
        }
        if let Some(secs) = env::env_parse::<u64>("KEEPALIVE_INTERVAL_SECS")? {
            bridge.keepalive_interval_secs = secs;
        }
        if let Some(ms) = env::env_parse::<u64>("RESPONSE_WATCHDOG_MS")? {
            bridge.response_watchdog_ms = ms;
        }
        // Set but empty disables the greeting
        if let Some(greeting) = env::env_string("GREETING_INSTRUCTIONS") {
            bridge.greeting = non_empty(greeting);
        }
        if let Some(instructions) = env::env_non_empty("SYSTEM_INSTRUCTIONS") {
            bridge.system_instructions = Some(instructions);
        }
        if let Some(path) = env::env_non_empty("TELEPHONY_PATH") {
            bridge.telephony_path = path;
        }
        if let Some(include) = env::env_bool("INCLUDE_STREAM_SID")? {
            bridge.include_stream_sid = include;
        }
        if let Some(capacity) = env::env_parse::<usize>("PENDING_QUEUE_CAPACITY")? {
            bridge.pending_queue_capacity = capacity;
        }
        Ok(())
    }

    fn apply_yaml(&mut self, yaml: YamlConfig) -> Result<(), String> {
        if let Some(server) = yaml.server {
            if let Some(host) = server.host {
                self.host = host;
            }
            if let Some(port) = server.port {
                self.port = port;
            }
        }
        if let Some(key) = yaml.providers.and_then(|p| p.openai_api_key) {
            self.openai_api_key = non_empty(key);
        }

        let Some(yaml) = yaml.bridge else {
            return Ok(());
        };
        let bridge = &mut self.bridge;
        if let Some(url) = yaml.voice_url {
            bridge.voice_url = url;
        }
        if let Some(model) = yaml.model {
            bridge.model = model;
        }
        if let Some(voice) = yaml.voice {
            bridge.voice = OpenAIRealtimeVoice::from_str_or_default(&voice);
        }
        if let Some(format) = yaml.audio_format {
            bridge.audio_format = parse_audio_format(&format)?;
        }
        if let Some(schema) = yaml.format_schema {
            bridge.format_schema = parse_format_schema(&schema)?;
        }
        if let Some(policy) = yaml.turn_policy {
            bridge.turn_policy = parse_turn_policy(&policy)?;
        }
        if let Some(ms) = yaml.min_buffer_ms {
            bridge.min_buffer_ms = ms;
        }
        if let Some(secs) = yaml.keepalive_interval_secs {
            bridge.keepalive_interval_secs = secs;
        }
        if let Some(ms) = yaml.response_watchdog_ms {
            bridge.response_watchdog_ms = ms;
        }
        if let Some(greeting) = yaml.greeting {
            bridge.greeting = non_empty(greeting);
        }
        if let Some(instructions) = yaml.instructions {
            bridge.system_instructions = non_empty(instructions);
        }
        if let Some(path) = yaml.telephony_path {
            bridge.telephony_path = path;
        }
        if let Some(include) = yaml.include_stream_sid {
            bridge.include_stream_sid = include;
        }
        if let Some(capacity) = yaml.pending_queue_capacity {
            bridge.pending_queue_capacity = capacity;
        }
        Ok(())
    }

    /// Get the server address as a string
    ///
    /// Returns the address in the format "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Whether a Voice Transport credential is configured.
    pub fn has_voice_credential(&self) -> bool {
        self.openai_api_key
            .as_deref()
            .is_some_and(|key| !key.trim().is_empty())
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

fn parse_audio_format(raw: &str) -> Result<VoiceAudioFormat, String> {
    VoiceAudioFormat::parse(raw).ok_or_else(|| {
        format!("Unsupported audio format '{raw}': expected g711_ulaw, pcm16_8k or pcm16_16k")
    })
}

fn parse_format_schema(raw: &str) -> Result<FormatSchema, String> {
    FormatSchema::parse(raw)
        .ok_or_else(|| format!("Unsupported format schema '{raw}': expected legacy or structured"))
}

fn parse_turn_policy(raw: &str) -> Result<TurnPolicy, String> {
    TurnPolicy::parse(raw)
        .ok_or_else(|| format!("Unsupported turn policy '{raw}': expected buffered or server_vad"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;
    use std::fs;
    use tempfile::TempDir;

    const ENV_VARS: &[&str] = &[
        "HOST",
        "PORT",
        "OPENAI_API_KEY",
        "OPENAI_REALTIME_URL",
        "REALTIME_MODEL",
        "REALTIME_VOICE",
        "REALTIME_AUDIO_FORMAT",
        "REALTIME_FORMAT_SCHEMA",
        "TURN_POLICY",
        "MIN_BUFFER_MS",
        "KEEPALIVE_INTERVAL_SECS",
        "RESPONSE_WATCHDOG_MS",
        "GREETING_INSTRUCTIONS",
        "SYSTEM_INSTRUCTIONS",
        "TELEPHONY_PATH",
        "INCLUDE_STREAM_SID",
        "PENDING_QUEUE_CAPACITY",
    ];

    // Helper to clean up environment variables
    fn cleanup_env_vars() {
        unsafe {
            for name in ENV_VARS {
                env::remove_var(name);
            }
        }
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.address(), "0.0.0.0:8080");
        assert!(!config.has_voice_credential());

        let bridge = &config.bridge;
        assert_eq!(bridge.voice, OpenAIRealtimeVoice::Marin);
        assert_eq!(bridge.audio_format, VoiceAudioFormat::G711Ulaw);
        assert_eq!(bridge.turn_policy, TurnPolicy::Buffered);
        assert_eq!(bridge.telephony_path, "/twilio");
        assert_eq!(bridge.keepalive_interval(), Duration::from_secs(25));
        assert_eq!(bridge.response_watchdog(), Some(Duration::from_millis(1500)));
        assert!(bridge.greeting.is_some());
    }

    #[test]
    fn test_flush_threshold_follows_format() {
        let mut bridge = BridgeConfig::default();
        assert_eq!(bridge.flush_threshold_samples(), 960);

        bridge.audio_format = VoiceAudioFormat::Pcm16Wideband;
        assert_eq!(bridge.flush_threshold_samples(), 1920);

        bridge.min_buffer_ms = 200;
        assert_eq!(bridge.flush_threshold_samples(), 3200);
    }

    #[test]
    fn test_watchdog_zero_disables() {
        let mut bridge = BridgeConfig::default();
        bridge.response_watchdog_ms = 0;
        assert!(bridge.response_watchdog().is_none());
    }

    #[test]
    #[serial]
    fn test_from_env_defaults() {
        cleanup_env_vars();

        let config = ServerConfig::from_env().unwrap();
        assert_eq!(config.port, 8080);
        assert!(config.openai_api_key.is_none());
        assert_eq!(config.bridge.voice_url, OPENAI_REALTIME_URL);

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_env_values() {
        cleanup_env_vars();
        unsafe {
            env::set_var("PORT", "5050");
            env::set_var("OPENAI_API_KEY", "sk-env");
            env::set_var("REALTIME_VOICE", "verse");
            env::set_var("REALTIME_AUDIO_FORMAT", "pcm16_16k");
            env::set_var("REALTIME_FORMAT_SCHEMA", "structured");
            env::set_var("TURN_POLICY", "server_vad");
            env::set_var("MIN_BUFFER_MS", "240");
            env::set_var("GREETING_INSTRUCTIONS", "");
            env::set_var("INCLUDE_STREAM_SID", "false");
            env::set_var("TELEPHONY_PATH", "/media");
        }

        let config = ServerConfig::from_env().unwrap();
        assert_eq!(config.port, 5050);
        assert_eq!(config.openai_api_key, Some("sk-env".to_string()));
        assert!(config.has_voice_credential());

        let bridge = &config.bridge;
        assert_eq!(bridge.voice, OpenAIRealtimeVoice::Verse);
        assert_eq!(bridge.audio_format, VoiceAudioFormat::Pcm16Wideband);
        assert_eq!(bridge.format_schema, FormatSchema::Structured);
        assert_eq!(bridge.turn_policy, TurnPolicy::ServerVad);
        assert_eq!(bridge.min_buffer_ms, 240);
        assert!(bridge.greeting.is_none());
        assert!(!bridge.include_stream_sid);
        assert_eq!(bridge.telephony_path, "/media");

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_env_invalid_values() {
        cleanup_env_vars();

        unsafe {
            env::set_var("PORT", "not-a-port");
        }
        assert!(ServerConfig::from_env().unwrap_err().to_string().contains("PORT"));

        cleanup_env_vars();
        unsafe {
            env::set_var("REALTIME_AUDIO_FORMAT", "opus");
        }
        assert!(
            ServerConfig::from_env()
                .unwrap_err()
                .to_string()
                .contains("Unsupported audio format")
        );

        cleanup_env_vars();
        unsafe {
            env::set_var("MIN_BUFFER_MS", "0");
        }
        assert!(
            ServerConfig::from_env()
                .unwrap_err()
                .to_string()
                .contains("min_buffer_ms")
        );

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_file_yaml_overrides_env() {
        cleanup_env_vars();

        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let yaml_content = r#"
server:
  host: "127.0.0.1"
  port: 9090

providers:
  openai_api_key: "sk-yaml"

bridge:
  turn_policy: "server_vad"
  instructions: "Answer questions about drywall repair."
"#;
        fs::write(&config_path, yaml_content).unwrap();

        unsafe {
            env::set_var("HOST", "0.0.0.0");
            env::set_var("OPENAI_API_KEY", "sk-env");
            env::set_var("MIN_BUFFER_MS", "160");
        }

        let config = ServerConfig::from_file(&config_path).unwrap();

        // YAML overrides ENV
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.openai_api_key, Some("sk-yaml".to_string()));
        assert_eq!(config.bridge.turn_policy, TurnPolicy::ServerVad);
        assert_eq!(
            config.bridge.system_instructions.as_deref(),
            Some("Answer questions about drywall repair.")
        );
        // ENV value where YAML is silent
        assert_eq!(config.bridge.min_buffer_ms, 160);
        assert_eq!(config.address(), "127.0.0.1:9090");

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_file_missing_file() {
        cleanup_env_vars();

        let config_path = PathBuf::from("/nonexistent/config.yaml");
        let result = ServerConfig::from_file(&config_path);

        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Failed to read config file")
        );

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_file_invalid_telephony_path() {
        cleanup_env_vars();

        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        fs::write(&config_path, "bridge:\n  telephony_path: \"/\"\n").unwrap();

        let result = ServerConfig::from_file(&config_path);
        assert!(result.unwrap_err().to_string().contains("telephony_path"));

        cleanup_env_vars();
    }
}
