use serde::Deserialize;

/// Root SDK configuration. Loaded from environment variables with the
/// prefix `FLOWKIT__` and an optional `flowkit.toml` file.
#[derive(Debug, Clone, Deserialize)]
pub struct SdkConfig {
    #[serde(default = "default_distinct_id")]
    pub distinct_id: String,
    #[serde(default)]
    pub bridge: BridgeConfig,
    #[serde(default)]
    pub batch: BatchConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BridgeConfig {
    /// How long `send_and_await` waits for the renderer before timing out.
    #[serde(default = "default_reply_timeout_ms")]
    pub reply_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BatchConfig {
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,
}

fn default_distinct_id() -> String {
    "anonymous".to_string()
}

fn default_reply_timeout_ms() -> u64 {
    5000
}

fn default_max_batch_size() -> usize {
    50
}

fn default_flush_interval_ms() -> u64 {
    10_000
}

impl Default for SdkConfig {
    fn default() -> Self {
        Self {
            distinct_id: default_distinct_id(),
            bridge: BridgeConfig::default(),
            batch: BatchConfig::default(),
        }
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            reply_timeout_ms: default_reply_timeout_ms(),
        }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_batch_size: default_max_batch_size(),
            flush_interval_ms: default_flush_interval_ms(),
        }
    }
}

impl SdkConfig {
    /// Load configuration from environment variables and an optional file.
    pub fn load() -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder()
            .add_source(config::File::with_name("flowkit").required(false))
            .add_source(
                config::Environment::with_prefix("FLOWKIT")
                    .separator("__")
                    .try_parsing(true),
            );

        let config = builder.build()?;
        config.try_deserialize()
    }
}
