use serde::Deserialize;

/// Root application configuration. Loaded from environment variables
/// with the prefix `LIFECYCLE_PULSE__`.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_node_id")]
    pub node_id: String,
    #[serde(default)]
    pub journey: JourneyConfig,
    #[serde(default)]
    pub segmentation: SegmentationConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JourneyConfig {
    #[serde(default = "default_journey_enabled")]
    pub enabled: bool,
    #[serde(default = "default_max_active_journeys")]
    pub max_active_journeys: usize,
    #[serde(default = "default_max_executions_per_journey")]
    pub max_executions_per_journey: usize,
    #[serde(default = "default_scheduler_interval_ms")]
    pub scheduler_interval_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SegmentationConfig {
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
}

// Default functions
fn default_node_id() -> String {
    "node-01".to_string()
}
fn default_journey_enabled() -> bool {
    true
}
fn default_max_active_journeys() -> usize {
    100
}
fn default_max_executions_per_journey() -> usize {
    1_000_000
}
fn default_scheduler_interval_ms() -> u64 {
    500
}
fn default_refresh_interval_secs() -> u64 {
    300
}

impl Default for JourneyConfig {
    fn default() -> Self {
        Self {
            enabled: default_journey_enabled(),
            max_active_journeys: default_max_active_journeys(),
            max_executions_per_journey: default_max_executions_per_journey(),
            scheduler_interval_ms: default_scheduler_interval_ms(),
        }
    }
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: default_refresh_interval_secs(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            node_id: default_node_id(),
            journey: JourneyConfig::default(),
            segmentation: SegmentationConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder().add_source(
            config::Environment::with_prefix("LIFECYCLE_PULSE")
                .separator("__")
                .try_parsing(true)
                .list_separator(","),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }
}
