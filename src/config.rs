use std::env;

// --- CONFIG AGGREGATOR ---

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub retained: RetainedConfig,
}

impl Config {
    /// Reads `.env` (if any) and then the process environment.
    pub fn load() -> Result<Self, String> {
        dotenv::dotenv().ok();
        Ok(Self {
            server: ServerConfig::load()?,
            retained: RetainedConfig::load()?,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            retained: RetainedConfig::default(),
        }
    }
}

// --- MODULES ---

// SERVER
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub node_id: String,
    pub log_level: String,
}

impl ServerConfig {
    fn load() -> Result<Self, String> {
        Ok(Self {
            node_id:   get_env("NODE_ID", "node-1")?,
            log_level: get_env("NEXO_LOG", "info")?,
        })
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            node_id: "node-1".to_string(),
            log_level: "info".to_string(),
        }
    }
}

// RETAINED
#[derive(Debug, Clone)]
pub struct RetainedConfig {
    /// Maximum retained topics per first topic (namespace), not global
    pub max_per_namespace: usize,
    pub snapshot_path: String,
    /// 0 disables periodic snapshots
    pub snapshot_interval_secs: u64,
    pub apply_channel_capacity: usize,
    /// Deepest topic accepted on write, 0 = unlimited
    pub max_topic_levels: usize,
}

impl RetainedConfig {
    fn load() -> Result<Self, String> {
        Ok(Self {
            max_per_namespace:      get_env("RETAINED_MAX_PER_NAMESPACE", "10000")?,
            snapshot_path:          get_env("RETAINED_SNAPSHOT_PATH", "./data/retained")?,
            snapshot_interval_secs: get_env("RETAINED_SNAPSHOT_INTERVAL_SECS", "300")?,
            apply_channel_capacity: get_env("RETAINED_APPLY_CHAN_CAP", "10000")?,
            max_topic_levels:       get_env("RETAINED_MAX_TOPIC_LEVELS", "1024")?,
        })
    }

    pub fn with_limit(max_per_namespace: usize) -> Self {
        Self {
            max_per_namespace,
            ..Self::default()
        }
    }
}

impl Default for RetainedConfig {
    fn default() -> Self {
        Self {
            max_per_namespace: 10_000,
            snapshot_path: "./data/retained".to_string(),
            snapshot_interval_secs: 300,
            apply_channel_capacity: 10_000,
            max_topic_levels: 1024,
        }
    }
}

// --- PRIVATE HELPER ---

fn get_env<T: std::str::FromStr>(key: &str, default: &str) -> Result<T, String> {
    env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .map_err(|_| format!("Config error: {} must be valid", key))
}
