use log::LevelFilter;
use serde::Deserialize;
use std::{
    env,
    fs::read_to_string,
    net::{IpAddr, Ipv4Addr},
    path::Path,
};

/// The server version extracted from the Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Environment variable key to load the config from
const CONFIG_ENV_KEY: &str = "CLANHALL_CONFIG_JSON";

pub fn load_config() -> Option<Config> {
    // Attempt to load the config from the env
    if let Ok(env) = env::var(CONFIG_ENV_KEY) {
        let config: Config = match serde_json::from_str(&env) {
            Ok(value) => value,
            Err(err) => {
                eprintln!("Failed to load env config (Using default): {:?}", err);
                return None;
            }
        };
        return Some(config);
    }

    // Attempt to load the config from disk
    let file = Path::new("config.json");
    if !file.exists() {
        return None;
    }

    let data = match read_to_string(file) {
        Ok(value) => value,
        Err(err) => {
            eprintln!("Failed to load config file (Using defaults): {:?}", err);
            return None;
        }
    };

    let config: Config = match serde_json::from_str(&data) {
        Ok(value) => value,
        Err(err) => {
            eprintln!("Failed to load config file (Using default): {:?}", err);
            return None;
        }
    };

    Some(config)
}

#[derive(Deserialize)]
#[serde(default)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub database_file: String,
    pub logging: LevelFilter,
    /// Base64 encoded 16 byte key for the player name codec
    pub encryption_key: String,
    /// How long a cached game snapshot may be served, in ms
    pub game_cache_ttl: i64,
    pub hooks: HookDeliveryConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 8080,
            database_file: "data/clanhall.db".to_string(),
            logging: LevelFilter::Info,
            encryption_key: "AAAAAAAAAAAAAAAAAAAAAA==".to_string(),
            game_cache_ttl: 60_000,
            hooks: Default::default(),
        }
    }
}

#[derive(Deserialize, Clone)]
#[serde(default)]
pub struct HookDeliveryConfig {
    /// Request timeout per delivery attempt, in ms
    pub timeout: u64,
    /// Attempts before an event is given up
    pub max_attempts: i32,
    /// Outbox polling interval, in ms
    pub poll_interval: u64,
    /// Base retry backoff doubled per attempt, in ms
    pub backoff: u64,
}

impl Default for HookDeliveryConfig {
    fn default() -> Self {
        Self {
            timeout: 5_000,
            max_attempts: 8,
            poll_interval: 500,
            backoff: 1_000,
        }
    }
}
