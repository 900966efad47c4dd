use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub sweeper: SweeperConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct SweeperConfig {
    /// Unpaid reservations older than this are reclaimed.
    #[serde(default = "default_grace_period_days")]
    pub grace_period_days: i64,
    /// Cadence of the background sweep.
    #[serde(default = "default_interval_seconds")]
    pub interval_seconds: u64,
}

fn default_grace_period_days() -> i64 {
    5
}

fn default_interval_seconds() -> u64 {
    3600
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Environment-specific overrides, optional.
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Local overrides, not checked in.
            .add_source(config::File::with_name("config/local").required(false))
            // Eg. `FAIRGRID_DATABASE__URL=...` overrides `database.url`.
            .add_source(config::Environment::with_prefix("FAIRGRID").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
