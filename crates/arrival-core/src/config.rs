use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::types::UpdateRequest;

pub const DEFAULT_TELEGRAM_API: &str = "https://api.telegram.org";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Top-level runtime config (arrival.toml + ARRIVAL_* env overrides).
///
/// The workflow itself (token, chat, destination…) is not part of this file;
/// it lives in the workflow store and is written by `arrival configure`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArrivalConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub tracking: TrackingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Bot API host, without trailing slash. Overridable for self-hosted Bot API servers.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// Applied to both connect and whole-request timeouts.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
        }
    }
}

/// Position update cadence requested from the positioning subsystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingConfig {
    #[serde(default = "default_min_interval")]
    pub min_interval_millis: u64,
    #[serde(default = "default_min_distance")]
    pub min_distance_meters: f32,
    #[serde(default = "default_max_delay")]
    pub max_update_delay_millis: u64,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        let req = UpdateRequest::default();
        Self {
            min_interval_millis: req.min_interval_millis,
            min_distance_meters: req.min_distance_meters,
            max_update_delay_millis: req.max_update_delay_millis,
        }
    }
}

impl TrackingConfig {
    pub fn update_request(&self) -> UpdateRequest {
        UpdateRequest {
            min_interval_millis: self.min_interval_millis,
            min_distance_meters: self.min_distance_meters,
            max_update_delay_millis: self.max_update_delay_millis,
        }
    }
}

fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.arrival/arrival.db", home)
}
fn default_api_base_url() -> String {
    DEFAULT_TELEGRAM_API.to_string()
}
fn default_timeout_secs() -> u64 {
    DEFAULT_HTTP_TIMEOUT_SECS
}
fn default_min_interval() -> u64 {
    UpdateRequest::default().min_interval_millis
}
fn default_min_distance() -> f32 {
    UpdateRequest::default().min_distance_meters
}
fn default_max_delay() -> u64 {
    UpdateRequest::default().max_update_delay_millis
}

impl ArrivalConfig {
    /// Load config from a TOML file with ARRIVAL_* env var overrides.
    ///
    /// Checks in order:
    ///   1. Explicit path argument
    ///   2. ~/.arrival/arrival.toml
    ///
    /// A missing file is not an error; every field has a default.
    /// Nested keys use a double underscore: `ARRIVAL_TELEGRAM__TIMEOUT_SECS=10`.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        Self::figment(&path)
            .extract()
            .map_err(|e| crate::error::ConfigError::Load(e.to_string()))
    }

    fn figment(path: &str) -> Figment {
        Figment::from(Serialized::defaults(ArrivalConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("ARRIVAL_").split("__"))
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.arrival/arrival.toml", home)
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn defaults_when_file_missing() {
        Jail::expect_with(|_jail| {
            let cfg = ArrivalConfig::load(Some("does-not-exist.toml")).expect("load");
            assert_eq!(cfg.telegram.api_base_url, DEFAULT_TELEGRAM_API);
            assert_eq!(cfg.telegram.timeout_secs, 30);
            assert_eq!(cfg.tracking.min_interval_millis, 10_000);
            assert!(cfg.database.path.ends_with(".arrival/arrival.db"));
            Ok(())
        });
    }

    #[test]
    fn toml_and_env_are_merged() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "arrival.toml",
                r#"
                [database]
                path = "/tmp/arrival-test.db"

                [telegram]
                api_base_url = "http://localhost:8081"

                [tracking]
                min_distance_meters = 2.5
                "#,
            )?;
            jail.set_env("ARRIVAL_TELEGRAM__TIMEOUT_SECS", "7");

            let cfg = ArrivalConfig::load(Some("arrival.toml")).expect("load");
            assert_eq!(cfg.database.path, "/tmp/arrival-test.db");
            assert_eq!(cfg.telegram.api_base_url, "http://localhost:8081");
            assert_eq!(cfg.telegram.timeout_secs, 7);
            let req = cfg.tracking.update_request();
            assert_eq!(req.min_distance_meters, 2.5);
            assert_eq!(req.min_interval_millis, 10_000);
            Ok(())
        });
    }

    #[test]
    fn bad_value_is_a_config_error() {
        Jail::expect_with(|jail| {
            jail.create_file("arrival.toml", "[telegram]\ntimeout_secs = \"soon\"\n")?;
            let err = ArrivalConfig::load(Some("arrival.toml")).unwrap_err();
            assert!(err.to_string().starts_with("Configuration error"));
            Ok(())
        });
    }
}
