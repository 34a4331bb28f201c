// Copyright 2020-2024, Wayfair GmbH
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use serde_derive::Deserialize;
use std::path::PathBuf;

pub const RELOAD_FIFO_NAME: &str = "polygen_reload.fifo";
pub const RELOAD_LIMITS_REQ: &str = "reload_limits";
pub const CACHE_LIMIT_FILE_NAME: &str = "cache_limits.json";

fn default_sleep_time() -> u64 {
    50
}
fn default_keys_batch() -> usize {
    100
}
fn default_queue_size() -> usize {
    1024
}
fn default_unblock_backoff() -> u64 {
    200
}
fn default_unblock_ratio() -> f64 {
    0.95
}
fn default_unknown_report() -> u64 {
    60
}
fn default_minimum_limit() -> u64 {
    16 * 1024
}
fn default_share_tick_multiplier() -> u64 {
    100
}

/// The generator's process configuration, loaded from the YAML file given
/// as the only argument.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub zone: String,
    pub redis_server: String,
    /// Address the policy channel listens on; every edge dials in here.
    pub policy_listen: String,
    #[serde(default = "default_sleep_time")]
    pub sleep_time: u64,
    #[serde(default = "default_keys_batch")]
    pub redis_keys_batch: usize,
    #[serde(default = "default_queue_size")]
    pub policy_msg_queue_size: usize,
    #[serde(default = "default_unblock_backoff")]
    pub requests_unblock_backoff_time_ms: u64,
    #[serde(default = "default_unblock_ratio")]
    pub requests_unblock_ratio: f64,
    #[serde(default = "default_unknown_report")]
    pub unknown_users_report_time_seconds: u64,
    #[serde(default = "default_minimum_limit")]
    pub minimum_limit: u64,
    /// Limit shares translate into standing limits rather than
    /// instantaneous stop signals, so they go out far less often than
    /// violations.
    #[serde(default = "default_share_tick_multiplier")]
    pub share_tick_multiplier: u64,
    #[serde(default)]
    pub default_active_request_if_qos_not_configured: Option<f64>,
    #[serde(default)]
    pub log_file_name: Option<String>,
    #[serde(default)]
    pub log_level: Option<String>,
}

impl Config {
    /// `~/weir_<zone>_cache_limits.json`
    pub fn limits_path(&self) -> PathBuf {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/root".to_string());
        PathBuf::from(home).join(format!("weir_{}_{}", self.zone, CACHE_LIMIT_FILE_NAME))
    }

    /// `/tmp/weir_<zone>_polygen_reload.fifo`
    pub fn reload_fifo_path(&self) -> PathBuf {
        PathBuf::from("/tmp").join(format!("weir_{}_{}", self.zone, RELOAD_FIFO_NAME))
    }

    pub fn redis_host_port(&self) -> Option<(String, u16)> {
        let mut parts = self.redis_server.splitn(2, ':');
        let host = parts.next().unwrap_or_default();
        let port = parts.next()?.parse().ok()?;
        if host.is_empty() {
            return None;
        }
        Some((host.to_string(), port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_gets_defaults() {
        let config: Config = serde_yaml::from_str(
            "zone: dev\n\
             redis_server: 127.0.0.1:7379\n\
             policy_listen: 0.0.0.0:9514\n",
        )
        .unwrap();
        assert_eq!(config.sleep_time, 50);
        assert_eq!(config.redis_keys_batch, 100);
        assert_eq!(config.requests_unblock_backoff_time_ms, 200);
        assert!((config.requests_unblock_ratio - 0.95).abs() < 1e-9);
        assert_eq!(config.minimum_limit, 16 * 1024);
        assert_eq!(config.share_tick_multiplier, 100);
        assert!(config.limits_path().ends_with("weir_dev_cache_limits.json"));
        assert_eq!(
            config.reload_fifo_path(),
            PathBuf::from("/tmp/weir_dev_polygen_reload.fifo")
        );
        assert_eq!(
            config.redis_host_port(),
            Some(("127.0.0.1".to_string(), 7379))
        );
    }

    #[test]
    fn missing_required_keys_fail() {
        assert!(serde_yaml::from_str::<Config>("zone: dev\n").is_err());
    }
}
