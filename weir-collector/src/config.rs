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
use std::fmt;

pub const DEFAULT_METRICS_BATCHING_COUNT: usize = 250_000;
pub const DEFAULT_METRICS_BATCHING_MSEC_PERIOD: u64 = 31;
pub const DEFAULT_REDIS_QOS_TTL: u64 = 2;
pub const DEFAULT_REDIS_QOS_CONN_TTL: u64 = 60;
pub const DEFAULT_CHECK_CONN_INTERVAL_SECS: u64 = 5;
pub const DEFAULT_MSG_QUEUE_SIZE: usize = 1024;

fn default_workers() -> usize {
    1
}
fn default_queue_size() -> usize {
    DEFAULT_MSG_QUEUE_SIZE
}
fn default_batch_count() -> usize {
    DEFAULT_METRICS_BATCHING_COUNT
}
fn default_batch_period() -> u64 {
    DEFAULT_METRICS_BATCHING_MSEC_PERIOD
}
fn default_qos_ttl() -> u64 {
    DEFAULT_REDIS_QOS_TTL
}
fn default_conn_ttl() -> u64 {
    DEFAULT_REDIS_QOS_CONN_TTL
}
fn default_check_interval() -> u64 {
    DEFAULT_CHECK_CONN_INTERVAL_SECS
}

/// The collector's process configuration, loaded from the YAML file given
/// as the only argument. `redis_server` and `endpoint` are required;
/// everything else has the usual defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub port: u16,
    #[serde(default = "default_workers")]
    pub num_of_syslog_servers: usize,
    #[serde(default = "default_queue_size")]
    pub msg_queue_size: usize,
    #[serde(default = "default_batch_count")]
    pub metrics_batch_count: usize,
    #[serde(default = "default_batch_period")]
    pub metrics_batch_period_msec: u64,
    pub redis_server: String,
    #[serde(default = "default_qos_ttl")]
    pub redis_qos_ttl: u64,
    #[serde(default = "default_conn_ttl")]
    pub redis_qos_conn_ttl: u64,
    #[serde(default = "default_check_interval")]
    pub redis_check_conn_interval_sec: u64,
    pub endpoint: String,
    #[serde(default)]
    pub log_file_name: Option<String>,
    #[serde(default)]
    pub access_log_file_name: Option<String>,
    #[serde(default)]
    pub log_level: Option<String>,
}

#[derive(Debug)]
pub struct BadAddress(pub String);

impl fmt::Display for BadAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "can't parse qos redis server address '{}'", self.0)
    }
}

impl std::error::Error for BadAddress {}

impl Config {
    /// Split `redis_server` (`host:port`) into its parts.
    pub fn redis_host_port(&self) -> Result<(String, u16), BadAddress> {
        let mut parts = self.redis_server.splitn(2, ':');
        let host = parts.next().unwrap_or_default();
        let port = parts
            .next()
            .and_then(|p| p.parse().ok())
            .ok_or_else(|| BadAddress(self.redis_server.clone()))?;
        if host.is_empty() {
            return Err(BadAddress(self.redis_server.clone()));
        }
        Ok((host.to_string(), port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_gets_defaults() {
        let config: Config = serde_yaml::from_str(
            "redis_server: 127.0.0.1:7379\n\
             endpoint: dev.dc\n\
             port: 5514\n",
        )
        .unwrap();
        assert_eq!(config.num_of_syslog_servers, 1);
        assert_eq!(config.msg_queue_size, 1024);
        assert_eq!(config.metrics_batch_count, 250_000);
        assert_eq!(config.metrics_batch_period_msec, 31);
        assert_eq!(config.redis_qos_ttl, 2);
        assert_eq!(config.redis_qos_conn_ttl, 60);
        assert_eq!(config.redis_check_conn_interval_sec, 5);
        assert_eq!(config.redis_host_port().unwrap(), ("127.0.0.1".to_string(), 7379));
    }

    #[test]
    fn missing_required_keys_fail() {
        assert!(serde_yaml::from_str::<Config>("port: 5514\n").is_err());
    }

    #[test]
    fn unparseable_redis_addresses_are_rejected() {
        let config: Config = serde_yaml::from_str(
            "redis_server: just-a-host\n\
             endpoint: dev.dc\n",
        )
        .unwrap();
        assert!(config.redis_host_port().is_err());
        let config: Config = serde_yaml::from_str(
            "redis_server: 'host:notaport'\n\
             endpoint: dev.dc\n",
        )
        .unwrap();
        assert!(config.redis_host_port().is_err());
    }
}
