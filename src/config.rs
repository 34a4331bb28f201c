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

use crate::errors::{Error, Result};
use weir_common::instance_id;

pub const DEFAULT_REFRESH_INTERVAL_MS: u64 = 10_000;
/// Applied while no limit-share has been received for a user yet.
pub const DEFAULT_UNKNOWN_USER_LIMIT: u32 = 10 * 1024 * 1024;
/// Shares below this are raised to it so a user is never starved outright.
pub const DEFAULT_MINIMUM_BANDWIDTH_LIMIT: u32 = 16 * 1024;

/// Static configuration of one edge enforcer instance.
#[derive(Debug, Clone)]
pub struct FilterConfig {
    pub instance_id: String,
    pub refresh_interval_ms: u64,
    pub unknown_user_limit: u32,
    pub minimum_limit: u32,
}

impl FilterConfig {
    /// Build the config for an instance listening on `port`, deriving the
    /// instance id from the local hostname.
    pub fn new(port: u16) -> Result<Self> {
        let host = hostname::get()?;
        Ok(Self::with_host(&host.to_string_lossy(), port))
    }

    pub fn with_host(host: &str, port: u16) -> Self {
        Self {
            instance_id: instance_id(host, port),
            refresh_interval_ms: DEFAULT_REFRESH_INTERVAL_MS,
            unknown_user_limit: DEFAULT_UNKNOWN_USER_LIMIT,
            minimum_limit: DEFAULT_MINIMUM_BANDWIDTH_LIMIT,
        }
    }

    /// Apply one `name value` filter option from the proxy configuration.
    /// Unknown names are errors so typos fail hard on startup.
    pub fn apply_option(&mut self, name: &str, value: &str) -> Result<()> {
        match name {
            "active-requests-refresh-interval" => {
                self.refresh_interval_ms = parse_time_ms(value)
                    .ok_or_else(|| bad_option(name, value))?;
            }
            "unknown-user-limit" => {
                self.unknown_user_limit =
                    parse_size(value).ok_or_else(|| bad_option(name, value))?;
            }
            "minimum-limit" => {
                self.minimum_limit = parse_size(value).ok_or_else(|| bad_option(name, value))?;
            }
            _ => {
                return Err(Error::Config(format!("unknown filter option '{}'", name)));
            }
        }
        Ok(())
    }
}

fn bad_option(name: &str, value: &str) -> Error {
    Error::Config(format!("invalid value '{}' for option '{}'", value, name))
}

/// Parse a duration like `500`, `750ms`, `10s`, `5m`, `1h` into
/// milliseconds. Bare numbers are milliseconds.
pub fn parse_time_ms(value: &str) -> Option<u64> {
    let (digits, unit) = split_number(value)?;
    let number: u64 = digits.parse().ok()?;
    let factor = match unit {
        "" | "ms" => 1,
        "s" => 1000,
        "m" => 60 * 1000,
        "h" => 60 * 60 * 1000,
        "d" => 24 * 60 * 60 * 1000,
        _ => return None,
    };
    number.checked_mul(factor)
}

/// Parse a size like `4096`, `64k`, `10m`, `1g` into bytes. Bare numbers
/// are bytes.
pub fn parse_size(value: &str) -> Option<u32> {
    let (digits, unit) = split_number(value)?;
    let number: u64 = digits.parse().ok()?;
    let factor = match unit.to_ascii_lowercase().as_str() {
        "" => 1,
        "k" => 1024,
        "m" => 1024 * 1024,
        "g" => 1024 * 1024 * 1024,
        _ => return None,
    };
    let bytes = number.checked_mul(factor)?;
    if bytes > u64::from(u32::MAX) {
        None
    } else {
        Some(bytes as u32)
    }
}

fn split_number(value: &str) -> Option<(&str, &str)> {
    if value.is_empty() {
        return None;
    }
    let split = value
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or_else(|| value.len());
    if split == 0 {
        return None;
    }
    Some((&value[..split], &value[split..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations_parse_with_units() {
        assert_eq!(parse_time_ms("500"), Some(500));
        assert_eq!(parse_time_ms("750ms"), Some(750));
        assert_eq!(parse_time_ms("10s"), Some(10_000));
        assert_eq!(parse_time_ms("5m"), Some(300_000));
        assert_eq!(parse_time_ms("1h"), Some(3_600_000));
        assert_eq!(parse_time_ms("10x"), None);
        assert_eq!(parse_time_ms("s"), None);
    }

    #[test]
    fn sizes_parse_with_units() {
        assert_eq!(parse_size("4096"), Some(4096));
        assert_eq!(parse_size("64k"), Some(64 * 1024));
        assert_eq!(parse_size("10m"), Some(10 * 1024 * 1024));
        assert_eq!(parse_size("1g"), Some(1024 * 1024 * 1024));
        assert_eq!(parse_size("8t"), None);
        assert_eq!(parse_size("5g"), None); // overflows u32
    }

    #[test]
    fn options_apply_and_reject_typos() {
        let mut config = FilterConfig::with_host("edge_a", 8080);
        assert_eq!(config.instance_id, "edge-a-8080");
        config
            .apply_option("active-requests-refresh-interval", "5s")
            .unwrap();
        config.apply_option("unknown-user-limit", "1m").unwrap();
        config.apply_option("minimum-limit", "32k").unwrap();
        assert_eq!(config.refresh_interval_ms, 5000);
        assert_eq!(config.unknown_user_limit, 1024 * 1024);
        assert_eq!(config.minimum_limit, 32 * 1024);
        assert!(config.apply_option("minimum-limit", "fast").is_err());
        assert!(config.apply_option("maximum-limit", "1m").is_err());
    }
}
