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

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq)]
enum Value {
    Str(String),
    Hash(HashMap<String, i64>),
}

#[derive(Debug)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn expired(&self, now: Instant) -> bool {
        match self.expires_at {
            Some(deadline) => now >= deadline,
            None => false,
        }
    }
}

/// The TTL-indexed map behind the store. Expired entries are dropped
/// lazily on touch and eagerly by [`sweep`](Store::sweep), which the
/// server runs on an interval.
pub struct Store {
    entries: Mutex<HashMap<String, Entry>>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Increment `field` of the hash at `key` by `delta`, creating the
    /// hash if needed, and return the new value. A key holding a string
    /// is overwritten; second-stamped hash keys and conn string keys
    /// never collide in practice, and the permissive behaviour keeps a
    /// half-expired mixture from wedging the writers.
    pub fn hincrby(&self, key: &str, field: &str, delta: i64) -> i64 {
        let now = Instant::now();
        let mut entries = self.entries.lock().unwrap();
        let needs_fresh_hash = match entries.get(key) {
            Some(entry) => entry.expired(now) || matches!(entry.value, Value::Str(_)),
            None => true,
        };
        if needs_fresh_hash {
            entries.insert(
                key.to_string(),
                Entry {
                    value: Value::Hash(HashMap::new()),
                    expires_at: None,
                },
            );
        }
        match entries.get_mut(key).map(|entry| &mut entry.value) {
            Some(Value::Hash(hash)) => {
                let slot = hash.entry(field.to_string()).or_insert(0);
                *slot += delta;
                *slot
            }
            _ => delta,
        }
    }

    /// Arm (or re-arm) the TTL of an existing key. Returns false when the
    /// key does not exist.
    pub fn expire(&self, key: &str, ttl_secs: u64) -> bool {
        let now = Instant::now();
        let mut entries = self.entries.lock().unwrap();
        match entries.get_mut(key) {
            Some(entry) if !entry.expired(now) => {
                entry.expires_at = Some(now + Duration::from_secs(ttl_secs));
                true
            }
            _ => {
                entries.remove(key);
                false
            }
        }
    }

    pub fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) {
        let now = Instant::now();
        self.entries.lock().unwrap().insert(
            key.to_string(),
            Entry {
                value: Value::Str(value.to_string()),
                expires_at: Some(now + Duration::from_secs(ttl_secs)),
            },
        );
    }

    pub fn get(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        let mut entries = self.entries.lock().unwrap();
        match entries.get(key) {
            Some(entry) if entry.expired(now) => {
                entries.remove(key);
                None
            }
            Some(entry) => match &entry.value {
                Value::Str(s) => Some(s.clone()),
                Value::Hash(_) => None,
            },
            None => None,
        }
    }

    pub fn mget(&self, keys: &[&str]) -> Vec<Option<String>> {
        keys.iter().map(|key| self.get(key)).collect()
    }

    pub fn hgetall(&self, key: &str) -> Vec<(String, i64)> {
        let now = Instant::now();
        let mut entries = self.entries.lock().unwrap();
        match entries.get(key) {
            Some(entry) if entry.expired(now) => {
                entries.remove(key);
                Vec::new()
            }
            Some(entry) => match &entry.value {
                Value::Hash(hash) => {
                    let mut fields: Vec<(String, i64)> =
                        hash.iter().map(|(k, v)| (k.clone(), *v)).collect();
                    fields.sort();
                    fields
                }
                Value::Str(_) => Vec::new(),
            },
            None => Vec::new(),
        }
    }

    /// All live keys matching a glob pattern (`*` wildcards only). The
    /// scan contract allows duplicates; this implementation happens not
    /// to produce any, which consumers must not rely on.
    pub fn scan(&self, pattern: &str) -> Vec<String> {
        let now = Instant::now();
        let entries = self.entries.lock().unwrap();
        entries
            .iter()
            .filter(|(_, entry)| !entry.expired(now))
            .filter(|(key, _)| glob_match(pattern, key))
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Drop every expired entry, returning how many were removed.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock().unwrap();
        let before = entries.len();
        entries.retain(|_, entry| !entry.expired(now));
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Match `key` against `pattern`, where `*` matches any run of characters
/// and everything else is literal. This covers the store's scan patterns
/// (`verb_<sec>_*`, `conn_v2_*`).
fn glob_match(pattern: &str, key: &str) -> bool {
    let mut parts = pattern.split('*');
    let first = parts.next().unwrap_or_default();
    if !key.starts_with(first) {
        return false;
    }
    let mut rest = &key[first.len()..];
    let mut last: Option<&str> = None;
    for part in parts {
        if let Some(prev) = last {
            match rest.find(prev) {
                Some(pos) => rest = &rest[pos + prev.len()..],
                None => return false,
            }
        }
        last = Some(part);
    }
    match last {
        // No '*' at all: the whole key must be consumed
        None => rest.is_empty(),
        Some(tail) => rest.ends_with(tail),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hincrby_accumulates() {
        let store = Store::new();
        assert_eq!(store.hincrby("verb_1_user_AKIA$dev", "GET", 1), 1);
        assert_eq!(store.hincrby("verb_1_user_AKIA$dev", "GET", 2), 3);
        assert_eq!(store.hincrby("verb_1_user_AKIA$dev", "PUT", 5), 5);
        let mut all = store.hgetall("verb_1_user_AKIA$dev");
        all.sort();
        assert_eq!(all, vec![("GET".into(), 3), ("PUT".into(), 5)]);
    }

    #[test]
    fn zero_ttl_expires_immediately() {
        let store = Store::new();
        store.set_ex("conn_v2_user_up_i_AKIA$dev", "3", 0);
        assert_eq!(store.get("conn_v2_user_up_i_AKIA$dev"), None);
    }

    #[test]
    fn expire_arms_existing_keys_only() {
        let store = Store::new();
        assert!(!store.expire("missing", 5));
        store.hincrby("verb_1_user_AKIA$dev", "GET", 1);
        assert!(store.expire("verb_1_user_AKIA$dev", 5));
        assert_eq!(store.hgetall("verb_1_user_AKIA$dev").len(), 1);
    }

    #[test]
    fn sweep_drops_expired_entries() {
        let store = Store::new();
        store.set_ex("a", "1", 0);
        store.set_ex("b", "2", 60);
        assert_eq!(store.sweep(), 1);
        assert_eq!(store.get("b").as_deref(), Some("2"));
    }

    #[test]
    fn mget_preserves_order_and_gaps() {
        let store = Store::new();
        store.set_ex("a", "1", 60);
        store.set_ex("c", "3", 60);
        assert_eq!(
            store.mget(&["a", "b", "c"]),
            vec![Some("1".into()), None, Some("3".into())]
        );
    }

    #[test]
    fn scan_matches_globs() {
        let store = Store::new();
        store.hincrby("verb_100_user_AKIA$dev", "GET", 1);
        store.hincrby("verb_101_user_AKIA$dev", "GET", 1);
        store.set_ex("conn_v2_user_up_i_AKIA$dev", "1", 60);
        let mut verbs = store.scan("verb_100_*");
        verbs.sort();
        assert_eq!(verbs, vec!["verb_100_user_AKIA$dev"]);
        assert_eq!(store.scan("conn_v2_*").len(), 1);
        assert_eq!(store.scan("verb_*").len(), 2);
    }

    #[test]
    fn glob_match_handles_literals_and_infixes() {
        assert!(glob_match("abc", "abc"));
        assert!(!glob_match("abc", "abcd"));
        assert!(glob_match("a*c", "abc"));
        assert!(glob_match("a*c", "ac"));
        assert!(!glob_match("a*c", "ab"));
        assert!(glob_match("*", "anything"));
        assert!(glob_match("conn_*_up_*", "conn_v2_up_x"));
    }
}
