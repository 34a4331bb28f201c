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

use crate::proto::Reply;
use crate::store::Store;
use async_std::io::BufReader;
use async_std::net::{TcpListener, TcpStream};
use async_std::prelude::*;
use async_std::task;
use slog::Logger;
use std::io;
use std::sync::Arc;
use std::time::Duration;

const SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Accept loop: one task per client connection, plus a sweeper task that
/// evicts expired entries once a second.
pub async fn serve(logger: Logger, store: Arc<Store>, listener: TcpListener) -> io::Result<()> {
    info!(logger, "kv store listening"; "addr" => %listener.local_addr()?);

    let sweep_store = store.clone();
    let sweep_logger = logger.clone();
    task::spawn(async move {
        let mut ticks = async_std::stream::interval(SWEEP_INTERVAL);
        while ticks.next().await.is_some() {
            let removed = sweep_store.sweep();
            if removed > 0 {
                debug!(sweep_logger, "swept expired keys"; "removed" => removed, "live" => sweep_store.len());
            }
        }
    });

    let mut incoming = listener.incoming();
    while let Some(stream) = incoming.next().await {
        match stream {
            Ok(stream) => {
                task::spawn(connection(logger.clone(), store.clone(), stream));
            }
            Err(e) => warn!(logger, "accept failed"; "error" => %e),
        }
    }
    Ok(())
}

async fn connection(logger: Logger, store: Arc<Store>, stream: TcpStream) {
    let peer = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "?".to_string());
    debug!(logger, "kv client connected"; "peer" => %peer);

    let mut writer = stream.clone();
    let reader = BufReader::new(stream);
    let mut lines = reader.lines();
    while let Some(line) = lines.next().await {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                debug!(logger, "kv client read failed"; "peer" => %peer, "error" => %e);
                break;
            }
        };
        if line.is_empty() {
            continue;
        }
        let reply = dispatch(&store, &line);
        let mut out = reply.encode();
        out.push('\n');
        if let Err(e) = writer.write_all(out.as_bytes()).await {
            debug!(logger, "kv client write failed"; "peer" => %peer, "error" => %e);
            break;
        }
    }
    debug!(logger, "kv client disconnected"; "peer" => %peer);
}

/// Execute one command line. Keys never contain whitespace, so commands
/// split on it.
fn dispatch(store: &Store, line: &str) -> Reply {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let cmd = match tokens.first() {
        Some(cmd) => cmd.to_ascii_lowercase(),
        None => return Reply::Error("empty command".to_string()),
    };
    match (cmd.as_str(), &tokens[1..]) {
        ("ping", []) => Reply::Ok,
        ("hincrby", [key, field, delta]) => match delta.parse() {
            Ok(delta) => Reply::Int(store.hincrby(key, field, delta)),
            Err(_) => Reply::Error(format!("bad increment '{}'", delta)),
        },
        ("expire", [key, ttl]) => match ttl.parse() {
            Ok(ttl) => Reply::Int(i64::from(store.expire(key, ttl))),
            Err(_) => Reply::Error(format!("bad ttl '{}'", ttl)),
        },
        ("set", [key, value, ex, ttl]) if ex.eq_ignore_ascii_case("ex") => match ttl.parse() {
            Ok(ttl) => {
                store.set_ex(key, value, ttl);
                Reply::Ok
            }
            Err(_) => Reply::Error(format!("bad ttl '{}'", ttl)),
        },
        ("get", [key]) => match store.get(key) {
            Some(value) => Reply::Bulk(value),
            None => Reply::Nil,
        },
        ("mget", keys) if !keys.is_empty() => Reply::Array(store.mget(keys)),
        ("hgetall", [key]) => Reply::Array(
            store
                .hgetall(key)
                .into_iter()
                .flat_map(|(field, value)| vec![Some(field), Some(value.to_string())])
                .collect(),
        ),
        ("scan", [pattern]) => Reply::Array(store.scan(pattern).into_iter().map(Some).collect()),
        _ => Reply::Error(format!("unknown command '{}'", line)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_covers_the_command_set() {
        let store = Store::new();
        assert_eq!(dispatch(&store, "ping"), Reply::Ok);
        assert_eq!(
            dispatch(&store, "hincrby verb_1_user_AKIA$dev GET 2"),
            Reply::Int(2)
        );
        assert_eq!(dispatch(&store, "expire verb_1_user_AKIA$dev 5"), Reply::Int(1));
        assert_eq!(
            dispatch(&store, "set conn_v2_user_up_i_AKIA$dev 7 ex 60"),
            Reply::Ok
        );
        assert_eq!(
            dispatch(&store, "get conn_v2_user_up_i_AKIA$dev"),
            Reply::Bulk("7".into())
        );
        assert_eq!(
            dispatch(&store, "mget conn_v2_user_up_i_AKIA$dev missing"),
            Reply::Array(vec![Some("7".into()), None])
        );
        assert_eq!(
            dispatch(&store, "hgetall verb_1_user_AKIA$dev"),
            Reply::Array(vec![Some("GET".into()), Some("2".into())])
        );
        assert_eq!(
            dispatch(&store, "scan verb_*"),
            Reply::Array(vec![Some("verb_1_user_AKIA$dev".into())])
        );
    }

    #[test]
    fn bad_commands_get_error_replies() {
        let store = Store::new();
        assert!(dispatch(&store, "nonsense a b").is_error());
        assert!(dispatch(&store, "hincrby k f ten").is_error());
        assert!(dispatch(&store, "set k v px 10").is_error());
        assert!(dispatch(&store, "mget").is_error());
    }
}
