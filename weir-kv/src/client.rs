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
use crate::proto::Reply;
use async_std::io::BufReader;
use async_std::net::{TcpStream, ToSocketAddrs};
use async_std::prelude::*;
use slog::Logger;
use std::net::IpAddr;

struct Conn {
    stream: TcpStream,
    reader: BufReader<TcpStream>,
    ip: IpAddr,
}

/// Client side of the store protocol.
///
/// Two usage modes share one type. The collector pipelines updates:
/// [`submit`](Client::submit) writes fire-and-forget commands and
/// [`drain_replies`](Client::drain_replies) later consumes the answers,
/// counting (but not propagating) per-command failures. The generator
/// queries: [`query`](Client::query) and the typed wrappers run one
/// command to completion.
///
/// A client must only ever be driven by a single task; replies are
/// matched to commands purely by ordering.
pub struct Client {
    logger: Logger,
    conn_id: String,
    host: String,
    port: u16,
    conn: Option<Conn>,
    needs_reconnect: bool,
    pending: usize,
    total_sent: u64,
    total_failures: u64,
}

impl Client {
    pub fn new(logger: &Logger, host: &str, port: u16) -> Self {
        Self {
            logger: logger.clone(),
            conn_id: format!("QoS({}:{})", host, port),
            host: host.to_string(),
            port,
            conn: None,
            needs_reconnect: false,
            pending: 0,
            total_sent: 0,
            total_failures: 0,
        }
    }

    pub fn connected(&self) -> bool {
        self.conn.is_some()
    }

    pub fn failures(&self) -> u64 {
        self.total_failures
    }

    /// Attempt to connect. Failures are logged and absorbed; the caller
    /// decides when to retry.
    pub async fn connect(&mut self) -> bool {
        if self.conn.is_some() {
            error!(self.logger, "already connected to {}", self.conn_id);
            return true;
        }
        info!(self.logger, "initiating connection attempt to {}", self.conn_id);
        let addr = match (self.host.as_str(), self.port).to_socket_addrs().await {
            Ok(mut addrs) => match addrs.next() {
                Some(addr) => addr,
                None => {
                    error!(self.logger, "no addresses for {}", self.conn_id);
                    return false;
                }
            },
            Err(e) => {
                error!(self.logger, "failed to resolve {}: {}", self.conn_id, e);
                return false;
            }
        };
        match TcpStream::connect(addr).await {
            Ok(stream) => {
                let _ = stream.set_nodelay(true);
                info!(self.logger, "connected to {} with IP addr {}", self.conn_id, addr.ip());
                self.conn = Some(Conn {
                    reader: BufReader::new(stream.clone()),
                    stream,
                    ip: addr.ip(),
                });
                self.pending = 0;
                true
            }
            Err(e) => {
                error!(self.logger, "failed to connect to {}: {}", self.conn_id, e);
                false
            }
        }
    }

    pub fn disconnect(&mut self) {
        if self.conn.take().is_some() {
            info!(self.logger, "disconnected from {}", self.conn_id);
        }
        // Replies to anything still in flight are gone with the stream
        self.pending = 0;
    }

    /// Re-resolve the host and flag a reconnect when the address no
    /// longer matches the connected IP. DNS failures only log; the
    /// existing connection stays.
    pub async fn check_needs_reconnect(&mut self) {
        let current_ip = match &self.conn {
            Some(conn) => conn.ip,
            None => return,
        };
        if self.needs_reconnect {
            return;
        }
        match (self.host.as_str(), self.port).to_socket_addrs().await {
            Ok(addrs) => {
                let ip_changed = !addrs.into_iter().any(|addr| addr.ip() == current_ip);
                if ip_changed {
                    info!(self.logger, "{} needs to reconnect because of IP change", self.conn_id);
                    self.needs_reconnect = true;
                }
            }
            Err(e) => {
                error!(self.logger, "failed to check connectivity to {}: {}", self.conn_id, e);
            }
        }
    }

    /// Act on a pending reconnect flag by dropping the connection; the
    /// caller's normal connect cycle brings it back.
    pub fn reconnect_if_needed(&mut self) {
        if self.needs_reconnect {
            self.disconnect();
            self.needs_reconnect = false;
        }
    }

    /// Write one pipelined command. Errors drop the connection and count
    /// as a failure; the next flush cycle reconnects.
    pub async fn submit(&mut self, cmd: &str) {
        trace!(self.logger, "kv command: {}", cmd);
        self.total_sent += 1;
        let conn = match &mut self.conn {
            Some(conn) => conn,
            None => {
                self.total_failures += 1;
                return;
            }
        };
        let mut line = cmd.to_string();
        line.push('\n');
        if let Err(e) = conn.stream.write_all(line.as_bytes()).await {
            error!(self.logger, "send to {} failed: {}", self.conn_id, e);
            self.total_failures += 1;
            self.disconnect();
            return;
        }
        self.pending += 1;
    }

    /// Consume the replies for every pipelined command submitted so far.
    /// Error replies are counted and logged, not returned; recovery is
    /// the next flush or reconnect, exactly like a lost datagram.
    pub async fn drain_replies(&mut self) {
        while self.pending > 0 {
            match self.read_reply().await {
                Ok(reply) => {
                    self.pending -= 1;
                    if let Reply::Error(msg) = reply {
                        error!(self.logger, "{} server reply error: {}", self.conn_id, msg);
                        self.total_failures += 1;
                    }
                }
                Err(e) => {
                    error!(self.logger, "{} read failed: {}", self.conn_id, e);
                    self.total_failures += 1;
                    self.disconnect();
                    return;
                }
            }
        }
    }

    async fn read_reply(&mut self) -> Result<Reply> {
        let conn = self.conn.as_mut().ok_or(Error::NotConnected)?;
        let mut line = String::new();
        let n = conn.reader.read_line(&mut line).await?;
        if n == 0 {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "connection closed",
            )));
        }
        Reply::parse(&line)
    }

    /// Run one command to completion. Only valid with no pipelined
    /// commands outstanding.
    pub async fn query(&mut self, cmd: &str) -> Result<Reply> {
        if self.pending > 0 {
            return Err(Error::Protocol(
                "query with pipelined commands outstanding".to_string(),
            ));
        }
        let conn = self.conn.as_mut().ok_or(Error::NotConnected)?;
        let mut line = cmd.to_string();
        line.push('\n');
        if let Err(e) = conn.stream.write_all(line.as_bytes()).await {
            self.disconnect();
            return Err(Error::Io(e));
        }
        match self.read_reply().await {
            Ok(Reply::Error(msg)) => Err(Error::Server(msg)),
            Ok(reply) => Ok(reply),
            Err(e) => {
                self.disconnect();
                Err(e)
            }
        }
    }

    pub async fn hincrby(&mut self, key: &str, field: &str, delta: i64) {
        self.submit(&format!("hincrby {} {} {}", key, field, delta)).await;
    }

    pub async fn expire(&mut self, key: &str, ttl_secs: u64) {
        self.submit(&format!("expire {} {}", key, ttl_secs)).await;
    }

    pub async fn set_ex(&mut self, key: &str, value: i64, ttl_secs: u64) {
        self.submit(&format!("set {} {} ex {}", key, value, ttl_secs)).await;
    }

    /// All keys currently matching a glob pattern. Duplicates are
    /// permitted by the scan contract, so callers dedup.
    pub async fn scan(&mut self, pattern: &str) -> Result<Vec<String>> {
        match self.query(&format!("scan {}", pattern)).await? {
            Reply::Array(items) => Ok(items.into_iter().flatten().collect()),
            other => Err(Error::Protocol(format!("scan got {:?}", other))),
        }
    }

    pub async fn mget(&mut self, keys: &[String]) -> Result<Vec<Option<String>>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        match self.query(&format!("mget {}", keys.join(" "))).await? {
            Reply::Array(items) => Ok(items),
            other => Err(Error::Protocol(format!("mget got {:?}", other))),
        }
    }

    pub async fn hgetall(&mut self, key: &str) -> Result<Vec<(String, i64)>> {
        match self.query(&format!("hgetall {}", key)).await? {
            Reply::Array(items) => {
                let items: Vec<String> = items.into_iter().flatten().collect();
                let mut fields = Vec::with_capacity(items.len() / 2);
                for pair in items.chunks(2) {
                    match pair {
                        [field, value] => {
                            let value = value.parse().map_err(|_| {
                                Error::Protocol(format!("non-integer hash value '{}'", value))
                            })?;
                            fields.push((field.clone(), value));
                        }
                        _ => {
                            return Err(Error::Protocol("odd hgetall reply".to_string()));
                        }
                    }
                }
                Ok(fields)
            }
            other => Err(Error::Protocol(format!("hgetall got {:?}", other))),
        }
    }
}
