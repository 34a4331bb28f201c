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

//! The policy generator daemon: three control loops over the KV store,
//! a broadcast server for the policy channel, and a named FIFO that
//! triggers limits reloads.

#[macro_use]
extern crate slog;

mod config;
mod generator;
mod metrics;
mod server;
mod violations;

use clap::{App, Arg};
use config::{Config, RELOAD_LIMITS_REQ};
use generator::{conn_check_loop, limit_share_loop, verb_check_loop, Shared};
use server::{accept_loop, Broadcaster};
use slog::{Drain, Level, Logger};
use std::fs::OpenOptions;
use std::io::Read;
use std::path::Path;
use std::process::exit;
use std::sync::Arc;

fn parse_level(level: Option<&str>) -> Level {
    match level {
        Some("trace") => Level::Trace,
        Some("debug") => Level::Debug,
        Some("warning") | Some("warn") => Level::Warning,
        Some("error") => Level::Error,
        _ => Level::Info,
    }
}

fn build_logger(path: Option<&str>, level: Level) -> std::io::Result<Logger> {
    match path {
        Some(path) if !path.is_empty() => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            let decorator = slog_term::PlainDecorator::new(file);
            let drain = slog_term::FullFormat::new(decorator).build().fuse();
            let drain = slog_async::Async::new(drain)
                .build()
                .filter_level(level)
                .ignore_res();
            Ok(Logger::root(drain, o!()))
        }
        _ => {
            let decorator = slog_term::TermDecorator::new().build();
            let drain = slog_term::FullFormat::new(decorator).build().fuse();
            let drain = slog_async::Async::new(drain)
                .build()
                .filter_level(level)
                .ignore_res();
            Ok(Logger::root(drain, o!()))
        }
    }
}

fn make_fifo(path: &Path) -> std::io::Result<()> {
    let cpath = std::ffi::CString::new(path.to_string_lossy().as_bytes())
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
    let r = unsafe { libc::mkfifo(cpath.as_ptr(), 0o666) };
    if r != 0 {
        let err = std::io::Error::last_os_error();
        if err.raw_os_error() != Some(libc::EEXIST) {
            return Err(err);
        }
    }
    unsafe {
        libc::chmod(cpath.as_ptr(), 0o666);
    }
    Ok(())
}

/// Block on the FIFO; each writer that sends `reload_limits` arms a
/// reload for the next tick. Opening a FIFO for reading blocks until a
/// writer appears, so this lives on its own thread.
fn monitor_reload_fifo(shared: Arc<Shared>) {
    let path = shared.config.reload_fifo_path();
    loop {
        let mut fifo = match std::fs::File::open(&path) {
            Ok(fifo) => fifo,
            Err(e) => {
                error!(shared.logger, "failed to open reload FIFO: {}", e);
                std::thread::sleep(std::time::Duration::from_secs(5));
                continue;
            }
        };
        info!(shared.logger, "Reload FIFO opened");
        let mut data = String::new();
        if fifo.read_to_string(&mut data).is_err() {
            continue;
        }
        for request in data.lines() {
            if request.trim() == RELOAD_LIMITS_REQ {
                info!(shared.logger, "Received FIFO reload_limits request");
                shared.request_reload();
            }
        }
        info!(shared.logger, "Writer closed the FIFO");
    }
}

fn main() {
    let matches = App::new("weir-polygen")
        .about("Weir QoS Policy Generator")
        .arg(
            Arg::with_name("config")
                .help("Path to the YAML config file")
                .required(true)
                .index(1),
        )
        .get_matches();
    let config_path = matches.value_of("config").unwrap_or_default();

    let raw = match std::fs::read_to_string(config_path) {
        Ok(raw) => raw,
        Err(e) => {
            eprintln!(
                "ERROR: Failed to open config file '{}': {}. Terminating...",
                config_path, e
            );
            exit(-libc::ENOENT);
        }
    };
    let config: Config = match serde_yaml::from_str(&raw) {
        Ok(config) => config,
        Err(e) => {
            eprintln!(
                "ERROR: Failed to parse config file '{}': {}. Terminating...",
                config_path, e
            );
            exit(-libc::EINVAL);
        }
    };

    let level = parse_level(config.log_level.as_deref());
    let logger = match build_logger(config.log_file_name.as_deref(), level) {
        Ok(logger) => logger,
        Err(e) => {
            eprintln!("ERROR: Failed to open log file: {}. Terminating...", e);
            exit(-libc::ENOENT);
        }
    };
    info!(logger, "Config file {} loaded", config_path);

    let (host, port) = match config.redis_host_port() {
        Some(pair) => pair,
        None => {
            error!(logger, "Can't parse qos redis server address '{}'", config.redis_server);
            exit(-libc::EINVAL);
        }
    };

    let listener = match async_std::task::block_on(async_std::net::TcpListener::bind(
        config.policy_listen.as_str(),
    )) {
        Ok(listener) => listener,
        Err(e) => {
            error!(logger, "failed to bind policy channel listener: {}", e);
            exit(-e.raw_os_error().unwrap_or(1));
        }
    };

    let broadcaster = Broadcaster::new(&logger, config.policy_msg_queue_size);
    let shared = Arc::new(Shared::new(&logger, config, broadcaster.clone()));

    if let Err(e) = make_fifo(&shared.config.reload_fifo_path()) {
        error!(logger, "failed to create reload FIFO: {}", e);
        exit(-e.raw_os_error().unwrap_or(1));
    }
    {
        let shared = shared.clone();
        std::thread::spawn(move || monitor_reload_fifo(shared));
    }

    async_std::task::spawn(accept_loop(logger.clone(), broadcaster, listener));

    let verb_client = weir_kv::Client::new(&logger, &host, port);
    let conn_client = weir_kv::Client::new(&logger, &host, port);
    let share_client = weir_kv::Client::new(&logger, &host, port);
    info!(logger, "Connecting to redisServer {}", shared.config.redis_server);

    async_std::task::spawn(verb_check_loop(shared.clone(), verb_client));
    async_std::task::spawn(conn_check_loop(shared.clone(), conn_client));
    info!(logger, "PolicyGenerator initialization completed");
    async_std::task::block_on(limit_share_loop(shared, share_client));
}
