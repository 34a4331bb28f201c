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

//! The collector daemon: N workers, each with its own reuse-port ingress
//! socket, bounded queue, consumer task and KV connection. Worker 0 runs
//! on the main thread for debugging convenience.

#[macro_use]
extern crate slog;

mod config;
mod socket;
mod worker;

use clap::{App, Arg};
use config::Config;
use futures::channel::mpsc::channel;
use slog::{Drain, Level, Logger};
use std::fs::OpenOptions;
use std::io::Write;
use std::process::exit;
use std::thread;
use worker::{consumer_loop, producer_loop, system_clock, Processor};

/// Drain that writes the bare message, used for the access log where the
/// forwarded JSON line is the whole record.
struct LineDrain<W: std::io::Write + Send>(std::sync::Mutex<W>);

impl<W: std::io::Write + Send> Drain for LineDrain<W> {
    type Ok = ();
    type Err = std::io::Error;

    fn log(
        &self,
        record: &slog::Record,
        _values: &slog::OwnedKVList,
    ) -> std::result::Result<(), std::io::Error> {
        let mut out = self.0.lock().unwrap();
        writeln!(out, "{}", record.msg())
    }
}

/// Returns the level plus the raw value when it was unrecognised, so the
/// complaint can go to the logger built with the fallback.
fn parse_level(level: Option<&str>) -> (Level, Option<String>) {
    match level {
        None => (Level::Info, None),
        Some("trace") => (Level::Trace, None),
        Some("debug") => (Level::Debug, None),
        Some("info") => (Level::Info, None),
        Some("warning") | Some("warn") => (Level::Warning, None),
        Some("error") => (Level::Error, None),
        Some(other) => (Level::Info, Some(other.to_string())),
    }
}

fn build_logger(path: Option<&str>, level: Level) -> std::io::Result<Logger> {
    match path {
        Some(path) if !path.is_empty() => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            let decorator = slog_term::PlainDecorator::new(file);
            let drain = slog_term::FullFormat::new(decorator).build().fuse();
            let drain = slog_async::Async::new(drain).build().filter_level(level).ignore_res();
            Ok(Logger::root(drain, o!()))
        }
        _ => {
            let decorator = slog_term::TermDecorator::new().build();
            let drain = slog_term::FullFormat::new(decorator).build().fuse();
            let drain = slog_async::Async::new(drain).build().filter_level(level).ignore_res();
            Ok(Logger::root(drain, o!()))
        }
    }
}

fn build_access_logger(path: Option<&str>) -> std::io::Result<Logger> {
    match path {
        Some(path) if !path.is_empty() => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Ok(Logger::root(
                LineDrain(std::sync::Mutex::new(file)).fuse(),
                o!(),
            ))
        }
        _ => {
            let drain = LineDrain(std::sync::Mutex::new(std::io::stdout()));
            Ok(Logger::root(drain.fuse(), o!()))
        }
    }
}

fn run_worker(logger: Logger, access_logger: Logger, config: Config, worker_id: usize) {
    info!(
        logger,
        "started the child syslog server {} with pid {}",
        worker_id,
        std::process::id()
    );

    let (socket, buffer_len) = match socket::create_socket(&logger, config.port) {
        Ok(pair) => pair,
        Err(e) => {
            error!(logger, "Failed to create socket: {}", e);
            exit(-e.raw_os_error().unwrap_or(1));
        }
    };

    let (host, port) = match config.redis_host_port() {
        Ok(pair) => pair,
        Err(e) => {
            error!(logger, "{}", e);
            exit(-libc::EINVAL);
        }
    };

    async_std::task::block_on(async move {
        let (tx, rx) = channel(config.msg_queue_size);
        let client = weir_kv::Client::new(&logger, &host, port);
        let processor = Processor::new(&logger, &config, worker_id, system_clock(), client);

        let consumer = async_std::task::spawn(consumer_loop(processor, rx));
        producer_loop(
            logger.clone(),
            access_logger,
            async_std::net::UdpSocket::from(socket),
            buffer_len,
            tx,
            worker_id,
        )
        .await;
        consumer.await;
    });
}

fn main() {
    let matches = App::new("weir-collector")
        .about("Aggregates weir edge events into the shared KV store")
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

    let (level, bad_level) = parse_level(config.log_level.as_deref());
    let logger = match build_logger(config.log_file_name.as_deref(), level) {
        Ok(logger) => logger,
        Err(e) => {
            eprintln!("ERROR: Failed to open log file: {}. Terminating...", e);
            exit(-libc::ENOENT);
        }
    };
    if let Some(bad) = bad_level {
        error!(
            logger,
            "Unrecognised log level config value '{}', defaulting to info", bad
        );
    }
    let access_logger = match build_access_logger(config.access_log_file_name.as_deref()) {
        Ok(logger) => logger,
        Err(e) => {
            error!(logger, "Failed to open access log file: {}", e);
            exit(-libc::ENOENT);
        }
    };

    info!(
        logger,
        "started the main syslog server using the cfg file {}", config_path
    );

    // Leave one worker on the main thread for the convenience of
    // debugging
    let mut workers = Vec::new();
    for worker_id in 1..config.num_of_syslog_servers {
        let logger = logger.clone();
        let access_logger = access_logger.clone();
        let config = config.clone();
        workers.push(thread::spawn(move || {
            run_worker(logger, access_logger, config, worker_id)
        }));
    }
    run_worker(logger, access_logger, config, 0);
    for handle in workers {
        let _ = handle.join();
    }
}
