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

#[macro_use]
extern crate slog;

use async_std::net::TcpListener;
use async_std::task;
use clap::{App, Arg};
use slog::Drain;
use std::process::exit;
use std::sync::Arc;
use weir_kv::{serve, Store};

fn main() {
    let matches = App::new("weir-kv")
        .about("TTL-indexed KV store for weir usage aggregates")
        .arg(
            Arg::with_name("listen")
                .short("l")
                .long("listen")
                .value_name("ADDR")
                .help("Address to listen on")
                .default_value("0.0.0.0:7379")
                .takes_value(true),
        )
        .get_matches();

    let decorator = slog_term::TermDecorator::new().build();
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let drain = slog_async::Async::new(drain).build().fuse();
    let logger = slog::Logger::root(drain, o!());

    let listen = matches.value_of("listen").unwrap_or_default().to_string();
    let store = Arc::new(Store::new());

    if let Err(e) = task::block_on(async {
        let listener = TcpListener::bind(&listen).await?;
        serve(logger.clone(), store, listener).await
    }) {
        error!(logger, "kv store failed"; "error" => %e);
        exit(-e.raw_os_error().unwrap_or(1));
    }
}
