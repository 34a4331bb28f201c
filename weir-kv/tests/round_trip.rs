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

use async_std::net::TcpListener;
use async_std::task;
use slog::{o, Discard, Logger};
use std::sync::Arc;
use weir_kv::{serve, Client, Store};

async fn start_store() -> (Logger, u16) {
    let logger = Logger::root(Discard, o!());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let server_logger = logger.clone();
    task::spawn(async move {
        let _ = serve(server_logger, Arc::new(Store::new()), listener).await;
    });
    (logger, port)
}

#[test]
fn pipelined_updates_then_queries() {
    task::block_on(async {
        let (logger, port) = start_store().await;
        let mut client = Client::new(&logger, "127.0.0.1", port);
        assert!(client.connect().await);
        assert!(client.connected());

        client.hincrby("verb_100_user_AKIA$dev", "GET", 2).await;
        client.hincrby("verb_100_user_AKIA$dev", "GET", 1).await;
        client.hincrby("verb_100_user_AKIA$dev", "bnd_dwn", 4096).await;
        client.expire("verb_100_user_AKIA$dev", 60).await;
        client.set_ex("conn_v2_user_up_edge-a-80_AKIA$dev", 7, 60).await;
        client.drain_replies().await;
        assert_eq!(client.failures(), 0);

        let mut fields = client.hgetall("verb_100_user_AKIA$dev").await.unwrap();
        fields.sort();
        assert_eq!(fields, vec![("GET".to_string(), 3), ("bnd_dwn".to_string(), 4096)]);

        let conns = client.scan("conn_v2_*").await.unwrap();
        assert_eq!(conns, vec!["conn_v2_user_up_edge-a-80_AKIA$dev".to_string()]);

        let counts = client
            .mget(&[conns[0].clone(), "missing".to_string()])
            .await
            .unwrap();
        assert_eq!(counts, vec![Some("7".to_string()), None]);
    });
}

#[test]
fn error_replies_are_counted_not_fatal() {
    task::block_on(async {
        let (logger, port) = start_store().await;
        let mut client = Client::new(&logger, "127.0.0.1", port);
        assert!(client.connect().await);

        client.submit("definitely not a command").await;
        client.hincrby("verb_100_user_AKIA$dev", "GET", 1).await;
        client.drain_replies().await;
        assert_eq!(client.failures(), 1);
        assert!(client.connected());

        // The stream is still in protocol sync
        let fields = client.hgetall("verb_100_user_AKIA$dev").await.unwrap();
        assert_eq!(fields, vec![("GET".to_string(), 1)]);
    });
}

#[test]
fn reconnect_flag_drops_the_connection() {
    task::block_on(async {
        let (logger, port) = start_store().await;
        let mut client = Client::new(&logger, "localhost", port);
        assert!(client.connect().await);

        // localhost still resolves to the connected IP
        client.check_needs_reconnect().await;
        client.reconnect_if_needed();
        assert!(client.connected());
    });
}
