// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[tokio::test]
async fn probe_succeeds_against_live_listener() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let probe = Probe::new(
        "127.0.0.1".into(),
        port,
        Duration::from_secs(1),
        Duration::from_secs(10),
    );
    assert!(probe.is_up().await);
}

#[tokio::test]
async fn probe_fails_fast_against_closed_port_and_caches() {
    // Bind then drop to get a port nothing listens on
    let port = {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    };

    let probe = Probe::new(
        "127.0.0.1".into(),
        port,
        Duration::from_millis(500),
        Duration::from_secs(60),
    );
    assert!(!probe.is_up().await);

    // Cached: a listener appearing now is not seen until the TTL lapses
    let _listener = tokio::net::TcpListener::bind(("127.0.0.1", port)).await.ok();
    assert!(!probe.is_up().await);
}
