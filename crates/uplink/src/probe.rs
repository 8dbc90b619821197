// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Connectivity probe.
//!
//! A TCP connect against the sink's host:port with a short timeout,
//! cached briefly so the uplink does not thrash a marginal cellular
//! link. While "down" the uplink does no work; the store is the buffer.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;

#[derive(Clone)]
pub struct Probe {
    host: String,
    port: u16,
    timeout: Duration,
    cache_ttl: Duration,
    cached: Arc<Mutex<Option<(tokio::time::Instant, bool)>>>,
}

impl Probe {
    pub fn new(host: String, port: u16, timeout: Duration, cache_ttl: Duration) -> Self {
        Self { host, port, timeout, cache_ttl, cached: Arc::default() }
    }

    pub async fn is_up(&self) -> bool {
        if let Some((at, up)) = *self.cached.lock() {
            if at.elapsed() < self.cache_ttl {
                return up;
            }
        }

        let addr = format!("{}:{}", self.host, self.port);
        let up = matches!(
            tokio::time::timeout(self.timeout, TcpStream::connect(&addr)).await,
            Ok(Ok(_))
        );
        if !up {
            tracing::debug!(addr, "connectivity probe failed");
        }
        *self.cached.lock() = Some((tokio::time::Instant::now(), up));
        up
    }
}

#[cfg(test)]
#[path = "probe_tests.rs"]
mod tests;
