// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Remote metrics sink seam.
//!
//! The uplink encodes batches (labeled series, Snappy-compressed) and
//! hands opaque payloads here. The sink classifies rejections so the
//! uplink can distinguish "try later" from "these samples will never be
//! accepted".

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("sink unreachable: {0}")]
    Unreachable(String),
    #[error("sink rejected batch with status {status}")]
    Rejected { status: u16 },
    #[error("samples older than acceptance window")]
    TooOld {
        /// Oldest accepted timestamp when the sink names one
        cutoff_ms: Option<u64>,
    },
}

#[async_trait]
pub trait MetricsSink: Clone + Send + Sync + 'static {
    /// Push one encoded batch. `samples` is carried for logging only.
    async fn push(&self, payload: Vec<u8>, samples: usize) -> Result<(), SinkError>;
}

/// POSTs Snappy-compressed payloads to the configured write URL
#[derive(Clone)]
pub struct HttpMetricsSink {
    url: String,
    client: reqwest::Client,
}

impl HttpMetricsSink {
    pub fn new(url: String, timeout: Duration) -> Result<Self, SinkError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SinkError::Unreachable(e.to_string()))?;
        Ok(Self { url, client })
    }

    /// Pull the acceptance cutoff out of a rejection body when the sink
    /// names one, e.g. `timestamp too old: oldest acceptable 1712000000000`.
    fn parse_cutoff_ms(body: &str) -> Option<u64> {
        body.split(|c: char| !c.is_ascii_digit())
            .filter_map(|tok| tok.parse::<u64>().ok())
            // Plausible epoch-milliseconds only; ignores small numerals
            .find(|n| *n > 1_000_000_000_000)
    }
}

#[async_trait]
impl MetricsSink for HttpMetricsSink {
    async fn push(&self, payload: Vec<u8>, samples: usize) -> Result<(), SinkError> {
        let response = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .header("Content-Encoding", "snappy")
            .body(payload)
            .send()
            .await
            .map_err(|e| SinkError::Unreachable(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            tracing::debug!(samples, "batch accepted by sink");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        if status.as_u16() == 400 && body.to_ascii_lowercase().contains("too old") {
            return Err(SinkError::TooOld { cutoff_ms: Self::parse_cutoff_ms(&body) });
        }
        Err(SinkError::Rejected { status: status.as_u16() })
    }
}

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(coverage_nightly, coverage(off))]
mod fake {
    use super::{MetricsSink, SinkError};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::Arc;

    /// Scripted outcome for the next push
    pub enum PushOutcome {
        Accept,
        Unreachable,
        TooOld { cutoff_ms: Option<u64> },
    }

    #[derive(Default)]
    struct FakeSinkState {
        script: VecDeque<PushOutcome>,
        accepted: Vec<(Vec<u8>, usize)>,
        pushes: usize,
    }

    /// Fake sink with scripted outcomes; accepts once the script runs out
    #[derive(Clone, Default)]
    pub struct FakeSink {
        inner: Arc<Mutex<FakeSinkState>>,
    }

    impl FakeSink {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn script(&self, outcome: PushOutcome) {
            self.inner.lock().script.push_back(outcome);
        }

        /// Payloads that were accepted, with their sample counts
        pub fn accepted(&self) -> Vec<(Vec<u8>, usize)> {
            self.inner.lock().accepted.clone()
        }

        pub fn pushes(&self) -> usize {
            self.inner.lock().pushes
        }
    }

    #[async_trait]
    impl MetricsSink for FakeSink {
        async fn push(&self, payload: Vec<u8>, samples: usize) -> Result<(), SinkError> {
            let mut state = self.inner.lock();
            state.pushes += 1;
            match state.script.pop_front() {
                None | Some(PushOutcome::Accept) => {
                    state.accepted.push((payload, samples));
                    Ok(())
                }
                Some(PushOutcome::Unreachable) => {
                    Err(SinkError::Unreachable("fake outage".into()))
                }
                Some(PushOutcome::TooOld { cutoff_ms }) => Err(SinkError::TooOld { cutoff_ms }),
            }
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeSink, PushOutcome};

#[cfg(test)]
#[path = "sink_tests.rs"]
mod tests;
