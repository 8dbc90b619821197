// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire encoding for the remote sink.
//!
//! Readings are grouped into labeled series with a stable label set per
//! sensor class: `__name__` is `vehicle_{class}_{metric}`, plus the
//! reading's own dimension labels. Timestamps stay at millisecond
//! resolution. The JSON document is Snappy-compressed for the wire.

use jalopy_core::Reading;
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WireError {
    #[error("encode failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("compression failed: {0}")]
    Snappy(#[from] snap::Error),
}

#[derive(Serialize)]
struct Series<'a> {
    labels: BTreeMap<&'a str, &'a str>,
    /// [ts_ms, value] pairs, ascending by id order of the batch
    samples: Vec<(u64, f64)>,
}

#[derive(Serialize)]
struct Payload<'a> {
    series: Vec<Series<'a>>,
}

/// Encode one batch of (id, reading) rows. Returns the compressed
/// payload and the number of samples in it.
pub fn encode_batch(rows: &[(u64, Reading)]) -> Result<(Vec<u8>, usize), WireError> {
    // Series key: metric name + the reading's own labels, ordered so the
    // label set per class is stable run to run.
    let mut series: BTreeMap<(String, Vec<(&str, &str)>), Vec<(u64, f64)>> = BTreeMap::new();
    let mut samples = 0usize;

    for (_, reading) in rows {
        for (metric, value) in &reading.values {
            let name = format!("vehicle_{}_{}", reading.class, metric);
            let dims: Vec<(&str, &str)> =
                reading.labels.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
            series.entry((name, dims)).or_default().push((reading.ts_ms, *value));
            samples += 1;
        }
    }

    let payload = Payload {
        series: series
            .iter()
            .map(|((name, dims), points)| {
                let mut labels: BTreeMap<&str, &str> = dims.iter().copied().collect();
                labels.insert("__name__", name.as_str());
                Series { labels, samples: points.clone() }
            })
            .collect(),
    };

    let json = serde_json::to_vec(&payload)?;
    let compressed = snap::raw::Encoder::new().compress_vec(&json)?;
    Ok((compressed, samples))
}

#[cfg(test)]
#[path = "wire_tests.rs"]
mod tests;
