// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fixed-length overwriting ring of recent IMU samples.
//!
//! Sized to the detector's pre-event window. One producer (the sampling
//! loop), one consumer (detector snapshots). Overwrites silently; never
//! yields more than its capacity, in strict insertion order.

use jalopy_core::ImuSample;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

#[derive(Clone)]
pub struct InertialRing {
    inner: Arc<Mutex<Inner>>,
}

struct Inner {
    buf: VecDeque<ImuSample>,
    capacity: usize,
}

impl InertialRing {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                buf: VecDeque::with_capacity(capacity),
                capacity: capacity.max(1),
            })),
        }
    }

    pub fn push(&self, sample: ImuSample) {
        let mut inner = self.inner.lock();
        if inner.buf.len() == inner.capacity {
            inner.buf.pop_front();
        }
        inner.buf.push_back(sample);
    }

    /// Copy the current contents, oldest first
    pub fn snapshot(&self) -> Vec<ImuSample> {
        self.inner.lock().buf.iter().copied().collect()
    }

    /// Samples with timestamps within the trailing `window_ms` of the
    /// newest sample
    pub fn window(&self, window_ms: u64) -> Vec<ImuSample> {
        let inner = self.inner.lock();
        let Some(newest) = inner.buf.back() else {
            return Vec::new();
        };
        let floor = newest.ts_ms.saturating_sub(window_ms);
        inner.buf.iter().filter(|s| s.ts_ms >= floor).copied().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().buf.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().capacity
    }
}

#[cfg(test)]
#[path = "ring_tests.rs"]
mod tests;
