// src/registry/window.rs

use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};

/// Milliseconds since the Unix epoch. `0` is the "unset" value for deadlines.
pub type UnixMillis = u64;

/// Rolling counters for one fixed-size time bucket.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WindowStats {
    /// Exclusive end of the accounting period, aligned to the window size.
    pub expires_at: UnixMillis,
    pub successes: u64,
    pub failures: u64,
    /// Running mean over successful outcomes only.
    pub latency_average: f64,
    /// Largest latency seen among successful outcomes.
    pub latency_spike: u64,
}

impl WindowStats {
    pub fn empty(expires_at: UnixMillis) -> Self {
        Self {
            expires_at,
            successes: 0,
            failures: 0,
            latency_average: 0.0,
            latency_spike: 0,
        }
    }

    /// Folds a successful call into the incremental mean and the spike.
    pub fn record_success(&mut self, latency_ms: u64) {
        self.successes += 1;
        let n = self.successes as f64;
        self.latency_average = (self.latency_average * (n - 1.0) + latency_ms as f64) / n;
        self.latency_spike = self.latency_spike.max(latency_ms);
    }

    pub fn record_failure(&mut self) {
        self.failures += 1;
    }

    pub fn total(&self) -> u64 {
        self.successes + self.failures
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// Window boundaries derived from a single evaluation instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowBounds {
    pub current: UnixMillis,
    pub previous: UnixMillis,
}

impl WindowBounds {
    /// `current = floor(now / w) * w + w`, `previous = current - w`.
    ///
    /// Fails when `current` does not fit in a `u64`, i.e. `now` lies in the
    /// last window before `u64::MAX`, or when `window_ms` is zero.
    pub fn at(now: UnixMillis, window_ms: u64) -> Result<Self> {
        let current = now
            .checked_div(window_ms)
            .and_then(|n| n.checked_mul(window_ms))
            .and_then(|start| start.checked_add(window_ms))
            .ok_or_else(|| {
                AppError::validation(
                    "now",
                    format!("instant {now} is outside the representable window range"),
                )
            })?;
        Ok(Self {
            current,
            previous: current - window_ms,
        })
    }
}
