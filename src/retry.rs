// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Retry logic with exponential backoff for collaborator HTTP calls.
//!
//! Transient failures (429, 5xx, connection errors) are retried with jittered
//! exponential backoff; permanent failures (other 4xx) fail immediately.

use anyhow::Result;
use reqwest::StatusCode;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

/// HTTP retry initial interval (50ms)
const HTTP_INITIAL_INTERVAL_MILLIS: u64 = 50;

/// HTTP retry maximum interval (10 seconds)
const HTTP_MAX_INTERVAL_SECS: u64 = 10;

/// HTTP retry maximum elapsed time (1 minute), well below the sync period
const HTTP_MAX_ELAPSED_TIME_SECS: u64 = 60;

/// Backoff multiplier (exponential growth factor)
const BACKOFF_MULTIPLIER: f64 = 2.0;

/// Randomization factor to prevent thundering herd (±10%)
const RANDOMIZATION_FACTOR: f64 = 0.1;

/// Simple exponential backoff implementation.
///
/// Provides exponential backoff with randomization (jitter).
pub struct ExponentialBackoff {
    /// Current interval duration
    pub current_interval: Duration,
    /// Maximum interval duration
    pub max_interval: Duration,
    /// Maximum total elapsed time
    pub max_elapsed_time: Option<Duration>,
    /// Backoff multiplier (typically 2.0 for doubling)
    pub multiplier: f64,
    /// Randomization factor (e.g., 0.1 for ±10%)
    pub randomization_factor: f64,
    start_time: Instant,
}

impl ExponentialBackoff {
    /// Create a new exponential backoff with specified parameters.
    #[must_use]
    pub fn new(
        initial_interval: Duration,
        max_interval: Duration,
        max_elapsed_time: Option<Duration>,
        multiplier: f64,
        randomization_factor: f64,
    ) -> Self {
        Self {
            current_interval: initial_interval,
            max_interval,
            max_elapsed_time,
            multiplier,
            randomization_factor,
            start_time: Instant::now(),
        }
    }

    /// Get the next backoff interval, or None if max elapsed time exceeded.
    pub fn next_backoff(&mut self) -> Option<Duration> {
        if let Some(max_elapsed) = self.max_elapsed_time {
            if self.start_time.elapsed() >= max_elapsed {
                return None;
            }
        }

        let interval = self.current_interval;
        let jittered = self.apply_jitter(interval);

        let next = interval.as_secs_f64() * self.multiplier;
        self.current_interval = Duration::from_secs_f64(next).min(self.max_interval);

        Some(jittered)
    }

    fn apply_jitter(&self, interval: Duration) -> Duration {
        if self.randomization_factor == 0.0 {
            return interval;
        }

        let secs = interval.as_secs_f64();
        let delta = secs * self.randomization_factor;
        let jittered = secs - delta + 2.0 * delta * rand::random::<f64>();

        Duration::from_secs_f64(jittered.max(0.0))
    }
}

/// Backoff for HTTP collaborator calls.
///
/// Retries occur at roughly 50ms, 100ms, 200ms … capped at 10s, for at most one minute.
#[must_use]
pub fn http_backoff() -> ExponentialBackoff {
    ExponentialBackoff::new(
        Duration::from_millis(HTTP_INITIAL_INTERVAL_MILLIS),
        Duration::from_secs(HTTP_MAX_INTERVAL_SECS),
        Some(Duration::from_secs(HTTP_MAX_ELAPSED_TIME_SECS)),
        BACKOFF_MULTIPLIER,
        RANDOMIZATION_FACTOR,
    )
}

/// Determine if an HTTP status code is retryable.
///
/// 429 and 500/502/503/504 are transient; everything else is not.
#[must_use]
pub fn is_retryable_http_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}

/// Send an HTTP request, retrying transient failures with `backoff`.
///
/// `build` is called once per attempt because a sent request cannot be reused.
/// A non-retryable status is returned to the caller unchanged.
///
/// # Errors
///
/// Returns an error when the request keeps failing until the backoff is exhausted.
pub async fn send_with_retry<F>(
    mut build: F,
    mut backoff: ExponentialBackoff,
    operation_name: &str,
) -> Result<reqwest::Response>
where
    F: FnMut() -> reqwest::RequestBuilder,
{
    let start_time = Instant::now();
    let mut attempt = 0;

    loop {
        attempt += 1;

        let failure = match build().send().await {
            Ok(response) if !is_retryable_http_status(response.status()) => {
                if attempt > 1 {
                    debug!(
                        operation = operation_name,
                        attempt = attempt,
                        elapsed = ?start_time.elapsed(),
                        "HTTP call succeeded after retries"
                    );
                }
                return Ok(response);
            }
            Ok(response) => format!("HTTP {}", response.status()),
            Err(e) if e.is_builder() => {
                error!(operation = operation_name, error = %e, "Invalid HTTP request, not retrying");
                return Err(e.into());
            }
            Err(e) => e.to_string(),
        };

        match backoff.next_backoff() {
            Some(duration) => {
                warn!(
                    operation = operation_name,
                    attempt = attempt,
                    retry_after = ?duration,
                    error = %failure,
                    "Retryable HTTP error, will retry"
                );
                tokio::time::sleep(duration).await;
            }
            None => {
                error!(
                    operation = operation_name,
                    attempt = attempt,
                    elapsed = ?start_time.elapsed(),
                    error = %failure,
                    "Backoff exhausted, giving up"
                );
                anyhow::bail!("{operation_name} failed after {attempt} attempts: {failure}");
            }
        }
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod retry_tests;
