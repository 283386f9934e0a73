//! Per-source request throttling.
//!
//! Enforces both per-second and per-minute limits so a burst of aggregation
//! calls cannot get a catalog to ban us.

use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tokio::time::sleep;

const WINDOW: Duration = Duration::from_secs(60);

/// Rate limiter with dual constraints (per-second and per-minute)
#[derive(Debug)]
pub struct RateLimiter {
    /// Minimum spacing between two requests
    min_interval: Duration,
    /// Maximum requests per minute
    max_per_minute: usize,
    /// Last request timestamp
    last_request: Option<Instant>,
    /// Request timestamps in the last minute, oldest first
    recent_requests: VecDeque<Instant>,
}

impl RateLimiter {
    /// Create a new rate limiter; non-positive limits disable that constraint
    pub fn new(max_per_second: f64, max_per_minute: u32) -> Self {
        let min_interval = if max_per_second > 0.0 && max_per_second.is_finite() {
            Duration::from_secs_f64(1.0 / max_per_second)
        } else {
            Duration::ZERO
        };
        let max_per_minute = if max_per_minute == 0 {
            usize::MAX
        } else {
            max_per_minute as usize
        };

        Self {
            min_interval,
            max_per_minute,
            last_request: None,
            recent_requests: VecDeque::new(),
        }
    }

    /// Wait until a request can be made, respecting both rate limits
    pub async fn acquire(&mut self) {
        self.prune(Instant::now());

        // Per-minute limit: wait for the oldest request to leave the window
        if self.recent_requests.len() >= self.max_per_minute {
            if let Some(&oldest) = self.recent_requests.front() {
                let elapsed = oldest.elapsed();
                if elapsed < WINDOW {
                    let wait_time = WINDOW - elapsed;
                    tracing::debug!(
                        wait_ms = wait_time.as_millis() as u64,
                        "Rate limit: waiting for per-minute limit"
                    );
                    sleep(wait_time).await;
                }
            }
            self.prune(Instant::now());
        }

        // Per-second limit
        if let Some(last) = self.last_request {
            let elapsed = last.elapsed();
            if elapsed < self.min_interval {
                let wait_time = self.min_interval - elapsed;
                tracing::debug!(
                    wait_ms = wait_time.as_millis() as u64,
                    "Rate limit: waiting for per-second limit"
                );
                sleep(wait_time).await;
            }
        }

        let request_time = Instant::now();
        self.last_request = Some(request_time);
        self.recent_requests.push_back(request_time);
    }

    /// Get the current number of requests in the last minute
    pub fn current_minute_count(&mut self) -> usize {
        self.prune(Instant::now());
        self.recent_requests.len()
    }

    fn prune(&mut self, now: Instant) {
        while let Some(&oldest) = self.recent_requests.front() {
            if now.duration_since(oldest) >= WINDOW {
                self.recent_requests.pop_front();
            } else {
                break;
            }
        }
    }
}
