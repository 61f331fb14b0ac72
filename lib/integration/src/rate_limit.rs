//! Rate limiting for integration operations.
//!
//! Respects external API constraints by limiting request rates per
//! connection, using a fixed window.

use chrono::{DateTime, Duration, Utc};
use flowdeck_core::ConnectionId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;

/// Rate limit configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Maximum requests per window.
    pub max_requests: u32,
    /// Window duration in seconds.
    pub window_seconds: u32,
}

impl RateLimitConfig {
    /// Creates a new rate limit configuration.
    #[must_use]
    pub fn new(max_requests: u32, window_seconds: u32) -> Self {
        Self {
            max_requests,
            window_seconds,
        }
    }

    /// Common limit: requests per minute.
    #[must_use]
    pub fn per_minute(max_requests: u32) -> Self {
        Self::new(max_requests, 60)
    }

    /// Common limit: requests per hour.
    #[must_use]
    pub fn per_hour(max_requests: u32) -> Self {
        Self::new(max_requests, 3600)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::per_minute(60)
    }
}

/// Result of a rate limit check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitResult {
    /// Request is allowed.
    Allowed {
        remaining: u32,
        resets_at: DateTime<Utc>,
    },
    /// Rate limit exceeded.
    Exceeded {
        retry_after: Duration,
        resets_at: DateTime<Utc>,
    },
}

impl RateLimitResult {
    /// Returns true if the request is allowed.
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed { .. })
    }

    /// Returns the number of remaining requests (0 if exceeded).
    #[must_use]
    pub fn remaining(&self) -> u32 {
        match self {
            Self::Allowed { remaining, .. } => *remaining,
            Self::Exceeded { .. } => 0,
        }
    }
}

/// State for a single rate limit window.
#[derive(Debug, Clone)]
struct WindowState {
    count: u32,
    window_start: DateTime<Utc>,
}

impl WindowState {
    fn new() -> Self {
        Self {
            count: 0,
            window_start: Utc::now(),
        }
    }
}

/// A fixed-window rate limiter keyed by connection.
pub struct RateLimiter {
    config: RateLimitConfig,
    windows: RwLock<HashMap<ConnectionId, WindowState>>,
}

impl RateLimiter {
    /// Creates a new rate limiter.
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: RwLock::new(HashMap::new()),
        }
    }

    /// Checks and records a request for the given connection.
    pub fn check(&self, connection_id: ConnectionId) -> RateLimitResult {
        let now = Utc::now();
        let window = Duration::seconds(i64::from(self.config.window_seconds));

        let mut windows = self.windows.write().expect("rate limiter lock");
        let state = windows.entry(connection_id).or_insert_with(WindowState::new);

        // Reset expired windows
        if now - state.window_start >= window {
            state.count = 0;
            state.window_start = now;
        }

        let resets_at = state.window_start + window;

        if state.count >= self.config.max_requests {
            return RateLimitResult::Exceeded {
                retry_after: resets_at - now,
                resets_at,
            };
        }

        state.count += 1;
        RateLimitResult::Allowed {
            remaining: self.config.max_requests - state.count,
            resets_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_up_to_limit() {
        let limiter = RateLimiter::new(RateLimitConfig::new(3, 60));
        let connection = ConnectionId::new();

        for remaining in (0..3).rev() {
            let result = limiter.check(connection);
            assert!(result.is_allowed());
            assert_eq!(result.remaining(), remaining);
        }

        let result = limiter.check(connection);
        assert!(!result.is_allowed());
    }

    #[test]
    fn connections_are_independent() {
        let limiter = RateLimiter::new(RateLimitConfig::new(1, 60));
        let first = ConnectionId::new();
        let second = ConnectionId::new();

        assert!(limiter.check(first).is_allowed());
        assert!(!limiter.check(first).is_allowed());
        assert!(limiter.check(second).is_allowed());
    }

    #[test]
    fn exceeded_reports_retry_after() {
        let limiter = RateLimiter::new(RateLimitConfig::new(1, 60));
        let connection = ConnectionId::new();
        limiter.check(connection);

        match limiter.check(connection) {
            RateLimitResult::Exceeded { retry_after, .. } => {
                assert!(retry_after <= Duration::seconds(60));
                assert!(retry_after > Duration::zero());
            }
            RateLimitResult::Allowed { .. } => panic!("expected exceeded"),
        }
    }
}
