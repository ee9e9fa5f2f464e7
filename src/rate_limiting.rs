// ABOUTME: Request throttling for auth endpoints and daily AI quota evaluation
// ABOUTME: Sliding-window limiter keyed by client plus a per-tier daily request quota
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MyGuide Health

//! # Rate limiting
//!
//! Two independent mechanisms:
//!
//! - [`AuthRateLimiter`] throttles signup/login attempts per client key with a
//!   sliding window held in memory.
//! - [`AiQuota`] evaluates a user's daily AI request count against the limit
//!   of their subscription tier. Counts are persisted by the database.

use std::collections::VecDeque;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tracing::warn;

use crate::config::environment::RateLimitConfig;
use crate::models::SubscriptionTier;

/// Outcome of a rate-limit check
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitStatus {
    /// Whether the request must be rejected
    pub is_limited: bool,
    /// Requests allowed per window
    pub limit: u32,
    /// Requests left in the current window
    pub remaining: u32,
    /// When the oldest counted request leaves the window
    pub reset_at: DateTime<Utc>,
    /// Seconds until a retry can succeed (for `Retry-After`)
    pub retry_after_seconds: Option<u64>,
}

impl RateLimitStatus {
    /// Fill `retry_after_seconds` from `reset_at` when limited
    #[must_use]
    pub fn with_retry_after(mut self, now: DateTime<Utc>) -> Self {
        if self.is_limited {
            let seconds = (self.reset_at - now).num_seconds().max(1);
            self.retry_after_seconds = Some(seconds.unsigned_abs());
        }
        self
    }
}

/// In-memory sliding-window limiter for authentication endpoints
pub struct AuthRateLimiter {
    config: RateLimitConfig,
    windows: DashMap<String, VecDeque<DateTime<Utc>>>,
}

impl AuthRateLimiter {
    /// Create a limiter with the given limits
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: DashMap::new(),
        }
    }

    fn window(&self) -> Duration {
        Duration::seconds(i64::try_from(self.config.auth_window_secs).unwrap_or(i64::MAX / 1000))
    }

    /// Count an attempt for `key` at `now`, unless the window is already full
    ///
    /// Rejected attempts are not counted, so a client regains access once
    /// its oldest counted attempt leaves the window.
    pub fn check_and_record(&self, key: &str, now: DateTime<Utc>) -> RateLimitStatus {
        let window = self.window();
        let limit = self.config.auth_max_attempts;
        let mut attempts = self.windows.entry(key.to_owned()).or_default();

        while attempts.front().is_some_and(|oldest| *oldest + window <= now) {
            attempts.pop_front();
        }

        let used = u32::try_from(attempts.len()).unwrap_or(u32::MAX);
        if used >= limit {
            let reset_at = attempts.front().map_or(now + window, |oldest| *oldest + window);
            warn!(client = %key, attempts = used, "Auth rate limit exceeded");
            return RateLimitStatus {
                is_limited: true,
                limit,
                remaining: 0,
                reset_at,
                retry_after_seconds: None,
            }
            .with_retry_after(now);
        }

        attempts.push_back(now);
        let reset_at = attempts.front().map_or(now + window, |oldest| *oldest + window);
        RateLimitStatus {
            is_limited: false,
            limit,
            remaining: limit.saturating_sub(used + 1),
            reset_at,
            retry_after_seconds: None,
        }
    }

    /// Forget all attempts from `key`
    pub fn reset(&self, key: &str) {
        self.windows.remove(key);
    }

    /// Drop keys whose attempts have all left the window
    pub fn prune(&self, now: DateTime<Utc>) -> usize {
        let window = self.window();
        let before = self.windows.len();
        self.windows
            .retain(|_, attempts| attempts.back().is_some_and(|latest| *latest + window > now));
        before.saturating_sub(self.windows.len())
    }
}

/// Daily AI quota evaluation
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AiQuota {
    /// Subscription tier the limit comes from
    pub tier: SubscriptionTier,
    /// Requests allowed per UTC day
    pub limit: u32,
    /// Requests made today, including the current one when counted
    pub used: u32,
    /// Requests left today
    pub remaining: u32,
    /// Next UTC midnight
    pub reset_at: DateTime<Utc>,
}

impl AiQuota {
    /// Evaluate `used` requests against the tier's daily limit
    #[must_use]
    pub fn evaluate(tier: SubscriptionTier, used: u32, now: DateTime<Utc>) -> Self {
        let limit = tier.daily_ai_requests();
        Self {
            tier,
            limit,
            used,
            remaining: limit.saturating_sub(used),
            reset_at: Self::calculate_daily_reset(now),
        }
    }

    /// Whether the counted request pushed usage over the limit
    #[must_use]
    pub const fn is_exceeded(&self) -> bool {
        self.used > self.limit
    }

    /// Start of the next UTC day
    #[must_use]
    pub fn calculate_daily_reset(now: DateTime<Utc>) -> DateTime<Utc> {
        let tomorrow: NaiveDate = now.date_naive().succ_opt().unwrap_or_else(|| {
            warn!("Failed to compute next day, using 24h fallback");
            (now + Duration::days(1)).date_naive()
        });
        tomorrow.and_time(chrono::NaiveTime::MIN).and_utc()
    }

    /// Seconds until the quota resets
    #[must_use]
    pub fn retry_after_seconds(&self, now: DateTime<Utc>) -> u64 {
        (self.reset_at - now).num_seconds().max(1).unsigned_abs()
    }
}
