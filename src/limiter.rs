// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Tiered fixed-window rate limiter.
//!
//! Each request lands in one bucket per (tier, client) pair:
//! 1. Standard tier (30 per minute default)
//! 2. Pro tier (5 per minute default)
//!
//! Counters live in an injected [`RateLimitStore`].

use crate::config::RateLimitConfig;
use crate::error::GateError;
use crate::store::{RateLimitStore, StoreError};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Rate-limit policy selected per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    #[default]
    Standard,
    Pro,
}

impl Tier {
    /// Select a tier from the request's `mode` field.
    ///
    /// Matching ignores case and surrounding whitespace. Anything other
    /// than `"pro"` selects the standard tier.
    pub fn from_mode(mode: Option<&str>) -> Self {
        match mode.map(str::trim) {
            Some(m) if m.eq_ignore_ascii_case("pro") => Tier::Pro,
            _ => Tier::Standard,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Standard => "standard",
            Tier::Pro => "pro",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a rate limit check.
#[derive(Debug, Clone)]
pub enum RateLimitResult {
    /// Request is allowed
    Allowed {
        /// Limit for the tier
        limit: u32,
        /// Remaining requests in current window
        remaining: u32,
        /// Time until window resets
        reset_in: Duration,
    },
    /// Request is rate limited
    Limited {
        /// Limit for the tier
        limit: u32,
        /// Time until the window resets
        retry_after: Duration,
    },
}

impl RateLimitResult {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitResult::Allowed { .. })
    }

    /// Convert a rejection into the gate's error type.
    pub fn into_result(self) -> Result<Self, GateError> {
        match self {
            RateLimitResult::Limited { limit, retry_after } => {
                Err(GateError::RateLimited { limit, retry_after })
            }
            allowed => Ok(allowed),
        }
    }
}

/// Thread-safe tiered rate limiter.
pub struct RateLimiter {
    config: RateLimitConfig,
    store: Arc<dyn RateLimitStore>,
}

impl RateLimiter {
    /// Create a new rate limiter over the given store.
    pub fn new(config: RateLimitConfig, store: Arc<dyn RateLimitStore>) -> Self {
        Self { config, store }
    }

    /// Configured per-window limit for a tier.
    pub fn limit_for(&self, tier: Tier) -> u32 {
        match tier {
            Tier::Standard => self.config.standard_per_window,
            Tier::Pro => self.config.pro_per_window,
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Record a request from `client` against `tier`'s bucket.
    pub async fn check(&self, tier: Tier, client: &str) -> Result<RateLimitResult, StoreError> {
        let limit = self.limit_for(tier);
        let key = bucket_key(tier, client);
        let hit = self
            .store
            .increment(&key, self.config.window_duration())
            .await?;

        if hit.count <= limit {
            Ok(RateLimitResult::Allowed {
                limit,
                remaining: limit - hit.count,
                reset_in: hit.resets_in,
            })
        } else {
            debug!(%tier, client, count = hit.count, limit, "Tier rate limit exceeded");
            Ok(RateLimitResult::Limited {
                limit,
                retry_after: hit.resets_in,
            })
        }
    }

    /// Clear a client's bucket for one tier.
    pub async fn reset(&self, tier: Tier, client: &str) -> Result<(), StoreError> {
        self.store.reset(&bucket_key(tier, client)).await
    }

    /// Clean up expired windows (should be called periodically).
    pub async fn cleanup(&self) {
        self.store.cleanup().await;
    }
}

/// Store key for a (tier, client) bucket.
fn bucket_key(tier: Tier, client: &str) -> String {
    format!("ratelimit:{}:{}", tier.as_str(), client)
}
