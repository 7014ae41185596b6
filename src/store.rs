// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Fixed-window counter storage.
//!
//! The [`RateLimitStore`] trait is the seam between the limiter and
//! wherever the counters live. [`InMemoryStore`] keeps them in process;
//! a shared cache backend can implement the same trait for multi-instance
//! deployments.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

/// Storage backend failure.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Rate limit backend error: {0}")]
    Backend(String),
}

/// Counter state after an increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowCount {
    /// Hits recorded in the current window, including this one
    pub count: u32,
    /// Time until the current window ends
    pub resets_in: Duration,
}

/// Backend holding one counter per key.
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    /// Record a hit against `key` and return the updated count.
    ///
    /// A key with no window, or whose window has ended, starts a fresh
    /// window of length `window` at this hit.
    async fn increment(&self, key: &str, window: Duration) -> Result<WindowCount, StoreError>;

    /// Forget the counter for `key`.
    async fn reset(&self, key: &str) -> Result<(), StoreError>;

    /// Drop expired windows.
    async fn cleanup(&self);
}

#[derive(Debug)]
struct Window {
    count: u32,
    started: Instant,
    length: Duration,
}

impl Window {
    fn ends_at(&self) -> Instant {
        self.started + self.length
    }
}

/// Process-local store. Increments are serialized by a write lock so
/// concurrent hits on one key are never lost.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    windows: RwLock<HashMap<String, Window>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tracked keys.
    pub async fn len(&self) -> usize {
        self.windows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.windows.read().await.is_empty()
    }
}

#[async_trait]
impl RateLimitStore for InMemoryStore {
    async fn increment(&self, key: &str, window: Duration) -> Result<WindowCount, StoreError> {
        let now = Instant::now();
        let mut windows = self.windows.write().await;

        let entry = windows.entry(key.to_string()).or_insert_with(|| Window {
            count: 0,
            started: now,
            length: window,
        });

        if now >= entry.ends_at() {
            debug!(key, "Window elapsed, resetting counter");
            entry.count = 0;
            entry.started = now;
            entry.length = window;
        }

        entry.count = entry.count.saturating_add(1);

        Ok(WindowCount {
            count: entry.count,
            resets_in: entry.ends_at().saturating_duration_since(now),
        })
    }

    async fn reset(&self, key: &str) -> Result<(), StoreError> {
        self.windows.write().await.remove(key);
        Ok(())
    }

    async fn cleanup(&self) {
        let now = Instant::now();
        let mut windows = self.windows.write().await;
        let before = windows.len();
        windows.retain(|_, w| now < w.ends_at());
        debug!(removed = before - windows.len(), "Purged expired windows");
    }
}
