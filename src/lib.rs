// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Credibility Gate
//!
//! Admission control in front of a credibility analysis endpoint:
//!
//! - Shared-secret API key check (`x-api-key` by default)
//! - Tier selection from the request's `mode` field
//! - Per-client, per-tier fixed-window rate limiting (30/min standard, 5/min pro)
//! - Pluggable response producer, a canned result by default

pub mod analysis;
pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod limiter;
pub mod metrics;
pub mod store;

pub use analysis::{AnalysisEngine, AnalysisRequest, AnalysisResult, StaticAnalysisEngine};
pub use auth::ApiKeyAuthenticator;
pub use config::Config;
pub use error::{GateError, StateError};
pub use handlers::{router, AppState};
pub use limiter::{RateLimitResult, RateLimiter, Tier};
pub use store::{InMemoryStore, RateLimitStore};
