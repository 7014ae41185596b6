// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Error types for the request gate.

use crate::config::ConfigError;
use crate::store::StoreError;
use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// Reasons a request is not admitted.
#[derive(Debug, Error)]
pub enum GateError {
    /// No credential is configured on the server (operator error)
    #[error("Server misconfigured")]
    ServerMisconfigured,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Invalid JSON body")]
    InvalidBody(#[source] serde_json::Error),

    #[error("Too many requests, please try again later.")]
    RateLimited {
        limit: u32,
        retry_after: Duration,
    },

    #[error("Rate limit store unavailable")]
    Store(#[from] StoreError),
}

impl GateError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::ServerMisconfigured | Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::InvalidBody(_) => StatusCode::BAD_REQUEST,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        }
    }

    /// Label used for the outcome metric.
    pub fn outcome(&self) -> &'static str {
        match self {
            Self::ServerMisconfigured => "misconfigured",
            Self::Unauthorized => "unauthorized",
            Self::InvalidBody(_) => "invalid_body",
            Self::RateLimited { .. } => "rate_limited",
            Self::Store(_) => "store_error",
        }
    }
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
}

/// Whole seconds a client should wait, never rounded down to zero.
pub fn retry_after_secs(retry_after: Duration) -> u64 {
    let secs = retry_after.as_secs();
    if retry_after.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs.max(1)
    }
}

impl IntoResponse for GateError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error = self.to_string();
        match self {
            Self::RateLimited { limit, retry_after } => {
                let retry_secs = retry_after_secs(retry_after);
                (
                    status,
                    [
                        (header::RETRY_AFTER, retry_secs.to_string()),
                        (
                            header::HeaderName::from_static("x-ratelimit-limit"),
                            limit.to_string(),
                        ),
                        (
                            header::HeaderName::from_static("x-ratelimit-remaining"),
                            "0".to_string(),
                        ),
                    ],
                    Json(ErrorResponse {
                        error,
                        retry_after_secs: Some(retry_secs),
                    }),
                )
                    .into_response()
            }
            _ => (
                status,
                Json(ErrorResponse {
                    error,
                    retry_after_secs: None,
                }),
            )
                .into_response(),
        }
    }
}

/// Failures assembling [`crate::AppState`].
#[derive(Debug, Error)]
pub enum StateError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to register metrics: {0}")]
    Metrics(#[from] prometheus::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, GateError>;
