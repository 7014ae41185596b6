// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Shared-secret API key check.

use crate::config::{AuthConfig, ConfigError};
use crate::error::GateError;
use axum::http::{HeaderMap, HeaderName};
use subtle::ConstantTimeEq;
use tracing::{debug, error};

/// Compares the credential header against the configured secret.
pub struct ApiKeyAuthenticator {
    expected: Option<Vec<u8>>,
    header: HeaderName,
}

impl ApiKeyAuthenticator {
    /// Create an authenticator from the auth configuration.
    ///
    /// Fails when the configured header name is not a valid HTTP header.
    pub fn new(config: &AuthConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            expected: config
                .api_key
                .as_ref()
                .filter(|k| !k.is_empty())
                .map(|k| k.as_bytes().to_vec()),
            header: config.header()?,
        })
    }

    pub fn header_name(&self) -> &HeaderName {
        &self.header
    }

    pub fn is_configured(&self) -> bool {
        self.expected.is_some()
    }

    /// Check a candidate credential.
    pub fn verify(&self, provided: Option<&[u8]>) -> Result<(), GateError> {
        let expected = match &self.expected {
            Some(expected) => expected,
            None => {
                error!("No API key configured, rejecting request");
                return Err(GateError::ServerMisconfigured);
            }
        };

        let provided = match provided {
            Some(p) => p,
            None => {
                debug!("Missing credential header");
                return Err(GateError::Unauthorized);
            }
        };

        // ct_eq on slices of different lengths is false without leaking where
        // they differ.
        if bool::from(expected.as_slice().ct_eq(provided)) {
            Ok(())
        } else {
            debug!("Credential mismatch");
            Err(GateError::Unauthorized)
        }
    }

    /// Authenticate a request from its headers.
    pub fn authenticate(&self, headers: &HeaderMap) -> Result<(), GateError> {
        self.verify(headers.get(&self.header).map(|v| v.as_bytes()))
    }
}
