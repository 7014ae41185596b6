// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Analysis request/response types and the response producer seam.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Analysis request body. Only `mode` is read; other fields are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnalysisRequest {
    #[serde(default)]
    pub mode: Option<String>,
}

impl AnalysisRequest {
    /// Parse a raw request body.
    ///
    /// An empty (or whitespace-only) body is an empty request, as is any
    /// valid JSON that is not an object. A non-string `mode` is treated as
    /// absent. Only syntactically invalid JSON is an error.
    pub fn from_body(body: &[u8]) -> Result<Self, serde_json::Error> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }

        let value: Value = serde_json::from_slice(body)?;
        let mode = value
            .get("mode")
            .and_then(Value::as_str)
            .map(str::to_string);
        Ok(Self { mode })
    }
}

/// Result returned to admitted clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub engine: String,
    pub score: u32,
    pub verdict: String,
    pub reasons: Vec<String>,
    pub sources: Vec<String>,
    pub status: String,
}

/// Produces the response for an admitted request.
#[async_trait]
pub trait AnalysisEngine: Send + Sync {
    /// Engine name for logs.
    fn name(&self) -> &str;

    async fn analyze(&self, request: &AnalysisRequest) -> AnalysisResult;
}

/// Returns the same canned result for every request.
#[derive(Debug, Clone)]
pub struct StaticAnalysisEngine {
    result: AnalysisResult,
}

impl StaticAnalysisEngine {
    pub fn new() -> Self {
        Self {
            result: AnalysisResult {
                engine: "credibility-engine-stub".to_string(),
                score: 72,
                verdict: "Likely credible".to_string(),
                reasons: vec![
                    "Neutral, non-sensational language".to_string(),
                    "Claims are specific and checkable".to_string(),
                    "No known misinformation patterns detected".to_string(),
                ],
                sources: Vec::new(),
                status: "ok".to_string(),
            },
        }
    }

    /// The canned result.
    pub fn result(&self) -> &AnalysisResult {
        &self.result
    }
}

impl Default for StaticAnalysisEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AnalysisEngine for StaticAnalysisEngine {
    fn name(&self) -> &str {
        &self.result.engine
    }

    async fn analyze(&self, _request: &AnalysisRequest) -> AnalysisResult {
        self.result.clone()
    }
}
