// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Prometheus counters for gate decisions.

use crate::limiter::Tier;
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

pub struct GateMetrics {
    registry: Registry,
    requests: IntCounterVec,
    admitted: IntCounterVec,
}

impl GateMetrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let requests = IntCounterVec::new(
            Opts::new("gate_requests_total", "Analyze requests by gate outcome"),
            &["outcome"],
        )?;
        let admitted = IntCounterVec::new(
            Opts::new("gate_admitted_total", "Admitted analyze requests by tier"),
            &["tier"],
        )?;

        registry.register(Box::new(requests.clone()))?;
        registry.register(Box::new(admitted.clone()))?;

        Ok(Self {
            registry,
            requests,
            admitted,
        })
    }

    pub fn record_rejected(&self, outcome: &str) {
        self.requests.with_label_values(&[outcome]).inc();
    }

    pub fn record_admitted(&self, tier: Tier) {
        self.requests.with_label_values(&["allowed"]).inc();
        self.admitted.with_label_values(&[tier.as_str()]).inc();
    }

    /// Count for one outcome label.
    pub fn outcome_count(&self, outcome: &str) -> u64 {
        self.requests.with_label_values(&[outcome]).get()
    }

    /// Render all metrics in the text exposition format.
    pub fn render(&self) -> prometheus::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
