//! Hotswap metrics tracking using OpenTelemetry.

use crate::classify::{RejectionReason, Service};
use opentelemetry::KeyValue;
use opentelemetry::metrics::{Counter, Histogram, Meter};
use std::time::Instant;

/// How a hotswap attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// Every change was applied through service APIs.
    Hotswapped,
    /// There was nothing to do.
    NoOp,
    /// The caller has to run a full deployment.
    FullDeployment,
    /// Planning or execution failed.
    Failed,
}

impl AttemptOutcome {
    /// The `outcome` attribute value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hotswapped => "hotswapped",
            Self::NoOp => "no-op",
            Self::FullDeployment => "full-deployment",
            Self::Failed => "failed",
        }
    }
}

/// Metrics collector for hotswap deployments.
///
/// # Examples
///
/// ```rust,no_run
/// use cfn_hotswap::metrics::{AttemptOutcome, HotswapMetrics};
/// use opentelemetry::global;
///
/// let metrics = HotswapMetrics::new(global::meter("cfn-hotswap"));
///
/// let timer = metrics.start_attempt();
/// // ... plan and execute ...
/// metrics.record_outcome(timer, AttemptOutcome::NoOp);
/// ```
#[derive(Clone)]
pub struct HotswapMetrics {
    attempts: Counter<u64>,
    outcomes: Counter<u64>,
    attempt_duration: Histogram<f64>,
    operations: Counter<u64>,
    non_hotswappable: Counter<u64>,
}

impl HotswapMetrics {
    /// Create a new metrics collector with the provided meter.
    pub fn new(meter: Meter) -> Self {
        let attempts = meter
            .u64_counter("cfn_hotswap.attempts")
            .with_description("Total number of hotswap attempts")
            .build();

        let outcomes = meter
            .u64_counter("cfn_hotswap.outcomes")
            .with_description("Hotswap attempts by outcome")
            .build();

        let attempt_duration = meter
            .f64_histogram("cfn_hotswap.attempt.duration")
            .with_description("Duration of hotswap attempts in seconds")
            .with_unit("s")
            .build();

        let operations = meter
            .u64_counter("cfn_hotswap.operations")
            .with_description("Service API operations executed by hotswaps")
            .build();

        let non_hotswappable = meter
            .u64_counter("cfn_hotswap.non_hotswappable")
            .with_description("Changes that could not be hotswapped, by reason")
            .build();

        Self {
            attempts,
            outcomes,
            attempt_duration,
            operations,
            non_hotswappable,
        }
    }

    /// Start timing a hotswap attempt.
    ///
    /// Pass the returned `Instant` to [`record_outcome`](Self::record_outcome).
    pub fn start_attempt(&self) -> Instant {
        self.attempts.add(1, &[]);
        Instant::now()
    }

    /// Record how an attempt ended.
    pub fn record_outcome(&self, start: Instant, outcome: AttemptOutcome) {
        let attributes = [KeyValue::new("outcome", outcome.as_str())];
        self.outcomes.add(1, &attributes);
        self.attempt_duration
            .record(start.elapsed().as_secs_f64(), &attributes);
    }

    /// Record one executed service operation.
    pub fn record_operation(&self, service: Service) {
        self.operations
            .add(1, &[KeyValue::new("service", service.as_str())]);
    }

    /// Record one change that needs a full deployment.
    pub fn record_non_hotswappable(&self, reason: RejectionReason) {
        self.non_hotswappable
            .add(1, &[KeyValue::new("reason", reason.as_str())]);
    }
}

impl std::fmt::Debug for HotswapMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HotswapMetrics").finish_non_exhaustive()
    }
}
