//! Metrics definitions for the session service.
//!
//! All metrics follow Prometheus naming conventions:
//! - `session_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Every label value comes from a fixed set in this crate. Subject ids,
//! emails and raw paths never become labels.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize the Prometheus recorder and return the handle used by the
/// `/metrics` endpoint.
///
/// # Errors
///
/// Returns error if the recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("session_http_request".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.200, 0.500, 1.000, 2.000,
            ],
        )
        .map_err(|e| format!("Failed to set HTTP request buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// HTTP Request Metrics
// ============================================================================

/// Record HTTP request completion.
///
/// Metric: `session_http_requests_total`, `session_http_request_duration_seconds`
/// Labels: `method`, `endpoint`, `status_code`
pub fn record_http_request(method: &str, endpoint: &str, status_code: u16, duration: Duration) {
    let endpoint = normalize_endpoint(endpoint);

    histogram!("session_http_request_duration_seconds",
        "method" => method.to_string(),
        "endpoint" => endpoint
    )
    .record(duration.as_secs_f64());

    counter!("session_http_requests_total",
        "method" => method.to_string(),
        "endpoint" => endpoint,
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

/// Map a request path onto the fixed route set.
fn normalize_endpoint(path: &str) -> &'static str {
    match path {
        "/auth/google" => "/auth/google",
        "/auth/logout" => "/auth/logout",
        "/me" => "/me",
        "/me/premium" => "/me/premium",
        "/payment/verify" => "/payment/verify",
        "/health" => "/health",
        "/ready" => "/ready",
        "/metrics" => "/metrics",
        _ => "/other",
    }
}

// ============================================================================
// Session Metrics
// ============================================================================

/// Record the outcome of per-request authentication.
///
/// Metric: `session_authentications_total`
/// Labels: `outcome` (authenticated, no_credential, expired, malformed,
/// invalid_signature, principal_not_found, store_error)
pub fn record_authentication(outcome: &'static str) {
    counter!("session_authentications_total", "outcome" => outcome).increment(1);
}

/// Record a session token being issued.
///
/// Metric: `session_credentials_issued_total`
/// Labels: `reason` (login, plan_upgrade)
pub fn record_credential_issued(reason: &'static str) {
    counter!("session_credentials_issued_total", "reason" => reason).increment(1);
}

/// Record an identity exchange result.
///
/// Metric: `session_identity_exchanges_total`
/// Labels: `result` (created, existing, conflict_resolved, verification_failed, error)
pub fn record_identity_exchange(result: &'static str) {
    counter!("session_identity_exchanges_total", "result" => result).increment(1);
}

/// Record a plan upgrade attempt.
///
/// Metric: `session_plan_upgrades_total`
/// Labels: `result` (success, invalid_signature, unconfigured, error)
pub fn record_plan_upgrade(result: &'static str) {
    counter!("session_plan_upgrades_total", "result" => result).increment(1);
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use metrics_util::debugging::{DebugValue, DebuggingRecorder};

    fn counter_value(
        snapshot: &[(
            metrics_util::CompositeKey,
            Option<metrics::Unit>,
            Option<metrics::SharedString>,
            DebugValue,
        )],
        name: &str,
        label: (&str, &str),
    ) -> u64 {
        snapshot
            .iter()
            .filter(|(key, _, _, _)| key.key().name() == name)
            .filter(|(key, _, _, _)| {
                key.key()
                    .labels()
                    .any(|l| l.key() == label.0 && l.value() == label.1)
            })
            .map(|(_, _, _, value)| match value {
                DebugValue::Counter(v) => *v,
                _ => 0,
            })
            .sum()
    }

    #[test]
    fn test_session_counters_are_labelled() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();

        metrics::with_local_recorder(&recorder, || {
            record_authentication("authenticated");
            record_authentication("expired");
            record_authentication("expired");
            record_credential_issued("login");
            record_identity_exchange("created");
            record_plan_upgrade("success");
        });

        let snapshot = snapshotter.snapshot().into_vec();
        assert_eq!(
            counter_value(&snapshot, "session_authentications_total", ("outcome", "expired")),
            2
        );
        assert_eq!(
            counter_value(
                &snapshot,
                "session_authentications_total",
                ("outcome", "authenticated")
            ),
            1
        );
        assert_eq!(
            counter_value(&snapshot, "session_credentials_issued_total", ("reason", "login")),
            1
        );
        assert_eq!(
            counter_value(&snapshot, "session_identity_exchanges_total", ("result", "created")),
            1
        );
        assert_eq!(
            counter_value(&snapshot, "session_plan_upgrades_total", ("result", "success")),
            1
        );
    }

    #[test]
    fn test_http_request_endpoint_is_normalized() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();

        metrics::with_local_recorder(&recorder, || {
            record_http_request("GET", "/me", 200, Duration::from_millis(3));
            record_http_request("GET", "/users/5b0c7a1e", 404, Duration::from_millis(1));
        });

        let snapshot = snapshotter.snapshot().into_vec();
        assert_eq!(
            counter_value(&snapshot, "session_http_requests_total", ("endpoint", "/me")),
            1
        );
        assert_eq!(
            counter_value(&snapshot, "session_http_requests_total", ("endpoint", "/other")),
            1
        );
    }

    #[test]
    fn test_normalize_endpoint() {
        assert_eq!(normalize_endpoint("/payment/verify"), "/payment/verify");
        assert_eq!(normalize_endpoint("/me/"), "/other");
        assert_eq!(normalize_endpoint("/admin"), "/other");
    }
}
