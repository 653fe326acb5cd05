use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use fieldscout_core::UpsertOutcome;

#[derive(Debug, Default)]
pub struct Metrics {
    request_total: AtomicU64,
    request_success: AtomicU64,
    request_error: AtomicU64,
    decisions_denied: AtomicU64,
    upserts_created: AtomicU64,
    upserts_updated: AtomicU64,
    audit_dropped: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self) {
        self.request_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_success(&self) {
        self.request_success.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.request_error.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_denied(&self) {
        self.decisions_denied.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_upsert(&self, outcome: UpsertOutcome) {
        let counter = match outcome {
            UpsertOutcome::Created => &self.upserts_created,
            UpsertOutcome::Updated => &self.upserts_updated,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_audit_dropped(&self, count: u64) {
        self.audit_dropped.fetch_add(count, Ordering::Relaxed);
    }

    pub fn request_total(&self) -> u64 {
        self.request_total.load(Ordering::Relaxed)
    }

    pub fn request_success(&self) -> u64 {
        self.request_success.load(Ordering::Relaxed)
    }

    pub fn request_error(&self) -> u64 {
        self.request_error.load(Ordering::Relaxed)
    }

    pub fn decisions_denied(&self) -> u64 {
        self.decisions_denied.load(Ordering::Relaxed)
    }

    pub fn upserts_created(&self) -> u64 {
        self.upserts_created.load(Ordering::Relaxed)
    }

    pub fn upserts_updated(&self) -> u64 {
        self.upserts_updated.load(Ordering::Relaxed)
    }

    pub fn audit_dropped(&self) -> u64 {
        self.audit_dropped.load(Ordering::Relaxed)
    }

    pub fn render_prometheus(&self) -> String {
        let counters = [
            (
                "fieldscout_requests_total",
                "Total number of requests.",
                self.request_total(),
            ),
            (
                "fieldscout_requests_success_total",
                "Total successful requests.",
                self.request_success(),
            ),
            (
                "fieldscout_requests_error_total",
                "Total failed requests.",
                self.request_error(),
            ),
            (
                "fieldscout_decisions_denied_total",
                "Policy decisions that denied an operation.",
                self.decisions_denied(),
            ),
            (
                "fieldscout_upserts_created_total",
                "Upserts that created a new row.",
                self.upserts_created(),
            ),
            (
                "fieldscout_upserts_updated_total",
                "Upserts that replaced an existing row.",
                self.upserts_updated(),
            ),
            (
                "fieldscout_audit_events_dropped_total",
                "Audit events dropped because the sink was saturated.",
                self.audit_dropped(),
            ),
        ];

        let mut output = String::new();
        for (name, help, value) in counters {
            output.push_str(&format!("# HELP {name} {help}\n"));
            output.push_str(&format!("# TYPE {name} counter\n"));
            output.push_str(&format!("{name} {value}\n"));
        }
        output
    }
}

pub async fn metrics_handler(State(metrics): State<Arc<Metrics>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        metrics.render_prometheus(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_metrics_are_zero() {
        let m = Metrics::new();
        assert_eq!(m.request_total(), 0);
        assert_eq!(m.decisions_denied(), 0);
        assert_eq!(m.audit_dropped(), 0);
    }

    #[test]
    fn record_increments_counters() {
        let m = Metrics::new();
        m.record_request();
        m.record_request();
        m.record_success();
        m.record_error();
        m.record_denied();

        assert_eq!(m.request_total(), 2);
        assert_eq!(m.request_success(), 1);
        assert_eq!(m.request_error(), 1);
        assert_eq!(m.decisions_denied(), 1);
    }

    #[test]
    fn upserts_are_split_by_outcome() {
        let m = Metrics::new();
        m.record_upsert(UpsertOutcome::Created);
        m.record_upsert(UpsertOutcome::Updated);
        m.record_upsert(UpsertOutcome::Updated);

        assert_eq!(m.upserts_created(), 1);
        assert_eq!(m.upserts_updated(), 2);
    }

    #[test]
    fn render_prometheus_format() {
        let m = Metrics::new();
        m.record_request();
        m.record_audit_dropped(3);

        let output = m.render_prometheus();

        assert!(output.contains("# TYPE fieldscout_requests_total counter"));
        assert!(output.contains("fieldscout_requests_total 1"));
        assert!(output.contains("fieldscout_requests_error_total 0"));
        assert!(
            output.contains("fieldscout_audit_events_dropped_total 3"),
            "missing dropped counter: {output}"
        );
    }

    #[tokio::test]
    async fn metrics_endpoint_returns_prometheus_text() {
        let metrics = Arc::new(Metrics::new());
        metrics.record_request();
        metrics.record_request();
        metrics.record_success();

        let app = axum::Router::new()
            .route("/metrics", axum::routing::get(metrics_handler))
            .with_state(metrics);

        let server = axum_test::TestServer::new(app).unwrap();
        let response = server.get("/metrics").await;

        response.assert_status_ok();
        let body = response.text();
        assert!(body.contains("fieldscout_requests_total 2"));
        assert!(body.contains("fieldscout_requests_success_total 1"));
    }
}
