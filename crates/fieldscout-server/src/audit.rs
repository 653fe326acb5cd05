//! Audit trail for authorization decisions.
//!
//! Handlers never log audit events inline. They submit them to an
//! [`AuditSink`], a bounded broadcast ring drained by one background task.
//! When the ring is full the oldest pending events are overwritten; the
//! consumer reports how many it missed. Submitting never blocks.

use std::sync::Arc;

use fieldscout_core::{AuthContext, RealmId, SubjectId};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use crate::metrics::Metrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Authenticate,
    CreateRealm,
    PatchRealm,
    CreateIdentity,
    ReadIdentity,
    ListIdentities,
    PatchIdentity,
    DeleteIdentity,
    WriteMatch,
    WriteComment,
    WriteReport,
    CreateSchema,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Authenticate => "authenticate",
            Operation::CreateRealm => "create_realm",
            Operation::PatchRealm => "patch_realm",
            Operation::CreateIdentity => "create_identity",
            Operation::ReadIdentity => "read_identity",
            Operation::ListIdentities => "list_identities",
            Operation::PatchIdentity => "patch_identity",
            Operation::DeleteIdentity => "delete_identity",
            Operation::WriteMatch => "write_match",
            Operation::WriteComment => "write_comment",
            Operation::WriteReport => "write_report",
            Operation::CreateSchema => "create_schema",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Allowed,
    Denied,
    Failed,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Allowed => "allowed",
            Outcome::Denied => "denied",
            Outcome::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEvent {
    pub operation: Operation,
    pub subject: Option<SubjectId>,
    pub realm: Option<RealmId>,
    pub target: String,
    pub outcome: Outcome,
    pub reason: Option<&'static str>,
}

impl AuditEvent {
    pub fn new(
        operation: Operation,
        ctx: Option<&AuthContext>,
        target: impl Into<String>,
        outcome: Outcome,
    ) -> Self {
        Self {
            operation,
            subject: ctx.map(|c| c.subject),
            realm: ctx.map(|c| c.realm),
            target: target.into(),
            outcome,
            reason: None,
        }
    }

    /// `reason` is a stable snake_case code such as
    /// [`DenyReason::as_str`](fieldscout_core::DenyReason::as_str).
    pub fn denied(
        operation: Operation,
        ctx: Option<&AuthContext>,
        target: impl Into<String>,
        reason: &'static str,
    ) -> Self {
        Self {
            reason: Some(reason),
            ..Self::new(operation, ctx, target, Outcome::Denied)
        }
    }
}

/// Writes one event to the `audit` tracing target.
pub fn emit(event: &AuditEvent) {
    let subject = event
        .subject
        .map_or_else(|| "anonymous".to_string(), |s| s.to_string());
    let realm = event
        .realm
        .map_or_else(|| "none".to_string(), |r| r.to_string());
    let reason = event.reason.unwrap_or("");

    match event.outcome {
        Outcome::Allowed => tracing::info!(
            target: "audit",
            event = "access_granted",
            operation = event.operation.as_str(),
            subject = subject.as_str(),
            realm = realm.as_str(),
            resource = event.target.as_str(),
            outcome = event.outcome.as_str(),
            "operation allowed"
        ),
        Outcome::Denied => tracing::warn!(
            target: "audit",
            event = "access_denied",
            operation = event.operation.as_str(),
            subject = subject.as_str(),
            realm = realm.as_str(),
            resource = event.target.as_str(),
            outcome = event.outcome.as_str(),
            reason = reason,
            "operation denied"
        ),
        Outcome::Failed => tracing::warn!(
            target: "audit",
            event = "operation_failed",
            operation = event.operation.as_str(),
            subject = subject.as_str(),
            realm = realm.as_str(),
            resource = event.target.as_str(),
            outcome = event.outcome.as_str(),
            reason = reason,
            "operation failed"
        ),
    }
}

#[derive(Debug, Clone)]
pub struct AuditSink {
    tx: broadcast::Sender<AuditEvent>,
}

impl AuditSink {
    /// Starts the consumer task. The task ends once every sink clone is
    /// dropped and the backlog is drained.
    pub fn spawn(capacity: usize, metrics: Arc<Metrics>) -> (Self, JoinHandle<()>) {
        let (tx, rx) = broadcast::channel(capacity);
        let handle = tokio::spawn(consume(rx, metrics));
        (Self { tx }, handle)
    }

    pub fn submit(&self, event: AuditEvent) {
        if self.tx.send(event).is_err() {
            tracing::debug!("audit consumer stopped, event discarded");
        }
    }
}

async fn consume(mut rx: broadcast::Receiver<AuditEvent>, metrics: Arc<Metrics>) {
    loop {
        match rx.recv().await {
            Ok(event) => emit(&event),
            Err(RecvError::Lagged(missed)) => {
                metrics.record_audit_dropped(missed);
                tracing::warn!(dropped = missed, "audit sink saturated, oldest events dropped");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldscout_core::{DenyReason, Roles};
    use std::sync::Mutex;
    use tracing_subscriber::layer::SubscriberExt;

    #[derive(Debug)]
    struct CapturedEvent {
        target: String,
        fields: Vec<(String, String)>,
    }

    struct TestLayer {
        events: Arc<Mutex<Vec<CapturedEvent>>>,
    }

    impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for TestLayer {
        fn on_event(
            &self,
            event: &tracing::Event<'_>,
            _ctx: tracing_subscriber::layer::Context<'_, S>,
        ) {
            let mut fields = Vec::new();
            let mut visitor = FieldVisitor(&mut fields);
            event.record(&mut visitor);

            self.events.lock().unwrap().push(CapturedEvent {
                target: event.metadata().target().to_string(),
                fields,
            });
        }
    }

    struct FieldVisitor<'a>(&'a mut Vec<(String, String)>);

    impl tracing::field::Visit for FieldVisitor<'_> {
        fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
            self.0
                .push((field.name().to_string(), format!("{value:?}")));
        }

        fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
            self.0.push((field.name().to_string(), value.to_string()));
        }
    }

    fn with_test_subscriber<F: FnOnce()>(f: F) -> Vec<CapturedEvent> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let layer = TestLayer {
            events: Arc::clone(&events),
        };
        let subscriber = tracing_subscriber::registry().with(layer);
        tracing::subscriber::with_default(subscriber, f);
        Arc::try_unwrap(events).unwrap().into_inner().unwrap()
    }

    fn has_field(event: &CapturedEvent, key: &str, value: &str) -> bool {
        event.fields.iter().any(|(k, v)| k == key && v == value)
    }

    fn admin() -> AuthContext {
        AuthContext::new(SubjectId::new(7), RealmId::new(5), Roles::admin())
    }

    #[test]
    fn denied_event_carries_reason_code() {
        let event = AuditEvent::denied(
            Operation::PatchIdentity,
            Some(&admin()),
            "identity 12",
            DenyReason::CrossRealm.as_str(),
        );

        let events = with_test_subscriber(|| emit(&event));

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].target, "audit");
        assert!(has_field(&events[0], "event", "access_denied"));
        assert!(has_field(&events[0], "operation", "patch_identity"));
        assert!(has_field(&events[0], "subject", "7"));
        assert!(has_field(&events[0], "realm", "5"));
        assert!(has_field(&events[0], "reason", "cross_realm"));
    }

    #[test]
    fn anonymous_callers_are_labelled() {
        let event = AuditEvent::new(
            Operation::CreateIdentity,
            None,
            "username scout01",
            Outcome::Allowed,
        );

        let events = with_test_subscriber(|| emit(&event));

        assert!(has_field(&events[0], "event", "access_granted"));
        assert!(has_field(&events[0], "subject", "anonymous"));
        assert!(has_field(&events[0], "outcome", "allowed"));
    }

    #[tokio::test]
    async fn saturated_sink_drops_oldest_and_counts_them() {
        let metrics = Arc::new(Metrics::new());
        let (sink, consumer) = AuditSink::spawn(2, Arc::clone(&metrics));

        for i in 0..5 {
            sink.submit(AuditEvent::new(
                Operation::WriteReport,
                Some(&admin()),
                format!("report {i}"),
                Outcome::Allowed,
            ));
        }
        drop(sink);
        consumer.await.unwrap();

        assert_eq!(metrics.audit_dropped(), 3);
    }

    #[tokio::test]
    async fn submit_after_consumer_stops_does_not_panic() {
        let metrics = Arc::new(Metrics::new());
        let (sink, consumer) = AuditSink::spawn(4, metrics);
        consumer.abort();
        let _ = consumer.await;

        sink.submit(AuditEvent::new(
            Operation::CreateRealm,
            None,
            "realm Pigmice",
            Outcome::Denied,
        ));
    }
}
