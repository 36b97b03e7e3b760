use anyhow::Result;
use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::Response;
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct ClinicMetrics {
    registry: Registry,
    login_attempts: IntCounterVec,
    booking_conflicts: IntCounterVec,
}

impl ClinicMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let login_attempts = IntCounterVec::new(
            Opts::new(
                "clinic_login_attempts_total",
                "Count of login attempts grouped by outcome",
            ),
            &["outcome"],
        )?;
        registry.register(Box::new(login_attempts.clone()))?;

        let booking_conflicts = IntCounterVec::new(
            Opts::new(
                "clinic_booking_conflicts_total",
                "Count of appointment writes rejected by the conflict check",
            ),
            &["operation"],
        )?;
        registry.register(Box::new(booking_conflicts.clone()))?;

        Ok(Self {
            registry,
            login_attempts,
            booking_conflicts,
        })
    }

    pub fn login_attempt(&self, outcome: &str) {
        self.login_attempts.with_label_values(&[outcome]).inc();
    }

    pub fn booking_conflict(&self, operation: &str) {
        self.booking_conflicts.with_label_values(&[operation]).inc();
    }

    pub fn render(&self) -> Result<Response> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        let response = Response::builder()
            .status(StatusCode::OK)
            .header(
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/plain; version=0.0.4"),
            )
            .body(Body::from(buffer))?;
        Ok(response)
    }
}
