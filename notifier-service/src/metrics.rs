use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, TextEncoder};

static RECORDS_CONSUMED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    let counter = IntCounter::new(
        "notifier_service_records_consumed_total",
        "Broker records read by the consumer loop",
    )
    .expect("failed to create notifier_service_records_consumed_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register notifier_service_records_consumed_total");
    counter
});

static DECODE_FAILURES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    let counter = IntCounter::new(
        "notifier_service_decode_failures_total",
        "Broker records skipped because they failed to decode",
    )
    .expect("failed to create notifier_service_decode_failures_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register notifier_service_decode_failures_total");
    counter
});

static PAYLOADS_DELIVERED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    let counter = IntCounter::new(
        "notifier_service_payloads_delivered_total",
        "Payloads enqueued onto a live connection",
    )
    .expect("failed to create notifier_service_payloads_delivered_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register notifier_service_payloads_delivered_total");
    counter
});

static PAYLOADS_DROPPED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "notifier_service_payloads_dropped_total",
            "Payloads dropped instead of delivered, by reason",
        ),
        &["reason"],
    )
    .expect("failed to create notifier_service_payloads_dropped_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register notifier_service_payloads_dropped_total");
    counter
});

pub fn record_consumed() {
    RECORDS_CONSUMED_TOTAL.inc();
}

pub fn record_decode_failure() {
    DECODE_FAILURES_TOTAL.inc();
}

pub fn record_delivered() {
    PAYLOADS_DELIVERED_TOTAL.inc();
}

pub fn record_dropped(reason: &str) {
    PAYLOADS_DROPPED_TOTAL.with_label_values(&[reason]).inc();
}

pub async fn serve_metrics() -> Response {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        return (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response();
    }

    (
        StatusCode::OK,
        [("content-type", encoder.format_type().to_string())],
        buffer,
    )
        .into_response()
}
