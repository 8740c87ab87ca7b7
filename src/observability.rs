use std::net::SocketAddr;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: appointments booked successfully.
pub const BOOKINGS_TOTAL: &str = "slotwise_bookings_total";

/// Counter: booking/reschedule attempts rejected as double bookings.
pub const DOUBLE_BOOKINGS_REJECTED_TOTAL: &str = "slotwise_double_bookings_rejected_total";

/// Counter: appointments cancelled.
pub const CANCELLATIONS_TOTAL: &str = "slotwise_cancellations_total";

/// Counter: appointments rescheduled.
pub const RESCHEDULES_TOTAL: &str = "slotwise_reschedules_total";

/// Counter: time slots created by the generator.
pub const SLOTS_GENERATED_TOTAL: &str = "slotwise_slots_generated_total";

// ── USE metrics (background work) ───────────────────────────────

/// Counter: rating-cache refreshes that failed (logged, never surfaced).
pub const RATING_REFRESH_FAILURES_TOTAL: &str = "slotwise_rating_refresh_failures_total";

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "slotwise_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "slotwise_wal_flush_batch_size";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) {
    let Some(port) = port else { return };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .expect("failed to install Prometheus metrics exporter");
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
}

/// Install the default fmt tracing subscriber. For embedders that don't
/// bring their own.
pub fn init_logging() {
    tracing_subscriber::fmt::init();
}
