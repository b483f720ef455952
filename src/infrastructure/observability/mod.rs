//! Observability infrastructure - Prometheus metrics

mod prometheus;

pub use prometheus::{
    create_metrics_router, init_metrics, record_admission_denial, record_auth_failure,
    record_quota_resets, record_request, PrometheusMetrics,
};
