use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, Encoder, HistogramVec,
    IntCounter, IntCounterVec, TextEncoder,
};

lazy_static! {
    // HTTP Metrics
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "http_requests_total",
        "Total number of HTTP requests",
        &["method", "path", "status"]
    )
    .unwrap();

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "http_request_duration_seconds",
        "HTTP request duration in seconds",
        &["method", "path"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .unwrap();

    // Business Metrics
    pub static ref ENROLLMENTS_TOTAL: IntCounter = register_int_counter!(
        "enrollments_total",
        "Total number of successful course enrollments"
    )
    .unwrap();

    pub static ref XP_AWARDS_TOTAL: IntCounter = register_int_counter!(
        "xp_awards_total",
        "Total number of lesson-completion XP awards"
    )
    .unwrap();

    pub static ref PROGRESS_UPDATES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "progress_updates_total",
        "Total number of lesson progress updates",
        &["transition"]
    )
    .unwrap();

    pub static ref SUBMISSIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "submissions_total",
        "Total number of code submissions",
        &["status"]
    )
    .unwrap();

    pub static ref JUDGE_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "judge_requests_total",
        "Total number of requests to the judging service",
        &["outcome"]
    )
    .unwrap();
}

/// Render all registered metrics in Prometheus text format
pub fn render_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_metrics_includes_registered_counters() {
        ENROLLMENTS_TOTAL.inc();
        XP_AWARDS_TOTAL.inc();
        SUBMISSIONS_TOTAL.with_label_values(&["passed"]).inc();

        let output = render_metrics().unwrap();
        assert!(output.contains("enrollments_total"));
        assert!(output.contains("xp_awards_total"));
        assert!(output.contains("submissions_total"));
    }
}
