//! Metrics instrumentation for the transport layer
//!
//! Thin wrappers around the `metrics` facade so call sites stay terse and
//! metric/label names live in one place. An exporter is wired up by the
//! embedding application, not by this crate.

/// Label value constants
pub mod labels {
    /// Buffered (HTTP/1) transport
    pub const TRANSPORT_BUFFERED: &str = "buffered";

    /// Multiplexed (HTTP/2) transport
    pub const TRANSPORT_MULTIPLEXED: &str = "multiplexed";

    /// Request completed successfully
    pub const OUTCOME_SUCCESS: &str = "success";

    /// Request failed
    pub const OUTCOME_ERROR: &str = "error";

    /// Request timed out
    pub const OUTCOME_TIMEOUT: &str = "timeout";
}

/// Counter metrics
pub mod counters {
    /// A request was handed to a transport adapter
    pub fn request_started(transport: &'static str) {
        metrics::counter!("tidewire_requests_started_total", "transport" => transport)
            .increment(1);
    }

    /// A request finished with the given outcome
    pub fn request_completed(transport: &'static str, outcome: &'static str) {
        metrics::counter!(
            "tidewire_requests_completed_total",
            "transport" => transport,
            "outcome" => outcome
        )
        .increment(1);
    }

    /// A new multiplexed session was opened
    pub fn session_opened() {
        metrics::counter!("tidewire_sessions_opened_total").increment(1);
    }

    /// A multiplexed session was evicted from the registry
    pub fn session_evicted() {
        metrics::counter!("tidewire_sessions_evicted_total").increment(1);
    }

    /// A keep-alive connection was reused from the pool
    pub fn connection_reused() {
        metrics::counter!("tidewire_connections_reused_total").increment(1);
    }

    /// A streamed response body finished (cleanly or with an error)
    pub fn stream_completed(outcome: &'static str) {
        metrics::counter!("tidewire_streams_completed_total", "outcome" => outcome).increment(1);
    }
}

/// Histogram metrics
pub mod histograms {
    /// End-to-end duration of a transport request in milliseconds
    pub fn request_duration(transport: &'static str, millis: u64) {
        metrics::histogram!("tidewire_request_duration_ms", "transport" => transport)
            .record(millis as f64);
    }
}
