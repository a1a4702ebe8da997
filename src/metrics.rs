//! Prometheus metrics collection for slchatd.
//!
//! Tracks connection churn, event throughput, and fan-out volume, exposed on
//! the HTTP endpoint alongside the query API.

use prometheus::{
    Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};
use std::sync::OnceLock;

/// Global Prometheus registry for all metrics.
static REGISTRY: OnceLock<Registry> = OnceLock::new();

pub fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::new)
}

static SESSIONS_STARTED: OnceLock<IntCounter> = OnceLock::new();
static CONNECTED_SESSIONS: OnceLock<IntGauge> = OnceLock::new();
static AUTH_FAILURES: OnceLock<IntCounter> = OnceLock::new();
static MESSAGES_STORED: OnceLock<IntCounter> = OnceLock::new();
static EVENTS_RECEIVED: OnceLock<IntCounterVec> = OnceLock::new();
static EVENT_ERRORS: OnceLock<IntCounterVec> = OnceLock::new();

fn int_counter(name: &str, help: &str) -> IntCounter {
    let counter = IntCounter::new(name, help).expect("valid metric definition");
    registry().register(Box::new(counter.clone())).ok();
    counter
}

fn int_counter_vec(name: &str, help: &str, label: &str) -> IntCounterVec {
    let counter = IntCounterVec::new(Opts::new(name, help), &[label])
        .expect("valid metric definition");
    registry().register(Box::new(counter.clone())).ok();
    counter
}

/// Total sessions accepted since startup.
pub fn sessions_started() -> &'static IntCounter {
    SESSIONS_STARTED.get_or_init(|| {
        int_counter("slchat_sessions_started_total", "Sessions accepted since startup")
    })
}

/// Currently attached sessions.
pub fn connected_sessions() -> &'static IntGauge {
    CONNECTED_SESSIONS.get_or_init(|| {
        let gauge = IntGauge::new("slchat_connected_sessions", "Currently attached sessions")
            .expect("valid metric definition");
        registry().register(Box::new(gauge.clone())).ok();
        gauge
    })
}

/// Connections rejected during the auth handshake.
pub fn auth_failures() -> &'static IntCounter {
    AUTH_FAILURES.get_or_init(|| {
        int_counter("slchat_auth_failures_total", "Connections rejected during handshake")
    })
}

/// Messages appended to room logs.
pub fn messages_stored() -> &'static IntCounter {
    MESSAGES_STORED.get_or_init(|| {
        int_counter("slchat_messages_stored_total", "Messages appended to room logs")
    })
}

/// Inbound events by wire name.
pub fn events_received(event: &str) -> IntCounter {
    EVENTS_RECEIVED
        .get_or_init(|| {
            int_counter_vec(
                "slchat_events_received_total",
                "Inbound client events by type",
                "event",
            )
        })
        .with_label_values(&[event])
}

/// Handler errors by error code (silent no-ops included).
pub fn event_errors(code: &str) -> IntCounter {
    EVENT_ERRORS
        .get_or_init(|| {
            int_counter_vec(
                "slchat_event_errors_total",
                "Handler errors by error code",
                "code",
            )
        })
        .with_label_values(&[code])
}

/// Force registration of every metric so scrapes see zeroed series.
pub fn init() {
    sessions_started();
    connected_sessions();
    auth_failures();
    messages_stored();
    events_received("auth");
    event_errors("not_a_room");
}

/// Render all registered metrics in Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let families = registry().gather();
    let mut buffer = Vec::new();
    if encoder.encode(&families, &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
