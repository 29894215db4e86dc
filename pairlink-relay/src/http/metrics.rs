//! Prometheus metrics endpoint.

use crate::server::ChatRelay;
use axum::{http::header::CONTENT_TYPE, response::IntoResponse, Extension};
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// Prometheus metrics handler.
///
/// Returns metrics in Prometheus text format. Includes both gauges
/// (current state) and counters (monotonic since startup).
pub async fn metrics_handler(Extension(relay): Extension<Arc<ChatRelay>>) -> impl IntoResponse {
    let m = relay.metrics();

    // Gauges — current state
    let online = relay.online_count().await;
    let sessions = relay.session_count().await;

    // Counters — monotonic since startup
    let conns_total = m.connections_total.load(Ordering::Relaxed);
    let forwarded = m.packets_forwarded.load(Ordering::Relaxed);
    let bytes = m.bytes_forwarded.load(Ordering::Relaxed);
    let gated = m.gated_drops.load(Ordering::Relaxed);
    let misses = m.delivery_misses.load(Ordering::Relaxed);
    let overflow = m.overflow_drops.load(Ordering::Relaxed);
    let errors = m.protocol_errors.load(Ordering::Relaxed);
    let bans = m.bans_total.load(Ordering::Relaxed);

    let body = format!(
        r#"# HELP pairlink_clients_online Number of online clients
# TYPE pairlink_clients_online gauge
pairlink_clients_online {online}

# HELP pairlink_sessions_tracked Number of tracked session pairs
# TYPE pairlink_sessions_tracked gauge
pairlink_sessions_tracked {sessions}

# HELP pairlink_info Server information
# TYPE pairlink_info gauge
pairlink_info{{version="{version}"}} 1

# HELP pairlink_connections_total Total transport connections accepted
# TYPE pairlink_connections_total counter
pairlink_connections_total {conns_total}

# HELP pairlink_packets_forwarded_total Total packets forwarded to a peer queue
# TYPE pairlink_packets_forwarded_total counter
pairlink_packets_forwarded_total {forwarded}

# HELP pairlink_bytes_forwarded_total Total wire bytes forwarded
# TYPE pairlink_bytes_forwarded_total counter
pairlink_bytes_forwarded_total {bytes}

# HELP pairlink_gated_drops_total Packets dropped by the encryption/session gate
# TYPE pairlink_gated_drops_total counter
pairlink_gated_drops_total {gated}

# HELP pairlink_delivery_misses_total Packets addressed to an offline nickname
# TYPE pairlink_delivery_misses_total counter
pairlink_delivery_misses_total {misses}

# HELP pairlink_overflow_drops_total Packets dropped on a full outbound queue
# TYPE pairlink_overflow_drops_total counter
pairlink_overflow_drops_total {overflow}

# HELP pairlink_protocol_errors_total Malformed records discarded
# TYPE pairlink_protocol_errors_total counter
pairlink_protocol_errors_total {errors}

# HELP pairlink_bans_total Total bans applied
# TYPE pairlink_bans_total counter
pairlink_bans_total {bans}
"#,
        version = env!("CARGO_PKG_VERSION"),
    );

    (
        [(CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}
