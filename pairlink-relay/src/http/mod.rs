//! HTTP operator interface.
//!
//! Read-only snapshots of the relay state plus the ban command. The
//! operator console is a client of the core, not a participant in its
//! locking.

pub mod admin;
pub mod health;
mod metrics;

use crate::server::ChatRelay;
use axum::routing::{get, post};
use axum::{Extension, Router};
use std::sync::Arc;

pub use health::HealthStatus;

/// Build the HTTP router with all operator endpoints.
pub fn build_router(relay: Arc<ChatRelay>) -> Router {
    let mut router = Router::new()
        .route("/health", get(health::health_handler))
        .route("/online", get(admin::online_handler))
        .route("/sessions", get(admin::sessions_handler))
        .route("/sessions/:a/:b/transcript", get(admin::transcript_handler))
        .route("/events", get(admin::events_handler))
        .route("/ban/:nick", post(admin::ban_handler));
    if relay.config().http.metrics_enabled {
        router = router.route("/metrics", get(metrics::metrics_handler));
    }
    router.layer(Extension(relay))
}
