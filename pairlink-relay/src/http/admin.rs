//! Operator snapshot and command endpoints.

use crate::events::EventRecord;
use crate::server::ChatRelay;
use crate::session::{SessionSummary, TranscriptEntry};
use axum::extract::{Path, Query};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::Deserialize;
use std::sync::Arc;

/// `GET /online` — sorted online nicknames.
pub async fn online_handler(Extension(relay): Extension<Arc<ChatRelay>>) -> Json<Vec<String>> {
    Json(relay.online_users().await)
}

/// `GET /sessions` — every tracked pair with status and transfer counters.
pub async fn sessions_handler(
    Extension(relay): Extension<Arc<ChatRelay>>,
) -> Json<Vec<SessionSummary>> {
    Json(relay.sessions().await)
}

/// `GET /sessions/{a}/{b}/transcript` — ordered transcript of one pair.
///
/// The two nicknames may be given in either order.
pub async fn transcript_handler(
    Extension(relay): Extension<Arc<ChatRelay>>,
    Path((a, b)): Path<(String, String)>,
) -> Result<Json<Vec<TranscriptEntry>>, StatusCode> {
    relay
        .transcript(&a, &b)
        .await
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

/// Query parameters for the event feed.
#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    /// Return events with a sequence number greater than this (default 0).
    #[serde(default)]
    pub since: u64,
}

/// `GET /events?since=SEQ` — poll the lifecycle event feed.
pub async fn events_handler(
    Extension(relay): Extension<Arc<ChatRelay>>,
    Query(query): Query<EventsQuery>,
) -> Json<Vec<EventRecord>> {
    Json(relay.events_since(query.since).await)
}

/// `POST /ban/{nick}` — ban a nickname for the life of the process.
pub async fn ban_handler(
    Extension(relay): Extension<Arc<ChatRelay>>,
    Path(nick): Path<String>,
) -> StatusCode {
    relay.ban(&nick).await;
    StatusCode::NO_CONTENT
}
