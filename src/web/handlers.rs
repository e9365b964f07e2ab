//! HTTP handlers for API endpoints.

use crate::metrics::data::SystemSnapshot;
use crate::monitor::SnapshotReceiver;
use axum::{extract::State, response::Json};
use serde_json::json;

/// Latest published snapshot as JSON.
pub async fn get_stats(State(snapshots): State<SnapshotReceiver>) -> Json<SystemSnapshot> {
    let latest = snapshots.borrow().clone();
    Json(SystemSnapshot::clone(&latest))
}

/// Health check endpoint.
pub async fn health_check() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "trafficdash",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}
