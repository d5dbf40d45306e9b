use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::app::AppState;
use crate::http::auth::internal;
use crate::token;

/// GET /api/scheduler/status — loop state plus the caller's job counts.
pub async fn status_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let account = token::bearer_account(&headers, &state.config.gateway.token_secret)?;
    let stats = state.store.stats(&account).map_err(internal)?;

    Ok(Json(json!({
        "scheduler_running": state.scheduler_running(),
        "server_time": chrono::Utc::now().to_rfc3339(),
        "server_timezone": "UTC",
        "poll_secs": state.config.scheduler.poll_secs,
        "stats": {
            "pending_messages": stats.pending,
            "sent_messages": stats.sent,
            "failed_messages": stats.failed,
            "total_messages": stats.total,
        },
    })))
}
