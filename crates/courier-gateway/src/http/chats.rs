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

/// GET /api/chats — the authenticated account's dialog list.
pub async fn chats_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let account = token::bearer_account(&headers, &state.config.gateway.token_secret)?;

    if !state.client.is_connected(&account).await.map_err(internal)? {
        return Err((
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "not authenticated"})),
        ));
    }

    let dialogs = state.client.dialogs(&account).await.map_err(internal)?;
    Ok(Json(json!({ "chats": dialogs })))
}
