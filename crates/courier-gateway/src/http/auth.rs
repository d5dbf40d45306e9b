//! Login, code verification, and session status.
//!
//! Login state is a 2–3 step handshake driven through the client actor; the
//! gateway only persists credentials once an account reaches `authenticated`
//! so session restore can reopen it after a restart.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

use courier_client::types::{AuthResult, Credentials};

use crate::app::AppState;
use crate::token;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub account: String,
    pub api_id: String,
    pub api_hash: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub account: String,
    pub code: String,
    pub password: Option<String>,
}

/// POST /api/auth/login
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if req.account.is_empty() || req.api_id.is_empty() || req.api_hash.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "missing credentials"})),
        ));
    }

    let creds = Credentials {
        account: req.account.clone(),
        api_id: req.api_id,
        api_hash: req.api_hash,
    };
    let result = state.client.login(creds.clone()).await.map_err(internal)?;

    let mut body = auth_body(&result);
    if matches!(result, AuthResult::Authenticated) {
        remember_account(&state, &creds);
        attach_token(&state, &mut body, &req.account);
    }
    info!(account = %req.account, "login step completed");
    Ok(Json(body))
}

/// POST /api/auth/verify
pub async fn verify_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<VerifyRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if req.account.is_empty() || req.code.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "missing account or code"})),
        ));
    }

    // The pending entry is consumed on success, so grab the credentials
    // before driving the state machine.
    let pending = state
        .client
        .pending_credentials(&req.account)
        .await
        .map_err(internal)?;

    let result = state
        .client
        .verify(&req.account, &req.code, req.password.as_deref())
        .await
        .map_err(internal)?;

    let mut body = auth_body(&result);
    if matches!(result, AuthResult::Authenticated) {
        if let Some(creds) = pending {
            remember_account(&state, &creds);
        }
        attach_token(&state, &mut body, &req.account);
    }
    info!(account = %req.account, "verification step completed");
    Ok(Json(body))
}

/// GET /api/auth/status
pub async fn status_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let account = token::bearer_account(&headers, &state.config.gateway.token_secret)?;
    let connected = state.client.is_connected(&account).await.map_err(internal)?;
    Ok(Json(json!({
        "account": account,
        "connected": connected,
    })))
}

fn auth_body(result: &AuthResult) -> Value {
    serde_json::to_value(result).unwrap_or_else(|_| json!({"state": "rejected"}))
}

fn attach_token(state: &AppState, body: &mut Value, account: &str) {
    if let Some(obj) = body.as_object_mut() {
        obj.insert(
            "session_token".to_string(),
            Value::String(token::issue(&state.config.gateway.token_secret, account)),
        );
    }
}

fn remember_account(state: &AppState, creds: &Credentials) {
    if let Err(e) = state
        .store
        .save_account(&creds.account, &creds.api_id, &creds.api_hash)
    {
        warn!(account = %creds.account, error = %e, "failed to persist account record");
    }
}

pub(crate) fn internal(e: impl std::fmt::Display) -> (StatusCode, Json<Value>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"error": e.to_string()})),
    )
}
