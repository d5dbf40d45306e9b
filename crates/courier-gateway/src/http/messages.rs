//! Message creation and lifecycle endpoints.
//!
//! Immediate sends persist a `pending` row first and finalize it after
//! dispatch, so a crash mid-send leaves something the scheduler will pick up
//! rather than a half-delivered batch with no record.

use axum::{
    extract::{Multipart, Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

use courier_core::types::{DispatchSummary, JobStatus, Recipient};
use courier_media::{MediaStaging, Upload};
use courier_scheduler::SchedulerError;
use courier_store::NewJob;

use crate::app::AppState;
use crate::http::auth::internal;
use crate::token;

type HandlerError = (StatusCode, Json<Value>);

#[derive(Debug, Deserialize)]
pub struct SendRequest {
    #[serde(default)]
    pub recipients: Vec<Recipient>,
    #[serde(default)]
    pub message: String,
    pub schedule_for: Option<String>,
}

/// POST /api/messages/send — JSON body, text only.
pub async fn send_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<SendRequest>,
) -> Result<Json<Value>, HandlerError> {
    let account = authenticate_connected(&state, &headers).await?;

    if req.recipients.is_empty() || req.message.is_empty() {
        return Err(bad_request("missing recipients or message"));
    }
    check_recipient_cap(&state, &req.recipients)?;

    // Some clients send `schedule_for: ""` rather than omitting the field;
    // a blank schedule means send now, not a job the scanner fails later.
    let schedule_for = req.schedule_for.filter(|s| !s.is_empty());

    submit(&state, &account, req.recipients, req.message, schedule_for, Vec::new()).await
}

/// POST /api/messages/send-media — multipart form with `recipients` (JSON),
/// `message`, optional `schedule_for`, and `images*` file parts.
pub async fn send_media_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<Value>, HandlerError> {
    let account = authenticate_connected(&state, &headers).await?;

    let mut recipients: Option<Vec<Recipient>> = None;
    let mut message = String::new();
    let mut schedule_for: Option<String> = None;
    let mut uploads: Vec<Upload> = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(&format!("malformed multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "recipients" => {
                let raw = field.text().await.map_err(|e| bad_request(&e.to_string()))?;
                recipients = Some(
                    serde_json::from_str(&raw)
                        .map_err(|_| bad_request("invalid recipients format"))?,
                );
            }
            "message" => {
                message = field.text().await.map_err(|e| bad_request(&e.to_string()))?;
            }
            "schedule_for" => {
                let raw = field.text().await.map_err(|e| bad_request(&e.to_string()))?;
                if !raw.is_empty() {
                    schedule_for = Some(raw);
                }
            }
            n if n.starts_with("images") => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| bad_request(&format!("failed reading upload: {e}")))?;
                uploads.push(Upload {
                    file_name,
                    content_type,
                    bytes: bytes.to_vec(),
                });
            }
            other => {
                warn!(field = %other, "ignoring unknown multipart field");
            }
        }
    }

    let recipients = recipients.ok_or_else(|| bad_request("missing recipients"))?;
    if recipients.is_empty() {
        return Err(bad_request("missing recipients"));
    }
    check_recipient_cap(&state, &recipients)?;
    if message.is_empty() && uploads.is_empty() {
        return Err(bad_request("missing message or images"));
    }
    validate_uploads(&state, &uploads)?;

    submit(&state, &account, recipients, message, schedule_for, uploads).await
}

/// GET /api/messages/scheduled
pub async fn scheduled_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Value>, HandlerError> {
    let account = token::bearer_account(&headers, &state.config.gateway.token_secret)?;
    let jobs = state.store.list(Some(&account)).map_err(internal)?;
    Ok(Json(json!({ "messages": jobs })))
}

/// POST /api/messages/execute/{id} — run a pending job ahead of schedule.
pub async fn execute_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<Value>, HandlerError> {
    let account = authenticate_connected(&state, &headers).await?;
    owned_job(&state, id, &account)?;

    match state.executor.execute(id).await {
        Ok(summary) => Ok(Json(summary_body(id, &summary))),
        Err(SchedulerError::JobNotFound { .. }) => Err(not_found("message not found")),
        Err(SchedulerError::AlreadyProcessed { .. }) => {
            Err(bad_request("message already processed"))
        }
        Err(e) => Err(internal(e)),
    }
}

/// DELETE /api/messages/{id}
pub async fn delete_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<Value>, HandlerError> {
    let account = token::bearer_account(&headers, &state.config.gateway.token_secret)?;

    // Fetch first so staged media can be reclaimed after the row goes.
    let job = state.store.get(id).map_err(internal)?;
    if !state.store.delete(id, &account).map_err(internal)? {
        return Err(not_found("message not found"));
    }
    if let Some(job) = job {
        state.media.reclaim(&job.media_refs);
    }
    info!(job_id = id, account = %account, "scheduled message deleted");
    Ok(Json(json!({"success": true})))
}

// ── Shared pieces ────────────────────────────────────────────────────────────

/// Persist the job (staging media if any), then dispatch immediately unless a
/// schedule was requested.
async fn submit(
    state: &AppState,
    account: &str,
    recipients: Vec<Recipient>,
    message: String,
    schedule_for: Option<String>,
    uploads: Vec<Upload>,
) -> Result<Json<Value>, HandlerError> {
    let immediate = schedule_for.is_none();
    let scheduled_for = schedule_for.unwrap_or_else(|| chrono::Utc::now().to_rfc3339());

    let (temp_key, staged_refs) = if uploads.is_empty() {
        (None, Vec::new())
    } else {
        let key = MediaStaging::temp_key();
        let refs = state.media.stage(&uploads, &key).map_err(internal)?;
        (Some(key), refs)
    };

    let id = state
        .store
        .create(&NewJob {
            owner: account.to_string(),
            recipients,
            body: message,
            scheduled_for,
            media_refs: staged_refs.clone(),
        })
        .map_err(internal)?;

    // Filesystem half of the two-phase media commit: rename the temp staging
    // directory onto the now-known job id. A failed rename fails the job.
    if let Some(temp_key) = temp_key {
        match state.media.commit(&staged_refs, &temp_key, id) {
            Ok(committed) => {
                state
                    .store
                    .update_media_refs(id, &committed)
                    .map_err(internal)?;
            }
            Err(e) => {
                warn!(job_id = id, error = %e, "media commit failed, failing job");
                let now = chrono::Utc::now().to_rfc3339();
                if let Err(e) = state.store.mark_terminal(id, JobStatus::Failed, &now) {
                    warn!(job_id = id, error = %e, "could not finalize broken job");
                }
                state.media.reclaim(&staged_refs);
                return Err(internal("failed to store media for scheduled message"));
            }
        }
    }

    if immediate {
        let summary = state.executor.execute(id).await.map_err(internal)?;
        info!(
            job_id = id,
            account = %account,
            sent = summary.sent_count,
            failed = summary.failed_count,
            "immediate message dispatched"
        );
        Ok(Json(summary_body(id, &summary)))
    } else {
        info!(job_id = id, account = %account, "message scheduled");
        Ok(Json(json!({
            "success": true,
            "message": "message scheduled",
            "scheduled_id": id,
        })))
    }
}

async fn authenticate_connected(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<String, HandlerError> {
    let account = token::bearer_account(headers, &state.config.gateway.token_secret)?;
    if !state.client.is_connected(&account).await.map_err(internal)? {
        return Err((
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "not authenticated"})),
        ));
    }
    Ok(account)
}

fn check_recipient_cap(state: &AppState, recipients: &[Recipient]) -> Result<(), HandlerError> {
    let cap = state.config.dispatch.max_recipients;
    if recipients.len() > cap {
        return Err(bad_request(&format!(
            "too many recipients: {} (max {cap})",
            recipients.len()
        )));
    }
    Ok(())
}

fn validate_uploads(state: &AppState, uploads: &[Upload]) -> Result<(), HandlerError> {
    let cfg = &state.config.media;
    for upload in uploads {
        if upload.file_name.is_empty() {
            return Err(bad_request("no file selected"));
        }
        let ext = upload
            .file_name
            .rsplit_once('.')
            .map(|(_, e)| e.to_ascii_lowercase())
            .unwrap_or_default();
        if !cfg.allowed_extensions.contains(&ext) {
            return Err(bad_request(&format!(
                "invalid file type: {ext}. allowed: {}",
                cfg.allowed_extensions.join(", ")
            )));
        }
        if upload.bytes.len() as u64 > cfg.max_file_bytes {
            return Err(bad_request(&format!(
                "file too large: {}. max size: {} bytes",
                upload.file_name, cfg.max_file_bytes
            )));
        }
    }
    Ok(())
}

fn owned_job(state: &AppState, id: i64, account: &str) -> Result<(), HandlerError> {
    match state.store.get(id).map_err(internal)? {
        Some(job) if job.owner == account => Ok(()),
        // Someone else's job looks like a missing one.
        _ => Err(not_found("message not found")),
    }
}

fn summary_body(job_id: i64, summary: &DispatchSummary) -> Value {
    json!({
        "success": true,
        "job_id": job_id,
        "sent_count": summary.sent_count,
        "failed_count": summary.failed_count,
        "results": summary.results,
    })
}

fn bad_request(msg: &str) -> HandlerError {
    (StatusCode::BAD_REQUEST, Json(json!({"error": msg})))
}

fn not_found(msg: &str) -> HandlerError {
    (StatusCode::NOT_FOUND, Json(json!({"error": msg})))
}
