use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    routing::{delete, get, post},
    Router,
};
use tower_http::cors::CorsLayer;

use courier_client::actor::ClientHandle;
use courier_core::config::CourierConfig;
use courier_media::MediaStaging;
use courier_scheduler::JobExecutor;
use courier_store::JobStore;

/// Central shared state, passed as `Arc<AppState>` to all handlers.
pub struct AppState {
    pub config: CourierConfig,
    pub store: Arc<JobStore>,
    pub client: ClientHandle,
    pub media: MediaStaging,
    pub executor: Arc<JobExecutor>,
    scheduler_running: AtomicBool,
}

impl AppState {
    pub fn new(
        config: CourierConfig,
        store: Arc<JobStore>,
        client: ClientHandle,
        media: MediaStaging,
        executor: Arc<JobExecutor>,
    ) -> Self {
        Self {
            config,
            store,
            client,
            media,
            executor,
            scheduler_running: AtomicBool::new(false),
        }
    }

    pub fn set_scheduler_running(&self, running: bool) {
        self.scheduler_running.store(running, Ordering::Relaxed);
    }

    pub fn scheduler_running(&self) -> bool {
        self.scheduler_running.load(Ordering::Relaxed)
    }
}

/// File parts a single multipart request may reasonably carry; the per-file
/// cap times this sizes the whole-request body limit.
const BODY_LIMIT_FILE_SLOTS: u64 = 8;

/// Assemble the full Axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.gateway.cors_origins);

    // Axum's default 2 MB body cap would reject uploads before the per-file
    // size check ever sees them.
    let body_limit = state
        .config
        .media
        .max_file_bytes
        .saturating_mul(BODY_LIMIT_FILE_SLOTS)
        .saturating_add(64 * 1024) as usize;

    Router::new()
        .route("/api/health", get(crate::http::health::health_handler))
        .route("/api/auth/login", post(crate::http::auth::login_handler))
        .route("/api/auth/verify", post(crate::http::auth::verify_handler))
        .route("/api/auth/status", get(crate::http::auth::status_handler))
        .route("/api/chats", get(crate::http::chats::chats_handler))
        .route("/api/messages/send", post(crate::http::messages::send_handler))
        .route(
            "/api/messages/send-media",
            post(crate::http::messages::send_media_handler),
        )
        .route(
            "/api/messages/scheduled",
            get(crate::http::messages::scheduled_handler),
        )
        .route(
            "/api/messages/execute/{id}",
            post(crate::http::messages::execute_handler),
        )
        .route(
            "/api/messages/{id}",
            delete(crate::http::messages::delete_handler),
        )
        .route(
            "/api/scheduler/status",
            get(crate::http::scheduler::status_handler),
        )
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(cors)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| o.parse::<HeaderValue>().ok())
        .collect();
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers(tower_http::cors::Any)
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use rusqlite::Connection;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use courier_client::actor::ClientActor;
    use courier_client::registry::SessionRegistry;
    use courier_client::sandbox::SandboxConnector;
    use courier_client::types::Credentials;
    use courier_dispatch::DispatchEngine;
    use courier_scheduler::JobExecutor;
    use courier_store::JobStore;

    use super::*;
    use crate::token;

    const ACCOUNT: &str = "+15559000";
    const BOUNDARY: &str = "courier-gateway-test";

    /// Full router over an in-memory store and a logged-in sandbox account.
    async fn test_app() -> (Router, String, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let mut config = CourierConfig::default();
        config.dispatch.text_cooldown_ms = 0;
        config.dispatch.media_cooldown_ms = 0;

        let store = Arc::new(JobStore::new(Connection::open_in_memory().unwrap()).unwrap());
        let connector = SandboxConnector::new();
        let registry = SessionRegistry::new(Arc::new(connector), dir.path().join("s"));
        let handle = ClientActor::spawn(registry);
        handle
            .login(Credentials {
                account: ACCOUNT.into(),
                api_id: "1".into(),
                api_hash: "h".into(),
            })
            .await
            .unwrap();
        handle.verify(ACCOUNT, "000000", None).await.unwrap();

        let media = MediaStaging::new(dir.path().join("m"));
        let dispatch = DispatchEngine::new(handle.clone(), &config.dispatch);
        let executor = Arc::new(JobExecutor::new(Arc::clone(&store), dispatch, media.clone()));
        let token = token::issue(&config.gateway.token_secret, ACCOUNT);
        let state = Arc::new(AppState::new(config, store, handle, media, executor));
        (build_router(state), token, dir)
    }

    fn upload_body(message: &str, file_name: &str, payload: &[u8]) -> Vec<u8> {
        let recipients = r#"[{"identifier":"@alice","name":"alice"}]"#;
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"recipients\"\r\n\r\n{recipients}\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"message\"\r\n\r\n{message}\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"images0\"; filename=\"{file_name}\"\r\nContent-Type: image/png\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(payload);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    async fn response_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn multi_megabyte_upload_is_accepted() {
        let (app, token, _dir) = test_app().await;
        let body = upload_body("big photo", "photo.png", &vec![0u8; 3 * 1024 * 1024]);

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/messages/send-media")
                    .header(header::AUTHORIZATION, format!("Bearer {token}"))
                    .header(
                        header::CONTENT_TYPE,
                        format!("multipart/form-data; boundary={BOUNDARY}"),
                    )
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = response_json(response).await;
        assert_eq!(json["success"], json!(true));
        assert_eq!(json["sent_count"], json!(1));
    }

    #[tokio::test]
    async fn oversized_upload_gets_the_size_error() {
        // Over the per-file cap but under the request-body cap: the request
        // must reach validation and come back with the size message, not a
        // generic multipart failure.
        let (app, token, _dir) = test_app().await;
        let body = upload_body("too big", "photo.png", &vec![0u8; 11 * 1024 * 1024]);

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/messages/send-media")
                    .header(header::AUTHORIZATION, format!("Bearer {token}"))
                    .header(
                        header::CONTENT_TYPE,
                        format!("multipart/form-data; boundary={BOUNDARY}"),
                    )
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = response_json(response).await;
        assert!(json["error"]
            .as_str()
            .unwrap()
            .starts_with("file too large"));
    }

    #[tokio::test]
    async fn blank_schedule_for_sends_immediately() {
        let (app, token, _dir) = test_app().await;
        let payload = json!({
            "recipients": [{"identifier": "@alice", "name": "alice"}],
            "message": "hello",
            "schedule_for": "",
        });

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/messages/send")
                    .header(header::AUTHORIZATION, format!("Bearer {token}"))
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(serde_json::to_string(&payload).unwrap()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = response_json(response).await;
        assert_eq!(json["sent_count"], json!(1));
        assert!(json.get("scheduled_id").is_none());
    }
}
