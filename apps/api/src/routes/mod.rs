pub mod health;
pub mod ui;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::session::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let upload_limit = state.max_upload_bytes;

    Router::new()
        .route("/", get(ui::index_handler))
        .route("/health", get(health::health_handler))
        // Session API
        .route("/api/v1/sessions", post(handlers::handle_create_session))
        .route(
            "/api/v1/sessions/:id",
            get(handlers::handle_get_session).delete(handlers::handle_end_session),
        )
        .route(
            "/api/v1/sessions/:id/documents",
            post(handlers::handle_build_index),
        )
        .route("/api/v1/sessions/:id/questions", post(handlers::handle_ask))
        .route(
            "/api/v1/sessions/:id/transcript",
            get(handlers::handle_transcript),
        )
        .layer(DefaultBodyLimit::max(upload_limit))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
        response::Response,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use uuid::Uuid;

    use super::*;
    use crate::session::controller::SessionSettings;
    use crate::state::SessionStore;
    use crate::testing::{providers, EchoChat, HashEmbedder};

    const BOUNDARY: &str = "cvchat-test-boundary";

    fn app() -> (Router, AppState, Arc<EchoChat>) {
        let embedder = HashEmbedder::new();
        let chat = EchoChat::new();
        let state = AppState {
            sessions: SessionStore::default(),
            providers: providers(&embedder, &chat),
            settings: SessionSettings::default(),
            max_upload_bytes: 1024 * 1024,
        };
        (build_router(state.clone()), state, chat)
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn create_session(app: &Router) -> Uuid {
        let response = app
            .clone()
            .oneshot(
                Request::post("/api/v1/sessions")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = json_body(response).await;
        body["session_id"].as_str().unwrap().parse().unwrap()
    }

    fn upload(id: Uuid, files: &[(&str, &str)]) -> Request<Body> {
        let mut body = String::new();
        for (name, content) in files {
            body.push_str(&format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"files\"; filename=\"{name}\"\r\n\
                 Content-Type: text/plain\r\n\r\n{content}\r\n"
            ));
        }
        body.push_str(&format!("--{BOUNDARY}--\r\n"));

        Request::post(format!("/api/v1/sessions/{id}/documents"))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn ask(id: Uuid, question: &str) -> Request<Body> {
        Request::post(format!("/api/v1/sessions/{id}/questions"))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json!({ "question": question }).to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _, _) = app();
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn test_index_page_is_served() {
        let (app, _, _) = app();
        let response = app
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(String::from_utf8_lossy(&bytes).contains("Chat with CVs"));
    }

    #[tokio::test]
    async fn test_ask_before_build_is_conflict() {
        let (app, _, chat) = app();
        let id = create_session(&app).await;

        let response = app.oneshot(ask(id, "Who is Jane?")).await.unwrap();

        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(json_body(response).await["error"]["code"], "INVALID_STATE");
        assert!(chat.requests().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_session_is_not_found() {
        let (app, _, _) = app();
        let response = app
            .oneshot(ask(Uuid::new_v4(), "Who is Jane?"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_upload_then_ask() {
        let (app, _, _) = app();
        let id = create_session(&app).await;

        let response = app
            .clone()
            .oneshot(upload(id, &[("jane.txt", "Name: Jane Doe, Skills: Go, Rust")]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let summary = json_body(response).await;
        assert_eq!(summary["documents"], 1);
        assert_eq!(summary["chunks"], 1);

        let response = app
            .clone()
            .oneshot(ask(id, "What are Jane's skills?"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let reply = json_body(response).await;
        assert_eq!(reply["turns"][0]["speaker"], "user");
        assert_eq!(reply["turns"][1]["speaker"], "assistant");
        let answer = reply["turns"][1]["text"].as_str().unwrap();
        assert!(answer.contains("Go") && answer.contains("Rust"));
        assert!(reply["sources"][0]["text"]
            .as_str()
            .unwrap()
            .contains("Skills: Go, Rust"));

        let response = app
            .oneshot(
                Request::get(format!("/api/v1/sessions/{id}/transcript"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let html = String::from_utf8_lossy(&bytes);
        assert!(html.contains("What are Jane&#39;s skills?"));
        assert!(html.contains(r#"class="chat-message bot""#));
    }

    #[tokio::test]
    async fn test_unsupported_upload_is_unprocessable() {
        let (app, _, _) = app();
        let id = create_session(&app).await;

        let response = app
            .oneshot(upload(id, &[("photo.png", "not a cv")]))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(json_body(response).await["error"]["code"], "EXTRACTION_ERROR");
    }

    #[tokio::test]
    async fn test_upload_without_files_is_bad_request() {
        let (app, _, _) = app();
        let id = create_session(&app).await;

        let response = app.oneshot(upload(id, &[])).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_end_session_discards_state() {
        let (app, state, _) = app();
        let id = create_session(&app).await;
        assert_eq!(state.sessions.len().await, 1);

        let response = app
            .clone()
            .oneshot(
                Request::delete(format!("/api/v1/sessions/{id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(state.sessions.len().await, 0);

        let response = app
            .oneshot(
                Request::get(format!("/api/v1/sessions/{id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    async fn assert_validation_envelope(response: Response) {
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        assert!(body["error"]["message"].as_str().is_some_and(|m| !m.is_empty()));
    }

    #[tokio::test]
    async fn test_malformed_session_id_is_json_error() {
        let (app, _, _) = app();
        let response = app
            .oneshot(
                Request::post("/api/v1/sessions/not-a-uuid/questions")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(json!({ "question": "x" }).to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_validation_envelope(response).await;
    }

    #[tokio::test]
    async fn test_malformed_question_body_is_json_error() {
        let (app, _, chat) = app();
        let id = create_session(&app).await;

        let response = app
            .oneshot(
                Request::post(format!("/api/v1/sessions/{id}/questions"))
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(json!({ "q": "x" }).to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_validation_envelope(response).await;
        assert!(chat.requests().is_empty());
    }

    #[tokio::test]
    async fn test_upload_without_multipart_is_json_error() {
        let (app, _, _) = app();
        let id = create_session(&app).await;

        let response = app
            .oneshot(
                Request::post(format!("/api/v1/sessions/{id}/documents"))
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_validation_envelope(response).await;
    }

    #[tokio::test]
    async fn test_session_view_reports_chunks() {
        let (app, _, _) = app();
        let id = create_session(&app).await;
        let view = |app: Router| async move {
            let response = app
                .oneshot(
                    Request::get(format!("/api/v1/sessions/{id}"))
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();
            json_body(response).await
        };

        let before = view(app.clone()).await;
        assert_eq!(before["indexed"], false);
        assert_eq!(before["chunks"], 0);

        let response = app
            .clone()
            .oneshot(upload(id, &[("jane.txt", "Name: Jane Doe, Skills: Go, Rust")]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let after = view(app).await;
        assert_eq!(after["indexed"], true);
        assert_eq!(after["chunks"], 1);
    }
}
