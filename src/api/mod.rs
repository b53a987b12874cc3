mod candidates;
pub mod error;
mod extract;
mod results;
mod sessions;
mod validation;
mod vote;
mod voters;

use axum::{
    http::{header::CONTENT_TYPE, Method, Uri},
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::db::now_timestamp;
use crate::AppState;

use error::ApiError;

pub fn create_router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        // Sessions
        .route("/sessions", post(sessions::create_session))
        .route("/sessions/close", post(sessions::close_session))
        .route("/sessions/reopen", post(sessions::reopen_session))
        .route("/sessions/admin/:admin_code", get(sessions::get_admin_session))
        .route("/sessions/:id", get(sessions::get_session))
        .route("/sessions/:id", delete(sessions::delete_session))
        // Voting and results
        .route("/vote", post(vote::submit_vote))
        .route("/results/:code", get(results::get_results))
        // Candidates
        .route("/candidates", post(candidates::add_candidate))
        .route("/candidates", put(candidates::update_candidate))
        .route("/candidates/:id", delete(candidates::delete_candidate))
        // Invited voters
        .route("/voters", post(voters::add_voters))
        .route("/voters", put(voters::update_voter))
        .route("/voters/:id", delete(voters::delete_voter))
        .fallback(api_not_found);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .nest("/api", api_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: String,
    pub message: &'static str,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: now_timestamp(),
        message: "QuickVote is running!",
    })
}

async fn api_not_found(uri: Uri) -> ApiError {
    ApiError::not_found(format!("No API route for {}", uri.path()))
}

#[cfg(test)]
pub(crate) mod testing {
    //! Router harness for handler tests.

    use axum::{
        body::Body,
        http::{Method, Request, StatusCode},
        Router,
    };
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    use crate::config::Config;
    use crate::db;
    use crate::AppState;

    pub struct TestApp {
        pub router: Router,
        pub state: Arc<AppState>,
    }

    impl TestApp {
        pub async fn new() -> Self {
            let pool = db::connect_in_memory().await.unwrap();
            let state = Arc::new(AppState::new(Config::default(), pool));
            Self {
                router: super::create_router(state.clone()),
                state,
            }
        }
    }

    /// Send a request and decode the JSON response (Null for empty bodies)
    pub async fn send(
        router: &Router,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    fn session_body(mode: &str, result_display: &str) -> Value {
        json!({
            "title": "Student Council",
            "mode": mode,
            "resultDisplay": result_display,
            "positions": [{
                "title": "President",
                "candidates": [{ "name": "A" }, { "name": "B" }]
            }]
        })
    }

    /// Create a casual session with one position "President" and candidates A, B
    pub async fn create_casual(router: &Router, result_display: &str) -> Value {
        let (status, body) = send(
            router,
            Method::POST,
            "/api/sessions",
            Some(session_body("casual", result_display)),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body
    }

    /// Same ballot as `create_casual`, official mode with the given invites
    pub async fn create_official(router: &Router, result_display: &str, emails: &[&str]) -> Value {
        let mut body = session_body("official", result_display);
        body["invitedEmails"] = json!(emails);
        let (status, body) = send(router, Method::POST, "/api/sessions", Some(body)).await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body
    }
}
