//! Results endpoint, gated by the session's result display setting.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use crate::db::{SessionSummary, VotingSession};
use crate::engine::{self, PositionStanding, ResultVisibility, SessionStats};
use crate::AppState;

use super::error::ApiError;

#[derive(Debug, Serialize)]
pub struct SessionResults {
    pub session: SessionSummary,
    pub positions: Vec<PositionStanding>,
    pub stats: SessionStats,
}

/// Ranked results by voting or admin code
/// GET /api/results/:code
pub async fn get_results(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Result<Json<SessionResults>, ApiError> {
    let session = VotingSession::find_by_code(&state.db, &code)
        .await?
        .ok_or_else(|| ApiError::not_found("Session not found"))?;

    let summary = SessionSummary::from(&session);

    if !ResultVisibility::for_session(&session).is_visible() {
        let session_json = serde_json::to_value(&summary)
            .map_err(|e| ApiError::internal(format!("Failed to encode session: {}", e)))?;
        return Err(
            ApiError::forbidden("Results will be available after voting closes")
                .with_extra("sessionActive", session.is_active)
                .with_extra("resultDisplay", session.result_display.clone())
                .with_extra("session", session_json),
        );
    }

    let tally = engine::tally_session(&state.db, &session).await?;

    Ok(Json(SessionResults {
        session: summary,
        positions: tally.positions,
        stats: tally.stats,
    }))
}

#[cfg(test)]
mod tests {
    use crate::api::testing::{create_casual, create_official, send, TestApp};
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    #[tokio::test]
    async fn test_after_closes_hidden_until_closed() {
        let app = TestApp::new().await;
        let created = create_casual(&app.router, "after-closes").await;
        let voting_code = created["votingCode"].as_str().unwrap();
        let results_uri = format!("/api/results/{}", voting_code);

        let (status, body) = send(&app.router, Method::GET, &results_uri, None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "Results will be available after voting closes");
        assert_eq!(body["sessionActive"], true);
        assert_eq!(body["resultDisplay"], "after-closes");
        assert_eq!(body["session"]["title"], "Student Council");
        assert!(body.get("positions").is_none());

        let admin = json!({ "adminCode": created["adminCode"] });
        send(&app.router, Method::POST, "/api/sessions/close", Some(admin.clone())).await;

        let (status, body) = send(&app.router, Method::GET, &results_uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["positions"][0]["title"], "President");
        assert_eq!(body["positions"][0]["candidates"].as_array().unwrap().len(), 2);

        // Reopening hides them again
        send(&app.router, Method::POST, "/api/sessions/reopen", Some(admin)).await;
        let (status, _) = send(&app.router, Method::GET, &results_uri, None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_realtime_results_are_ranked() {
        let app = TestApp::new().await;
        let created = create_casual(&app.router, "realtime").await;
        let voting_code = created["votingCode"].as_str().unwrap();

        let (_, ballot) =
            send(&app.router, Method::GET, &format!("/api/sessions/{}", voting_code), None).await;
        let position_id = ballot["positions"][0]["id"].clone();
        let candidate_b = ballot["positions"][0]["candidates"][1]["id"].clone();

        for _ in 0..2 {
            let (status, _) = send(
                &app.router,
                Method::POST,
                "/api/vote",
                Some(json!({
                    "sessionId": created["sessionId"],
                    "votes": [{ "positionId": position_id, "candidateId": candidate_b }]
                })),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
        }

        // The admin code resolves results too
        let (status, body) = send(
            &app.router,
            Method::GET,
            &format!("/api/results/{}", created["adminCode"].as_str().unwrap()),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let position = &body["positions"][0];
        assert_eq!(position["totalVotes"], 2);
        let leader = &position["candidates"][0];
        assert_eq!(leader["name"], "B");
        assert_eq!(leader["voteCount"], 2);
        assert_eq!(leader["percentage"], 100.0);
        assert_eq!(leader["rank"], 1);
        assert_eq!(leader["isLeading"], true);
        assert_eq!(position["candidates"][1]["rank"], 2);
        assert_eq!(body["stats"]["totalVotes"], 2);
        assert!(body["stats"]["turnoutPercentage"].is_null());
    }

    #[tokio::test]
    async fn test_official_turnout() {
        let app = TestApp::new().await;
        let emails = ["a@x.org", "b@x.org", "c@x.org", "d@x.org"];
        let created = create_official(&app.router, "realtime", &emails).await;
        let voting_code = created["votingCode"].as_str().unwrap();

        let (_, ballot) =
            send(&app.router, Method::GET, &format!("/api/sessions/{}", voting_code), None).await;
        let position_id = ballot["positions"][0]["id"].clone();
        let candidate_a = ballot["positions"][0]["candidates"][0]["id"].clone();

        for email in &emails[..3] {
            let (status, _) = send(
                &app.router,
                Method::POST,
                "/api/vote",
                Some(json!({
                    "sessionId": created["sessionId"],
                    "voterEmail": email,
                    "votes": [{ "positionId": position_id, "candidateId": candidate_a }]
                })),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
        }

        let (_, body) =
            send(&app.router, Method::GET, &format!("/api/results/{}", voting_code), None).await;
        assert_eq!(body["stats"]["totalVotes"], 3);
        assert_eq!(body["stats"]["totalInvited"], 4);
        assert_eq!(body["stats"]["turnoutPercentage"], 75);
    }

    #[tokio::test]
    async fn test_unknown_code() {
        let app = TestApp::new().await;
        let (status, body) = send(&app.router, Method::GET, "/api/results/ZZZZZZ", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Session not found");
    }
}
