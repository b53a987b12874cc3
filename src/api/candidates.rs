//! Candidate management for existing sessions.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::db::{
    self, now_timestamp, AddCandidateRequest, AddCandidateResponse, Candidate, Position,
    UpdateCandidateRequest, VotingSession,
};
use crate::AppState;

use super::error::{ApiError, ValidationErrorBuilder};
use super::extract::AppJson;
use super::sessions::MessageResponse;
use super::validation::{trimmed, validate_description, validate_photo_url, validate_title};

/// Validate the editable candidate fields
fn validate_details(
    name: &str,
    description: &Option<String>,
    photo_url: &Option<String>,
) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    if let Err(e) = validate_title(name, "Candidate name") {
        errors.add("name", e);
    }
    if let Err(e) = validate_description(description) {
        errors.add("description", e);
    }
    if let Err(e) = validate_photo_url(photo_url) {
        errors.add("photoUrl", e);
    }

    errors.finish()
}

/// Append a candidate to a position
/// POST /api/candidates
pub async fn add_candidate(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<AddCandidateRequest>,
) -> Result<(StatusCode, Json<AddCandidateResponse>), ApiError> {
    let name = req.name.trim().to_string();
    let description = trimmed(&req.description);
    let photo_url = trimmed(&req.photo_url);
    validate_details(&name, &description, &photo_url)?;

    let position_id = req.position_id.trim();
    if position_id.is_empty() {
        return Err(ApiError::validation_field("positionId", "Position ID is required"));
    }

    let mut tx = db::begin_write(&state.db).await?;

    let position = Position::find_by_id(&mut *tx, position_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Position not found"))?;

    if let Some(session_id) = trimmed(&req.session_id) {
        if session_id != position.session_id {
            return Err(ApiError::forbidden("Position does not belong to this session"));
        }
    }

    let display_order = Candidate::next_display_order(&mut *tx, &position.id).await?;
    let candidate = Candidate {
        id: Uuid::new_v4().to_string(),
        position_id: position.id.clone(),
        name,
        description,
        photo_url,
        display_order,
    };
    candidate.insert(&mut *tx).await?;
    VotingSession::touch(&mut *tx, &position.session_id, &now_timestamp()).await?;

    tx.commit().await?;

    info!(
        session_id = %position.session_id,
        candidate_id = %candidate.id,
        "Candidate added"
    );

    Ok((
        StatusCode::CREATED,
        Json(AddCandidateResponse {
            message: "Candidate added successfully".to_string(),
            candidate_id: candidate.id,
            display_order,
        }),
    ))
}

/// Change a candidate's name, description or photo
/// PUT /api/candidates
pub async fn update_candidate(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<UpdateCandidateRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    if req.id.trim().is_empty() {
        return Err(ApiError::validation_field("id", "Candidate ID is required"));
    }

    let name = req.name.trim().to_string();
    let description = trimmed(&req.description);
    let photo_url = trimmed(&req.photo_url);
    validate_details(&name, &description, &photo_url)?;

    let mut tx = db::begin_write(&state.db).await?;

    let owner = Candidate::find_owner(&mut *tx, req.id.trim())
        .await?
        .ok_or_else(|| ApiError::not_found("Candidate not found"))?;

    Candidate::update_details(
        &mut *tx,
        &owner.id,
        &name,
        description.as_deref(),
        photo_url.as_deref(),
    )
    .await?;
    VotingSession::touch(&mut *tx, &owner.session_id, &now_timestamp()).await?;

    tx.commit().await?;

    info!(session_id = %owner.session_id, candidate_id = %owner.id, "Candidate updated");

    Ok(Json(MessageResponse::new("Candidate updated successfully")))
}

/// Remove a candidate that has not received any votes
/// DELETE /api/candidates/:id
pub async fn delete_candidate(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let mut tx = db::begin_write(&state.db).await?;

    let owner = Candidate::find_owner(&mut *tx, &id)
        .await?
        .ok_or_else(|| ApiError::not_found("Candidate not found"))?;

    if !Candidate::delete_unvoted(&mut *tx, &owner.id).await? {
        return Err(ApiError::conflict(
            "Cannot delete candidate who has received votes",
        ));
    }
    VotingSession::touch(&mut *tx, &owner.session_id, &now_timestamp()).await?;

    tx.commit().await?;

    info!(session_id = %owner.session_id, candidate_id = %owner.id, "Candidate deleted");

    Ok(Json(MessageResponse::new("Candidate deleted successfully")))
}

#[cfg(test)]
mod tests {
    use crate::api::testing::{create_casual, send, TestApp};
    use axum::http::{Method, StatusCode};
    use serde_json::{json, Value};

    /// (sessionId, adminCode, positionId, first candidate id)
    async fn setup(app: &TestApp) -> (Value, Value, Value, Value) {
        let created = create_casual(&app.router, "realtime").await;
        let (_, ballot) = send(
            &app.router,
            Method::GET,
            &format!("/api/sessions/{}", created["votingCode"].as_str().unwrap()),
            None,
        )
        .await;
        (
            created["sessionId"].clone(),
            created["adminCode"].clone(),
            ballot["positions"][0]["id"].clone(),
            ballot["positions"][0]["candidates"][0]["id"].clone(),
        )
    }

    #[tokio::test]
    async fn test_add_appends_after_last() {
        let app = TestApp::new().await;
        let (session_id, admin_code, position_id, _) = setup(&app).await;

        let (status, body) = send(
            &app.router,
            Method::POST,
            "/api/candidates",
            Some(json!({
                "name": " C ",
                "positionId": position_id,
                "sessionId": session_id
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["message"], "Candidate added successfully");
        assert_eq!(body["displayOrder"], 2);

        let (_, admin) = send(
            &app.router,
            Method::GET,
            &format!("/api/sessions/admin/{}", admin_code.as_str().unwrap()),
            None,
        )
        .await;
        let names: Vec<&str> = admin["positions"][0]["candidates"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["A", "B", "C"]);
        assert_ne!(admin["session"]["updatedAt"], admin["session"]["createdAt"]);
    }

    #[tokio::test]
    async fn test_add_checks_position_and_owner() {
        let app = TestApp::new().await;
        let (_, _, position_id, _) = setup(&app).await;

        let (status, body) = send(
            &app.router,
            Method::POST,
            "/api/candidates",
            Some(json!({ "name": "C", "positionId": position_id, "sessionId": "someone-else" })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "Position does not belong to this session");

        let (status, body) = send(
            &app.router,
            Method::POST,
            "/api/candidates",
            Some(json!({ "name": "C", "positionId": "missing" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Position not found");

        let (status, body) = send(
            &app.router,
            Method::POST,
            "/api/candidates",
            Some(json!({ "name": "", "positionId": position_id })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Candidate name is required");
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let app = TestApp::new().await;
        let (_, _, _, candidate_id) = setup(&app).await;

        let (status, body) = send(
            &app.router,
            Method::PUT,
            "/api/candidates",
            Some(json!({ "id": candidate_id, "name": "Anne", "description": "Incumbent" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Candidate updated successfully");

        let (status, _) = send(
            &app.router,
            Method::PUT,
            "/api/candidates",
            Some(json!({ "id": "missing", "name": "X" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let uri = format!("/api/candidates/{}", candidate_id.as_str().unwrap());
        let (status, body) = send(&app.router, Method::DELETE, &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Candidate deleted successfully");

        let (status, body) = send(&app.router, Method::DELETE, &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Candidate not found");
    }

    #[tokio::test]
    async fn test_candidate_with_votes_is_kept() {
        let app = TestApp::new().await;
        let (session_id, _, position_id, candidate_id) = setup(&app).await;

        let (status, _) = send(
            &app.router,
            Method::POST,
            "/api/vote",
            Some(json!({
                "sessionId": session_id,
                "votes": [{ "positionId": position_id, "candidateId": candidate_id }]
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(
            &app.router,
            Method::DELETE,
            &format!("/api/candidates/{}", candidate_id.as_str().unwrap()),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Cannot delete candidate who has received votes");
    }
}
