//! Invite list management for official sessions.

use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::db::{
    self, now_timestamp, AddVotersDetails, AddVotersRequest, AddVotersResponse, InvitedVoter,
    SessionMode, UpdateVoterRequest, VotingSession,
};
use crate::engine::is_unique_violation;
use crate::AppState;

use super::error::ApiError;
use super::extract::AppJson;
use super::sessions::MessageResponse;
use super::validation::{sort_emails, validate_email};

/// Invite more voters to an official session
/// POST /api/voters
pub async fn add_voters(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<AddVotersRequest>,
) -> Result<Json<AddVotersResponse>, ApiError> {
    let session_id = req.session_id.trim();
    if session_id.is_empty() {
        return Err(ApiError::validation_field("sessionId", "Session ID is required"));
    }
    if req.emails.is_empty() {
        return Err(ApiError::validation_field(
            "emails",
            "At least one email is required",
        ));
    }

    let mut tx = db::begin_write(&state.db).await?;

    let session = VotingSession::find_by_id(&mut *tx, session_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Session not found"))?;

    if session.mode_enum() != SessionMode::Official {
        return Err(ApiError::bad_request(
            "Can only add voters to official mode sessions",
        ));
    }

    let sorted = sort_emails(&req.emails);
    let mut added_emails = Vec::new();
    let mut duplicate_emails = sorted.duplicates;
    let now = now_timestamp();

    for email in sorted.valid {
        if InvitedVoter::find_by_email(&mut *tx, &session.id, &email)
            .await?
            .is_some()
        {
            duplicate_emails.push(email);
            continue;
        }

        let voter = InvitedVoter {
            id: Uuid::new_v4().to_string(),
            session_id: session.id.clone(),
            email,
            has_voted: false,
            voted_at: None,
            created_at: now.clone(),
        };
        let inserted = voter.insert(&mut *tx).await;
        match inserted {
            Ok(()) => added_emails.push(voter.email),
            Err(e) if is_unique_violation(&e) => duplicate_emails.push(voter.email),
            Err(e) => return Err(e.into()),
        }
    }

    VotingSession::touch(&mut *tx, &session.id, &now).await?;
    tx.commit().await?;

    info!(
        session_id = %session.id,
        added = added_emails.len(),
        duplicates = duplicate_emails.len(),
        invalid = sorted.invalid.len(),
        "Invited voters added"
    );

    Ok(Json(AddVotersResponse {
        message: format!("Successfully added {} voter(s)", added_emails.len()),
        added: added_emails.len(),
        duplicates: duplicate_emails.len(),
        invalid: sorted.invalid.len(),
        details: AddVotersDetails {
            added_emails,
            duplicate_emails,
            invalid_emails: sorted.invalid,
        },
    }))
}

/// Change the email of a voter who has not voted
/// PUT /api/voters
pub async fn update_voter(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<UpdateVoterRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let id = req.id.trim();
    if id.is_empty() {
        return Err(ApiError::validation_field("id", "Voter ID is required"));
    }

    let email = InvitedVoter::normalize_email(&req.email);
    validate_email(&email).map_err(|e| ApiError::validation_field("email", e))?;

    let mut tx = db::begin_write(&state.db).await?;

    let voter = InvitedVoter::find_by_id(&mut *tx, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Voter not found"))?;

    if voter.has_voted {
        return Err(ApiError::conflict(
            "Cannot edit email of a voter who has already voted",
        ));
    }

    if InvitedVoter::email_taken(&mut *tx, &voter.session_id, &email, &voter.id).await? {
        return Err(ApiError::conflict("This email is already in the voter list"));
    }

    if !InvitedVoter::update_email(&mut *tx, &voter.id, &email).await? {
        return Err(ApiError::conflict(
            "Cannot edit email of a voter who has already voted",
        ));
    }
    VotingSession::touch(&mut *tx, &voter.session_id, &now_timestamp()).await?;

    tx.commit().await?;

    info!(session_id = %voter.session_id, voter_id = %voter.id, "Invited voter updated");

    Ok(Json(MessageResponse::new("Voter email updated successfully")))
}

/// Remove a voter who has not voted
/// DELETE /api/voters/:id
pub async fn delete_voter(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let mut tx = db::begin_write(&state.db).await?;

    let voter = InvitedVoter::find_by_id(&mut *tx, &id)
        .await?
        .ok_or_else(|| ApiError::not_found("Voter not found"))?;

    if voter.has_voted || !InvitedVoter::delete_unvoted(&mut *tx, &voter.id).await? {
        return Err(ApiError::conflict(
            "Cannot delete a voter who has already voted",
        ));
    }
    VotingSession::touch(&mut *tx, &voter.session_id, &now_timestamp()).await?;

    tx.commit().await?;

    info!(session_id = %voter.session_id, voter_id = %voter.id, "Invited voter removed");

    Ok(Json(MessageResponse::new("Voter removed successfully")))
}
