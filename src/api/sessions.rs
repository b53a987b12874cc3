//! Voting session endpoints: create, ballot view, admin view, close/reopen,
//! delete.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

use crate::db::{
    AdminCodeRequest, Candidate, CandidateVoteCount, CreateSessionRequest, CreateSessionResponse,
    InvitedVoter, Position, ResultDisplay, SessionMode, SessionSummary, VotingSession,
};
use crate::engine::{self, NewCandidate, NewPosition, NewSession, PositionStanding, SessionStats};
use crate::AppState;

use super::error::{ApiError, ValidationErrorBuilder};
use super::extract::AppJson;
use super::validation::{
    parse_mode, parse_result_display, sort_emails, trimmed, validate_description,
    validate_photo_url, validate_title,
};

/// A position with its candidates, as shown on the ballot
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BallotPosition {
    #[serde(flatten)]
    pub position: Position,
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Serialize)]
pub struct SessionBallot {
    pub session: SessionSummary,
    pub positions: Vec<BallotPosition>,
}

/// A position with per-candidate counts in display order
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminPosition {
    #[serde(flatten)]
    pub position: Position,
    pub candidates: Vec<CandidateVoteCount>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminSessionView {
    /// Includes both access codes
    pub session: VotingSession,
    pub positions: Vec<AdminPosition>,
    pub standings: Vec<PositionStanding>,
    pub invited_voters: Vec<InvitedVoter>,
    pub stats: SessionStats,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseSessionResponse {
    pub message: String,
    pub closed_at: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Turn a create request into a session ready for provisioning
fn build_new_session(
    req: CreateSessionRequest,
    default_display: ResultDisplay,
) -> Result<NewSession, ApiError> {
    let title = req.title.trim().to_string();
    let description = trimmed(&req.description);

    let mut errors = ValidationErrorBuilder::new();
    if let Err(e) = validate_title(&title, "Title") {
        errors.add("title", e);
    }
    if let Err(e) = validate_description(&description) {
        errors.add("description", e);
    }
    errors.finish()?;

    let mode = parse_mode(&req.mode).map_err(|e| ApiError::validation_field("mode", e))?;
    let result_display = parse_result_display(&req.result_display, default_display)
        .map_err(|e| ApiError::validation_field("resultDisplay", e))?;

    let invited_emails = if mode == SessionMode::Official {
        let emails = sort_emails(&req.invited_emails);
        if !emails.invalid.is_empty() {
            return Err(ApiError::validation_field(
                "invitedEmails",
                format!("Invalid email(s): {}", emails.invalid.join(", ")),
            ));
        }
        emails.valid
    } else {
        Vec::new()
    };

    let mut errors = ValidationErrorBuilder::new();
    let positions: Vec<NewPosition> = req
        .positions
        .into_iter()
        .map(|p| {
            let candidates = p
                .candidates
                .into_iter()
                .map(|c| {
                    let candidate = NewCandidate {
                        name: c.name.trim().to_string(),
                        description: trimmed(&c.description),
                        photo_url: trimmed(&c.photo_url),
                    };
                    if let Err(e) = validate_photo_url(&candidate.photo_url) {
                        errors.add("positions", e);
                    }
                    candidate
                })
                .collect();
            NewPosition {
                title: p.title.trim().to_string(),
                description: trimmed(&p.description),
                max_selections: p.max_selections.unwrap_or(1),
                candidates,
            }
        })
        .collect();
    errors.finish()?;

    Ok(NewSession {
        title,
        description,
        mode,
        result_display,
        positions,
        invited_emails,
    })
}

/// Create a voting session
/// POST /api/sessions
pub async fn create_session(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<CreateSessionRequest>,
) -> Result<(StatusCode, Json<CreateSessionResponse>), ApiError> {
    let new = build_new_session(req, state.config.voting.default_result_display)?;
    let created = engine::create_session(&state.db, new, &state.config.voting).await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateSessionResponse {
            message: "Session created successfully".to_string(),
            session_id: created.session_id,
            voting_code: created.voting_code,
            admin_code: created.admin_code,
            mode: created.mode,
            invited_voters_count: created.invited_voters_count,
        }),
    ))
}

/// Ballot view by voting or admin code, without vote counts
/// GET /api/sessions/:code
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Result<Json<SessionBallot>, ApiError> {
    let session = VotingSession::find_by_code(&state.db, &code)
        .await?
        .ok_or_else(|| ApiError::not_found("Session not found"))?;

    if !session.is_active {
        return Err(ApiError::forbidden("Session is closed"));
    }

    let mut by_position: HashMap<String, Vec<Candidate>> = HashMap::new();
    for candidate in Candidate::list_for_session(&state.db, &session.id).await? {
        by_position
            .entry(candidate.position_id.clone())
            .or_default()
            .push(candidate);
    }

    let positions = Position::list_for_session(&state.db, &session.id)
        .await?
        .into_iter()
        .map(|position| {
            let candidates = by_position.remove(&position.id).unwrap_or_default();
            BallotPosition {
                position,
                candidates,
            }
        })
        .collect();

    Ok(Json(SessionBallot {
        session: SessionSummary::from(&session),
        positions,
    }))
}

/// Full admin view: codes, counts, standings, invite list, turnout
/// GET /api/sessions/admin/:admin_code
pub async fn get_admin_session(
    State(state): State<Arc<AppState>>,
    Path(admin_code): Path<String>,
) -> Result<Json<AdminSessionView>, ApiError> {
    let session = VotingSession::find_by_admin_code(&state.db, &admin_code)
        .await?
        .ok_or_else(|| ApiError::not_found("Session not found"))?;

    let mut tally = engine::tally_session(&state.db, &session).await?;
    let positions = Position::list_for_session(&state.db, &session.id)
        .await?
        .into_iter()
        .map(|position| {
            let candidates = tally.counts.remove(&position.id).unwrap_or_default();
            AdminPosition {
                position,
                candidates,
            }
        })
        .collect();

    let invited_voters = if session.mode_enum() == SessionMode::Official {
        InvitedVoter::list_for_session(&state.db, &session.id).await?
    } else {
        Vec::new()
    };

    Ok(Json(AdminSessionView {
        session,
        positions,
        standings: tally.positions,
        invited_voters,
        stats: tally.stats,
    }))
}

fn require_admin_code(req: &AdminCodeRequest) -> Result<&str, ApiError> {
    let code = req.admin_code.trim();
    if code.is_empty() {
        return Err(ApiError::validation_field("adminCode", "Admin code is required"));
    }
    Ok(code)
}

/// Stop accepting ballots
/// POST /api/sessions/close
pub async fn close_session(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<AdminCodeRequest>,
) -> Result<Json<CloseSessionResponse>, ApiError> {
    let admin_code = require_admin_code(&req)?;
    let closed = engine::close_session(&state.db, admin_code).await?;

    Ok(Json(CloseSessionResponse {
        message: "Session closed successfully".to_string(),
        closed_at: closed.closed_at,
    }))
}

/// Accept ballots again
/// POST /api/sessions/reopen
pub async fn reopen_session(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<AdminCodeRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let admin_code = require_admin_code(&req)?;
    engine::reopen_session(&state.db, admin_code).await?;

    Ok(Json(MessageResponse::new("Session reopened successfully")))
}

/// Delete a session and everything under it
/// DELETE /api/sessions/:id
pub async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    engine::delete_session(&state.db, &session_id).await?;

    Ok(Json(MessageResponse::new("Session deleted successfully")))
}
