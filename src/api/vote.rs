//! Ballot submission endpoint.

use axum::{extract::State, Json};
use std::sync::Arc;

use crate::db::{SubmitVoteRequest, SubmitVoteResponse};
use crate::engine;
use crate::AppState;

use super::error::ApiError;
use super::extract::AppJson;

/// Submit a ballot
/// POST /api/vote
pub async fn submit_vote(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<SubmitVoteRequest>,
) -> Result<Json<SubmitVoteResponse>, ApiError> {
    let receipt = engine::submit_ballot(&state.db, &req, &state.config.voting).await?;

    Ok(Json(SubmitVoteResponse {
        success: true,
        message: "Vote submitted successfully".to_string(),
        voter_id: receipt.voter_id,
    }))
}
