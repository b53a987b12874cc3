//! Ballot submission.
//!
//! A submission is checked against the session's mode and then written in a
//! single transaction: the ballot record, one vote row per selection, and for
//! official sessions the invited voter's has_voted flag. Duplicate names and
//! emails are stopped by unique indexes on the ballot table and by a
//! conditional update of has_voted, not only by the read-side pre-checks.

use std::collections::{HashMap, HashSet};

use sqlx::SqliteConnection;
use tracing::{info, warn};
use uuid::Uuid;

use super::{is_unique_violation, VotingError};
use crate::config::VotingConfig;
use crate::db::{
    self, now_timestamp, Ballot, Candidate, DbPool, InvitedVoter, Position, SessionMode,
    Selection, SubmitVoteRequest, Vote, VotingSession,
};

/// Proof of an accepted ballot
#[derive(Debug, Clone)]
pub struct BallotReceipt {
    pub voter_id: String,
    pub session_id: String,
    pub votes_recorded: usize,
    pub cast_at: String,
}

/// Who is casting the ballot, as far as the session's mode cares
#[derive(Debug, Clone, PartialEq, Eq)]
enum VoterIdentity {
    /// Official mode: normalized invited email
    Invited(String),
    /// Casual mode with a name
    Named(String),
    /// Casual mode without a name
    Anonymous,
}

fn identify_voter(
    mode: SessionMode,
    request: &SubmitVoteRequest,
) -> Result<VoterIdentity, VotingError> {
    match mode {
        SessionMode::Official => {
            let email = request
                .voter_email
                .as_deref()
                .map(InvitedVoter::normalize_email)
                .unwrap_or_default();
            if email.is_empty() {
                return Err(VotingError::validation(
                    "Email is required for official voting",
                ));
            }
            Ok(VoterIdentity::Invited(email))
        }
        SessionMode::Casual => match request.voter_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => Ok(VoterIdentity::Named(name.to_string())),
            _ => Ok(VoterIdentity::Anonymous),
        },
    }
}

/// Every selection must name a candidate of a position of this session, at
/// most once. With `enforce_max_selections`, no position may get more picks
/// than it allows.
fn check_selections(
    request: &SubmitVoteRequest,
    positions: &[Position],
    candidates: &[Candidate],
    enforce_max_selections: bool,
) -> Result<(), VotingError> {
    let positions_by_id: HashMap<&str, &Position> =
        positions.iter().map(|p| (p.id.as_str(), p)).collect();
    let position_of_candidate: HashMap<&str, &str> = candidates
        .iter()
        .map(|c| (c.id.as_str(), c.position_id.as_str()))
        .collect();

    let mut seen = HashSet::new();
    let mut picks_per_position: HashMap<&str, i64> = HashMap::new();

    for selection in &request.votes {
        if selection.position_id.is_empty() || selection.candidate_id.is_empty() {
            return Err(VotingError::validation(
                "Each vote needs a positionId and a candidateId",
            ));
        }
        if !positions_by_id.contains_key(selection.position_id.as_str()) {
            return Err(VotingError::validation(format!(
                "Position {} is not part of this session",
                selection.position_id
            )));
        }
        if position_of_candidate.get(selection.candidate_id.as_str())
            != Some(&selection.position_id.as_str())
        {
            return Err(VotingError::validation(format!(
                "Candidate {} is not running for position {}",
                selection.candidate_id, selection.position_id
            )));
        }
        if !seen.insert((selection.position_id.as_str(), selection.candidate_id.as_str())) {
            return Err(VotingError::validation(format!(
                "Candidate {} was selected more than once",
                selection.candidate_id
            )));
        }
        *picks_per_position
            .entry(selection.position_id.as_str())
            .or_default() += 1;
    }

    if enforce_max_selections {
        for (position_id, picks) in picks_per_position {
            let position = positions_by_id[position_id];
            if picks > position.max_selections {
                return Err(VotingError::validation(format!(
                    "Position \"{}\" allows at most {} selection(s)",
                    position.title, position.max_selections
                )));
            }
        }
    }

    Ok(())
}

/// Write one accepted ballot: the has_voted flip for official voters, the
/// ballot row, and a vote row per selection. The flip and the ballot's
/// unique indexes reject a duplicate that got past the pre-checks.
async fn record_ballot(
    conn: &mut SqliteConnection,
    session_id: &str,
    identity: &VoterIdentity,
    selections: &[Selection],
    cast_at: &str,
) -> Result<String, VotingError> {
    let voter_id = Uuid::new_v4().to_string();

    let (voter_email, voter_name) = match identity {
        VoterIdentity::Invited(email) => (Some(email.clone()), None),
        VoterIdentity::Named(name) => (None, Some(name.clone())),
        VoterIdentity::Anonymous => (None, None),
    };

    if let Some(email) = &voter_email {
        // Compare-and-set: only one ballot can flip the flag
        if !InvitedVoter::mark_voted(&mut *conn, session_id, email, cast_at).await? {
            return Err(VotingError::AlreadyVoted);
        }
    }

    let ballot = Ballot {
        voter_id: voter_id.clone(),
        session_id: session_id.to_string(),
        voter_name: voter_name.clone(),
        voter_email: voter_email.clone(),
        cast_at: cast_at.to_string(),
    };
    if let Err(err) = ballot.insert(&mut *conn).await {
        if !is_unique_violation(&err) {
            return Err(err.into());
        }
        warn!(session_id = %session_id, "Ballot rejected by a unique index");
        return Err(match &voter_name {
            Some(name) => match Ballot::voter_id_for_name(&mut *conn, session_id, name).await? {
                Some(voter_id) => VotingError::NameAlreadyUsed { voter_id },
                None => VotingError::Conflict("Ballot could not be recorded".to_string()),
            },
            None => VotingError::AlreadyVoted,
        });
    }

    for selection in selections {
        let vote = Vote {
            id: Uuid::new_v4().to_string(),
            session_id: session_id.to_string(),
            position_id: selection.position_id.clone(),
            candidate_id: selection.candidate_id.clone(),
            voter_id: voter_id.clone(),
            voter_email: voter_email.clone(),
            voter_name: voter_name.clone(),
            voted_at: cast_at.to_string(),
        };
        vote.insert(&mut *conn).await?;
    }

    Ok(voter_id)
}

/// Validate a submission and record it
pub async fn submit_ballot(
    db: &DbPool,
    request: &SubmitVoteRequest,
    config: &VotingConfig,
) -> Result<BallotReceipt, VotingError> {
    if request.session_id.trim().is_empty() {
        return Err(VotingError::validation("Session ID is required"));
    }
    if request.votes.is_empty() {
        return Err(VotingError::validation("Votes are required"));
    }

    let mut tx = db::begin_write(db).await?;

    let session = VotingSession::find_by_id(&mut *tx, request.session_id.trim())
        .await?
        .ok_or(VotingError::SessionNotFound)?;

    if !session.is_active {
        return Err(VotingError::SessionClosed);
    }

    let identity = identify_voter(session.mode_enum(), request)?;

    match &identity {
        VoterIdentity::Invited(email) => {
            let invited = InvitedVoter::find_by_email(&mut *tx, &session.id, email)
                .await?
                .ok_or_else(|| {
                    warn!(session_id = %session.id, "Ballot from an email that was not invited");
                    VotingError::NotInvited
                })?;
            if invited.has_voted {
                return Err(VotingError::AlreadyVoted);
            }
        }
        VoterIdentity::Named(name) => {
            if let Some(voter_id) = Ballot::voter_id_for_name(&mut *tx, &session.id, name).await? {
                return Err(VotingError::NameAlreadyUsed { voter_id });
            }
        }
        VoterIdentity::Anonymous => {}
    }

    let positions = Position::list_for_session(&mut *tx, &session.id).await?;
    let candidates = Candidate::list_for_session(&mut *tx, &session.id).await?;
    check_selections(request, &positions, &candidates, config.enforce_max_selections)?;

    let cast_at = now_timestamp();
    let voter_id = record_ballot(&mut tx, &session.id, &identity, &request.votes, &cast_at).await?;

    tx.commit().await?;

    info!(
        session_id = %session.id,
        voter_id = %voter_id,
        selections = request.votes.len(),
        "Ballot accepted"
    );

    Ok(BallotReceipt {
        voter_id,
        session_id: session.id,
        votes_recorded: request.votes.len(),
        cast_at,
    })
}
