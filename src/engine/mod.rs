//! Voting engine: everything between an HTTP request and the database rows.
//!
//! - `provision` - create a session with its positions, candidates and invite list
//! - `ballot` - validate and record a voter's submission
//! - `tally` - vote counts, percentages, ranks with ties, turnout
//! - `lifecycle` - close / reopen / delete
//! - `visibility` - whether results may be shown right now
//! - `codes` - voting and admin access codes

pub mod ballot;
pub mod codes;
pub mod lifecycle;
pub mod provision;
pub mod tally;
pub mod visibility;

pub use ballot::*;
pub use codes::*;
pub use lifecycle::*;
pub use provision::*;
pub use tally::*;
pub use visibility::*;

use thiserror::Error;

/// Errors raised by voting operations
#[derive(Error, Debug)]
pub enum VotingError {
    #[error("{0}")]
    Validation(String),

    #[error("Session not found")]
    SessionNotFound,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("This voting session has been closed")]
    SessionClosed,

    #[error("You are not invited to this voting session")]
    NotInvited,

    #[error("You have already voted in this session")]
    AlreadyVoted,

    #[error("This name has already been used to vote in this session")]
    NameAlreadyUsed { voter_id: String },

    #[error("Session is already closed")]
    AlreadyClosed,

    #[error("Session is already open")]
    AlreadyOpen,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Could not allocate a unique access code")]
    CodeSpaceExhausted,

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl VotingError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

/// Whether a database error is a UNIQUE constraint violation
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

#[cfg(test)]
pub(crate) mod testing {
    //! Fixtures shared by the engine and API tests.

    use super::*;
    use crate::config::VotingConfig;
    use crate::db::{self, DbPool, ResultDisplay, SessionMode};

    pub async fn pool() -> DbPool {
        db::connect_in_memory().await.unwrap()
    }

    pub fn new_session(mode: SessionMode, display: ResultDisplay) -> NewSession {
        NewSession {
            title: "Student Council".to_string(),
            description: None,
            mode,
            result_display: display,
            positions: vec![NewPosition {
                title: "President".to_string(),
                description: None,
                max_selections: 1,
                candidates: vec![NewCandidate::named("A"), NewCandidate::named("B")],
            }],
            invited_emails: Vec::new(),
        }
    }

    pub async fn casual_session(pool: &DbPool, display: ResultDisplay) -> ProvisionedSession {
        create_session(pool, new_session(SessionMode::Casual, display), &VotingConfig::default())
            .await
            .unwrap()
    }

    pub async fn official_session(
        pool: &DbPool,
        display: ResultDisplay,
        emails: &[&str],
    ) -> ProvisionedSession {
        let mut new = new_session(SessionMode::Official, display);
        new.invited_emails = emails.iter().map(|e| e.to_string()).collect();
        create_session(pool, new, &VotingConfig::default()).await.unwrap()
    }

    /// (position_id, candidate ids in display order) of the first position
    pub async fn first_position(pool: &DbPool, session_id: &str) -> (String, Vec<String>) {
        let positions = db::Position::list_for_session(pool, session_id).await.unwrap();
        let position = positions.into_iter().next().unwrap();
        let candidates = db::Candidate::list_for_session(pool, session_id)
            .await
            .unwrap()
            .into_iter()
            .filter(|c| c.position_id == position.id)
            .map(|c| c.id)
            .collect();
        (position.id, candidates)
    }
}
