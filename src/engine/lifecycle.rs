//! Session lifecycle: Active <-> Closed, plus hard delete from either state.

use serde::Serialize;
use tracing::info;

use super::VotingError;
use crate::db::{self, now_timestamp, DbPool, VotingSession};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Active,
    Closed,
}

impl SessionState {
    pub fn of(session: &VotingSession) -> Self {
        if session.is_active {
            Self::Active
        } else {
            Self::Closed
        }
    }

    pub fn close(self) -> Result<Self, VotingError> {
        match self {
            Self::Active => Ok(Self::Closed),
            Self::Closed => Err(VotingError::AlreadyClosed),
        }
    }

    pub fn reopen(self) -> Result<Self, VotingError> {
        match self {
            Self::Closed => Ok(Self::Active),
            Self::Active => Err(VotingError::AlreadyOpen),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClosedSession {
    pub session_id: String,
    pub closed_at: String,
}

/// Stop accepting ballots
pub async fn close_session(db: &DbPool, admin_code: &str) -> Result<ClosedSession, VotingError> {
    let session = VotingSession::find_by_admin_code(db, admin_code)
        .await?
        .ok_or(VotingError::SessionNotFound)?;

    SessionState::of(&session).close()?;

    let closed_at = now_timestamp();
    // Conditional update, so a concurrent close loses cleanly
    if !VotingSession::mark_closed(db, &session.id, &closed_at).await? {
        return Err(VotingError::AlreadyClosed);
    }

    info!(session_id = %session.id, "Voting session closed");

    Ok(ClosedSession {
        session_id: session.id,
        closed_at,
    })
}

/// Accept ballots again and clear the close timestamp
pub async fn reopen_session(db: &DbPool, admin_code: &str) -> Result<String, VotingError> {
    let session = VotingSession::find_by_admin_code(db, admin_code)
        .await?
        .ok_or(VotingError::SessionNotFound)?;

    SessionState::of(&session).reopen()?;

    if !VotingSession::mark_reopened(db, &session.id, &now_timestamp()).await? {
        return Err(VotingError::AlreadyOpen);
    }

    info!(session_id = %session.id, "Voting session reopened");
    Ok(session.id)
}

/// Remove a session with its positions, candidates, votes, ballots and invites
pub async fn delete_session(db: &DbPool, session_id: &str) -> Result<VotingSession, VotingError> {
    let mut tx = db::begin_write(db).await?;

    let session = VotingSession::find_by_id(&mut *tx, session_id)
        .await?
        .ok_or(VotingError::SessionNotFound)?;

    VotingSession::delete(&mut *tx, &session.id).await?;
    tx.commit().await?;

    info!(session_id = %session.id, title = %session.title, "Voting session deleted");
    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Candidate, InvitedVoter, Position, ResultDisplay};
    use crate::engine::testing;

    #[test]
    fn test_transitions() {
        assert_eq!(SessionState::Active.close().unwrap(), SessionState::Closed);
        assert_eq!(SessionState::Closed.reopen().unwrap(), SessionState::Active);
        assert!(matches!(
            SessionState::Closed.close(),
            Err(VotingError::AlreadyClosed)
        ));
        assert!(matches!(
            SessionState::Active.reopen(),
            Err(VotingError::AlreadyOpen)
        ));
    }

    #[tokio::test]
    async fn test_close_and_reopen_keep_closed_at_in_step() {
        let pool = testing::pool().await;
        let created = testing::casual_session(&pool, ResultDisplay::AfterCloses).await;

        let closed = close_session(&pool, &created.admin_code).await.unwrap();
        let session = VotingSession::find_by_id(&pool, &created.session_id)
            .await
            .unwrap()
            .unwrap();
        assert!(!session.is_active);
        assert_eq!(session.closed_at.as_deref(), Some(closed.closed_at.as_str()));

        assert!(matches!(
            close_session(&pool, &created.admin_code).await,
            Err(VotingError::AlreadyClosed)
        ));

        reopen_session(&pool, &created.admin_code).await.unwrap();
        let session = VotingSession::find_by_id(&pool, &created.session_id)
            .await
            .unwrap()
            .unwrap();
        assert!(session.is_active);
        assert!(session.closed_at.is_none());

        assert!(matches!(
            reopen_session(&pool, &created.admin_code).await,
            Err(VotingError::AlreadyOpen)
        ));
    }

    #[tokio::test]
    async fn test_voting_code_cannot_close() {
        let pool = testing::pool().await;
        let created = testing::casual_session(&pool, ResultDisplay::Realtime).await;

        assert!(matches!(
            close_session(&pool, &created.voting_code).await,
            Err(VotingError::SessionNotFound)
        ));
    }

    #[tokio::test]
    async fn test_delete_cascades() {
        let pool = testing::pool().await;
        let created = testing::official_session(&pool, ResultDisplay::Realtime, &["x@example.com"]).await;

        delete_session(&pool, &created.session_id).await.unwrap();

        assert!(VotingSession::find_by_id(&pool, &created.session_id)
            .await
            .unwrap()
            .is_none());
        assert!(Position::list_for_session(&pool, &created.session_id)
            .await
            .unwrap()
            .is_empty());
        assert!(Candidate::list_for_session(&pool, &created.session_id)
            .await
            .unwrap()
            .is_empty());
        assert_eq!(
            InvitedVoter::count_for_session(&pool, &created.session_id).await.unwrap(),
            0
        );

        assert!(matches!(
            delete_session(&pool, &created.session_id).await,
            Err(VotingError::SessionNotFound)
        ));
    }
}
