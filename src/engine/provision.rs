//! Session provisioning: one transaction writes the session, its positions,
//! their candidates, and the invite list.

use tracing::info;
use uuid::Uuid;

use super::{unused_code, VotingError};
use crate::config::VotingConfig;
use crate::db::{
    self, now_timestamp, Candidate, DbPool, InvitedVoter, Position, ResultDisplay, SessionMode,
    VotingSession,
};

#[derive(Debug, Clone)]
pub struct NewCandidate {
    pub name: String,
    pub description: Option<String>,
    pub photo_url: Option<String>,
}

impl NewCandidate {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            photo_url: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewPosition {
    pub title: String,
    pub description: Option<String>,
    pub max_selections: i64,
    pub candidates: Vec<NewCandidate>,
}

/// A session ready to be written. Text fields are expected to be trimmed and
/// emails normalized by the caller.
#[derive(Debug, Clone)]
pub struct NewSession {
    pub title: String,
    pub description: Option<String>,
    pub mode: SessionMode,
    pub result_display: ResultDisplay,
    pub positions: Vec<NewPosition>,
    pub invited_emails: Vec<String>,
}

impl NewSession {
    /// Structural rules every session must satisfy before it is written
    pub fn validate(&self) -> Result<(), VotingError> {
        if self.title.is_empty() {
            return Err(VotingError::validation("Title is required"));
        }
        if self.mode == SessionMode::Official && self.invited_emails.is_empty() {
            return Err(VotingError::validation(
                "Official mode requires at least one invited email",
            ));
        }
        if self.positions.is_empty() {
            return Err(VotingError::validation("At least one position is required"));
        }
        for position in &self.positions {
            if position.title.is_empty() {
                return Err(VotingError::validation("All positions must have a title"));
            }
            if position.max_selections < 1 {
                return Err(VotingError::validation(format!(
                    "Position \"{}\" must allow at least one selection",
                    position.title
                )));
            }
            if position.candidates.is_empty() {
                return Err(VotingError::validation(format!(
                    "Position \"{}\" must have at least one candidate",
                    position.title
                )));
            }
            if position.candidates.iter().any(|c| c.name.is_empty()) {
                return Err(VotingError::validation(format!(
                    "All candidates of \"{}\" must have a name",
                    position.title
                )));
            }
        }
        Ok(())
    }
}

/// What the organizer gets back after creating a session
#[derive(Debug, Clone)]
pub struct ProvisionedSession {
    pub session_id: String,
    pub voting_code: String,
    pub admin_code: String,
    pub mode: SessionMode,
    pub invited_voters_count: usize,
}

/// Create a session in the active state. Invite emails are only stored for
/// official sessions.
pub async fn create_session(
    db: &DbPool,
    new: NewSession,
    config: &VotingConfig,
) -> Result<ProvisionedSession, VotingError> {
    new.validate()?;

    let mut tx = db::begin_write(db).await?;

    let voting_code = unused_code(&mut tx, config.voting_code_length).await?;
    let admin_code = unused_code(&mut tx, config.admin_code_length).await?;
    let now = now_timestamp();

    let session = VotingSession {
        id: Uuid::new_v4().to_string(),
        title: new.title,
        description: new.description,
        mode: new.mode.to_string(),
        result_display: new.result_display.to_string(),
        voting_code,
        admin_code,
        is_active: true,
        created_at: now.clone(),
        updated_at: now.clone(),
        closed_at: None,
    };
    session.insert(&mut *tx).await?;

    for (position_index, new_position) in new.positions.into_iter().enumerate() {
        let position = Position {
            id: Uuid::new_v4().to_string(),
            session_id: session.id.clone(),
            title: new_position.title,
            description: new_position.description,
            max_selections: new_position.max_selections,
            display_order: position_index as i64,
        };
        position.insert(&mut *tx).await?;

        for (candidate_index, new_candidate) in new_position.candidates.into_iter().enumerate() {
            let candidate = Candidate {
                id: Uuid::new_v4().to_string(),
                position_id: position.id.clone(),
                name: new_candidate.name,
                description: new_candidate.description,
                photo_url: new_candidate.photo_url,
                display_order: candidate_index as i64,
            };
            candidate.insert(&mut *tx).await?;
        }
    }

    let mut invited_voters_count = 0;
    if new.mode == SessionMode::Official {
        for email in new.invited_emails {
            let voter = InvitedVoter {
                id: Uuid::new_v4().to_string(),
                session_id: session.id.clone(),
                email,
                has_voted: false,
                voted_at: None,
                created_at: now.clone(),
            };
            voter.insert(&mut *tx).await?;
            invited_voters_count += 1;
        }
    }

    tx.commit().await?;

    info!(
        session_id = %session.id,
        mode = %session.mode,
        result_display = %session.result_display,
        invited = invited_voters_count,
        "Voting session created"
    );

    Ok(ProvisionedSession {
        session_id: session.id,
        voting_code: session.voting_code,
        admin_code: session.admin_code,
        mode: new.mode,
        invited_voters_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing;

    #[test]
    fn test_official_without_invites_is_rejected() {
        let new = testing::new_session(SessionMode::Official, ResultDisplay::Realtime);
        assert!(matches!(new.validate(), Err(VotingError::Validation(_))));
    }

    #[test]
    fn test_position_without_candidates_is_rejected() {
        let mut new = testing::new_session(SessionMode::Casual, ResultDisplay::Realtime);
        new.positions[0].candidates.clear();
        let err = new.validate().unwrap_err();
        assert!(err.to_string().contains("President"));
    }

    #[test]
    fn test_zero_max_selections_is_rejected() {
        let mut new = testing::new_session(SessionMode::Casual, ResultDisplay::Realtime);
        new.positions[0].max_selections = 0;
        assert!(new.validate().is_err());
    }

    #[tokio::test]
    async fn test_create_session_persists_everything() {
        let pool = testing::pool().await;
        let mut new = testing::new_session(SessionMode::Official, ResultDisplay::AfterCloses);
        new.invited_emails = vec!["x@example.com".to_string(), "y@example.com".to_string()];

        let created = create_session(&pool, new, &VotingConfig::default()).await.unwrap();
        assert_eq!(created.voting_code.len(), 6);
        assert_eq!(created.admin_code.len(), 8);
        assert_eq!(created.invited_voters_count, 2);

        let session = VotingSession::find_by_code(&pool, &created.voting_code)
            .await
            .unwrap()
            .unwrap();
        assert!(session.is_active);
        assert!(session.closed_at.is_none());
        assert_eq!(session.mode_enum(), SessionMode::Official);

        let by_admin = VotingSession::find_by_code(&pool, &created.admin_code)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_admin.id, session.id);

        let (_, candidates) = testing::first_position(&pool, &session.id).await;
        assert_eq!(candidates.len(), 2);
        assert_eq!(InvitedVoter::count_for_session(&pool, &session.id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_casual_session_ignores_invites() {
        let pool = testing::pool().await;
        let mut new = testing::new_session(SessionMode::Casual, ResultDisplay::Realtime);
        new.invited_emails = vec!["x@example.com".to_string()];

        let created = create_session(&pool, new, &VotingConfig::default()).await.unwrap();
        assert_eq!(created.invited_voters_count, 0);
        assert_eq!(
            InvitedVoter::count_for_session(&pool, &created.session_id).await.unwrap(),
            0
        );
    }
}
