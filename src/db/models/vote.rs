//! Vote rows, ballot records, and the ballot submission DTOs.

use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite};

/// One selection of one candidate for one position
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Vote {
    pub id: String,
    pub session_id: String,
    pub position_id: String,
    pub candidate_id: String,
    /// Shared by every vote cast in the same submission
    pub voter_id: String,
    pub voter_email: Option<String>,
    pub voter_name: Option<String>,
    pub voted_at: String,
}

/// One accepted submission. Carries the unique indexes that stop a name or
/// an email from being used twice in a session.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Ballot {
    pub voter_id: String,
    pub session_id: String,
    pub voter_name: Option<String>,
    pub voter_email: Option<String>,
    pub cast_at: String,
}

impl Vote {
    pub async fn insert<'e, E>(&self, db: E) -> Result<(), sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query(
            r#"
            INSERT INTO votes (id, session_id, position_id, candidate_id, voter_id,
                               voter_email, voter_name, voted_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&self.id)
        .bind(&self.session_id)
        .bind(&self.position_id)
        .bind(&self.candidate_id)
        .bind(&self.voter_id)
        .bind(&self.voter_email)
        .bind(&self.voter_name)
        .bind(&self.voted_at)
        .execute(db)
        .await?;
        Ok(())
    }

    pub async fn list_for_voter<'e, E>(db: E, voter_id: &str) -> Result<Vec<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as("SELECT * FROM votes WHERE voter_id = ? ORDER BY position_id")
            .bind(voter_id)
            .fetch_all(db)
            .await
    }

    /// Number of distinct submissions in a session
    pub async fn count_voters<'e, E>(db: E, session_id: &str) -> Result<i64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let row: (i64,) =
            sqlx::query_as("SELECT COUNT(DISTINCT voter_id) FROM votes WHERE session_id = ?")
                .bind(session_id)
                .fetch_one(db)
                .await?;
        Ok(row.0)
    }
}

impl Ballot {
    pub async fn insert<'e, E>(&self, db: E) -> Result<(), sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query(
            r#"
            INSERT INTO ballots (voter_id, session_id, voter_name, voter_email, cast_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&self.voter_id)
        .bind(&self.session_id)
        .bind(&self.voter_name)
        .bind(&self.voter_email)
        .bind(&self.cast_at)
        .execute(db)
        .await?;
        Ok(())
    }

    /// voterId of the ballot already cast under this name, if any.
    /// The column is NOCASE, so "alice" finds "Alice".
    pub async fn voter_id_for_name<'e, E>(
        db: E,
        session_id: &str,
        voter_name: &str,
    ) -> Result<Option<String>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT voter_id FROM ballots WHERE session_id = ? AND voter_name = ? LIMIT 1",
        )
        .bind(session_id)
        .bind(voter_name)
        .fetch_optional(db)
        .await?;
        Ok(row.map(|(voter_id,)| voter_id))
    }
}

/// One (position, candidate) pick in a submission
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
    #[serde(default)]
    pub position_id: String,
    #[serde(default)]
    pub candidate_id: String,
}

/// Body of POST /api/vote
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitVoteRequest {
    #[serde(default)]
    pub session_id: String,
    pub voter_email: Option<String>,
    pub voter_name: Option<String>,
    #[serde(default)]
    pub votes: Vec<Selection>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitVoteResponse {
    pub success: bool,
    pub message: String,
    pub voter_id: String,
}
