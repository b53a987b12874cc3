//! Candidate models, per-candidate vote counts, and candidate management DTOs.

use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub id: String,
    #[serde(skip_serializing)]
    pub position_id: String,
    pub name: String,
    pub description: Option<String>,
    pub photo_url: Option<String>,
    pub display_order: i64,
}

/// A candidate together with the number of votes it has received
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CandidateVoteCount {
    pub id: String,
    #[serde(skip_serializing)]
    pub position_id: String,
    pub name: String,
    pub description: Option<String>,
    pub photo_url: Option<String>,
    pub display_order: i64,
    pub vote_count: i64,
}

/// Candidate joined with the session that owns its position
#[derive(Debug, Clone, FromRow)]
pub struct CandidateOwner {
    pub id: String,
    pub position_id: String,
    pub session_id: String,
}

impl Candidate {
    /// All candidates of a session, ordered by position then display order
    pub async fn list_for_session<'e, E>(db: E, session_id: &str) -> Result<Vec<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as(
            r#"
            SELECT c.*
            FROM candidates c
            JOIN positions p ON c.position_id = p.id
            WHERE p.session_id = ?
            ORDER BY p.display_order ASC, c.display_order ASC
            "#,
        )
        .bind(session_id)
        .fetch_all(db)
        .await
    }

    pub async fn find_owner<'e, E>(db: E, id: &str) -> Result<Option<CandidateOwner>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as(
            r#"
            SELECT c.id, c.position_id, p.session_id
            FROM candidates c
            JOIN positions p ON c.position_id = p.id
            WHERE c.id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(db)
        .await
    }

    /// Display order for a candidate appended to the end of a position
    pub async fn next_display_order<'e, E>(db: E, position_id: &str) -> Result<i64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let row: (i64,) = sqlx::query_as(
            "SELECT COALESCE(MAX(display_order), -1) + 1 FROM candidates WHERE position_id = ?",
        )
        .bind(position_id)
        .fetch_one(db)
        .await?;
        Ok(row.0)
    }

    pub async fn insert<'e, E>(&self, db: E) -> Result<(), sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query(
            r#"
            INSERT INTO candidates (id, position_id, name, description, photo_url, display_order)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&self.id)
        .bind(&self.position_id)
        .bind(&self.name)
        .bind(&self.description)
        .bind(&self.photo_url)
        .bind(self.display_order)
        .execute(db)
        .await?;
        Ok(())
    }

    pub async fn update_details<'e, E>(
        db: E,
        id: &str,
        name: &str,
        description: Option<&str>,
        photo_url: Option<&str>,
    ) -> Result<(), sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query("UPDATE candidates SET name = ?, description = ?, photo_url = ? WHERE id = ?")
            .bind(name)
            .bind(description)
            .bind(photo_url)
            .bind(id)
            .execute(db)
            .await?;
        Ok(())
    }

    /// Delete a candidate that has no votes. Returns false when a vote exists
    /// (or the candidate is gone), so votes are never cascaded away.
    pub async fn delete_unvoted<'e, E>(db: E, id: &str) -> Result<bool, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query(
            r#"
            DELETE FROM candidates
            WHERE id = ? AND NOT EXISTS (SELECT 1 FROM votes WHERE candidate_id = ?)
            "#,
        )
        .bind(id)
        .bind(id)
        .execute(db)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}

impl CandidateVoteCount {
    /// Vote counts for every candidate of a session, zero-vote candidates
    /// included, ordered by position then display order
    pub async fn list_for_session<'e, E>(db: E, session_id: &str) -> Result<Vec<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as(
            r#"
            SELECT c.id, c.position_id, c.name, c.description, c.photo_url, c.display_order,
                   COUNT(v.id) AS vote_count
            FROM candidates c
            JOIN positions p ON c.position_id = p.id
            LEFT JOIN votes v ON v.candidate_id = c.id
            WHERE p.session_id = ?
            GROUP BY c.id
            ORDER BY p.display_order ASC, c.display_order ASC
            "#,
        )
        .bind(session_id)
        .fetch_all(db)
        .await
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddCandidateRequest {
    #[serde(default)]
    pub name: String,
    pub description: Option<String>,
    pub photo_url: Option<String>,
    #[serde(default)]
    pub position_id: String,
    /// When present, the position must belong to this session
    pub session_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCandidateRequest {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub description: Option<String>,
    pub photo_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddCandidateResponse {
    pub message: String,
    pub candidate_id: String,
    pub display_order: i64,
}
