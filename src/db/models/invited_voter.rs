//! Invited voter (official mode allow-list) models.

use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct InvitedVoter {
    pub id: String,
    #[serde(skip_serializing)]
    pub session_id: String,
    pub email: String,
    pub has_voted: bool,
    pub voted_at: Option<String>,
    #[serde(skip_serializing)]
    pub created_at: String,
}

impl InvitedVoter {
    /// Emails are stored and compared trimmed and lowercased
    pub fn normalize_email(email: &str) -> String {
        email.trim().to_lowercase()
    }

    pub async fn list_for_session<'e, E>(db: E, session_id: &str) -> Result<Vec<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as("SELECT * FROM invited_voters WHERE session_id = ? ORDER BY email ASC")
            .bind(session_id)
            .fetch_all(db)
            .await
    }

    pub async fn count_for_session<'e, E>(db: E, session_id: &str) -> Result<i64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM invited_voters WHERE session_id = ?")
            .bind(session_id)
            .fetch_one(db)
            .await?;
        Ok(row.0)
    }

    pub async fn find_by_id<'e, E>(db: E, id: &str) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as("SELECT * FROM invited_voters WHERE id = ?")
            .bind(id)
            .fetch_optional(db)
            .await
    }

    pub async fn find_by_email<'e, E>(
        db: E,
        session_id: &str,
        email: &str,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as("SELECT * FROM invited_voters WHERE session_id = ? AND email = ?")
            .bind(session_id)
            .bind(email)
            .fetch_optional(db)
            .await
    }

    /// Whether another voter of the session already uses this email
    pub async fn email_taken<'e, E>(
        db: E,
        session_id: &str,
        email: &str,
        except_id: &str,
    ) -> Result<bool, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let row: (i64,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM invited_voters WHERE session_id = ? AND email = ? AND id != ?)",
        )
        .bind(session_id)
        .bind(email)
        .bind(except_id)
        .fetch_one(db)
        .await?;
        Ok(row.0 != 0)
    }

    pub async fn insert<'e, E>(&self, db: E) -> Result<(), sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query(
            r#"
            INSERT INTO invited_voters (id, session_id, email, has_voted, voted_at, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&self.id)
        .bind(&self.session_id)
        .bind(&self.email)
        .bind(self.has_voted)
        .bind(&self.voted_at)
        .bind(&self.created_at)
        .execute(db)
        .await?;
        Ok(())
    }

    /// Flip has_voted false -> true. Returns false when the flag was already
    /// set (or the voter does not exist), so a second concurrent ballot for
    /// the same email loses.
    pub async fn mark_voted<'e, E>(
        db: E,
        session_id: &str,
        email: &str,
        voted_at: &str,
    ) -> Result<bool, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query(
            r#"
            UPDATE invited_voters
            SET has_voted = 1, voted_at = ?
            WHERE session_id = ? AND email = ? AND has_voted = 0
            "#,
        )
        .bind(voted_at)
        .bind(session_id)
        .bind(email)
        .execute(db)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Change the email of a voter who has not voted yet
    pub async fn update_email<'e, E>(db: E, id: &str, email: &str) -> Result<bool, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result =
            sqlx::query("UPDATE invited_voters SET email = ? WHERE id = ? AND has_voted = 0")
                .bind(email)
                .bind(id)
                .execute(db)
                .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Remove a voter who has not voted yet
    pub async fn delete_unvoted<'e, E>(db: E, id: &str) -> Result<bool, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query("DELETE FROM invited_voters WHERE id = ? AND has_voted = 0")
            .bind(id)
            .execute(db)
            .await?;
        Ok(result.rows_affected() == 1)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddVotersRequest {
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub emails: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateVoterRequest {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddVotersDetails {
    pub added_emails: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub duplicate_emails: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub invalid_emails: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddVotersResponse {
    pub message: String,
    pub added: usize,
    pub duplicates: usize,
    pub invalid: usize,
    pub details: AddVotersDetails,
}
