//! Voting session models and queries.

use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite};

/// How voters are admitted to a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionMode {
    /// Anyone holding the voting code may vote, optionally under a name
    Casual,
    /// Only invited emails may vote, once each
    Official,
}

impl SessionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Casual => "casual",
            Self::Official => "official",
        }
    }
}

impl std::fmt::Display for SessionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SessionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "casual" => Ok(Self::Casual),
            "official" => Ok(Self::Official),
            _ => Err(format!("Unknown session mode: {}", s)),
        }
    }
}

impl From<String> for SessionMode {
    fn from(s: String) -> Self {
        s.parse().unwrap_or(SessionMode::Casual)
    }
}

/// When tallies become visible to voters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResultDisplay {
    Realtime,
    AfterCloses,
}

impl ResultDisplay {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Realtime => "realtime",
            Self::AfterCloses => "after-closes",
        }
    }
}

impl std::fmt::Display for ResultDisplay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ResultDisplay {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "realtime" => Ok(Self::Realtime),
            "after-closes" => Ok(Self::AfterCloses),
            _ => Err(format!("Unknown result display: {}", s)),
        }
    }
}

impl From<String> for ResultDisplay {
    fn from(s: String) -> Self {
        // Hiding is the safe fallback for an unreadable value
        s.parse().unwrap_or(ResultDisplay::AfterCloses)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct VotingSession {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub mode: String,
    pub result_display: String,
    pub voting_code: String,
    pub admin_code: String,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
    pub closed_at: Option<String>,
}

impl VotingSession {
    pub fn mode_enum(&self) -> SessionMode {
        SessionMode::from(self.mode.clone())
    }

    pub fn result_display_enum(&self) -> ResultDisplay {
        ResultDisplay::from(self.result_display.clone())
    }

    pub async fn find_by_id<'e, E>(db: E, id: &str) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as("SELECT * FROM voting_sessions WHERE id = ?")
            .bind(id)
            .fetch_optional(db)
            .await
    }

    /// Resolve either the voting code or the admin code
    pub async fn find_by_code<'e, E>(db: E, code: &str) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as("SELECT * FROM voting_sessions WHERE voting_code = ? OR admin_code = ?")
            .bind(code)
            .bind(code)
            .fetch_optional(db)
            .await
    }

    pub async fn find_by_admin_code<'e, E>(
        db: E,
        admin_code: &str,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as("SELECT * FROM voting_sessions WHERE admin_code = ?")
            .bind(admin_code)
            .fetch_optional(db)
            .await
    }

    /// Whether a code is already taken as either kind of code
    pub async fn code_in_use<'e, E>(db: E, code: &str) -> Result<bool, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let row: (i64,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM voting_sessions WHERE voting_code = ? OR admin_code = ?)",
        )
        .bind(code)
        .bind(code)
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
            INSERT INTO voting_sessions (id, title, description, mode, result_display,
                                         voting_code, admin_code, is_active,
                                         created_at, updated_at, closed_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&self.id)
        .bind(&self.title)
        .bind(&self.description)
        .bind(&self.mode)
        .bind(&self.result_display)
        .bind(&self.voting_code)
        .bind(&self.admin_code)
        .bind(self.is_active)
        .bind(&self.created_at)
        .bind(&self.updated_at)
        .bind(&self.closed_at)
        .execute(db)
        .await?;
        Ok(())
    }

    /// Active -> closed. Returns false when the session was not active.
    pub async fn mark_closed<'e, E>(db: E, id: &str, closed_at: &str) -> Result<bool, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query(
            r#"
            UPDATE voting_sessions
            SET is_active = 0, closed_at = ?, updated_at = ?
            WHERE id = ? AND is_active = 1
            "#,
        )
        .bind(closed_at)
        .bind(closed_at)
        .bind(id)
        .execute(db)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Closed -> active. Returns false when the session was already active.
    pub async fn mark_reopened<'e, E>(db: E, id: &str, now: &str) -> Result<bool, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query(
            r#"
            UPDATE voting_sessions
            SET is_active = 1, closed_at = NULL, updated_at = ?
            WHERE id = ? AND is_active = 0
            "#,
        )
        .bind(now)
        .bind(id)
        .execute(db)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Bump updated_at after a change to something the session owns
    pub async fn touch<'e, E>(db: E, id: &str, now: &str) -> Result<(), sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query("UPDATE voting_sessions SET updated_at = ? WHERE id = ?")
            .bind(now)
            .bind(id)
            .execute(db)
            .await?;
        Ok(())
    }

    /// Delete the session; owned rows go with it through ON DELETE CASCADE
    pub async fn delete<'e, E>(db: E, id: &str) -> Result<bool, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query("DELETE FROM voting_sessions WHERE id = ?")
            .bind(id)
            .execute(db)
            .await?;
        Ok(result.rows_affected() == 1)
    }
}

/// Session fields safe to show anyone holding the voting code
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub mode: String,
    pub result_display: String,
    pub is_active: bool,
    pub created_at: String,
    pub closed_at: Option<String>,
}

impl From<&VotingSession> for SessionSummary {
    fn from(session: &VotingSession) -> Self {
        Self {
            id: session.id.clone(),
            title: session.title.clone(),
            description: session.description.clone(),
            mode: session.mode.clone(),
            result_display: session.result_display.clone(),
            is_active: session.is_active,
            created_at: session.created_at.clone(),
            closed_at: session.closed_at.clone(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCandidateInput {
    #[serde(default)]
    pub name: String,
    pub description: Option<String>,
    pub photo_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePositionInput {
    #[serde(default)]
    pub title: String,
    pub description: Option<String>,
    pub max_selections: Option<i64>,
    #[serde(default)]
    pub candidates: Vec<CreateCandidateInput>,
}

/// Body of POST /api/sessions. Every field is optional at the serde level so
/// missing values surface as validation errors rather than parse failures.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    #[serde(default)]
    pub title: String,
    pub description: Option<String>,
    pub mode: Option<String>,
    pub result_display: Option<String>,
    #[serde(default)]
    pub positions: Vec<CreatePositionInput>,
    #[serde(default)]
    pub invited_emails: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionResponse {
    pub message: String,
    pub session_id: String,
    pub voting_code: String,
    pub admin_code: String,
    pub mode: SessionMode,
    pub invited_voters_count: usize,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminCodeRequest {
    #[serde(default)]
    pub admin_code: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_round_trip_strings() {
        assert_eq!("casual".parse::<SessionMode>().unwrap(), SessionMode::Casual);
        assert_eq!("official".parse::<SessionMode>().unwrap(), SessionMode::Official);
        assert!("Official".parse::<SessionMode>().is_err());
        assert_eq!(SessionMode::Official.to_string(), "official");
    }

    #[test]
    fn test_result_display_serde_names() {
        let json = serde_json::to_string(&ResultDisplay::AfterCloses).unwrap();
        assert_eq!(json, "\"after-closes\"");
        let parsed: ResultDisplay = serde_json::from_str("\"realtime\"").unwrap();
        assert_eq!(parsed, ResultDisplay::Realtime);
    }

    #[test]
    fn test_unknown_result_display_falls_back_to_hidden() {
        assert_eq!(ResultDisplay::from("bogus".to_string()), ResultDisplay::AfterCloses);
    }
}
