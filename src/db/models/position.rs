//! Position (contest) models.

use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub id: String,
    #[serde(skip_serializing)]
    pub session_id: String,
    pub title: String,
    pub description: Option<String>,
    pub max_selections: i64,
    pub display_order: i64,
}

impl Position {
    pub async fn list_for_session<'e, E>(db: E, session_id: &str) -> Result<Vec<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as(
            "SELECT * FROM positions WHERE session_id = ? ORDER BY display_order ASC",
        )
        .bind(session_id)
        .fetch_all(db)
        .await
    }

    pub async fn find_by_id<'e, E>(db: E, id: &str) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as("SELECT * FROM positions WHERE id = ?")
            .bind(id)
            .fetch_optional(db)
            .await
    }

    pub async fn insert<'e, E>(&self, db: E) -> Result<(), sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query(
            r#"
            INSERT INTO positions (id, session_id, title, description, max_selections, display_order)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&self.id)
        .bind(&self.session_id)
        .bind(&self.title)
        .bind(&self.description)
        .bind(self.max_selections)
        .bind(self.display_order)
        .execute(db)
        .await?;
        Ok(())
    }
}
