//! services/api/src/adapters/documents.rs
//!
//! The document store adapter: achievement detail records kept as JSONB
//! documents keyed by their application-generated id, behind their own pool.

use achievement_core::domain::{AchievementContent, AchievementDetail};
use achievement_core::ports::{DetailStore, PortError, PortResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};

#[derive(Clone)]
pub struct DocumentStore {
    pool: PgPool,
}

impl DocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Runs the document-store migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        let mut migrator = sqlx::migrate!("./migrations/documents");
        migrator.set_ignore_missing(true);
        migrator.run(&self.pool).await
    }

    /// Merges `fields` into the top level of document `id`.
    async fn merge(&self, id: &str, fields: Value) -> PortResult<()> {
        let result = sqlx::query("UPDATE achievement_documents SET doc = doc || $2 WHERE id = $1")
            .bind(id)
            .bind(Json(fields))
            .execute(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("achievement detail {id}")));
        }
        Ok(())
    }
}

#[derive(FromRow)]
struct DocumentRecord {
    doc: Json<AchievementDetail>,
}

#[async_trait]
impl DetailStore for DocumentStore {
    async fn upsert(&self, detail: &AchievementDetail) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO achievement_documents (id, doc) VALUES ($1, $2) \
             ON CONFLICT (id) DO UPDATE SET doc = EXCLUDED.doc",
        )
        .bind(&detail.id)
        .bind(Json(detail))
        .execute(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(())
    }

    async fn find(&self, id: &str) -> PortResult<Option<AchievementDetail>> {
        let record = sqlx::query_as::<_, DocumentRecord>(
            "SELECT doc FROM achievement_documents WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        Ok(record.map(|r| r.doc.0))
    }

    async fn replace_content(
        &self,
        id: &str,
        content: &AchievementContent,
        at: DateTime<Utc>,
    ) -> PortResult<AchievementDetail> {
        // The row lock taken by `old` makes the read and the merge one step.
        let record = sqlx::query_as::<_, DocumentRecord>(
            "WITH old AS (SELECT id, doc FROM achievement_documents WHERE id = $1 FOR UPDATE) \
             UPDATE achievement_documents d SET doc = d.doc || $2 \
             FROM old WHERE d.id = old.id \
             RETURNING old.doc",
        )
        .bind(id)
        .bind(Json(content_fields(content, at)?))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        record
            .map(|r| r.doc.0)
            .ok_or_else(|| PortError::NotFound(format!("achievement detail {id}")))
    }

    async fn restore_content(
        &self,
        id: &str,
        previous: &AchievementDetail,
        written_at: DateTime<Utc>,
    ) -> PortResult<bool> {
        let result = sqlx::query(
            "UPDATE achievement_documents SET doc = doc || $2 \
             WHERE id = $1 AND doc->>'updated_at' = $3",
        )
        .bind(id)
        .bind(Json(content_fields(&previous.content, previous.updated_at)?))
        .bind(timestamp_text(written_at)?)
        .execute(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        Ok(result.rows_affected() == 1)
    }

    async fn set_deleted_at(&self, id: &str, at: Option<DateTime<Utc>>) -> PortResult<()> {
        self.merge(id, json!({ "deleted_at": at })).await
    }
}

/// The owner-editable fields plus `updated_at`, shaped for a top-level merge.
fn content_fields(content: &AchievementContent, at: DateTime<Utc>) -> PortResult<Value> {
    let mut fields =
        serde_json::to_value(content).map_err(|e| PortError::Unexpected(e.to_string()))?;
    if let Value::Object(map) = &mut fields {
        map.insert("updated_at".into(), json!(at));
    }
    Ok(fields)
}

/// `at` exactly as serde writes it into a document.
fn timestamp_text(at: DateTime<Utc>) -> PortResult<String> {
    match serde_json::to_value(at) {
        Ok(Value::String(text)) => Ok(text),
        Ok(other) => Err(PortError::Unexpected(format!("timestamp encoded as {other}"))),
        Err(e) => Err(PortError::Unexpected(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn guard_text_matches_the_stored_timestamp() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap()
            + chrono::Duration::microseconds(123_456);
        let content = AchievementContent {
            achievement_type: "Competition".into(),
            title: "Hackathon".into(),
            ..Default::default()
        };

        let fields = content_fields(&content, at).unwrap();
        assert_eq!(
            fields["updated_at"].as_str(),
            Some(timestamp_text(at).unwrap().as_str())
        );
        assert_eq!(fields["title"], "Hackathon");
    }
}
