//! services/api/src/adapters/db.rs
//!
//! This module contains the relational database adapter: the concrete
//! implementation of the `IdentityStore`, `StudentDirectory` and
//! `ReferenceStore` ports from the `core` crate. It handles all interactions
//! with the PostgreSQL tables using `sqlx`.
//!
//! Every state change is a single conditional `UPDATE`; its row count tells
//! the workflow whether the row was still a live draft.

use achievement_core::domain::{AchievementReference, AchievementStatus, Identity};
use achievement_core::ports::{
    IdentityStore, PortError, PortResult, ReferenceStore, StudentDirectory,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// The Postgres adapter for accounts, student profiles and achievement references.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Creates a new `PgStore`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Runs the relational migrations at startup.
    ///
    /// Both migration sets may share one `_sqlx_migrations` table, so versions
    /// applied by the other set are ignored.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        let mut migrator = sqlx::migrate!("./migrations/relational");
        migrator.set_ignore_missing(true);
        migrator.run(&self.pool).await
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct IdentityRecord {
    id: Uuid,
    username: String,
    email: String,
    password_hash: String,
    full_name: String,
    role_id: Uuid,
    role_name: String,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl IdentityRecord {
    fn to_domain(self) -> Identity {
        Identity {
            id: self.id,
            username: self.username,
            email: self.email,
            password_hash: self.password_hash,
            full_name: self.full_name,
            role_id: self.role_id,
            role_name: self.role_name,
            is_active: self.is_active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(FromRow)]
struct ReferenceRecord {
    id: Uuid,
    student_id: Uuid,
    mongo_achievement_id: String,
    status: String,
    created_at: DateTime<Utc>,
    submitted_at: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}
impl ReferenceRecord {
    fn to_domain(self) -> PortResult<AchievementReference> {
        let status = self
            .status
            .parse::<AchievementStatus>()
            .map_err(|e| PortError::Unexpected(format!("achievement {}: {e}", self.id)))?;
        Ok(AchievementReference {
            id: self.id,
            student_id: self.student_id,
            detail_id: self.mongo_achievement_id,
            status,
            created_at: self.created_at,
            submitted_at: self.submitted_at,
            updated_at: self.updated_at,
            deleted_at: self.deleted_at,
        })
    }
}

const REFERENCE_COLUMNS: &str = "id, student_id, mongo_achievement_id, status, created_at, \
     submitted_at, updated_at, deleted_at";

//=========================================================================================
// Port Implementations
//=========================================================================================

#[async_trait]
impl IdentityStore for PgStore {
    async fn find_by_login(&self, identifier: &str) -> PortResult<Option<Identity>> {
        let record = sqlx::query_as::<_, IdentityRecord>(
            "SELECT u.id, u.username, u.email, u.password_hash, u.full_name, u.role_id, \
                    r.name AS role_name, u.is_active, u.created_at, u.updated_at \
             FROM users u \
             JOIN roles r ON u.role_id = r.id \
             WHERE u.username = $1 OR u.email = $1",
        )
        .bind(identifier)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(record.map(IdentityRecord::to_domain))
    }
}

#[async_trait]
impl StudentDirectory for PgStore {
    async fn student_id_for_user(&self, user_id: Uuid) -> PortResult<Option<Uuid>> {
        sqlx::query_scalar::<_, Uuid>("SELECT id FROM students WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)
    }
}

#[async_trait]
impl ReferenceStore for PgStore {
    async fn insert(&self, reference: &AchievementReference) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO achievement_references \
                 (id, student_id, mongo_achievement_id, status, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(reference.id)
        .bind(reference.student_id)
        .bind(&reference.detail_id)
        .bind(reference.status.as_str())
        .bind(reference.created_at)
        .bind(reference.updated_at)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn find_live(&self, id: Uuid) -> PortResult<Option<AchievementReference>> {
        let query = format!(
            "SELECT {REFERENCE_COLUMNS} FROM achievement_references \
             WHERE id = $1 AND deleted_at IS NULL"
        );
        sqlx::query_as::<_, ReferenceRecord>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?
            .map(ReferenceRecord::to_domain)
            .transpose()
    }

    async fn list_live_for_student(&self, student_id: Uuid) -> PortResult<Vec<AchievementReference>> {
        let query = format!(
            "SELECT {REFERENCE_COLUMNS} FROM achievement_references \
             WHERE student_id = $1 AND deleted_at IS NULL \
             ORDER BY created_at DESC"
        );
        sqlx::query_as::<_, ReferenceRecord>(&query)
            .bind(student_id)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?
            .into_iter()
            .map(ReferenceRecord::to_domain)
            .collect()
    }

    async fn touch_draft(&self, id: Uuid, at: DateTime<Utc>) -> PortResult<bool> {
        let result = sqlx::query(
            "UPDATE achievement_references SET updated_at = $2 \
             WHERE id = $1 AND status = 'draft' AND deleted_at IS NULL",
        )
        .bind(id)
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(result.rows_affected() == 1)
    }

    async fn tombstone_draft(&self, id: Uuid, at: DateTime<Utc>) -> PortResult<bool> {
        let result = sqlx::query(
            "UPDATE achievement_references SET deleted_at = $2, updated_at = $2 \
             WHERE id = $1 AND status = 'draft' AND deleted_at IS NULL",
        )
        .bind(id)
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(result.rows_affected() == 1)
    }

    async fn submit_draft(&self, id: Uuid, at: DateTime<Utc>) -> PortResult<bool> {
        let result = sqlx::query(
            "UPDATE achievement_references \
             SET status = 'submitted', submitted_at = $2, updated_at = $2 \
             WHERE id = $1 AND status = 'draft' AND deleted_at IS NULL",
        )
        .bind(id)
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(result.rows_affected() == 1)
    }
}
