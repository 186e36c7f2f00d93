//! crates/achievement_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture: the relational
//! store and the document store are reached only through them.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{AchievementContent, AchievementDetail, AchievementReference, Identity};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Store call timed out: {0}")]
    Timeout(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Relational Store Ports
//=========================================================================================

#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Finds an account by username or email, joined with its role name.
    async fn find_by_login(&self, identifier: &str) -> PortResult<Option<Identity>>;
}

#[async_trait]
pub trait StudentDirectory: Send + Sync {
    /// Resolves the student profile id owned by a user account, if any.
    async fn student_id_for_user(&self, user_id: Uuid) -> PortResult<Option<Uuid>>;
}

/// Access to `achievement_references`. Every read ignores tombstoned rows and
/// every state-changing write is conditional: the `bool` result reports
/// whether a live draft row was actually changed.
#[async_trait]
pub trait ReferenceStore: Send + Sync {
    async fn insert(&self, reference: &AchievementReference) -> PortResult<()>;

    async fn find_live(&self, id: Uuid) -> PortResult<Option<AchievementReference>>;

    async fn list_live_for_student(&self, student_id: Uuid) -> PortResult<Vec<AchievementReference>>;

    /// Bumps `updated_at` on a live draft.
    async fn touch_draft(&self, id: Uuid, at: DateTime<Utc>) -> PortResult<bool>;

    /// Sets `deleted_at` on a live draft.
    async fn tombstone_draft(&self, id: Uuid, at: DateTime<Utc>) -> PortResult<bool>;

    /// Moves a live draft to `submitted`, stamping `submitted_at` and `updated_at`.
    async fn submit_draft(&self, id: Uuid, at: DateTime<Utc>) -> PortResult<bool>;
}

//=========================================================================================
// Document Store Port
//=========================================================================================

#[async_trait]
pub trait DetailStore: Send + Sync {
    /// Inserts the document or replaces the one with the same id.
    async fn upsert(&self, detail: &AchievementDetail) -> PortResult<()>;

    async fn find(&self, id: &str) -> PortResult<Option<AchievementDetail>>;

    /// Overwrites the owner-editable fields and `updated_at`, returning the
    /// document as it was just before the write. Read and write are atomic.
    async fn replace_content(
        &self,
        id: &str,
        content: &AchievementContent,
        at: DateTime<Utc>,
    ) -> PortResult<AchievementDetail>;

    /// Puts `previous` back, but only while the document's `updated_at` is
    /// still `written_at`. Returns whether the restore applied.
    async fn restore_content(
        &self,
        id: &str,
        previous: &AchievementDetail,
        written_at: DateTime<Utc>,
    ) -> PortResult<bool>;

    async fn set_deleted_at(&self, id: &str, at: Option<DateTime<Utc>>) -> PortResult<()>;
}
