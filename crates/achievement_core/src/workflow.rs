//! crates/achievement_core/src/workflow.rs
//!
//! The achievement state machine, coordinated across the relational reference
//! store and the document detail store.
//!
//! Write ordering: every mutation that touches both stores writes the document
//! store first and the relational store second. The reference row decides
//! whether an achievement is visible, so a detail that never got referenced is
//! inert, while a reference pointing at a missing detail would be a broken
//! record. The stores share no transaction. If `create` fails after the detail
//! write, the detail stays behind as an orphan and is only logged; cleaning
//! orphans up is an out-of-band job keyed on detail ids with no reference.
//!
//! Transitions never read-then-write: the relational write is conditional on
//! the row still being a live draft. When that condition fails after the
//! document write already landed, the document change is reverted, unless a
//! later document write has replaced it or the record was deleted meanwhile.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::domain::{
    Achievement, AchievementContent, AchievementDetail, AchievementReference, AchievementStatus,
    CreatedAchievement,
};
use crate::ports::{DetailStore, PortError, PortResult, ReferenceStore, StudentDirectory};

/// Upper bound for a single store call.
const DEFAULT_STORE_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("Caller has no student profile")]
    NotAStudent,

    #[error("Achievement {0} not found")]
    NotFound(Uuid),

    #[error("Achievement belongs to another student")]
    Forbidden,

    #[error("Operation not allowed while the achievement is {current}")]
    InvalidState { current: AchievementStatus },

    #[error("Invalid achievement: {0}")]
    Validation(String),

    #[error("Storage failure: {0}")]
    Storage(#[from] PortError),
}

pub struct AchievementWorkflow {
    students: Arc<dyn StudentDirectory>,
    references: Arc<dyn ReferenceStore>,
    details: Arc<dyn DetailStore>,
    store_timeout: Duration,
}

impl AchievementWorkflow {
    pub fn new(
        students: Arc<dyn StudentDirectory>,
        references: Arc<dyn ReferenceStore>,
        details: Arc<dyn DetailStore>,
    ) -> Self {
        Self {
            students,
            references,
            details,
            store_timeout: Duration::from_secs(DEFAULT_STORE_TIMEOUT_SECS),
        }
    }

    pub fn with_store_timeout(mut self, store_timeout: Duration) -> Self {
        self.store_timeout = store_timeout;
        self
    }

    //=====================================================================================
    // Operations
    //=====================================================================================

    /// Creates a draft owned by the student profile of `owner` (a user id).
    pub async fn create(
        &self,
        owner: Uuid,
        content: AchievementContent,
    ) -> Result<CreatedAchievement, WorkflowError> {
        validate(&content)?;
        let student_id = self.caller_student(owner).await?;

        let now = Utc::now();
        let detail = AchievementDetail {
            id: AchievementDetail::new_id(),
            student_id,
            content,
            points: 0,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        self.bounded("detail upsert", self.details.upsert(&detail))
            .await?;

        let reference = AchievementReference {
            id: Uuid::new_v4(),
            student_id,
            detail_id: detail.id.clone(),
            status: AchievementStatus::Draft,
            created_at: now,
            submitted_at: None,
            updated_at: now,
            deleted_at: None,
        };
        if let Err(e) = self
            .bounded("reference insert", self.references.insert(&reference))
            .await
        {
            warn!(
                detail_id = %detail.id,
                %student_id,
                error = %e,
                "reference insert failed, detail record left orphaned"
            );
            return Err(e);
        }

        info!(achievement_id = %reference.id, %student_id, "achievement created as draft");
        Ok(CreatedAchievement {
            id: reference.id,
            detail_id: reference.detail_id,
            status: reference.status,
            created_at: reference.created_at,
        })
    }

    /// Fetches one live achievement owned by the caller.
    pub async fn get(&self, id: Uuid, caller: Uuid) -> Result<Achievement, WorkflowError> {
        let student_id = self.caller_student(caller).await?;
        let reference = self.owned_reference(id, student_id).await?;
        let detail = self.detail_for(&reference).await?;
        Ok(Achievement { reference, detail })
    }

    /// Lists the caller's live achievements, newest first.
    pub async fn list(&self, caller: Uuid) -> Result<Vec<Achievement>, WorkflowError> {
        let student_id = self.caller_student(caller).await?;
        let references = self
            .bounded(
                "reference listing",
                self.references.list_live_for_student(student_id),
            )
            .await?;

        let mut achievements = Vec::with_capacity(references.len());
        for reference in references {
            match self
                .bounded("detail lookup", self.details.find(&reference.detail_id))
                .await?
            {
                Some(detail) => achievements.push(Achievement { reference, detail }),
                None => error!(
                    achievement_id = %reference.id,
                    detail_id = %reference.detail_id,
                    "live reference points at a missing detail record"
                ),
            }
        }
        Ok(achievements)
    }

    /// Replaces the content of a draft.
    pub async fn update(
        &self,
        id: Uuid,
        caller: Uuid,
        content: AchievementContent,
    ) -> Result<(), WorkflowError> {
        validate(&content)?;
        let student_id = self.caller_student(caller).await?;
        let reference = self.owned_draft(id, student_id).await?;

        let now = Utc::now();
        let previous = self
            .bounded(
                "detail update",
                self.details
                    .replace_content(&reference.detail_id, &content, now),
            )
            .await?;

        if self
            .bounded("reference touch", self.references.touch_draft(id, now))
            .await?
        {
            info!(achievement_id = %id, "achievement draft updated");
            return Ok(());
        }

        let restored = self
            .revert(
                id,
                self.details
                    .restore_content(&reference.detail_id, &previous, now),
            )
            .await?;
        if !restored {
            debug!(achievement_id = %id, "detail rewritten since, keeping the newer content");
        }
        Err(self.lost_race(id).await)
    }

    /// Tombstones a draft in both stores.
    pub async fn delete(&self, id: Uuid, caller: Uuid) -> Result<(), WorkflowError> {
        let student_id = self.caller_student(caller).await?;
        let reference = self.owned_draft(id, student_id).await?;

        let now = Utc::now();
        self.bounded(
            "detail tombstone",
            self.details.set_deleted_at(&reference.detail_id, Some(now)),
        )
        .await?;

        if self
            .bounded("reference tombstone", self.references.tombstone_draft(id, now))
            .await?
        {
            info!(achievement_id = %id, "achievement draft deleted");
            return Ok(());
        }

        // A reference tombstoned in the meantime keeps its detail tombstone.
        let outcome = self.lost_race(id).await;
        if matches!(outcome, WorkflowError::InvalidState { .. }) {
            self.revert(id, self.details.set_deleted_at(&reference.detail_id, None))
                .await?;
        }
        Err(outcome)
    }

    /// Moves a draft to `submitted`. Returns the submission time.
    pub async fn submit(&self, id: Uuid, caller: Uuid) -> Result<DateTime<Utc>, WorkflowError> {
        let student_id = self.caller_student(caller).await?;
        self.owned_draft(id, student_id).await?;

        let now = Utc::now();
        if self
            .bounded("reference submit", self.references.submit_draft(id, now))
            .await?
        {
            info!(achievement_id = %id, "achievement submitted for verification");
            return Ok(now);
        }

        Err(self.lost_race(id).await)
    }

    //=====================================================================================
    // Helpers
    //=====================================================================================

    async fn bounded<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = PortResult<T>>,
    ) -> Result<T, WorkflowError> {
        match timeout(self.store_timeout, call).await {
            Ok(result) => result.map_err(WorkflowError::from),
            Err(_) => Err(PortError::Timeout(operation.to_string()).into()),
        }
    }

    async fn caller_student(&self, user_id: Uuid) -> Result<Uuid, WorkflowError> {
        self.bounded("student lookup", self.students.student_id_for_user(user_id))
            .await?
            .ok_or(WorkflowError::NotAStudent)
    }

    async fn owned_reference(
        &self,
        id: Uuid,
        student_id: Uuid,
    ) -> Result<AchievementReference, WorkflowError> {
        let reference = self
            .bounded("reference lookup", self.references.find_live(id))
            .await?
            .ok_or(WorkflowError::NotFound(id))?;

        if reference.student_id != student_id {
            return Err(WorkflowError::Forbidden);
        }
        Ok(reference)
    }

    async fn owned_draft(
        &self,
        id: Uuid,
        student_id: Uuid,
    ) -> Result<AchievementReference, WorkflowError> {
        let reference = self.owned_reference(id, student_id).await?;
        if reference.status != AchievementStatus::Draft {
            return Err(WorkflowError::InvalidState {
                current: reference.status,
            });
        }
        Ok(reference)
    }

    async fn detail_for(
        &self,
        reference: &AchievementReference,
    ) -> Result<AchievementDetail, WorkflowError> {
        self.bounded("detail lookup", self.details.find(&reference.detail_id))
            .await?
            .ok_or_else(|| {
                error!(
                    achievement_id = %reference.id,
                    detail_id = %reference.detail_id,
                    "live reference points at a missing detail record"
                );
                PortError::NotFound(format!("detail record {}", reference.detail_id)).into()
            })
    }

    /// Undoes a document write whose relational counterpart did not apply.
    async fn revert<T>(
        &self,
        id: Uuid,
        undo: impl Future<Output = PortResult<T>>,
    ) -> Result<T, WorkflowError> {
        warn!(achievement_id = %id, "draft changed concurrently, reverting detail write");
        self.bounded("detail revert", undo).await.map_err(|e| {
            error!(
                achievement_id = %id,
                error = %e,
                "detail revert failed, detail no longer matches its reference"
            );
            e
        })
    }

    /// Explains why a conditional write matched no live draft.
    async fn lost_race(&self, id: Uuid) -> WorkflowError {
        match self
            .bounded("reference lookup", self.references.find_live(id))
            .await
        {
            Ok(Some(reference)) => WorkflowError::InvalidState {
                current: reference.status,
            },
            Ok(None) => WorkflowError::NotFound(id),
            Err(e) => e,
        }
    }
}

fn validate(content: &AchievementContent) -> Result<(), WorkflowError> {
    match content.missing_field() {
        Some(field) => Err(WorkflowError::Validation(format!("{field} is required"))),
        None => Ok(()),
    }
}
