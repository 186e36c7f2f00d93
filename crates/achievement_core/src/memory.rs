//! crates/achievement_core/src/memory.rs
//!
//! An in-process implementation of every store port. State transitions are
//! applied under a write lock, so conditional updates behave like the
//! `UPDATE ... WHERE status = 'draft'` statements of the Postgres adapters.
//! Used by the test suites and for running the API without a database.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::auth::{hash_password, AuthError};
use crate::domain::{
    AchievementContent, AchievementDetail, AchievementReference, AchievementStatus, Identity,
};
use crate::ports::{
    DetailStore, IdentityStore, PortError, PortResult, ReferenceStore, StudentDirectory,
};

#[derive(Default)]
pub struct MemoryStore {
    identities: RwLock<HashMap<Uuid, Identity>>,
    /// user id → student id
    students: RwLock<HashMap<Uuid, Uuid>>,
    references: RwLock<HashMap<Uuid, AchievementReference>>,
    details: RwLock<HashMap<String, AchievementDetail>>,
    reject_reference_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an active account with an Argon2 hash of `password`.
    pub async fn add_identity(
        &self,
        username: &str,
        role_name: &str,
        password: &str,
    ) -> Result<Identity, AuthError> {
        let now = Utc::now();
        let identity = Identity {
            id: Uuid::new_v4(),
            username: username.to_string(),
            email: format!("{username}@kampus.ac.id"),
            password_hash: hash_password(password)?,
            full_name: username.to_string(),
            role_id: Uuid::new_v4(),
            role_name: role_name.to_string(),
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.identities
            .write()
            .await
            .insert(identity.id, identity.clone());
        Ok(identity)
    }

    pub async fn set_active(&self, user_id: Uuid, active: bool) {
        if let Some(identity) = self.identities.write().await.get_mut(&user_id) {
            identity.is_active = active;
        }
    }

    /// Gives `user_id` a student profile and returns its id.
    pub async fn add_student(&self, user_id: Uuid) -> Uuid {
        let student_id = Uuid::new_v4();
        self.students.write().await.insert(user_id, student_id);
        student_id
    }

    /// Makes every subsequent reference insert fail, to exercise partial writes.
    #[cfg(any(test, feature = "test-util"))]
    pub fn reject_reference_writes(&self, reject: bool) {
        self.reject_reference_writes.store(reject, Ordering::SeqCst);
    }

    /// Raw reference row, tombstoned or not.
    pub async fn reference(&self, id: Uuid) -> Option<AchievementReference> {
        self.references.read().await.get(&id).cloned()
    }

    /// Raw detail document, tombstoned or not.
    pub async fn detail(&self, id: &str) -> Option<AchievementDetail> {
        self.details.read().await.get(id).cloned()
    }

    pub async fn detail_count(&self) -> usize {
        self.details.read().await.len()
    }

    pub async fn reference_count(&self) -> usize {
        self.references.read().await.len()
    }

    /// Applies `change` to a live draft row; reports whether it applied.
    async fn change_live_draft(
        &self,
        id: Uuid,
        change: impl FnOnce(&mut AchievementReference),
    ) -> PortResult<bool> {
        let mut references = self.references.write().await;
        match references.get_mut(&id) {
            Some(row) if row.is_live() && row.status == AchievementStatus::Draft => {
                change(row);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl IdentityStore for MemoryStore {
    async fn find_by_login(&self, identifier: &str) -> PortResult<Option<Identity>> {
        Ok(self
            .identities
            .read()
            .await
            .values()
            .find(|i| i.username == identifier || i.email == identifier)
            .cloned())
    }
}

#[async_trait]
impl StudentDirectory for MemoryStore {
    async fn student_id_for_user(&self, user_id: Uuid) -> PortResult<Option<Uuid>> {
        Ok(self.students.read().await.get(&user_id).copied())
    }
}

#[async_trait]
impl ReferenceStore for MemoryStore {
    async fn insert(&self, reference: &AchievementReference) -> PortResult<()> {
        if self.reject_reference_writes.load(Ordering::SeqCst) {
            return Err(PortError::Unexpected("reference store unavailable".into()));
        }
        let mut references = self.references.write().await;
        if references.contains_key(&reference.id) {
            return Err(PortError::Unexpected(format!(
                "duplicate achievement reference {}",
                reference.id
            )));
        }
        references.insert(reference.id, reference.clone());
        Ok(())
    }

    async fn find_live(&self, id: Uuid) -> PortResult<Option<AchievementReference>> {
        Ok(self
            .references
            .read()
            .await
            .get(&id)
            .filter(|r| r.is_live())
            .cloned())
    }

    async fn list_live_for_student(&self, student_id: Uuid) -> PortResult<Vec<AchievementReference>> {
        let mut rows: Vec<AchievementReference> = self
            .references
            .read()
            .await
            .values()
            .filter(|r| r.student_id == student_id && r.is_live())
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn touch_draft(&self, id: Uuid, at: DateTime<Utc>) -> PortResult<bool> {
        self.change_live_draft(id, |row| row.updated_at = at).await
    }

    async fn tombstone_draft(&self, id: Uuid, at: DateTime<Utc>) -> PortResult<bool> {
        self.change_live_draft(id, |row| row.deleted_at = Some(at)).await
    }

    async fn submit_draft(&self, id: Uuid, at: DateTime<Utc>) -> PortResult<bool> {
        self.change_live_draft(id, |row| {
            row.status = AchievementStatus::Submitted;
            row.submitted_at = Some(at);
            row.updated_at = at;
        })
        .await
    }
}

#[async_trait]
impl DetailStore for MemoryStore {
    async fn upsert(&self, detail: &AchievementDetail) -> PortResult<()> {
        self.details
            .write()
            .await
            .insert(detail.id.clone(), detail.clone());
        Ok(())
    }

    async fn find(&self, id: &str) -> PortResult<Option<AchievementDetail>> {
        Ok(self.details.read().await.get(id).cloned())
    }

    async fn replace_content(
        &self,
        id: &str,
        content: &AchievementContent,
        at: DateTime<Utc>,
    ) -> PortResult<AchievementDetail> {
        let mut details = self.details.write().await;
        let detail = details
            .get_mut(id)
            .ok_or_else(|| PortError::NotFound(format!("achievement detail {id}")))?;
        let previous = detail.clone();
        detail.content = content.clone();
        detail.updated_at = at;
        Ok(previous)
    }

    async fn restore_content(
        &self,
        id: &str,
        previous: &AchievementDetail,
        written_at: DateTime<Utc>,
    ) -> PortResult<bool> {
        let mut details = self.details.write().await;
        match details.get_mut(id) {
            Some(detail) if detail.updated_at == written_at => {
                detail.content = previous.content.clone();
                detail.updated_at = previous.updated_at;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn set_deleted_at(&self, id: &str, at: Option<DateTime<Utc>>) -> PortResult<()> {
        let mut details = self.details.write().await;
        let detail = details
            .get_mut(id)
            .ok_or_else(|| PortError::NotFound(format!("achievement detail {id}")))?;
        detail.deleted_at = at;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn detail(title: &str, at: DateTime<Utc>) -> AchievementDetail {
        AchievementDetail {
            id: AchievementDetail::new_id(),
            student_id: Uuid::new_v4(),
            content: AchievementContent {
                achievement_type: "Competition".into(),
                title: title.into(),
                ..Default::default()
            },
            points: 0,
            created_at: at,
            updated_at: at,
            deleted_at: None,
        }
    }

    fn titled(title: &str) -> AchievementContent {
        AchievementContent {
            achievement_type: "Competition".into(),
            title: title.into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn replace_hands_back_what_it_overwrote() {
        let store = MemoryStore::new();
        let created = Utc::now();
        let original = detail("Original", created);
        store.upsert(&original).await.unwrap();

        let replaced = store
            .replace_content(&original.id, &titled("Edited"), created + Duration::seconds(1))
            .await
            .unwrap();

        assert_eq!(replaced, original);
        assert_eq!(store.detail(&original.id).await.unwrap().content.title, "Edited");
    }

    #[tokio::test]
    async fn restore_only_undoes_the_latest_write() {
        let store = MemoryStore::new();
        let created = Utc::now();
        let first_at = created + Duration::seconds(1);
        let second_at = created + Duration::seconds(2);
        let original = detail("Original", created);
        store.upsert(&original).await.unwrap();

        let before_first = store
            .replace_content(&original.id, &titled("First"), first_at)
            .await
            .unwrap();
        let before_second = store
            .replace_content(&original.id, &titled("Second"), second_at)
            .await
            .unwrap();

        assert!(!store.restore_content(&original.id, &before_first, first_at).await.unwrap());
        assert_eq!(store.detail(&original.id).await.unwrap().content.title, "Second");

        assert!(store.restore_content(&original.id, &before_second, second_at).await.unwrap());
        let restored = store.detail(&original.id).await.unwrap();
        assert_eq!(restored.content.title, "First");
        assert_eq!(restored.updated_at, first_at);
    }
}
