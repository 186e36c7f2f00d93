//! crates/achievement_core/src/domain.rs
//!
//! Defines the core data structures for the application: identities, the
//! relational achievement reference and the document-store achievement detail.
//! Serde derives are limited to what the document store and token layer need.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

//=========================================================================================
// Identity
//=========================================================================================

/// An account as stored in the relational `users` table joined with its role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    /// Write-only: never leaves the process in a serialized form.
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub full_name: String,
    pub role_id: Uuid,
    pub role_name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//=========================================================================================
// Achievement workflow
//=========================================================================================

/// Workflow stage of an achievement. Deletion is not a stage; it is a tombstone
/// timestamp on the reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AchievementStatus {
    Draft,
    Submitted,
    Verified,
    Rejected,
}

impl AchievementStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Submitted => "submitted",
            Self::Verified => "verified",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for AchievementStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown achievement status '{0}'")]
pub struct UnknownStatus(pub String);

impl FromStr for AchievementStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "submitted" => Ok(Self::Submitted),
            "verified" => Ok(Self::Verified),
            "rejected" => Ok(Self::Rejected),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// The relational row that owns an achievement's lifecycle.
#[derive(Debug, Clone, PartialEq)]
pub struct AchievementReference {
    pub id: Uuid,
    pub student_id: Uuid,
    /// Id of the paired detail record in the document store.
    pub detail_id: String,
    pub status: AchievementStatus,
    pub created_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl AchievementReference {
    pub fn is_live(&self) -> bool {
        self.deleted_at.is_none()
    }
}

/// The owner-editable part of an achievement.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AchievementContent {
    pub achievement_type: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub details: Map<String, Value>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub event_date: Option<DateTime<Utc>>,
}

impl AchievementContent {
    /// Returns the name of the first required field that is blank.
    pub fn missing_field(&self) -> Option<&'static str> {
        if self.achievement_type.trim().is_empty() {
            return Some("achievement_type");
        }
        if self.title.trim().is_empty() {
            return Some("title");
        }
        None
    }
}

/// A document-store record. Serialized as-is into the document collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AchievementDetail {
    pub id: String,
    pub student_id: Uuid,
    #[serde(flatten)]
    pub content: AchievementContent,
    #[serde(default)]
    pub points: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl AchievementDetail {
    /// Generates a fresh opaque id for a detail record. Ids are produced by the
    /// application so that a retried write lands on the same document.
    pub fn new_id() -> String {
        Uuid::new_v4().simple().to_string()
    }
}

/// A live achievement as seen by its owner: the reference joined with its detail.
#[derive(Debug, Clone, PartialEq)]
pub struct Achievement {
    pub reference: AchievementReference,
    pub detail: AchievementDetail,
}

/// What `create` hands back to the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct CreatedAchievement {
    pub id: Uuid,
    pub detail_id: String,
    pub status: AchievementStatus,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_never_serializes() {
        let identity = Identity {
            id: Uuid::new_v4(),
            username: "ayu".into(),
            email: "ayu@kampus.ac.id".into(),
            password_hash: "$argon2id$secret".into(),
            full_name: "Ayu Lestari".into(),
            role_id: Uuid::new_v4(),
            role_name: "Mahasiswa".into(),
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let json = serde_json::to_string(&identity).unwrap();
        assert!(!json.contains("password_hash"));
        assert!(!json.contains("secret"));
    }

    #[test]
    fn status_parses_its_own_text() {
        for status in [
            AchievementStatus::Draft,
            AchievementStatus::Submitted,
            AchievementStatus::Verified,
            AchievementStatus::Rejected,
        ] {
            assert_eq!(status.as_str().parse::<AchievementStatus>().unwrap(), status);
        }
        assert!("archived".parse::<AchievementStatus>().is_err());
    }

    #[test]
    fn blank_title_is_reported() {
        let content = AchievementContent {
            achievement_type: "Competition".into(),
            title: "   ".into(),
            ..Default::default()
        };
        assert_eq!(content.missing_field(), Some("title"));
    }

    #[test]
    fn detail_document_is_flat() {
        let detail = AchievementDetail {
            id: AchievementDetail::new_id(),
            student_id: Uuid::new_v4(),
            content: AchievementContent {
                achievement_type: "Competition".into(),
                title: "Hackathon Winner".into(),
                tags: vec!["ai".into(), "team".into()],
                ..Default::default()
            },
            points: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            deleted_at: None,
        };

        let doc = serde_json::to_value(&detail).unwrap();
        assert_eq!(doc["title"], "Hackathon Winner");
        assert_eq!(doc["tags"][1], "team");
        let back: AchievementDetail = serde_json::from_value(doc).unwrap();
        assert_eq!(back, detail);
    }
}
