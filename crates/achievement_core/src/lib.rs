pub mod auth;
pub mod domain;
pub mod memory;
pub mod ports;
pub mod workflow;

pub use auth::{
    AuthError, Claims, CredentialVerifier, PermissionGate, RolePermissions, TokenAuthority,
    TokenKind, TokenPair, TokenSettings,
};
pub use domain::{
    Achievement, AchievementContent, AchievementDetail, AchievementReference, AchievementStatus,
    CreatedAchievement, Identity,
};
pub use ports::{DetailStore, IdentityStore, PortError, PortResult, ReferenceStore, StudentDirectory};
pub use workflow::{AchievementWorkflow, WorkflowError};
