//! services/api/src/web/state.rs
//!
//! Defines the application's shared state, created once at startup and
//! passed to every handler and middleware.

use std::sync::Arc;

use achievement_core::ports::{DetailStore, IdentityStore, ReferenceStore, StudentDirectory};
use achievement_core::{
    AchievementWorkflow, CredentialVerifier, PermissionGate, RolePermissions, TokenAuthority,
    TokenSettings,
};

use crate::config::Config;

/// The store adapters the services are built on.
pub struct Stores {
    pub identities: Arc<dyn IdentityStore>,
    pub students: Arc<dyn StudentDirectory>,
    pub references: Arc<dyn ReferenceStore>,
    pub details: Arc<dyn DetailStore>,
}

/// The shared application state. Everything in it is immutable after startup.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub credentials: CredentialVerifier,
    pub tokens: Arc<TokenAuthority>,
    pub permissions: Arc<PermissionGate>,
    pub achievements: Arc<AchievementWorkflow>,
}

impl AppState {
    pub fn new(config: Arc<Config>, permissions: RolePermissions, stores: Stores) -> Self {
        let tokens = TokenAuthority::new(TokenSettings {
            secret: config.jwt_secret.clone(),
            access_ttl: config.access_token_ttl,
            refresh_ttl: config.refresh_token_ttl,
        });
        let achievements =
            AchievementWorkflow::new(stores.students, stores.references, stores.details)
                .with_store_timeout(config.store_timeout);

        Self {
            credentials: CredentialVerifier::new(stores.identities),
            tokens: Arc::new(tokens),
            permissions: Arc::new(PermissionGate::new(permissions)),
            achievements: Arc::new(achievements),
            config,
        }
    }
}
