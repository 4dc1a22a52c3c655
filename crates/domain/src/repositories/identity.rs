use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::value_objects::enums::user_roles::UserRole;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserProfile {
    pub id: Uuid,
    pub role: UserRole,
    pub email: Option<String>,
}

/// Resolves an opaque external user id to a role and email. Treated as a
/// fallible dependency: callers degrade gracefully when it is unavailable.
#[automock]
#[async_trait]
pub trait IdentityProvider {
    async fn resolve_user(&self, user_id: Uuid) -> Result<UserProfile>;
}
