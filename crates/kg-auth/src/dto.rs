use kg_core::Epoch;
use kg_core::Unique;

use crate::AuthContext;
use crate::User;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: String,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    /// Role names to grant at creation.
    #[serde(default)]
    pub roles: Vec<String>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ResetRequest {
    pub email: Option<String>,
    pub username: Option<String>,
}

/// A freshly issued session token and its absolute expiry.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TokenResponse {
    pub token: String,
    pub expiration: Epoch,
}

/// Registration result: the new identity's session token plus the
/// confirmation token it must spend before the confirm deadline.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RegisterResponse {
    pub token: String,
    pub confirm_token: String,
    pub expiration: Epoch,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct UserInfo {
    pub id: uuid::Uuid,
    pub username: String,
    pub email: String,
    pub active: bool,
    pub confirmed: bool,
    pub roles: Vec<String>,
}

impl From<&AuthContext> for UserInfo {
    fn from(context: &AuthContext) -> Self {
        let mut roles = context.roles().iter().cloned().collect::<Vec<_>>();
        roles.sort();
        Self {
            id: context.user().id().inner(),
            username: context.user().username().to_string(),
            email: context.user().email().to_string(),
            active: context.user().active(),
            confirmed: context.user().confirmed(),
            roles,
        }
    }
}

impl From<&User> for UserInfo {
    fn from(user: &User) -> Self {
        Self {
            id: user.id().inner(),
            username: user.username().to_string(),
            email: user.email().to_string(),
            active: user.active(),
            confirmed: user.confirmed(),
            roles: Vec::new(),
        }
    }
}
