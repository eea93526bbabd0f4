use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::repo_types::User;

/// Request body for user registration. Fields default to empty so that a
/// missing field reports the same message as a blank one.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub handle: String,
    pub password: String,
}

/// Request body for login.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// Response returned after login or register.
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub user: PublicUser,
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VerifyEmailResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Public part of the user returned to the client. The username goes out
/// as `name`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicUser {
    pub id: Uuid,
    #[serde(rename = "name")]
    pub username: String,
    pub email: String,
    pub handle: String,
    pub avatar: Option<String>,
    pub verified: bool,
}

impl From<User> for PublicUser {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            username: u.username,
            email: u.email,
            handle: u.handle,
            avatar: u.avatar,
            verified: u.verified,
        }
    }
}
