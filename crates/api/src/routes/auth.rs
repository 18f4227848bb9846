//! Caller identity extractors.
//!
//! Authentication happens upstream. The caller's user ID and role arrive in
//! the `x-user-id` and `x-user-role` headers and are trusted as-is.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use common::UserId;

use crate::error::ApiError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// Role of the calling user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    Customer,
}

/// The authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub user_id: UserId,
    pub role: Role,
}

impl Identity {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

impl<S: Send + Sync> FromRequestParts<S> for Identity {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|h| h.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized("Unauthorized".to_string()))?
            .parse::<UserId>()
            .map_err(|_| ApiError::Unauthorized("Invalid user ID".to_string()))?;

        let role = match parts
            .headers
            .get(USER_ROLE_HEADER)
            .and_then(|h| h.to_str().ok())
        {
            Some(role) if role.eq_ignore_ascii_case("ADMIN") => Role::Admin,
            Some(role) if role.eq_ignore_ascii_case("CUSTOMER") => Role::Customer,
            None => Role::Customer,
            Some(other) => {
                tracing::warn!(role = other, "request with unknown role");
                return Err(ApiError::Unauthorized(format!("Unknown role: {other}")));
            }
        };

        Ok(Identity { user_id, role })
    }
}

/// An authenticated caller with the ADMIN role.
#[derive(Debug, Clone, Copy)]
pub struct Admin(pub Identity);

impl<S: Send + Sync> FromRequestParts<S> for Admin {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let identity = Identity::from_request_parts(parts, state).await?;
        if !identity.is_admin() {
            tracing::warn!(user_id = %identity.user_id, uri = %parts.uri, "admin route denied");
            return Err(ApiError::Forbidden("Forbidden".to_string()));
        }
        Ok(Admin(identity))
    }
}
