use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use super::AppState;
use crate::{
    models::users::User,
    services::{call, users::UserRequest, ServiceError},
};

/// Caller identified by a bearer session token.
pub struct AuthUser(pub User);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ServiceError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;

        let user = call(&state.user_channel, "User", |response| {
            UserRequest::Authenticate { token, response }
        })
        .await?;

        Ok(AuthUser(user))
    }
}

/// Authenticated caller with a staff account.
pub struct AdminUser(pub User);

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ServiceError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let AuthUser(user) = AuthUser::from_request_parts(parts, state).await?;

        if !user.is_staff {
            log::warn!("User {} tried to reach {}.", user.telegram_id, parts.uri.path());
            return Err(ServiceError::Forbidden(
                "You do not have permission to perform this action.".to_string(),
            ));
        }

        Ok(AdminUser(user))
    }
}

fn bearer_token(parts: &Parts) -> Result<String, ServiceError> {
    let header = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .ok_or_else(|| {
            ServiceError::Unauthorized("Authentication credentials were not provided.".to_string())
        })?;

    match header.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(token.trim().to_string()),
        _ => Err(ServiceError::Unauthorized(
            "Invalid Authorization header format.".to_string(),
        )),
    }
}
